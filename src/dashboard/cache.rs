use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{
    AnalysisReport, ClusterAssignment, Dataset, ForecastSeries, PersonaTitle, RepositoryRecord,
    UserProfile,
};

/// Latest dataset of a session and everything derived from it.
///
/// Derived results are tagged with the generation of the dataset they were
/// computed from. Replacing the dataset bumps the generation and clears all
/// of them at once, so a late result from before a refresh is dropped.
#[derive(Debug, Default)]
pub struct SessionCache {
    dataset: Option<Arc<Dataset>>,
    generation: u64,
    analysis: Option<AnalysisReport>,
    clusters: Option<ClusterAssignment>,
    forecast: Option<ForecastSeries>,
    persona: Option<PersonaTitle>,
    last_error: Option<String>,
}

/// What the presentation layer should show.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ViewState {
    NoData,
    Partial {
        snapshot: SessionSnapshot,
        warnings: Vec<String>,
    },
    Ready {
        snapshot: SessionSnapshot,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub generation: u64,
    pub username: String,
    pub fetched_at: DateTime<Utc>,
    pub profile: Option<UserProfile>,
    pub repositories: Vec<RepositoryRecord>,
    pub analysis: Option<AnalysisReport>,
    pub clusters: Option<ClusterAssignment>,
    pub forecast: Option<ForecastSeries>,
    pub persona: Option<PersonaTitle>,
    pub last_error: Option<String>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn dataset(&self) -> Option<Arc<Dataset>> {
        self.dataset.clone()
    }

    /// Installs a fresh dataset and drops every derived result with the old one.
    pub fn replace_dataset(&mut self, dataset: Dataset) -> u64 {
        self.generation += 1;
        self.dataset = Some(Arc::new(dataset));
        self.analysis = None;
        self.clusters = None;
        self.forecast = None;
        self.persona = None;
        self.last_error = None;
        self.generation
    }

    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }

    pub fn set_analysis(&mut self, generation: u64, mut report: AnalysisReport) -> bool {
        let Some(dataset) = self.accept(generation, "analysis") else {
            return false;
        };
        report.records.retain(|r| dataset.contains(&r.repository));
        self.analysis = Some(report);
        self.last_error = None;
        true
    }

    pub fn set_clusters(&mut self, generation: u64, mut assignment: ClusterAssignment) -> bool {
        let Some(dataset) = self.accept(generation, "clustering") else {
            return false;
        };
        assignment.members.retain(|m| dataset.contains(&m.repository));
        self.clusters = Some(assignment);
        self.last_error = None;
        true
    }

    pub fn set_forecast(&mut self, generation: u64, mut series: ForecastSeries) -> bool {
        let Some(dataset) = self.accept(generation, "forecast") else {
            return false;
        };
        series.repositories.retain(|id| dataset.contains(id));
        self.forecast = Some(series);
        self.last_error = None;
        true
    }

    pub fn set_persona(&mut self, generation: u64, persona: PersonaTitle) -> bool {
        if self.accept(generation, "persona").is_none() {
            return false;
        }
        self.persona = Some(persona);
        true
    }

    pub fn analysis(&self) -> Option<&AnalysisReport> {
        self.analysis.as_ref()
    }

    pub fn clusters(&self) -> Option<&ClusterAssignment> {
        self.clusters.as_ref()
    }

    pub fn forecast(&self) -> Option<&ForecastSeries> {
        self.forecast.as_ref()
    }

    pub fn persona(&self) -> Option<&PersonaTitle> {
        self.persona.as_ref()
    }

    fn accept(&self, generation: u64, what: &str) -> Option<Arc<Dataset>> {
        if generation != self.generation {
            tracing::info!(
                "Discarding {} computed for generation {} (current {})",
                what,
                generation,
                self.generation
            );
            return None;
        }
        self.dataset.clone()
    }

    pub fn view(&self) -> ViewState {
        let Some(dataset) = &self.dataset else {
            return match &self.last_error {
                Some(error) => ViewState::Failed { error: error.clone() },
                None => ViewState::NoData,
            };
        };

        let mut warnings: Vec<String> = dataset
            .warnings
            .iter()
            .map(|w| format!("{} ({:?}): {}", w.repository, w.stage, w.message))
            .collect();
        if let Some(report) = &self.analysis {
            warnings.extend(report.warnings.iter().cloned());
        }
        if let Some(error) = &self.last_error {
            warnings.push(error.clone());
        }

        let snapshot = SessionSnapshot {
            generation: self.generation,
            username: dataset.username.clone(),
            fetched_at: dataset.fetched_at,
            profile: dataset.profile.clone(),
            repositories: dataset.records().cloned().collect(),
            analysis: self.analysis.clone(),
            clusters: self.clusters.clone(),
            forecast: self.forecast.clone(),
            persona: self.persona.clone(),
            last_error: self.last_error.clone(),
        };

        if warnings.is_empty() {
            ViewState::Ready { snapshot }
        } else {
            ViewState::Partial { snapshot, warnings }
        }
    }
}
