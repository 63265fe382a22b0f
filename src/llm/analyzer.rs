use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;

use crate::config::AnalyzerConfig;
use crate::error::{Error, Result};
use crate::llm::parser::{parse_analysis, parse_sentiment};
use crate::llm::prompts::{
    analysis_schema, persona_prompt, readme_tips_prompt, sentiment_prompt, sentiment_schema,
    AnalysisInput, PERSONA_SYSTEM_PROMPT, README_TIPS_SYSTEM_PROMPT, SYSTEM_PROMPT,
};
use crate::llm::provider::{GenerateRequest, LLMProvider};
use crate::models::{
    AnalysisOutcome, AnalysisRecord, AnalysisReport, Dataset, DeveloperStats, Sentiment,
    VariantResponse,
};
use crate::taxonomy::SkillTaxonomy;

pub struct LlmAnalyzer {
    provider: Arc<dyn LLMProvider>,
    taxonomy: SkillTaxonomy,
    config: AnalyzerConfig,
}

impl LlmAnalyzer {
    pub fn new(provider: Arc<dyn LLMProvider>, config: AnalyzerConfig) -> Self {
        Self {
            provider,
            taxonomy: SkillTaxonomy::new(),
            config,
        }
    }

    pub fn variants(&self) -> &[String] {
        &self.config.variants
    }

    pub fn default_variant(&self) -> &str {
        self.config.variants.first().map(String::as_str).unwrap_or("")
    }

    /// One input per repository with text; the rest are reported as skipped.
    pub fn build_inputs(&self, dataset: &Dataset) -> (Vec<AnalysisInput>, Vec<String>) {
        let mut inputs = Vec::new();
        let mut skipped = Vec::new();

        for repo in &dataset.repositories {
            match AnalysisInput::from_repository(
                repo,
                self.config.max_commit_messages,
                self.config.max_readme_chars,
            ) {
                Some(input) => inputs.push(input),
                None => skipped.push(format!("{}: no README or commit messages to analyze", repo.id())),
            }
        }

        (inputs, skipped)
    }

    /// Runs every variant over the same inputs. Variants never share results.
    pub async fn analyze_all(&self, inputs: &[AnalysisInput], variants: &[String]) -> AnalysisReport {
        let mut report = AnalysisReport::default();

        for variant in variants {
            tracing::info!("Analyzing {} input(s) with {}", inputs.len(), variant);
            let (records, warnings) = self.analyze_batch(inputs, variant).await;
            report.records.extend(records);
            report.warnings.extend(warnings);
        }

        tracing::info!(
            "Analysis finished: {} record(s), {} failed",
            report.records.len(),
            report.failed_count()
        );
        report
    }

    /// One record per input, ordered by repository id. A failing input is
    /// recorded as failed; the others still complete.
    pub async fn analyze_batch(&self, inputs: &[AnalysisInput], variant: &str) -> (Vec<AnalysisRecord>, Vec<String>) {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency_limit.max(1)));
        let pb = self.progress_bar(inputs.len(), variant);

        let futures = inputs.iter().map(|input| {
            let sem = semaphore.clone();
            let pb = pb.clone();
            async move {
                let _permit = sem.acquire().await;
                let outcome = self.analyze_one(input, variant).await;
                pb.inc(1);
                outcome
            }
        });

        let mut results = join_all(futures).await;
        pb.finish_and_clear();
        results.sort_by(|a, b| a.0.repository.cmp(&b.0.repository));

        let mut records = Vec::with_capacity(results.len());
        let mut warnings = Vec::new();
        for (record, warning) in results {
            records.push(record);
            warnings.extend(warning);
        }
        (records, warnings)
    }

    async fn analyze_one(&self, input: &AnalysisInput, variant: &str) -> (AnalysisRecord, Option<String>) {
        let request = GenerateRequest {
            model: variant.to_string(),
            prompt: input.to_prompt(),
            system: Some(SYSTEM_PROMPT.to_string()),
            schema: Some(analysis_schema()),
        };

        let started = Instant::now();
        let response = self.call(&input.repository, request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let (outcome, warning) = match response {
            Ok(text) => {
                let parsed = parse_analysis(&text);
                let mut result = parsed.result;
                result.skills = self.taxonomy.normalize_all(&result.skills);

                let warning = parsed.parse_failure.map(|reason| {
                    let err = Error::ParseFailure(reason);
                    tracing::debug!("{} / {}: {}", input.repository, variant, err);
                    format!("{} [{}]: {}", input.repository, variant, err)
                });
                (AnalysisOutcome::Completed { result }, warning)
            }
            Err(e) => {
                tracing::warn!("{} / {} failed: {}", input.repository, variant, e);
                let warning = format!("{} [{}]: {}", input.repository, variant, e);
                (AnalysisOutcome::Failed { reason: e.to_string() }, Some(warning))
            }
        };

        let record = AnalysisRecord {
            repository: input.repository.clone(),
            variant: variant.to_string(),
            outcome,
            elapsed_ms,
        };
        (record, warning)
    }

    /// Classifies a single commit message.
    pub async fn sentiment_of(&self, message: &str, variant: &str) -> Result<(Sentiment, bool)> {
        let request = GenerateRequest {
            model: variant.to_string(),
            prompt: sentiment_prompt(message),
            system: None,
            schema: Some(sentiment_schema()),
        };
        let text = self.call("commit message", request).await?;
        Ok(parse_sentiment(&text))
    }

    /// Same prompt on every variant, timed independently.
    pub async fn compare_models(&self, prompt: &str) -> Vec<VariantResponse> {
        let futures = self.config.variants.iter().map(|variant| async move {
            let request = GenerateRequest {
                model: variant.clone(),
                prompt: prompt.to_string(),
                system: None,
                schema: None,
            };
            let started = Instant::now();
            let result = self.call("comparison prompt", request).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(text) => VariantResponse {
                    variant: variant.clone(),
                    elapsed_ms,
                    response: Some(text.trim().to_string()),
                    error: None,
                },
                Err(e) => VariantResponse {
                    variant: variant.clone(),
                    elapsed_ms,
                    response: None,
                    error: Some(e.to_string()),
                },
            }
        });

        join_all(futures).await
    }

    pub async fn readme_tips(&self, repository: &str, readme: &str, variant: &str) -> Result<String> {
        if readme.trim().is_empty() {
            return Err(Error::InsufficientData {
                what: "README improvement tips",
                needed: 1,
                found: 0,
            });
        }

        let request = GenerateRequest {
            model: variant.to_string(),
            prompt: readme_tips_prompt(repository, readme),
            system: Some(README_TIPS_SYSTEM_PROMPT.to_string()),
            schema: None,
        };
        Ok(self.call(repository, request).await?.trim().to_string())
    }

    /// Falls back to a title derived from the stats when the model fails.
    pub async fn persona_title(&self, stats: &DeveloperStats, variant: &str) -> (String, bool) {
        let request = GenerateRequest {
            model: variant.to_string(),
            prompt: persona_prompt(stats),
            system: Some(PERSONA_SYSTEM_PROMPT.to_string()),
            schema: None,
        };

        match self.call("persona", request).await {
            Ok(text) => {
                let title = text.lines().next().unwrap_or("").trim().trim_matches('"').to_string();
                if title.is_empty() {
                    (fallback_title(stats), false)
                } else {
                    (title, true)
                }
            }
            Err(e) => {
                tracing::warn!("Persona generation failed: {}", e);
                (fallback_title(stats), false)
            }
        }
    }

    async fn call(&self, input: &str, request: GenerateRequest) -> Result<String> {
        let budget: Duration = self.config.timeout;
        match tokio::time::timeout(budget, self.provider.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::AnalysisTimeout {
                input: input.to_string(),
                after: budget,
            }),
        }
    }

    fn progress_bar(&self, len: usize, variant: &str) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(variant.to_string());
        pb
    }
}

fn fallback_title(stats: &DeveloperStats) -> String {
    match stats.top_language.as_deref() {
        Some(language) => format!("The {} {} Artisan", stats.chronotype, language),
        None => format!("The {} Coder", stats.chronotype),
    }
}
