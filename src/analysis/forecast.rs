use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDate};

use crate::config::{ForecastConfig, MAX_FORECAST_HORIZON_DAYS};
use crate::error::{Error, Result};
use crate::models::{CommitRecord, DailyCount, ForecastPoint, ForecastSeries};

/// Additive trend + seasonality model over daily commit counts.
///
/// The trend is an ordinary least-squares line through the daily series.
/// Seasonality is the mean detrended residual per position in the cycle,
/// centred so it sums to zero. Prediction bounds use the regression
/// standard error, so they grow with distance from the fitted window.
pub struct ActivityForecaster {
    config: ForecastConfig,
}

impl ActivityForecaster {
    pub fn new(config: ForecastConfig) -> Self {
        Self { config }
    }

    pub fn forecast<'a, I>(&self, commits: I, horizon_days: u32) -> Result<ForecastSeries>
    where
        I: IntoIterator<Item = &'a CommitRecord>,
    {
        let mut repositories = BTreeSet::new();
        let commits: Vec<&CommitRecord> = commits
            .into_iter()
            .inspect(|c| {
                repositories.insert(c.repository.clone());
            })
            .collect();

        let history = daily_counts(commits);
        let mut series = self.forecast_counts(history, horizon_days)?;
        series.repositories = repositories.into_iter().collect();
        Ok(series)
    }

    /// Forecast from an already bucketed, gap-free daily series.
    pub fn forecast_counts(&self, history: Vec<DailyCount>, horizon_days: u32) -> Result<ForecastSeries> {
        let season = self.config.season_length;
        if season < 2 {
            return Err(Error::InvalidArgument(format!(
                "season length must be at least 2 days, got {}",
                season
            )));
        }
        if horizon_days == 0 {
            return Err(Error::InvalidArgument("forecast horizon must be at least 1 day".to_string()));
        }
        if horizon_days > MAX_FORECAST_HORIZON_DAYS {
            return Err(Error::InvalidArgument(format!(
                "forecast horizon must be at most {} days, got {}",
                MAX_FORECAST_HORIZON_DAYS, horizon_days
            )));
        }

        let needed = season * 2;
        if history.len() < needed {
            return Err(Error::InsufficientData {
                what: "forecast",
                needed,
                found: history.len(),
            });
        }

        let y: Vec<f64> = history.iter().map(|d| d.commits as f64).collect();
        let fit = TrendFit::new(&y, season);
        tracing::debug!(
            "forecast fit: n={} slope={:.4} intercept={:.4} sigma={:.4}",
            y.len(),
            fit.slope,
            fit.intercept,
            fit.sigma
        );

        let last_date = history.last().map(|d| d.date).ok_or(Error::InsufficientData {
            what: "forecast",
            needed,
            found: 0,
        })?;
        let last_t = y.len() - 1;

        let points = (1..=horizon_days as usize)
            .map(|h| {
                let t = last_t + h;
                let predicted = fit.predict(t);
                let half_width = self.config.interval_z * fit.standard_error(t);
                ForecastPoint {
                    date: last_date + Duration::days(h as i64),
                    predicted,
                    lower: predicted - half_width,
                    upper: predicted + half_width,
                }
            })
            .collect();

        Ok(ForecastSeries {
            history,
            points,
            season_length: season,
            slope: fit.slope,
            repositories: Vec::new(),
        })
    }
}

/// Buckets commits per UTC day and fills missing days with zero.
pub fn daily_counts<'a, I>(commits: I) -> Vec<DailyCount>
where
    I: IntoIterator<Item = &'a CommitRecord>,
{
    let mut buckets: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    for commit in commits {
        *buckets.entry(commit.timestamp.date_naive()).or_insert(0) += 1;
    }

    let (Some(&first), Some(&last)) = (buckets.keys().next(), buckets.keys().next_back()) else {
        return Vec::new();
    };

    first
        .iter_days()
        .take_while(|d| *d <= last)
        .map(|date| DailyCount {
            date,
            commits: buckets.get(&date).copied().unwrap_or(0),
        })
        .collect()
}

struct TrendFit {
    intercept: f64,
    slope: f64,
    seasonal: Vec<f64>,
    sigma: f64,
    n: f64,
    t_mean: f64,
    sxx: f64,
}

impl TrendFit {
    fn new(y: &[f64], season: usize) -> Self {
        let n = y.len() as f64;
        let t_mean = (n - 1.0) / 2.0;
        let y_mean = y.iter().sum::<f64>() / n;

        let mut sxx = 0.0;
        let mut sxy = 0.0;
        for (t, value) in y.iter().enumerate() {
            let dt = t as f64 - t_mean;
            sxx += dt * dt;
            sxy += dt * (value - y_mean);
        }
        let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
        let intercept = y_mean - slope * t_mean;

        let mut sums = vec![0.0; season];
        let mut counts = vec![0usize; season];
        for (t, value) in y.iter().enumerate() {
            sums[t % season] += value - (intercept + slope * t as f64);
            counts[t % season] += 1;
        }
        let mut seasonal: Vec<f64> = sums
            .iter()
            .zip(&counts)
            .map(|(s, c)| s / (*c).max(1) as f64)
            .collect();
        let offset = seasonal.iter().sum::<f64>() / season as f64;
        seasonal.iter_mut().for_each(|s| *s -= offset);

        let mut fit = Self {
            intercept,
            slope,
            seasonal,
            sigma: 0.0,
            n,
            t_mean,
            sxx,
        };

        // trend (2) + free seasonal terms (season - 1)
        let dof = (y.len() as f64 - 1.0 - season as f64).max(1.0);
        let sse: f64 = y
            .iter()
            .enumerate()
            .map(|(t, value)| (value - fit.predict(t)).powi(2))
            .sum();
        fit.sigma = (sse / dof).sqrt();
        fit
    }

    fn predict(&self, t: usize) -> f64 {
        self.intercept + self.slope * t as f64 + self.seasonal[t % self.seasonal.len()]
    }

    fn standard_error(&self, t: usize) -> f64 {
        let dt = t as f64 - self.t_mean;
        let leverage = if self.sxx > 0.0 { dt * dt / self.sxx } else { 0.0 };
        self.sigma * (1.0 + 1.0 / self.n + leverage).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn forecaster(season: usize) -> ActivityForecaster {
        ActivityForecaster::new(ForecastConfig {
            horizon_days: 30,
            season_length: season,
            interval_z: 1.2816,
        })
    }

    fn series(counts: impl IntoIterator<Item = u32>) -> Vec<DailyCount> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        counts
            .into_iter()
            .enumerate()
            .map(|(i, commits)| DailyCount {
                date: start + Duration::days(i as i64),
                commits,
            })
            .collect()
    }

    fn commit(repo: &str, sha: &str, day: u32, hour: u32) -> CommitRecord {
        CommitRecord {
            repository: repo.to_string(),
            sha: sha.to_string(),
            author: "octocat".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap(),
            message: "work".to_string(),
        }
    }

    #[test]
    fn test_increasing_history_continues_trend_with_widening_bounds() {
        // 180 days of linear growth plus a small deterministic wobble
        let history = series((0..180u32).map(|i| i / 2 + (i * 7) % 3));
        let result = forecaster(7).forecast_counts(history, 30).unwrap();

        assert!(result.slope > 0.4);
        assert_eq!(result.points.len(), 30);
        assert_eq!(result.points[0].date, NaiveDate::from_ymd_opt(2024, 6, 29).unwrap());

        let last_week_mean = (173..180u32).map(|i| (i / 2 + (i * 7) % 3) as f64).sum::<f64>() / 7.0;
        let first_week_mean = result.points[..7].iter().map(|p| p.predicted).sum::<f64>() / 7.0;
        assert!(first_week_mean > last_week_mean);

        for week in 0..3 {
            assert!(result.points[(week + 1) * 7].predicted > result.points[week * 7].predicted);
        }
        for pair in result.points.windows(2) {
            assert!(pair[1].interval_width() >= pair[0].interval_width());
            assert!(pair[1].upper - pair[1].predicted >= pair[0].upper - pair[0].predicted);
        }
        assert!(result.points[29].interval_width() > result.points[0].interval_width());
    }

    #[test]
    fn test_short_history_is_insufficient() {
        let err = forecaster(7).forecast_counts(series([1, 2, 3, 4, 5, 6, 7, 8, 9, 10]), 14);
        match err {
            Err(Error::InsufficientData { needed, found, .. }) => {
                assert_eq!(needed, 14);
                assert_eq!(found, 10);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_weekly_pattern_is_reproduced() {
        let pattern = [0u32, 5, 5, 5, 5, 5, 0];
        let history = series((0..56).map(|i| pattern[i % 7]));
        let result = forecaster(7).forecast_counts(history, 7).unwrap();

        // history starts on a Monday index 0; day 56 is index 0 again
        assert!(result.points[0].predicted < 1.0);
        assert!((result.points[1].predicted - 5.0).abs() < 0.5);
        assert!(result.slope.abs() < 0.01);
    }

    #[test]
    fn test_daily_counts_fill_gaps() {
        let commits = vec![
            commit("octo/a", "1", 3, 9),
            commit("octo/a", "2", 3, 18),
            commit("octo/b", "3", 6, 23),
        ];
        let counts = daily_counts(&commits);
        let values: Vec<u32> = counts.iter().map(|d| d.commits).collect();
        assert_eq!(values, vec![2, 0, 0, 1]);
        assert_eq!(counts[0].date, NaiveDate::from_ymd_opt(2024, 3, 3).unwrap());
    }

    #[test]
    fn test_forecast_reports_source_repositories() {
        let commits: Vec<_> = (1..=28)
            .map(|day| commit(if day % 2 == 0 { "octo/b" } else { "octo/a" }, &day.to_string(), day, 12))
            .collect();
        let result = forecaster(7).forecast(&commits, 3).unwrap();
        assert_eq!(result.repositories, vec!["octo/a", "octo/b"]);
        assert_eq!(result.history.len(), 28);
        assert_eq!(result.points.len(), 3);
    }

    #[test]
    fn test_oversized_horizon_is_rejected() {
        let history = series([1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14]);
        for horizon in [MAX_FORECAST_HORIZON_DAYS + 1, u32::MAX] {
            assert!(matches!(
                forecaster(7).forecast_counts(history.clone(), horizon),
                Err(Error::InvalidArgument(_))
            ));
        }

        let longest = forecaster(7).forecast_counts(history, MAX_FORECAST_HORIZON_DAYS).unwrap();
        assert_eq!(longest.points.len(), MAX_FORECAST_HORIZON_DAYS as usize);
    }

    #[test]
    fn test_no_commits_is_insufficient() {
        let commits: Vec<CommitRecord> = Vec::new();
        assert!(matches!(
            forecaster(7).forecast(&commits, 7),
            Err(Error::InsufficientData { found: 0, .. })
        ));
    }
}
