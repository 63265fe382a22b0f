use std::collections::{BTreeSet, HashMap};

use chrono::{Datelike, Timelike};

use crate::models::{
    Chronotype, Dataset, DeveloperStats, HealthGrade, LanguageShare, OverviewStats, RepoHealth,
    RepositoryData, RepositoryInsight, TimelineEvent, TimelineKind,
};
use crate::taxonomy::detect_tech_stack;

const MONTHS: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

pub fn overview_stats(dataset: &Dataset) -> OverviewStats {
    let mut languages: HashMap<&str, usize> = HashMap::new();
    for record in dataset.records() {
        if let Some(language) = record.language.as_deref() {
            *languages.entry(language).or_insert(0) += 1;
        }
    }

    let mut top_languages: Vec<LanguageShare> = languages
        .into_iter()
        .map(|(language, repositories)| LanguageShare {
            language: language.to_string(),
            repositories,
        })
        .collect();
    top_languages.sort_by(|a, b| b.repositories.cmp(&a.repositories).then_with(|| a.language.cmp(&b.language)));

    OverviewStats {
        total_repos: dataset.repositories.len(),
        total_stars: dataset.records().map(|r| r.stars as u64).sum(),
        total_commits_tracked: dataset.all_commits().count(),
        top_languages,
    }
}

/// Label and lowercase root-entry prefixes that satisfy it.
const HEALTH_CHECKS: &[(&str, &[&str])] = &[
    ("README", &["readme"]),
    ("LICENSE", &["license", "licence", "copying"]),
    (".gitignore", &[".gitignore"]),
    ("CONTRIBUTING", &["contributing"]),
    ("tests", &["tests/", "test/", "__tests__/", "spec/"]),
    ("CI config", &[".github/", ".gitlab-ci.yml", ".circleci/", ".travis.yml", "jenkinsfile"]),
];

/// Six hygiene checks over the root listing. A fetched README counts even if
/// the listing is unavailable.
pub fn health_score(repository: &RepositoryData) -> RepoHealth {
    let files: Vec<String> = repository.root_files.iter().map(|f| f.to_lowercase()).collect();
    let has_readme_text = !repository.metadata.readme.trim().is_empty();

    let mut missing = Vec::new();
    for (label, prefixes) in HEALTH_CHECKS {
        let present = files.iter().any(|f| prefixes.iter().any(|p| f.starts_with(p)))
            || (*label == "README" && has_readme_text);
        if !present {
            missing.push(label.to_string());
        }
    }

    let max_score = HEALTH_CHECKS.len() as u8;
    let score = max_score - missing.len() as u8;
    let grade = if score >= 5 {
        HealthGrade::A
    } else if score >= 3 {
        HealthGrade::B
    } else {
        HealthGrade::C
    };

    RepoHealth {
        score,
        max_score,
        grade,
        missing,
    }
}

pub fn repository_insights(dataset: &Dataset) -> Vec<RepositoryInsight> {
    dataset
        .repositories
        .iter()
        .map(|repo| RepositoryInsight {
            repository: repo.id().to_string(),
            health: health_score(repo),
            tech_stack: detect_tech_stack(&repo.root_files),
        })
        .collect()
}

/// Commit-habit summary across every repository with an available history.
/// Hours are UTC.
pub fn developer_stats(dataset: &Dataset) -> DeveloperStats {
    let mut commits_by_hour = [0u32; 24];
    let mut by_month = [0usize; 12];
    let mut active_days = BTreeSet::new();
    let mut total_commits = 0;

    for commit in dataset.all_commits() {
        total_commits += 1;
        commits_by_hour[commit.timestamp.hour() as usize] += 1;
        by_month[commit.timestamp.month0() as usize] += 1;
        active_days.insert(commit.timestamp.date_naive());
    }

    let mut longest_streak_days = 0u32;
    let mut current = 0u32;
    let mut previous = None;
    for day in active_days {
        current = match previous {
            Some(p) if day.pred_opt() == Some(p) => current + 1,
            _ => 1,
        };
        longest_streak_days = longest_streak_days.max(current);
        previous = Some(day);
    }

    let most_active_month = by_month
        .iter()
        .enumerate()
        .filter(|(_, count)| **count > 0)
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))
        .map(|(idx, _)| MONTHS[idx].to_string());

    DeveloperStats {
        total_commits,
        longest_streak_days,
        top_language: top_language(dataset),
        most_active_month,
        chronotype: chronotype(&commits_by_hour),
        commits_by_hour,
    }
}

fn top_language(dataset: &Dataset) -> Option<String> {
    overview_stats(dataset)
        .top_languages
        .into_iter()
        .next()
        .map(|share| share.language)
}

/// Classified by the peak commit hour; earliest hour wins a tie.
fn chronotype(by_hour: &[u32; 24]) -> Chronotype {
    let peak = by_hour
        .iter()
        .enumerate()
        .filter(|(_, count)| **count > 0)
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))
        .map(|(hour, _)| hour);

    match peak {
        Some(22..=23) | Some(0..=4) => Chronotype::NightOwl,
        Some(5..=9) => Chronotype::EarlyBird,
        _ => Chronotype::DayWalker,
    }
}

pub fn timeline(dataset: &Dataset) -> Vec<TimelineEvent> {
    let mut events = Vec::new();

    if let Some(profile) = &dataset.profile {
        events.push(TimelineEvent {
            date: profile.created_at.date_naive(),
            kind: TimelineKind::AccountCreated,
            title: format!("Joined GitHub as {}", profile.login),
        });
    }

    let first_repo = dataset.records().min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    let latest_repo = dataset.records().max_by(|a, b| a.created_at.cmp(&b.created_at).then(b.id.cmp(&a.id)));

    if let Some(repo) = first_repo {
        events.push(TimelineEvent {
            date: repo.created_at.date_naive(),
            kind: TimelineKind::FirstRepository,
            title: format!("Created first repository {}", repo.name),
        });
    }

    if let Some(commit) = dataset.all_commits().min_by_key(|c| c.timestamp) {
        events.push(TimelineEvent {
            date: commit.timestamp.date_naive(),
            kind: TimelineKind::FirstCommit,
            title: format!("First tracked commit in {}", commit.repository),
        });
    }

    if let Some(repo) = dataset
        .records()
        .filter(|r| r.stars > 0)
        .max_by(|a, b| a.stars.cmp(&b.stars).then(b.id.cmp(&a.id)))
    {
        events.push(TimelineEvent {
            date: repo.created_at.date_naive(),
            kind: TimelineKind::MostStarred,
            title: format!("{} reached {} stars", repo.name, repo.stars),
        });
    }

    if let (Some(first), Some(latest)) = (first_repo, latest_repo) {
        if first.id != latest.id {
            events.push(TimelineEvent {
                date: latest.created_at.date_naive(),
                kind: TimelineKind::LatestRepository,
                title: format!("Started {}", latest.name),
            });
        }
    }

    events.sort_by_key(|e| e.date);
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommitHistory, CommitRecord, RepositoryRecord, UserProfile};
    use chrono::{TimeZone, Utc};

    fn repo(id: &str, stars: u32, language: Option<&str>, created: (i32, u32, u32)) -> RepositoryRecord {
        let created_at = Utc.with_ymd_and_hms(created.0, created.1, created.2, 0, 0, 0).unwrap();
        RepositoryRecord {
            id: id.to_string(),
            name: id.split('/').nth(1).unwrap().to_string(),
            description: None,
            stars,
            forks: 0,
            size: Some(10),
            language: language.map(str::to_string),
            created_at,
            updated_at: created_at,
            readme: String::new(),
        }
    }

    fn commit(repo: &str, sha: &str, ymd: (i32, u32, u32), hour: u32) -> CommitRecord {
        CommitRecord {
            repository: repo.to_string(),
            sha: sha.to_string(),
            author: "octocat".to_string(),
            timestamp: Utc.with_ymd_and_hms(ymd.0, ymd.1, ymd.2, hour, 30, 0).unwrap(),
            message: "change".to_string(),
        }
    }

    fn data(metadata: RepositoryRecord, commits: Vec<CommitRecord>, files: &[&str]) -> RepositoryData {
        RepositoryData {
            metadata,
            commits: CommitHistory::available(commits),
            root_files: files.iter().map(|f| f.to_string()).collect(),
        }
    }

    fn sample() -> Dataset {
        let profile = UserProfile {
            login: "octocat".to_string(),
            name: None,
            bio: None,
            public_repos: 3,
            followers: 1,
            created_at: Utc.with_ymd_and_hms(2015, 6, 1, 0, 0, 0).unwrap(),
        };
        Dataset::new(
            "octocat",
            Some(profile),
            vec![
                data(
                    repo("octocat/engine", 40, Some("Rust"), (2020, 1, 10)),
                    vec![
                        commit("octocat/engine", "a1", (2024, 3, 1), 23),
                        commit("octocat/engine", "a2", (2024, 3, 2), 1),
                        commit("octocat/engine", "a3", (2024, 3, 3), 23),
                    ],
                    &["README.md", "LICENSE", ".gitignore", "Cargo.toml", "tests/", ".github/"],
                ),
                data(
                    repo("octocat/scripts", 2, Some("Python"), (2018, 5, 2)),
                    vec![commit("octocat/scripts", "b1", (2023, 11, 20), 14)],
                    &["main.py"],
                ),
                data(repo("octocat/tools", 0, Some("Rust"), (2022, 8, 8)), vec![], &[]),
            ],
            vec![],
        )
    }

    #[test]
    fn test_overview_counts() {
        let stats = overview_stats(&sample());
        assert_eq!(stats.total_repos, 3);
        assert_eq!(stats.total_stars, 42);
        assert_eq!(stats.total_commits_tracked, 4);
        assert_eq!(stats.top_languages[0].language, "Rust");
        assert_eq!(stats.top_languages[0].repositories, 2);
    }

    #[test]
    fn test_health_grades() {
        let dataset = sample();
        let insights = repository_insights(&dataset);

        let engine = &insights[0];
        assert_eq!(engine.repository, "octocat/engine");
        assert_eq!(engine.health.score, 5);
        assert_eq!(engine.health.grade, HealthGrade::A);
        assert_eq!(engine.health.missing, vec!["CONTRIBUTING"]);
        assert!(engine.tech_stack.contains(&"Rust".to_string()));

        let scripts = &insights[1];
        assert_eq!(scripts.health.grade, HealthGrade::C);
        assert_eq!(scripts.health.missing.len(), 6);
    }

    #[test]
    fn test_readme_text_counts_without_listing() {
        let mut metadata = repo("octocat/docs", 0, None, (2021, 1, 1));
        metadata.readme = "# Docs".to_string();
        let health = health_score(&data(metadata, vec![], &[]));
        assert_eq!(health.score, 1);
        assert!(!health.missing.contains(&"README".to_string()));
    }

    #[test]
    fn test_developer_stats() {
        let stats = developer_stats(&sample());
        assert_eq!(stats.total_commits, 4);
        assert_eq!(stats.longest_streak_days, 3);
        assert_eq!(stats.top_language.as_deref(), Some("Rust"));
        assert_eq!(stats.most_active_month.as_deref(), Some("March"));
        assert_eq!(stats.chronotype, Chronotype::NightOwl);
        assert_eq!(stats.commits_by_hour[23], 2);
        assert_eq!(stats.commits_by_hour.iter().sum::<u32>(), 4);
    }

    #[test]
    fn test_empty_dataset_stats() {
        let dataset = Dataset::new("nobody", None, vec![], vec![]);
        let stats = developer_stats(&dataset);
        assert_eq!(stats.total_commits, 0);
        assert_eq!(stats.longest_streak_days, 0);
        assert_eq!(stats.most_active_month, None);
        assert_eq!(stats.chronotype, Chronotype::DayWalker);
        assert!(timeline(&dataset).is_empty());
    }

    #[test]
    fn test_chronotype_buckets() {
        let mut hours = [0u32; 24];
        hours[7] = 3;
        hours[15] = 2;
        assert_eq!(chronotype(&hours), Chronotype::EarlyBird);
        hours[15] = 5;
        assert_eq!(chronotype(&hours), Chronotype::DayWalker);
    }

    #[test]
    fn test_timeline_is_sorted() {
        let events = timeline(&sample());
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TimelineKind::AccountCreated,
                TimelineKind::FirstRepository,
                TimelineKind::MostStarred,
                TimelineKind::LatestRepository,
                TimelineKind::FirstCommit,
            ]
        );
        assert!(events.windows(2).all(|w| w[0].date <= w[1].date));
    }
}
