use serde_json::{json, Value};

use crate::models::{DeveloperStats, RepositoryData};

pub const SYSTEM_PROMPT: &str = r#"You are a senior engineer reviewing a developer's GitHub repository.
You receive the repository README and its recent commit messages.

You must respond with valid JSON matching this exact schema:
{
    "sentiment": "positive|neutral|negative (overall tone of the commit messages)",
    "skills": ["specific technologies, languages and practices evidenced by the text"],
    "quality_commentary": "two or three sentences on documentation and commit quality"
}

Guidelines:
- Be specific with skill names (e.g., "PostgreSQL" not "databases")
- Only list skills the text gives evidence for
- Do not add fields and do not wrap the JSON in prose"#;

pub const README_TIPS_SYSTEM_PROMPT: &str = "You are a technical writer. Review the README and answer with a short markdown checklist of concrete improvements (missing sections, unclear setup steps, absent examples, badges, license). No preamble.";

pub const PERSONA_SYSTEM_PROMPT: &str = "You invent playful developer titles. Answer with the title only: at most six words, no quotes, no explanation.";

/// Schema passed to the model server as the structured-output hint.
pub fn analysis_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "sentiment": {"type": "string", "enum": ["positive", "neutral", "negative"]},
            "skills": {"type": "array", "items": {"type": "string"}},
            "quality_commentary": {"type": "string"}
        },
        "required": ["sentiment", "skills", "quality_commentary"]
    })
}

pub fn sentiment_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "sentiment": {"type": "string", "enum": ["positive", "neutral", "negative"]}
        },
        "required": ["sentiment"]
    })
}

/// Text of one repository prepared for the model.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisInput {
    pub repository: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub readme: String,
    pub commit_messages: Vec<String>,
}

impl AnalysisInput {
    /// `None` when the repository has neither README nor commit text.
    pub fn from_repository(data: &RepositoryData, max_commits: usize, max_readme_chars: usize) -> Option<Self> {
        let readme: String = data.metadata.readme.trim().chars().take(max_readme_chars).collect();
        let commit_messages: Vec<String> = data
            .commits
            .commits()
            .iter()
            .map(|c| c.headline().trim().to_string())
            .filter(|m| !m.is_empty())
            .take(max_commits)
            .collect();

        if readme.is_empty() && commit_messages.is_empty() {
            return None;
        }

        Some(Self {
            repository: data.metadata.id.clone(),
            description: data.metadata.description.clone(),
            language: data.metadata.language.clone(),
            readme,
            commit_messages,
        })
    }

    pub fn to_prompt(&self) -> String {
        let mut prompt = format!("Repository: {}", self.repository);
        if let Some(language) = &self.language {
            prompt.push_str(&format!(" ({})", language));
        }
        prompt.push('\n');
        if let Some(desc) = self.description.as_deref().filter(|d| !d.is_empty()) {
            prompt.push_str(&format!("Description: {}\n", desc));
        }

        prompt.push_str("\n## README\n");
        if self.readme.is_empty() {
            prompt.push_str("(no README)\n");
        } else {
            prompt.push_str(&self.readme);
            prompt.push('\n');
        }

        prompt.push_str(&format!("\n## Recent commit messages ({})\n", self.commit_messages.len()));
        for message in &self.commit_messages {
            prompt.push_str(&format!("- {}\n", message));
        }

        prompt.push_str("\nProvide your analysis as JSON:\n");
        prompt
    }
}

pub fn sentiment_prompt(message: &str) -> String {
    format!(
        "Classify the sentiment of this commit message as positive, neutral or negative. Respond as JSON {{\"sentiment\": ...}}.\n\nCommit message:\n{}",
        message.trim()
    )
}

pub fn readme_tips_prompt(repository: &str, readme: &str) -> String {
    format!("README of {}:\n\n{}", repository, readme.trim())
}

pub fn persona_prompt(stats: &DeveloperStats) -> String {
    format!(
        "Developer stats: {} commits, longest streak {} days, top language {}, most active month {}, works like a {}. Give this developer a title.",
        stats.total_commits,
        stats.longest_streak_days,
        stats.top_language.as_deref().unwrap_or("unknown"),
        stats.most_active_month.as_deref().unwrap_or("unknown"),
        stats.chronotype
    )
}
