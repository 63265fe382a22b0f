use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::{AnalysisResult, Sentiment};

const MAX_FALLBACK_COMMENTARY: usize = 500;

/// Outcome of decoding one model response.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAnalysis {
    pub result: AnalysisResult,
    /// Set when the strict decode failed or left fields defaulted.
    pub parse_failure: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawAnalysis {
    sentiment: Option<String>,
    skills: Option<Vec<Value>>,
    #[serde(alias = "commentary", alias = "quality", alias = "quality_assessment")]
    quality_commentary: Option<Value>,
}

/// Strict decode first; on failure fall back to a best-effort reading of the
/// free text. Never fails: the worst case is a neutral, empty result.
pub fn parse_analysis(response: &str) -> ParsedAnalysis {
    match parse_strict(response) {
        Ok(parsed) => parsed,
        Err(e) => ParsedAnalysis {
            result: fallback_from_text(response),
            parse_failure: Some(e.to_string()),
        },
    }
}

fn parse_strict(response: &str) -> Result<ParsedAnalysis> {
    let json_str = extract_json(response)?;
    let raw: RawAnalysis = serde_json::from_str(&json_str)
        .map_err(|e| Error::ParseFailure(format!("invalid analysis JSON: {}", e)))?;

    let mut missing = Vec::new();

    let sentiment = match raw.sentiment.as_deref().and_then(Sentiment::from_label) {
        Some(s) => s,
        None => {
            missing.push("sentiment");
            Sentiment::Neutral
        }
    };

    let skills = match raw.skills {
        Some(values) => values.iter().filter_map(skill_name).collect(),
        None => {
            missing.push("skills");
            Vec::new()
        }
    };

    let commentary = match raw.quality_commentary.as_ref().and_then(text_of) {
        Some(text) => text,
        None => {
            missing.push("quality_commentary");
            String::new()
        }
    };

    let parse_failure = if missing.is_empty() {
        None
    } else {
        Some(format!("missing or unreadable field(s): {}", missing.join(", ")))
    };

    Ok(ParsedAnalysis {
        result: AnalysisResult {
            sentiment,
            skills,
            commentary,
            verified: parse_failure.is_none(),
        },
        parse_failure,
    })
}

/// Only the sentiment label, for single-message classification.
pub fn parse_sentiment(response: &str) -> (Sentiment, bool) {
    #[derive(Deserialize)]
    struct RawSentiment {
        sentiment: String,
    }

    let strict = extract_json(response)
        .ok()
        .and_then(|json| serde_json::from_str::<RawSentiment>(&json).ok())
        .and_then(|raw| Sentiment::from_label(&raw.sentiment));

    match strict {
        Some(sentiment) => (sentiment, true),
        None => (Sentiment::from_label(response).unwrap_or_default(), false),
    }
}

fn skill_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("name").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Array(items) => {
            let joined: Vec<String> = items.iter().filter_map(text_of).collect();
            (!joined.is_empty()).then(|| joined.join(" "))
        }
        _ => None,
    }
}

fn fallback_from_text(text: &str) -> AnalysisResult {
    let sentiment = text
        .lines()
        .find_map(Sentiment::from_label)
        .unwrap_or_default();

    let skills = text
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")))
        .map(str::trim)
        .filter(|item| !item.is_empty() && item.len() <= 40)
        .take(15)
        .map(str::to_string)
        .collect();

    AnalysisResult {
        sentiment,
        skills,
        commentary: text.trim().chars().take(MAX_FALLBACK_COMMENTARY).collect(),
        verified: false,
    }
}

fn extract_json(text: &str) -> Result<String> {
    // Try to find JSON block in markdown code blocks
    if let Some(start) = text.find("```json") {
        let start = start + 7;
        if let Some(end) = text[start..].find("```") {
            return Ok(text[start..start + end].trim().to_string());
        }
    }

    // Try plain code block
    if let Some(start) = text.find("```") {
        let start = start + 3;
        let start = text[start..]
            .find('\n')
            .map(|i| start + i + 1)
            .unwrap_or(start);
        if let Some(end) = text[start..].find("```") {
            let content = text[start..start + end].trim();
            if content.starts_with('{') {
                return Ok(content.to_string());
            }
        }
    }

    // Try to find raw JSON object
    if let Some(start) = text.find('{') {
        let mut depth = 0;
        let mut in_string = false;
        let mut escape_next = false;

        for (i, c) in text[start..].char_indices() {
            if escape_next {
                escape_next = false;
                continue;
            }

            match c {
                '\\' if in_string => escape_next = true,
                '"' => in_string = !in_string,
                '{' if !in_string => depth += 1,
                '}' if !in_string => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(text[start..start + i + 1].to_string());
                    }
                }
                _ => {}
            }
        }
    }

    Err(Error::ParseFailure("no JSON object in model output".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_from_markdown() {
        let input = r#"Here's the analysis:
```json
{"skills": []}
```
"#;
        let result = extract_json(input).unwrap();
        assert_eq!(result, r#"{"skills": []}"#);
    }

    #[test]
    fn test_extract_raw_json_with_braces_in_strings() {
        let input = r#"Result: {"quality_commentary": "uses {} a lot", "skills": []} trailing"#;
        let result = extract_json(input).unwrap();
        assert_eq!(result, r#"{"quality_commentary": "uses {} a lot", "skills": []}"#);
    }

    #[test]
    fn test_well_formed_output_is_verified() {
        let parsed = parse_analysis(
            r#"{"sentiment":"Positive","skills":["Rust",{"name":"Tokio"}],"quality_commentary":"Clear README."}"#,
        );
        assert!(parsed.parse_failure.is_none());
        assert!(parsed.result.verified);
        assert_eq!(parsed.result.sentiment, Sentiment::Positive);
        assert_eq!(parsed.result.skills, vec!["Rust", "Tokio"]);
        assert_eq!(parsed.result.commentary, "Clear README.");
    }

    #[test]
    fn test_partial_json_keeps_what_it_has() {
        let parsed = parse_analysis(r#"{"skills":["Go"]}"#);
        assert!(!parsed.result.verified);
        assert_eq!(parsed.result.sentiment, Sentiment::Neutral);
        assert_eq!(parsed.result.skills, vec!["Go"]);
        let failure = parsed.parse_failure.unwrap();
        assert!(failure.contains("sentiment"));
        assert!(failure.contains("quality_commentary"));
    }

    #[test]
    fn test_prose_degrades_to_best_effort() {
        let text = "Overall the tone is negative.\nSkills:\n- Python\n- Docker\n";
        let parsed = parse_analysis(text);
        assert!(parsed.parse_failure.is_some());
        assert!(!parsed.result.verified);
        assert_eq!(parsed.result.sentiment, Sentiment::Negative);
        assert_eq!(parsed.result.skills, vec!["Python", "Docker"]);
        assert!(parsed.result.commentary.starts_with("Overall"));
    }

    #[test]
    fn test_empty_output_is_neutral_default() {
        let parsed = parse_analysis("");
        assert_eq!(parsed.result, AnalysisResult::default());
    }

    #[test]
    fn test_parse_sentiment() {
        assert_eq!(parse_sentiment(r#"{"sentiment":"negative"}"#), (Sentiment::Negative, true));
        assert_eq!(parse_sentiment("I'd say positive"), (Sentiment::Positive, false));
        assert_eq!(parse_sentiment("???"), (Sentiment::Neutral, false));
    }
}
