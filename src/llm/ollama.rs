use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::llm::provider::{GenerateRequest, LLMProvider};

/// Client for a locally hosted Ollama server (`/api/generate`).
pub struct OllamaProvider {
    client: Client,
    endpoint: String,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a Value>,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaProvider {
    /// `request_timeout` bounds the raw HTTP exchange; the analyzer applies
    /// its own, tighter, per-input budget on top.
    pub fn new(endpoint: &str, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::network(endpoint, e))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    async fn generate(&self, request: GenerateRequest) -> Result<String> {
        let url = format!("{}/api/generate", self.endpoint);
        tracing::debug!("Sending {} chars to {}", request.prompt.len(), request.model);

        let body = OllamaRequest {
            model: &request.model,
            prompt: &request.prompt,
            system: request.system.as_deref(),
            format: request.schema.as_ref(),
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::network(url.clone(), e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::ModelServer(format!(
                "model {} is not available on {}",
                request.model, self.endpoint
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ModelServer(format!("{} ({}): {}", url, status, body)));
        }

        let result: OllamaResponse = response
            .json()
            .await
            .map_err(|e| Error::network(url.clone(), e))?;

        if let Some(error) = result.error {
            return Err(Error::ModelServer(error));
        }

        Ok(result.response)
    }

    fn name(&self) -> &str {
        "Ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn request(model: &str) -> GenerateRequest {
        GenerateRequest {
            model: model.to_string(),
            prompt: "hello".to_string(),
            system: None,
            schema: Some(json!({"type": "object"})),
        }
    }

    #[tokio::test]
    async fn test_generate_returns_response_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/generate")
            .match_body(Matcher::PartialJson(json!({
                "model": "llama3.1",
                "stream": false,
                "format": {"type": "object"}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"model":"llama3.1","response":"{\"sentiment\":\"positive\"}","done":true}"#)
            .create_async()
            .await;

        let provider = OllamaProvider::new(&server.url(), Duration::from_secs(5)).unwrap();
        let text = provider.generate(request("llama3.1")).await.unwrap();
        assert_eq!(text, r#"{"sentiment":"positive"}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unknown_model_is_a_model_server_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/api/generate")
            .with_status(404)
            .with_body(r#"{"error":"model 'nope' not found"}"#)
            .create_async()
            .await;

        let provider = OllamaProvider::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = provider.generate(request("nope")).await.unwrap_err();
        assert!(matches!(err, Error::ModelServer(_)));
        assert!(err.to_string().contains("nope"));
    }
}
