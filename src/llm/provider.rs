use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Model variant name as the serving endpoint knows it.
    pub model: String,
    pub prompt: String,
    pub system: Option<String>,
    /// Structured-output hint; `None` asks for free text.
    pub schema: Option<Value>,
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Returns the generated text, which may or may not be valid JSON.
    async fn generate(&self, request: GenerateRequest) -> Result<String>;
    fn name(&self) -> &str;
}
