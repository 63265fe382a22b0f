pub mod provider;
pub mod ollama;
pub mod prompts;
pub mod parser;
pub mod analyzer;

pub use provider::{GenerateRequest, LLMProvider};
pub use ollama::OllamaProvider;
pub use prompts::AnalysisInput;
pub use analyzer::LlmAnalyzer;
