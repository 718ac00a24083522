//! chartqa LLM - Completion clients and the free-form answer service
//!
//! Author: hephaex@gmail.com

pub mod llm;
pub mod mock;
pub mod service;

pub use llm::{create_llm_client, OllamaClient, OpenAiClient};
pub use mock::MockLlmClient;
pub use service::CompletionService;
