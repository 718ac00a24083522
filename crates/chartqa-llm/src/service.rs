//! Free-form answer service
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use chartqa_core::{AnswerMode, AnswerService, LlmClient, Result};
use std::sync::Arc;
use std::time::Instant;

/// Forwards the question verbatim to the completion endpoint
pub struct CompletionService {
    llm: Arc<dyn LlmClient>,
}

impl CompletionService {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl AnswerService for CompletionService {
    async fn answer(&self, question: &str) -> Result<String> {
        let start = Instant::now();
        let answer = self.llm.generate(question).await?;
        tracing::info!(
            backend = self.llm.name(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            answer_chars = answer.len(),
            "Free-form answer generated"
        );
        Ok(answer)
    }

    fn mode(&self) -> AnswerMode {
        AnswerMode::FreeForm
    }
}
