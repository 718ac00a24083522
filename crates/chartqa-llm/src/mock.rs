//! Scripted LLM client for tests
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use chartqa_core::{ChartQaError, LlmClient, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Returns pre-defined replies in order and records every prompt it sees.
pub struct MockLlmClient {
    replies: Vec<std::result::Result<String, String>>,
    index: AtomicUsize,
    repeat_last: bool,
    prompts: Mutex<Vec<String>>,
}

impl MockLlmClient {
    pub fn new(replies: Vec<String>) -> Self {
        Self {
            replies: replies.into_iter().map(Ok).collect(),
            index: AtomicUsize::new(0),
            repeat_last: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A client that answers every prompt with the same text
    pub fn always(reply: impl Into<String>) -> Self {
        Self {
            repeat_last: true,
            ..Self::new(vec![reply.into()])
        }
    }

    /// A client whose first call fails with an LLM error
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            replies: vec![Err(message.into())],
            index: AtomicUsize::new(0),
            repeat_last: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, oldest first
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.to_vec()).unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.prompts().len()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let mut i = self.index.fetch_add(1, Ordering::SeqCst);
        if self.repeat_last && i >= self.replies.len() {
            i = self.replies.len().saturating_sub(1);
        }

        match self.replies.get(i) {
            Some(Ok(reply)) => Ok(reply.clone()),
            Some(Err(message)) => Err(ChartQaError::LlmError(message.clone())),
            None => Err(ChartQaError::LlmError(format!(
                "MockLlmClient: no more replies (called {} times)",
                i + 1
            ))),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
