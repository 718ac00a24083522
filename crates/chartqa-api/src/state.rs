//! Application state management
//!
//! Author: hephaex@gmail.com

use chartqa_agent::TabularService;
use chartqa_core::{AnswerService, AppConfig, Result};
use chartqa_llm::{create_llm_client, CompletionService};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Prompt request counter
    pub request_count: AtomicU64,
    /// Ready status
    pub is_ready: AtomicBool,
    /// Free-form answers (`/api/prompt`)
    pub prompt_service: Arc<dyn AnswerService>,
    /// Tabular agent answers (`/api/prompt-agent`)
    pub agent_service: Arc<dyn AnswerService>,
}

impl AppState {
    /// Create application state around explicit answer services
    pub fn new(
        config: AppConfig,
        prompt_service: Arc<dyn AnswerService>,
        agent_service: Arc<dyn AnswerService>,
    ) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            is_ready: AtomicBool::new(true),
            prompt_service,
            agent_service,
        }
    }

    /// Build the LLM clients and answer services described by `config`
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let prompt_llm = create_llm_client(&config.llm)?;
        let agent_llm = create_llm_client(&config.agent_llm())?;

        let prompt_service = Arc::new(CompletionService::new(prompt_llm));
        let agent_service = Arc::new(TabularService::new(agent_llm, &config.agent));

        Ok(Self::new(config, prompt_service, agent_service))
    }

    /// Increment request counter
    pub fn increment_requests(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::SeqCst)
    }

    /// Get total request count
    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Check if service is ready
    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    /// Set ready status
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }

    /// Whether the configured provider has the credentials it needs
    pub fn llm_configured(&self) -> bool {
        !self.config.llm.provider.requires_api_key() || self.config.llm.openai_api_key.is_some()
    }

    /// Whether the tabular agent's data file exists
    pub fn data_file_present(&self) -> bool {
        self.config.agent.data_path.is_file()
    }
}
