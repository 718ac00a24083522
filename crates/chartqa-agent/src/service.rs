//! Tabular answer service
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use chartqa_core::{AgentConfig, AnswerMode, AnswerService, ChartQaError, LlmClient, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::agent::{AgentSettings, TabularAgent};
use crate::table::Table;

/// Loads the data file and runs a fresh agent for every question
pub struct TabularService {
    llm: Arc<dyn LlmClient>,
    data_path: PathBuf,
    settings: AgentSettings,
}

impl TabularService {
    pub fn new(llm: Arc<dyn LlmClient>, config: &AgentConfig) -> Self {
        Self {
            llm,
            data_path: config.data_path.clone(),
            settings: AgentSettings::from(config),
        }
    }

    async fn load_table(&self) -> Result<Table> {
        let path = self.data_path.clone();
        let table = tokio::task::spawn_blocking(move || Table::from_path(path))
            .await
            .map_err(|e| ChartQaError::AgentError(format!("Table loading task failed: {e}")))??;
        Ok(table)
    }
}

#[async_trait]
impl AnswerService for TabularService {
    async fn answer(&self, question: &str) -> Result<String> {
        let start = Instant::now();
        let table = self.load_table().await?;
        tracing::debug!(path = %self.data_path.display(), rows = table.len(), "Loaded data file");

        let agent = TabularAgent::new(self.llm.clone(), Arc::new(table), self.settings.clone());
        let answer = agent.run(question).await?;

        tracing::info!(
            backend = self.llm.name(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            answer_chars = answer.len(),
            "Tabular answer generated"
        );
        Ok(answer)
    }

    fn mode(&self) -> AnswerMode {
        AnswerMode::Tabular
    }
}
