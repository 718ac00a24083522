//! The tabular agent's reason/act loop
//!
//! Author: hephaex@gmail.com

use chartqa_core::{AgentConfig, LlmClient, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::prompt::{build_prompt, build_system_prompt, render_scratchpad, ScratchEntry};
use crate::step::{parse_step, Step, ToolCall};
use crate::table::Table;
use crate::tools::{Outcome, ToolRegistry, ToolResult};

/// Answer returned when the iteration budget runs out
pub const ITERATION_LIMIT_ANSWER: &str = "Agent stopped due to iteration limit or time limit.";

/// Loop limits for one agent run
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub max_iterations: usize,
    pub tool_timeout: Duration,
    pub preview_rows: usize,
    pub max_observation_chars: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from(&AgentConfig::default())
    }
}

impl From<&AgentConfig> for AgentSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            tool_timeout: Duration::from_secs(config.tool_timeout_secs),
            preview_rows: config.preview_rows,
            max_observation_chars: config.max_observation_chars,
        }
    }
}

/// Answers one question about one table
pub struct TabularAgent {
    llm: Arc<dyn LlmClient>,
    table: Arc<Table>,
    tools: ToolRegistry,
    settings: AgentSettings,
}

impl TabularAgent {
    pub fn new(llm: Arc<dyn LlmClient>, table: Arc<Table>, settings: AgentSettings) -> Self {
        let tools = ToolRegistry::for_table(table.clone());
        Self {
            llm,
            table,
            tools,
            settings,
        }
    }

    /// Each call runs on its own blocking thread; results keep call order
    async fn execute_calls(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        let timeout = self.settings.tool_timeout;
        futures::future::join_all(calls.iter().map(|call| self.tools.execute(call, timeout))).await
    }

    /// Run the loop until the model answers or the budget is spent
    pub async fn run(&self, question: &str) -> Result<String> {
        let system = build_system_prompt(
            &self.tools.descriptions(),
            &self.table,
            self.settings.preview_rows,
        );
        let mut scratchpad: Vec<ScratchEntry> = Vec::new();

        tracing::info!(
            rows = self.table.len(),
            columns = self.table.columns().len(),
            max_iterations = self.settings.max_iterations,
            "Tabular agent started"
        );

        for iteration in 1..=self.settings.max_iterations {
            let pad = render_scratchpad(&scratchpad, self.settings.max_observation_chars);
            let prompt = build_prompt(&system, question, &pad);
            let reply = self.llm.generate(&prompt).await?;

            let step = match parse_step(&reply) {
                Ok(step) => step,
                Err(e) => {
                    tracing::warn!(iteration, error = %e, "Unparseable agent reply");
                    scratchpad.push(ScratchEntry::Unparseable {
                        reply,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            match step {
                Step::Act { thought, calls } => {
                    tracing::info!(iteration, thought = %thought, calls = calls.len(), "Agent thought");
                    for call in &calls {
                        tracing::debug!(iteration, tool = %call.tool, args = ?call.args, "Tool call");
                    }

                    let results = self.execute_calls(&calls).await;

                    for result in &results {
                        match &result.outcome {
                            Outcome::Success(out) => {
                                tracing::debug!(iteration, tool = %result.tool, observation = %out, "Tool succeeded");
                            }
                            Outcome::Error(err) => {
                                tracing::info!(iteration, tool = %result.tool, error = %err, "Tool failed");
                            }
                        }
                    }

                    scratchpad.push(ScratchEntry::Acted {
                        thought,
                        calls,
                        results,
                    });
                }
                Step::Finish { thought, answer } => {
                    tracing::info!(iteration, thought = %thought, "Agent finished");
                    return Ok(answer);
                }
            }
        }

        tracing::warn!(
            max_iterations = self.settings.max_iterations,
            "Tabular agent hit iteration limit"
        );
        Ok(ITERATION_LIMIT_ANSWER.to_string())
    }
}
