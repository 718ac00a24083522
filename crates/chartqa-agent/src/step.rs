//! Agent steps and model reply parsing
//!
//! Author: hephaex@gmail.com

use chartqa_core::{ChartQaError, Result};
use serde::Serialize;
use std::collections::HashMap;

/// A single tool invocation request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCall {
    pub tool: String,
    pub args: HashMap<String, String>,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            args: HashMap::new(),
        }
    }

    pub fn arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }
}

/// What the model decided to do this iteration
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Execute tool calls. Multiple calls run in parallel.
    Act {
        thought: String,
        calls: Vec<ToolCall>,
    },
    /// Question answered
    Finish { thought: String, answer: String },
}

/// Locate the JSON object in a reply that may carry fences or prose
fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

fn parse_error(message: String) -> ChartQaError {
    ChartQaError::AgentError(message)
}

/// Parse a model reply into a `Step`
pub fn parse_step(text: &str) -> Result<Step> {
    let json_str = extract_json(text);

    let response: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| parse_error(format!("reply is not valid JSON: {e}")))?;

    let thought = response
        .get("thought")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    if let Some(answer) = response.get("answer") {
        let answer = match answer {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        };
        return Ok(Step::Finish { thought, answer });
    }

    let Some(calls) = response
        .get("action")
        .and_then(|action| action.get("calls"))
        .and_then(|calls| calls.as_array())
    else {
        return Err(parse_error(
            "reply has neither an \"answer\" nor an \"action\" with \"calls\"".to_string(),
        ));
    };

    let tool_calls: Vec<ToolCall> = calls
        .iter()
        .filter_map(|call| {
            let tool = call.get("tool")?.as_str()?.to_string();
            let args = call
                .get("args")
                .and_then(|a| a.as_object())
                .map(|obj| {
                    obj.iter()
                        .map(|(k, v)| {
                            let val = match v {
                                serde_json::Value::String(s) => s.clone(),
                                other => other.to_string(),
                            };
                            (k.clone(), val)
                        })
                        .collect()
                })
                .unwrap_or_default();
            Some(ToolCall { tool, args })
        })
        .collect();

    if tool_calls.is_empty() {
        return Err(parse_error("action contains no valid tool calls".to_string()));
    }

    Ok(Step::Act {
        thought,
        calls: tool_calls,
    })
}
