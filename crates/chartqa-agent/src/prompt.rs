//! Agent prompt construction
//!
//! Author: hephaex@gmail.com

use crate::step::ToolCall;
use crate::table::Table;
use crate::tools::{Outcome, ToolDescription, ToolResult};

const INTRO: &str = "You are working with a table of data loaded from a CSV file. \
Answer the question about this table by calling the tools below, reasoning step by step.";
const RESPONSE_HEADER: &str = "You MUST respond with valid JSON in one of two formats:";
const TOOL_FORMAT: &str = "To use tools:\n{\"thought\": \"your reasoning about what to do next\", \"action\": {\"calls\": [{\"tool\": \"tool_name\", \"args\": {\"arg_name\": \"arg_value\"}}]}}";
const ANSWER_FORMAT: &str = "To give the final answer:\n{\"thought\": \"your reasoning about why you're done\", \"answer\": \"your final answer to the question\"}";
const RULES_HEADER: &str = "Rules:";
const RULES: &[&str] = &[
    "Output JSON only. No markdown, no extra text, no extra keys.",
    "Thought should be brief (1-2 sentences).",
    "Use only the tools listed above. Never invent tools.",
    "Use the calls array to run tools in parallel.",
    "Base the answer on tool results, not on the preview alone, unless the preview is the whole table.",
    "If a tool returns an error, analyze it and try a different approach.",
    "When you have enough information, respond with the answer format.",
];

/// One completed iteration, replayed into the next prompt
#[derive(Debug, Clone)]
pub enum ScratchEntry {
    Acted {
        thought: String,
        calls: Vec<ToolCall>,
        results: Vec<ToolResult>,
    },
    Unparseable {
        reply: String,
        error: String,
    },
}

/// The fixed part of the prompt: role, tools, table shape, response protocol
pub fn build_system_prompt(tools: &[ToolDescription], table: &Table, preview_rows: usize) -> String {
    let mut tools_desc = String::new();
    for tool in tools {
        tools_desc.push_str(&format!("- {}: {}\n", tool.name, tool.description));
    }

    let rules = RULES
        .iter()
        .map(|rule| format!("- {rule}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{INTRO}\n\nThe table has {rows} rows and these columns: {columns}\n\nFirst rows:\n{preview}\nYou have access to these tools:\n{tools_desc}\n{RESPONSE_HEADER}\n\n{TOOL_FORMAT}\n\n{ANSWER_FORMAT}\n\n{RULES_HEADER}\n{rules}\n",
        rows = table.len(),
        columns = table.columns().join(", "),
        preview = table.to_markdown(preview_rows),
    )
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars).collect();
    format!("{kept}\n... (truncated)")
}

/// Render the scratchpad of previous iterations
pub fn render_scratchpad(entries: &[ScratchEntry], max_observation_chars: usize) -> String {
    let mut out = String::new();
    for (i, entry) in entries.iter().enumerate() {
        out.push_str(&format!("Step {}\n", i + 1));
        match entry {
            ScratchEntry::Acted {
                thought,
                calls,
                results,
            } => {
                out.push_str(&format!("Thought: {thought}\n"));
                for call in calls {
                    let args = serde_json::to_string(&call.args).unwrap_or_default();
                    out.push_str(&format!("Action: {} {args}\n", call.tool));
                }
                for result in results {
                    match &result.outcome {
                        Outcome::Success(output) => out.push_str(&format!(
                            "Observation [{}]: {}\n",
                            result.tool,
                            truncate(output, max_observation_chars)
                        )),
                        Outcome::Error(err) => out.push_str(&format!(
                            "Observation [{}]: ERROR {}\n",
                            result.tool,
                            truncate(err, max_observation_chars)
                        )),
                    }
                }
            }
            ScratchEntry::Unparseable { reply, error } => {
                out.push_str(&format!(
                    "Your reply could not be used ({error}). Reply was: {}\nRespond with JSON only.\n",
                    truncate(reply, max_observation_chars)
                ));
            }
        }
    }
    out
}

/// Full prompt for one iteration
pub fn build_prompt(system: &str, question: &str, scratchpad: &str) -> String {
    if scratchpad.is_empty() {
        format!("{system}\nQuestion: {question}\n")
    } else {
        format!("{system}\nQuestion: {question}\n\nPrevious steps:\n{scratchpad}\nContinue.\n")
    }
}
