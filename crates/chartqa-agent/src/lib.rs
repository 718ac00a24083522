//! chartqa Agent - Tabular question answering over CSV data
//!
//! A reason/act agent that answers natural-language questions about a
//! single CSV file. Each iteration the LLM either requests table tool
//! calls (run in parallel, results fed back as observations) or gives
//! the final answer.
//!
//! Author: hephaex@gmail.com

pub mod agent;
pub mod prompt;
pub mod service;
pub mod step;
pub mod table;
pub mod tools;

pub use agent::{AgentSettings, TabularAgent, ITERATION_LIMIT_ANSWER};
pub use service::TabularService;
pub use step::{parse_step, Step, ToolCall};
pub use table::{Aggregate, Cell, ColumnSummary, FilterOp, Table, TableError};
pub use tools::{Outcome, Tool, ToolRegistry, ToolResult};
