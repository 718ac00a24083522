//! Table tools the agent can call
//!
//! Author: hephaex@gmail.com

use chartqa_core::Result;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use crate::step::ToolCall;
use crate::table::{format_number, Aggregate, FilterOp, Table, TableError};

/// Outcome of a single tool execution. Errors are information, not failures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Outcome {
    Success(String),
    Error(String),
}

/// Result of executing a tool call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub tool: String,
    pub outcome: Outcome,
}

/// Describes a tool so the model knows what's available
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
}

/// Something the agent can do with the table
///
/// Tools are CPU-bound and run on the blocking pool.
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn execute(&self, args: &HashMap<String, String>) -> Result<String>;
}

// ============================================================================
// Argument helpers
// ============================================================================

fn required<'a>(args: &'a HashMap<String, String>, key: &str) -> std::result::Result<&'a str, TableError> {
    args.get(key)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| TableError::InvalidArgument(format!("missing required argument '{key}'")))
}

fn optional_usize(
    args: &HashMap<String, String>,
    key: &str,
    default: usize,
    max: usize,
) -> std::result::Result<usize, TableError> {
    match args.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<usize>()
            .map(|n| n.min(max))
            .map_err(|_| TableError::InvalidArgument(format!("'{key}' must be a positive integer, got '{raw}'"))),
    }
}

/// Apply the optional `where_column`/`where_op`/`where_value` filter
fn scoped(table: &Table, args: &HashMap<String, String>) -> std::result::Result<Option<Table>, TableError> {
    let Some(column) = args.get("where_column").filter(|c| !c.trim().is_empty()) else {
        return Ok(None);
    };
    let op: FilterOp = args.get("where_op").map(String::as_str).unwrap_or("==").parse()?;
    let value = required(args, "where_value")?;
    table.filter(column, op, value).map(Some)
}

const MAX_ROWS: usize = 50;

// ============================================================================
// Tools
// ============================================================================

/// Column names with inferred types
pub struct ColumnsTool {
    table: Arc<Table>,
}

impl Tool for ColumnsTool {
    fn name(&self) -> &str {
        "columns"
    }

    fn description(&self) -> &str {
        "List column names with their inferred type and the row count. No args."
    }

    fn execute(&self, _args: &HashMap<String, String>) -> Result<String> {
        let columns: Vec<String> = self
            .table
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let kind = if self.table.is_numeric(idx) { "numeric" } else { "text" };
                format!("{name} ({kind})")
            })
            .collect();
        Ok(format!("{} rows; columns: {}", self.table.len(), columns.join(", ")))
    }
}

/// First rows of the table
pub struct HeadTool {
    table: Arc<Table>,
}

impl Tool for HeadTool {
    fn name(&self) -> &str {
        "head"
    }

    fn description(&self) -> &str {
        "Show the first rows. Args: n (optional, default 5)."
    }

    fn execute(&self, args: &HashMap<String, String>) -> Result<String> {
        let n = optional_usize(args, "n", 5, MAX_ROWS)?;
        Ok(self.table.head(n).to_markdown(n))
    }
}

/// Summary statistics per column
pub struct DescribeTool {
    table: Arc<Table>,
}

impl Tool for DescribeTool {
    fn name(&self) -> &str {
        "describe"
    }

    fn description(&self) -> &str {
        "Summary statistics for every column (count/mean/min/max or count/unique/top). No args."
    }

    fn execute(&self, _args: &HashMap<String, String>) -> Result<String> {
        Ok(self
            .table
            .describe()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

/// Rows matching a condition
pub struct FilterTool {
    table: Arc<Table>,
}

impl Tool for FilterTool {
    fn name(&self) -> &str {
        "filter"
    }

    fn description(&self) -> &str {
        "Rows where a column matches a condition. Args: column, op (==, !=, >, >=, <, <=, contains), value, limit (optional, default 20)."
    }

    fn execute(&self, args: &HashMap<String, String>) -> Result<String> {
        let column = required(args, "column")?;
        let op: FilterOp = required(args, "op")?.parse()?;
        let value = required(args, "value")?;
        let limit = optional_usize(args, "limit", 20, MAX_ROWS)?;

        let matched = self.table.filter(column, op, value)?;
        Ok(format!(
            "{} matching rows\n{}",
            matched.len(),
            matched.to_markdown(limit)
        ))
    }
}

/// Rows ordered by a column
pub struct SortTool {
    table: Arc<Table>,
}

impl Tool for SortTool {
    fn name(&self) -> &str {
        "sort"
    }

    fn description(&self) -> &str {
        "Rows ordered by a column. Args: column, order (asc or desc, default desc), limit (optional, default 10), plus optional where_column/where_op/where_value filter."
    }

    fn execute(&self, args: &HashMap<String, String>) -> Result<String> {
        let column = required(args, "column")?;
        let descending = match args.get("order").map(|o| o.trim().to_lowercase()) {
            None => true,
            Some(o) if o.is_empty() || o == "desc" || o == "descending" => true,
            Some(o) if o == "asc" || o == "ascending" => false,
            Some(o) => {
                return Err(TableError::InvalidArgument(format!(
                    "'order' must be asc or desc, got '{o}'"
                ))
                .into())
            }
        };
        let limit = optional_usize(args, "limit", 10, MAX_ROWS)?;

        let scope = scoped(&self.table, args)?;
        let table = scope.as_ref().unwrap_or(self.table.as_ref());
        Ok(table.sort_by(column, descending)?.to_markdown(limit))
    }
}

/// A single aggregate over a column
pub struct AggregateTool {
    table: Arc<Table>,
}

impl Tool for AggregateTool {
    fn name(&self) -> &str {
        "aggregate"
    }

    fn description(&self) -> &str {
        "Compute count, sum, mean, min, max or median of a column. Args: column, function, plus optional where_column/where_op/where_value filter."
    }

    fn execute(&self, args: &HashMap<String, String>) -> Result<String> {
        let column = required(args, "column")?;
        let function: Aggregate = required(args, "function")?.parse()?;

        let scope = scoped(&self.table, args)?;
        let table = scope.as_ref().unwrap_or(self.table.as_ref());
        let value = table.aggregate(column, function)?;
        Ok(format!(
            "{function}({column}) = {} over {} rows",
            format_number(value),
            table.len()
        ))
    }
}

/// An aggregate per group
pub struct GroupByTool {
    table: Arc<Table>,
}

impl Tool for GroupByTool {
    fn name(&self) -> &str {
        "group_by"
    }

    fn description(&self) -> &str {
        "Aggregate a column per distinct value of another. Args: by, column, function (count, sum, mean, min, max, median), limit (optional, default 20)."
    }

    fn execute(&self, args: &HashMap<String, String>) -> Result<String> {
        let by = required(args, "by")?;
        let column = required(args, "column")?;
        let function: Aggregate = required(args, "function")?.parse()?;
        let limit = optional_usize(args, "limit", 20, MAX_ROWS)?;

        let groups = self.table.group_by(by, column, function)?;
        let mut out = format!("{function}({column}) by {by}\n");
        for (key, value) in groups.iter().take(limit) {
            out.push_str(&format!("{key}: {}\n", format_number(*value)));
        }
        if groups.len() > limit {
            out.push_str(&format!("... ({} more groups)\n", groups.len() - limit));
        }
        Ok(out)
    }
}

/// Frequency of each distinct value
pub struct ValueCountsTool {
    table: Arc<Table>,
}

impl Tool for ValueCountsTool {
    fn name(&self) -> &str {
        "value_counts"
    }

    fn description(&self) -> &str {
        "Distinct values of a column with their counts, most frequent first. Args: column, limit (optional, default 20)."
    }

    fn execute(&self, args: &HashMap<String, String>) -> Result<String> {
        let column = required(args, "column")?;
        let limit = optional_usize(args, "limit", 20, MAX_ROWS)?;

        let counts = self.table.value_counts(column)?;
        let mut out = format!("{} distinct values\n", counts.len());
        for (value, count) in counts.iter().take(limit) {
            out.push_str(&format!("{value}: {count}\n"));
        }
        Ok(out)
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Holds the tools available for one agent run
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All table tools bound to `table`
    pub fn for_table(table: Arc<Table>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ColumnsTool { table: table.clone() }));
        registry.register(Arc::new(HeadTool { table: table.clone() }));
        registry.register(Arc::new(DescribeTool { table: table.clone() }));
        registry.register(Arc::new(FilterTool { table: table.clone() }));
        registry.register(Arc::new(SortTool { table: table.clone() }));
        registry.register(Arc::new(AggregateTool { table: table.clone() }));
        registry.register(Arc::new(GroupByTool { table: table.clone() }));
        registry.register(Arc::new(ValueCountsTool { table }));
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Run a call on the blocking pool, giving up after `timeout`
    ///
    /// A timed-out tool still runs to completion on its thread; its result is dropped.
    pub async fn execute(&self, call: &ToolCall, timeout: Duration) -> ToolResult {
        let outcome = match self.tools.get(&call.tool) {
            Some(tool) => {
                let tool = Arc::clone(tool);
                let args = call.args.clone();
                let task = tokio::task::spawn_blocking(move || tool.execute(&args));
                match tokio::time::timeout(timeout, task).await {
                    Ok(Ok(Ok(output))) => Outcome::Success(output),
                    Ok(Ok(Err(e))) => Outcome::Error(e.to_string()),
                    Ok(Err(e)) => Outcome::Error(format!("tool task failed: {e}")),
                    Err(_) => Outcome::Error("timed out".to_string()),
                }
            }
            None => Outcome::Error(format!("unknown tool: {}", call.tool)),
        };
        ToolResult {
            tool: call.tool.clone(),
            outcome,
        }
    }

    /// Descriptions ordered by tool name
    pub fn descriptions(&self) -> Vec<ToolDescription> {
        self.tools
            .values()
            .map(|t| ToolDescription {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }
}
