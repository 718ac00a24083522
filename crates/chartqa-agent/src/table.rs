//! In-memory CSV table
//!
//! Loads a CSV file with a header row and provides the operations the
//! agent's tools expose: preview, summary statistics, filtering, sorting,
//! aggregation, grouping, and value counts.
//!
//! Author: hephaex@gmail.com

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use chartqa_core::ChartQaError;

/// Table errors
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("Failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Table has no columns")]
    Empty,

    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    #[error("Unknown operator '{0}' (expected one of ==, !=, >, >=, <, <=, contains)")]
    UnknownOperator(String),

    #[error("Unknown function '{0}' (expected one of count, sum, mean, min, max, median)")]
    UnknownFunction(String),

    #[error("Column '{0}' has no numeric values")]
    NotNumeric(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<TableError> for ChartQaError {
    fn from(err: TableError) -> Self {
        ChartQaError::DataError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TableError>;

// ============================================================================
// Cells
// ============================================================================

/// A single typed value
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    /// Type a raw CSV field
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Cell::Number(n),
            _ => Cell::Text(trimmed.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Ordering used by `sort_by`: numbers, then text, then empty cells
    fn sort_cmp(&self, other: &Cell) -> Ordering {
        match (self, other) {
            (Cell::Number(a), Cell::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Cell::Text(a), Cell::Text(b)) => a.cmp(b),
            (Cell::Number(_), _) => Ordering::Less,
            (_, Cell::Number(_)) => Ordering::Greater,
            (Cell::Text(_), Cell::Empty) => Ordering::Less,
            (Cell::Empty, Cell::Text(_)) => Ordering::Greater,
            (Cell::Empty, Cell::Empty) => Ordering::Equal,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Number(n) => write!(f, "{}", format_number(*n)),
            Cell::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Format without unnecessary decimals
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        let rounded = format!("{n:.4}");
        rounded
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    }
}

// ============================================================================
// Operators
// ============================================================================

/// Row filter comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
}

impl std::str::FromStr for FilterOp {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "==" | "=" | "eq" => Ok(Self::Eq),
            "!=" | "<>" | "ne" => Ok(Self::Ne),
            ">" | "gt" => Ok(Self::Gt),
            ">=" | "ge" => Ok(Self::Ge),
            "<" | "lt" => Ok(Self::Lt),
            "<=" | "le" => Ok(Self::Le),
            "contains" => Ok(Self::Contains),
            other => Err(TableError::UnknownOperator(other.to_string())),
        }
    }
}

impl FilterOp {
    fn matches(&self, cell: &Cell, value: &str) -> bool {
        if *self == FilterOp::Contains {
            return cell
                .to_string()
                .to_lowercase()
                .contains(&value.trim().to_lowercase());
        }

        let ordering = match (cell, value.trim().parse::<f64>()) {
            (Cell::Number(n), Ok(v)) => n.partial_cmp(&v),
            (Cell::Empty, _) => return *self == FilterOp::Ne && !value.trim().is_empty(),
            _ => Some(cell.to_string().as_str().cmp(value.trim())),
        };

        match ordering {
            Some(o) => match self {
                FilterOp::Eq => o == Ordering::Equal,
                FilterOp::Ne => o != Ordering::Equal,
                FilterOp::Gt => o == Ordering::Greater,
                FilterOp::Ge => o != Ordering::Less,
                FilterOp::Lt => o == Ordering::Less,
                FilterOp::Le => o != Ordering::Greater,
                FilterOp::Contains => false,
            },
            None => false,
        }
    }
}

/// Column aggregate function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Sum,
    Mean,
    Min,
    Max,
    Median,
}

impl std::str::FromStr for Aggregate {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "count" => Ok(Self::Count),
            "sum" | "total" => Ok(Self::Sum),
            "mean" | "avg" | "average" => Ok(Self::Mean),
            "min" | "minimum" => Ok(Self::Min),
            "max" | "maximum" => Ok(Self::Max),
            "median" => Ok(Self::Median),
            other => Err(TableError::UnknownFunction(other.to_string())),
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Min => "min",
            Self::Max => "max",
            Self::Median => "median",
        };
        write!(f, "{name}")
    }
}

impl Aggregate {
    /// Apply to the numeric values of a column; `None` when there are none
    fn apply(&self, values: &[f64]) -> Option<f64> {
        if *self == Aggregate::Count {
            return Some(values.len() as f64);
        }
        if values.is_empty() {
            return None;
        }
        let result = match self {
            Aggregate::Count => values.len() as f64,
            Aggregate::Sum => values.iter().sum(),
            Aggregate::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Aggregate::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregate::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Aggregate::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    (sorted[mid - 1] + sorted[mid]) / 2.0
                } else {
                    sorted[mid]
                }
            }
        };
        Some(result)
    }
}

// ============================================================================
// Summaries
// ============================================================================

/// Per-column summary produced by `describe`
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnSummary {
    Numeric {
        name: String,
        count: usize,
        mean: f64,
        min: f64,
        max: f64,
    },
    Text {
        name: String,
        count: usize,
        unique: usize,
        top: Option<String>,
    },
}

impl fmt::Display for ColumnSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnSummary::Numeric {
                name,
                count,
                mean,
                min,
                max,
            } => write!(
                f,
                "{name} (numeric): count={count}, mean={}, min={}, max={}",
                format_number(*mean),
                format_number(*min),
                format_number(*max)
            ),
            ColumnSummary::Text {
                name,
                count,
                unique,
                top,
            } => write!(
                f,
                "{name} (text): count={count}, unique={unique}, top={}",
                top.as_deref().unwrap_or("-")
            ),
        }
    }
}

// ============================================================================
// Table
// ============================================================================

/// Rows of typed cells under a header
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { headers, rows }
    }

    /// Load a CSV file whose first row is the header
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| TableError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_reader(file)
    }

    /// Parse CSV from any reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(TableError::Empty);
        }

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let row = (0..headers.len())
                .map(|i| Cell::parse(record.get(i).unwrap_or("")))
                .collect();
            rows.push(row);
        }

        Ok(Self::new(headers, rows))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.headers
    }

    /// Resolve a column name, falling back to a case-insensitive match
    pub fn column_index(&self, name: &str) -> Result<usize> {
        let name = name.trim();
        self.headers
            .iter()
            .position(|h| h == name)
            .or_else(|| {
                self.headers
                    .iter()
                    .position(|h| h.eq_ignore_ascii_case(name))
            })
            .ok_or_else(|| TableError::UnknownColumn(name.to_string()))
    }

    fn column_values(&self, idx: usize) -> impl Iterator<Item = &Cell> {
        self.rows.iter().map(move |row| &row[idx])
    }

    fn numeric_values(&self, idx: usize) -> Vec<f64> {
        self.column_values(idx).filter_map(Cell::as_f64).collect()
    }

    /// A column is numeric when every non-empty cell is a number
    pub fn is_numeric(&self, idx: usize) -> bool {
        let mut seen = false;
        for cell in self.column_values(idx) {
            match cell {
                Cell::Number(_) => seen = true,
                Cell::Text(_) => return false,
                Cell::Empty => {}
            }
        }
        seen
    }

    /// First `n` rows
    pub fn head(&self, n: usize) -> Table {
        Table::new(self.headers.clone(), self.rows.iter().take(n).cloned().collect())
    }

    pub fn describe(&self) -> Vec<ColumnSummary> {
        (0..self.headers.len())
            .map(|idx| {
                let name = self.headers[idx].clone();
                if self.is_numeric(idx) {
                    let values = self.numeric_values(idx);
                    ColumnSummary::Numeric {
                        name,
                        count: values.len(),
                        mean: Aggregate::Mean.apply(&values).unwrap_or(0.0),
                        min: Aggregate::Min.apply(&values).unwrap_or(0.0),
                        max: Aggregate::Max.apply(&values).unwrap_or(0.0),
                    }
                } else {
                    let counts = self.counts(idx);
                    ColumnSummary::Text {
                        name,
                        count: counts.iter().map(|(_, c)| c).sum(),
                        unique: counts.len(),
                        top: counts.first().map(|(v, _)| v.clone()),
                    }
                }
            })
            .collect()
    }

    /// Rows where `column <op> value`
    pub fn filter(&self, column: &str, op: FilterOp, value: &str) -> Result<Table> {
        let idx = self.column_index(column)?;
        Ok(Table {
            headers: self.headers.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| op.matches(&row[idx], value))
                .cloned()
                .collect(),
        })
    }

    /// Stable sort on one column
    pub fn sort_by(&self, column: &str, descending: bool) -> Result<Table> {
        let idx = self.column_index(column)?;
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| {
            let (x, y) = (&a[idx], &b[idx]);
            match (x.is_empty(), y.is_empty()) {
                // empty cells stay last in both directions
                (false, false) if descending => y.sort_cmp(x),
                _ => x.sort_cmp(y),
            }
        });
        Ok(Table {
            headers: self.headers.clone(),
            rows,
        })
    }

    /// Aggregate one column; `count` counts non-empty cells of any type
    pub fn aggregate(&self, column: &str, function: Aggregate) -> Result<f64> {
        let idx = self.column_index(column)?;
        if function == Aggregate::Count {
            return Ok(self.column_values(idx).filter(|c| !c.is_empty()).count() as f64);
        }
        let values = self.numeric_values(idx);
        function
            .apply(&values)
            .ok_or_else(|| TableError::NotNumeric(self.headers[idx].clone()))
    }

    /// Aggregate `column` per distinct value of `key`, ordered by key
    pub fn group_by(&self, key: &str, column: &str, function: Aggregate) -> Result<Vec<(String, f64)>> {
        let key_idx = self.column_index(key)?;
        let col_idx = self.column_index(column)?;
        if function != Aggregate::Count && self.numeric_values(col_idx).is_empty() {
            return Err(TableError::NotNumeric(self.headers[col_idx].clone()));
        }

        let mut groups: BTreeMap<String, (usize, Vec<f64>)> = BTreeMap::new();
        for row in &self.rows {
            let entry = groups.entry(row[key_idx].to_string()).or_default();
            if !row[col_idx].is_empty() {
                entry.0 += 1;
            }
            if let Some(n) = row[col_idx].as_f64() {
                entry.1.push(n);
            }
        }

        Ok(groups
            .into_iter()
            .filter_map(|(group, (non_empty, values))| {
                let result = match function {
                    Aggregate::Count => Some(non_empty as f64),
                    _ => function.apply(&values),
                };
                result.map(|r| (group, r))
            })
            .collect())
    }

    /// Distinct values of a column with their frequency, most frequent first
    pub fn value_counts(&self, column: &str) -> Result<Vec<(String, usize)>> {
        let idx = self.column_index(column)?;
        Ok(self.counts(idx))
    }

    fn counts(&self, idx: usize) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for cell in self.column_values(idx).filter(|c| !c.is_empty()) {
            *counts.entry(cell.to_string()).or_default() += 1;
        }
        let mut counts: Vec<(String, usize)> = counts.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts
    }

    /// Render as a markdown table, showing at most `limit` rows
    pub fn to_markdown(&self, limit: usize) -> String {
        let mut out = String::new();
        out.push_str(&format!("| {} |\n", self.headers.join(" | ")));
        out.push_str(&format!(
            "|{}\n",
            self.headers.iter().map(|_| "---|").collect::<String>()
        ));
        for row in self.rows.iter().take(limit) {
            let cells: Vec<String> = row
                .iter()
                .map(|c| c.to_string().replace('|', "\\|"))
                .collect();
            out.push_str(&format!("| {} |\n", cells.join(" | ")));
        }
        if self.rows.len() > limit {
            out.push_str(&format!("... ({} more rows)\n", self.rows.len() - limit));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
country,income,health,population,region
Norway,64304,81.6,5210967,europe_central_asia
Japan,36162,83.5,126573481,east_asia_pacific
Chad,2191,57.2,14037472,sub_saharan_africa
Brazil,14833,75.6,207847528,america
Germany,44053,81.1,80688545,europe_central_asia
Kosovo,9600,,1804944,europe_central_asia
";

    fn sample() -> Table {
        Table::from_reader(SAMPLE.as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_types() {
        let table = sample();
        assert_eq!(table.len(), 6);
        assert_eq!(table.columns()[0], "country");
        assert_eq!(table.rows[0][0], Cell::Text("Norway".to_string()));
        assert_eq!(table.rows[0][2], Cell::Number(81.6));
        assert_eq!(table.rows[5][2], Cell::Empty);
        assert!(table.is_numeric(1));
        assert!(table.is_numeric(2));
        assert!(!table.is_numeric(4));
    }

    #[test]
    fn test_short_rows_padded() {
        let table = Table::from_reader("a,b,c\n1,2\n".as_bytes()).unwrap();
        assert_eq!(table.rows[0], vec![Cell::Number(1.0), Cell::Number(2.0), Cell::Empty]);
    }

    #[test]
    fn test_empty_input() {
        let err = Table::from_reader("".as_bytes()).unwrap_err();
        assert!(matches!(err, TableError::Empty));
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = Table::from_path("/nonexistent/data.csv").unwrap_err();
        assert!(matches!(err, TableError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/data.csv"));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let table = Table::from_path(file.path()).unwrap();
        assert_eq!(table.len(), 6);
    }

    #[test]
    fn test_column_index_case_insensitive() {
        let table = sample();
        assert_eq!(table.column_index("Income").unwrap(), 1);
        assert!(matches!(
            table.column_index("gdp"),
            Err(TableError::UnknownColumn(c)) if c == "gdp"
        ));
    }

    #[test]
    fn test_filter_numeric_and_text() {
        let table = sample();
        let rich = table.filter("income", FilterOp::Gt, "40000").unwrap();
        assert_eq!(rich.len(), 2);

        let europe = table
            .filter("region", FilterOp::Eq, "europe_central_asia")
            .unwrap();
        assert_eq!(europe.len(), 3);

        let contains = table.filter("country", FilterOp::Contains, "AN").unwrap();
        let names: Vec<String> = contains.rows.iter().map(|r| r[0].to_string()).collect();
        assert_eq!(names, vec!["Japan", "Germany"]);
    }

    #[test]
    fn test_filter_skips_empty_cells() {
        let table = sample();
        let healthy = table.filter("health", FilterOp::Lt, "100").unwrap();
        assert_eq!(healthy.len(), 5);
    }

    #[test]
    fn test_filter_op_parse() {
        assert_eq!(">=".parse::<FilterOp>().unwrap(), FilterOp::Ge);
        assert_eq!("=".parse::<FilterOp>().unwrap(), FilterOp::Eq);
        assert!("~".parse::<FilterOp>().is_err());
    }

    #[test]
    fn test_sort_descending_keeps_empty_last() {
        let table = sample();
        let sorted = table.sort_by("health", true).unwrap();
        let first: Vec<String> = sorted.rows.iter().map(|r| r[0].to_string()).collect();
        assert_eq!(first[0], "Japan");
        assert_eq!(first[4], "Chad");
        assert_eq!(first[5], "Kosovo");

        let ascending = table.sort_by("health", false).unwrap();
        assert_eq!(ascending.rows[0][0].to_string(), "Chad");
        assert_eq!(ascending.rows[5][0].to_string(), "Kosovo");
    }

    #[test]
    fn test_aggregates() {
        let table = sample();
        assert_eq!(table.aggregate("income", Aggregate::Max).unwrap(), 64304.0);
        assert_eq!(table.aggregate("income", Aggregate::Min).unwrap(), 2191.0);
        assert_eq!(table.aggregate("health", Aggregate::Count).unwrap(), 5.0);
        assert_eq!(table.aggregate("health", Aggregate::Median).unwrap(), 81.1);
        let mean = table.aggregate("health", Aggregate::Mean).unwrap();
        assert!((mean - 75.8).abs() < 1e-9);
        assert!(matches!(
            table.aggregate("region", Aggregate::Sum),
            Err(TableError::NotNumeric(_))
        ));
    }

    #[test]
    fn test_aggregate_parse() {
        assert_eq!("AVG".parse::<Aggregate>().unwrap(), Aggregate::Mean);
        assert!("stddev".parse::<Aggregate>().is_err());
    }

    #[test]
    fn test_group_by() {
        let table = sample();
        let groups = table
            .group_by("region", "population", Aggregate::Sum)
            .unwrap();
        assert_eq!(groups.len(), 4);
        assert_eq!(groups[0].0, "america");
        let europe = groups
            .iter()
            .find(|(k, _)| k == "europe_central_asia")
            .unwrap();
        assert_eq!(europe.1, 5210967.0 + 80688545.0 + 1804944.0);

        let counts = table.group_by("region", "health", Aggregate::Count).unwrap();
        let europe = counts
            .iter()
            .find(|(k, _)| k == "europe_central_asia")
            .unwrap();
        assert_eq!(europe.1, 2.0);
    }

    #[test]
    fn test_value_counts() {
        let table = sample();
        let counts = table.value_counts("region").unwrap();
        assert_eq!(counts[0], ("europe_central_asia".to_string(), 3));
        assert_eq!(counts.len(), 4);
    }

    #[test]
    fn test_describe() {
        let table = sample();
        let summary = table.describe();
        assert_eq!(summary.len(), 5);
        match &summary[1] {
            ColumnSummary::Numeric { name, count, max, .. } => {
                assert_eq!(name, "income");
                assert_eq!(*count, 6);
                assert_eq!(*max, 64304.0);
            }
            other => panic!("expected numeric summary, got {other:?}"),
        }
        match &summary[4] {
            ColumnSummary::Text { unique, top, .. } => {
                assert_eq!(*unique, 4);
                assert_eq!(top.as_deref(), Some("europe_central_asia"));
            }
            other => panic!("expected text summary, got {other:?}"),
        }
        assert!(summary[2].to_string().starts_with("health (numeric): count=5"));
    }

    #[test]
    fn test_to_markdown_truncates() {
        let table = sample();
        let md = table.to_markdown(2);
        let lines: Vec<&str> = md.lines().collect();
        assert_eq!(lines[0], "| country | income | health | population | region |");
        assert_eq!(lines[2], "| Norway | 64304 | 81.6 | 5210967 | europe_central_asia |");
        assert_eq!(lines[4], "... (4 more rows)");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(42.0), "42");
        assert_eq!(format_number(81.6), "81.6");
        assert_eq!(format_number(1.0 / 3.0), "0.3333");
    }
}
