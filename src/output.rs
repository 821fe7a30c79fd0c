//! Rendering of query results
//!
//! [`OutputFormat`] names the formats the CLI accepts; [`format_table`] renders
//! a [`QueryTable`] in any of them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[cfg(feature = "display")]
use crate::database::QueryTable;

/// Default maximum cell width in table output
pub const DEFAULT_MAX_WIDTH: usize = 40;

/// Output format for query results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Pretty table with borders (default)
    #[default]
    Table,
    /// Markdown table format
    Markdown,
    /// Compact JSON array
    Json,
    /// Pretty-printed JSON with indentation
    JsonPretty,
    /// JSON Lines format (one JSON object per line)
    JsonLine,
    /// Pipe-separated values with header
    Psv,
}

impl OutputFormat {
    /// Get a list of all format names for help text
    pub fn all_names() -> &'static [&'static str] {
        &[
            "table",
            "markdown",
            "json",
            "json-pretty",
            "json-line",
            "psv",
        ]
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
            Self::JsonPretty => write!(f, "json-pretty"),
            Self::JsonLine => write!(f, "json-line"),
            Self::Psv => write!(f, "psv"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "pretty" => Ok(Self::Table),
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "json-pretty" | "jsonpretty" => Ok(Self::JsonPretty),
            "json-line" | "jsonline" | "jsonl" | "ndjson" => Ok(Self::JsonLine),
            "psv" | "pipe" => Ok(Self::Psv),
            _ => Err(format!(
                "Unknown output format '{}'. Valid formats: {}",
                s,
                Self::all_names().join(", ")
            )),
        }
    }
}

/// Truncate a string to `max_len` characters, ending in "..." if cut
///
/// ```
/// use yelpdb::output::truncate_name;
///
/// assert_eq!(truncate_name("Short", 20), "Short");
/// assert_eq!(truncate_name("Coffee & Tea, Bakeries, Cafes", 20), "Coffee & Tea, Bak...");
/// ```
pub fn truncate_name(name: &str, max_len: usize) -> String {
    if name.chars().count() <= max_len {
        name.to_string()
    } else {
        let truncated: String = name.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Render a query result
///
/// Table formats cut cells longer than `max_width` characters; JSON and PSV
/// output keep full values. Text newlines are flattened in table and PSV cells.
#[cfg(feature = "display")]
pub fn format_table(
    table: &QueryTable,
    format: OutputFormat,
    max_width: usize,
) -> serde_json::Result<String> {
    use tabled::builder::Builder;
    use tabled::settings::Style;

    let cell = |value: &crate::database::SqlValue| value.to_string().replace(['\n', '\r'], " ");

    let output = match format {
        OutputFormat::Table | OutputFormat::Markdown => {
            let mut builder = Builder::default();
            builder.push_record(table.columns.iter().cloned());
            for row in &table.rows {
                builder.push_record(row.iter().map(|v| truncate_name(&cell(v), max_width)));
            }
            let mut rendered = builder.build();
            if format == OutputFormat::Markdown {
                rendered.with(Style::markdown());
            } else {
                rendered.with(Style::rounded());
            }
            rendered.to_string()
        }
        OutputFormat::Json => serde_json::to_string(&table.to_records())?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(&table.to_records())?,
        OutputFormat::JsonLine => table
            .to_records()
            .iter()
            .map(serde_json::to_string)
            .collect::<serde_json::Result<Vec<_>>>()?
            .join("\n"),
        OutputFormat::Psv => {
            let mut lines = vec![table.columns.join("|")];
            for row in &table.rows {
                lines.push(row.iter().map(cell).collect::<Vec<_>>().join("|"));
            }
            lines.join("\n")
        }
    };
    Ok(output)
}
