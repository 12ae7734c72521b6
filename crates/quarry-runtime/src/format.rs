//! Text rendering of query results.
//!
//! The output is evidence for a downstream language model, not prose for an
//! end user: one section per table, one `Column: value` line per cell.

use crate::adapter::ResultRow;
use quarry_core::{FormatConfig, TableMetadata};
use quarry_policy::SecurityPolicy;
use std::fmt::Display;

/// Returned when no catalog table is relevant to the question.
pub const NO_MATCHING_TABLE: &str =
    "No matching data found in the tables available for querying.";

/// Rendered for a table whose statement returned no rows.
pub const NO_RESULTS: &str = "No results found.";

/// Returned when no connection could be acquired for the question.
pub fn database_error(cause: impl Display) -> String {
    format!("Error accessing database: {cause}")
}

#[derive(Debug, Clone)]
pub struct ResultFormatter {
    mask_token: String,
    null_token: String,
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::from_config(&FormatConfig::default())
    }
}

impl ResultFormatter {
    pub fn from_config(config: &FormatConfig) -> Self {
        Self {
            mask_token: config.mask_token.clone(),
            null_token: config.null_token.clone(),
        }
    }

    pub fn mask_token(&self) -> &str {
        &self.mask_token
    }

    pub fn null_token(&self) -> &str {
        &self.null_token
    }

    pub fn header(&self, table: &TableMetadata) -> String {
        format!("=== {} ({}) ===\n", table.display_name, table.name)
    }

    pub fn count_line(&self, table: &TableMetadata, total: i64) -> String {
        format!("Total {}: {}\n", table.display_name, total)
    }

    /// Render rows, or the no-results line when there are none.
    pub fn rows(&self, table: &TableMetadata, rows: &[ResultRow], policy: &SecurityPolicy) -> String {
        if rows.is_empty() {
            return format!("{NO_RESULTS}\n");
        }

        let mut out = String::new();
        for (idx, row) in rows.iter().enumerate() {
            out.push_str(&format!("--- Record {} ---\n", idx + 1));
            for (column, value) in &row.values {
                out.push_str(&table.column_display_name(column));
                out.push_str(": ");
                out.push_str(self.cell(column, value.as_deref(), policy));
                out.push('\n');
            }
        }
        out
    }

    /// Sensitive columns are masked even when null.
    pub fn cell<'a>(&'a self, column: &str, value: Option<&'a str>, policy: &SecurityPolicy) -> &'a str {
        if policy.is_sensitive_column(column) {
            return &self.mask_token;
        }
        value.unwrap_or(&self.null_token)
    }

    pub fn not_viewable(&self, table: &TableMetadata) -> String {
        format!("Table {} is not viewable.\n", table.display_name)
    }

    pub fn not_enabled(&self, table: &TableMetadata, operation: &str) -> String {
        format!(
            "{} is not enabled for table {}.\n",
            operation, table.display_name
        )
    }

    pub fn table_error(&self, table: &TableMetadata, error: impl Display) -> String {
        format!("Error querying table {}: {}\n", table.name, error)
    }
}
