use async_trait::async_trait;
use quarry_planner::Statement;
use serde::{Deserialize, Serialize};

/// A column as reported by introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            description: None,
        }
    }
}

/// One column mapping of a foreign key: `child_table.child_column`
/// references `parent_table.parent_column`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    pub parent_table: String,
    pub parent_column: String,
    pub child_table: String,
    pub child_column: String,
}

/// Read-only schema introspection used while building the catalog.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Every base table in the configured schema.
    async fn table_names(&self) -> anyhow::Result<Vec<String>>;

    /// Primary key columns in key order.
    async fn primary_keys(&self, table: &str) -> anyhow::Result<Vec<String>>;

    /// Columns in ordinal order.
    async fn columns(&self, table: &str) -> anyhow::Result<Vec<ColumnInfo>>;

    /// Foreign keys where `table` is the referenced (parent) side.
    async fn exported_keys(&self, table: &str) -> anyhow::Result<Vec<ForeignKeyInfo>>;

    /// Foreign keys where `table` is the referencing (child) side.
    async fn imported_keys(&self, table: &str) -> anyhow::Result<Vec<ForeignKeyInfo>>;
}

/// A result row as ordered (column, text value) pairs. `None` is SQL NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    pub values: Vec<(String, Option<String>)>,
}

impl ResultRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: Option<&str>) -> Self {
        self.values
            .push((column.into(), value.map(|v| v.to_string())));
        self
    }

    pub fn get(&self, column: &str) -> Option<Option<&str>> {
        self.values
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_deref())
    }
}

/// Hands out one session per question.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn acquire(&self) -> anyhow::Result<Box<dyn QuerySession>>;
}

/// A single connection used sequentially for every table of one question.
/// Dropping the session releases the connection.
#[async_trait]
pub trait QuerySession: Send {
    async fn fetch_rows(&mut self, statement: &Statement) -> anyhow::Result<Vec<ResultRow>>;

    /// Runs a `COUNT(*) AS total` statement.
    async fn fetch_count(&mut self, statement: &Statement) -> anyhow::Result<i64>;
}
