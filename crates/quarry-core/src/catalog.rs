//! Catalog snapshot types.
//!
//! A [`Catalog`] is built once at startup from live introspection and is
//! read-only afterwards. Each allowed table gets one [`TableMetadata`]; foreign
//! keys between allowed tables become [`RelationshipEdge`]s stored on the
//! source table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Row cap applied to list and search statements unless overridden.
pub const DEFAULT_MAX_RESULTS: u32 = 100;

/// SQL join kind stored on an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
}

impl JoinKind {
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER",
            JoinKind::Left => "LEFT",
        }
    }
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Cardinality tag carried by an edge. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    #[default]
    ManyToOne,
    ManyToMany,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Cardinality::OneToOne => "ONE_TO_ONE",
            Cardinality::OneToMany => "ONE_TO_MANY",
            Cardinality::ManyToOne => "MANY_TO_ONE",
            Cardinality::ManyToMany => "MANY_TO_MANY",
        };
        f.write_str(s)
    }
}

/// A directed foreign-key link between two catalog tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipEdge {
    pub source_table: String,
    pub target_table: String,
    pub source_column: String,
    pub target_column: String,
    #[serde(default)]
    pub join_kind: JoinKind,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RelationshipEdge {
    /// Create an edge with the default INNER / MANY_TO_ONE tags.
    pub fn new(
        source_table: impl Into<String>,
        target_table: impl Into<String>,
        source_column: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        Self {
            source_table: source_table.into(),
            target_table: target_table.into(),
            source_column: source_column.into(),
            target_column: target_column.into(),
            join_kind: JoinKind::default(),
            cardinality: Cardinality::default(),
            description: None,
        }
    }

    pub fn with_join_kind(mut self, join_kind: JoinKind) -> Self {
        self.join_kind = join_kind;
        self
    }

    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// An edge is usable only when all four identifying fields are set.
    pub fn is_valid(&self) -> bool {
        !self.source_table.is_empty()
            && !self.target_table.is_empty()
            && !self.source_column.is_empty()
            && !self.target_column.is_empty()
    }

    /// Human-readable summary, preferring an explicit description.
    pub fn readable_description(&self) -> String {
        match &self.description {
            Some(d) if !d.is_empty() => d.clone(),
            _ => format!(
                "{} {} joined with {} through {} = {}",
                self.source_table,
                self.join_kind,
                self.target_table,
                self.source_column,
                self.target_column
            ),
        }
    }
}

/// Metadata for one allowed table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMetadata {
    /// Table name as reported by the database.
    pub name: String,

    /// Title-cased name used in rendered output and query matching.
    pub display_name: String,

    /// Column names in ordinal order.
    pub columns: Vec<String>,

    /// Column name -> native type name.
    pub column_types: BTreeMap<String, String>,

    /// Column name -> display name.
    pub column_display_names: BTreeMap<String, String>,

    /// Column name -> comment from the database, when one exists.
    #[serde(default)]
    pub column_descriptions: BTreeMap<String, String>,

    /// Non-sensitive text columns, in ordinal order.
    pub searchable_columns: Vec<String>,

    /// Non-sensitive columns, in ordinal order.
    pub countable_columns: Vec<String>,

    /// Primary key columns in key order.
    pub primary_keys: Vec<String>,

    /// Outgoing edges in discovery order. Several edges may point at the
    /// same related table.
    #[serde(default)]
    pub relationships: Vec<RelationshipEdge>,

    pub viewable: bool,
    pub countable: bool,
    pub searchable: bool,

    /// LIMIT applied to list and search statements.
    pub max_results: u32,
}

impl TableMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: display_name_for(&name),
            name,
            columns: Vec::new(),
            column_types: BTreeMap::new(),
            column_display_names: BTreeMap::new(),
            column_descriptions: BTreeMap::new(),
            searchable_columns: Vec::new(),
            countable_columns: Vec::new(),
            primary_keys: Vec::new(),
            relationships: Vec::new(),
            viewable: true,
            countable: true,
            searchable: true,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Record a column. `sensitive` comes from the security policy and keeps
    /// the column out of the searchable and countable sets.
    pub fn push_column(&mut self, name: &str, data_type: &str, sensitive: bool) {
        self.columns.push(name.to_string());
        self.column_types
            .insert(name.to_string(), data_type.to_string());
        self.column_display_names
            .insert(name.to_string(), display_name_for(name));

        if sensitive {
            return;
        }
        self.countable_columns.push(name.to_string());
        if is_text_type(data_type) {
            self.searchable_columns.push(name.to_string());
        }
    }

    pub fn is_column_searchable(&self, column: &str) -> bool {
        self.searchable_columns.iter().any(|c| c == column)
    }

    pub fn is_column_countable(&self, column: &str) -> bool {
        self.countable_columns.iter().any(|c| c == column)
    }

    pub fn column_type(&self, column: &str) -> Option<&str> {
        self.column_types.get(column).map(String::as_str)
    }

    pub fn column_description(&self, column: &str) -> Option<&str> {
        self.column_descriptions.get(column).map(String::as_str)
    }

    /// Display name for a column, falling back to title-casing the raw name
    /// for columns this table does not own (e.g. from a join).
    pub fn column_display_name(&self, column: &str) -> String {
        self.column_display_names
            .get(column)
            .cloned()
            .unwrap_or_else(|| display_name_for(column))
    }

    pub fn add_relationship(&mut self, edge: RelationshipEdge) {
        self.relationships.push(edge);
    }

    pub fn has_relationship_with(&self, table: &str) -> bool {
        self.relationships.iter().any(|e| e.target_table == table)
    }

    /// First edge (in discovery order) pointing at `table`.
    pub fn relationship_with(&self, table: &str) -> Option<&RelationshipEdge> {
        self.relationships.iter().find(|e| e.target_table == table)
    }

    /// Every edge pointing at `table`.
    pub fn edges_to<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a RelationshipEdge> {
        self.relationships
            .iter()
            .filter(move |e| e.target_table == table)
    }

    /// Related table names, deduplicated, in first-discovery order.
    pub fn related_tables(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for edge in &self.relationships {
            if !out.contains(&edge.target_table.as_str()) {
                out.push(&edge.target_table);
            }
        }
        out
    }

    /// Whether the table name or display name occurs in `query`,
    /// case-insensitively.
    pub fn mentioned_in(&self, query: &str) -> bool {
        let lowered = query.to_lowercase();
        lowered.contains(&self.name.to_lowercase())
            || lowered.contains(&self.display_name.to_lowercase())
    }
}

/// The immutable set of allowed tables, keyed by table name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    tables: BTreeMap<String, TableMetadata>,
    captured_at: DateTime<Utc>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            tables: BTreeMap::new(),
            captured_at: Utc::now(),
        }
    }

    pub fn insert(&mut self, table: TableMetadata) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn get(&self, name: &str) -> Option<&TableMetadata> {
        self.tables.get(name)
    }

    /// Mutable access for the relationship build pass.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut TableMetadata> {
        self.tables.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableMetadata> {
        self.tables.values()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}

/// `order_items` -> `Order Items`.
pub fn display_name_for(snake: &str) -> String {
    snake
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Character and text type family (Postgres `information_schema` names and
/// the common aliases).
pub fn is_text_type(data_type: &str) -> bool {
    let dt = data_type.to_lowercase();
    dt.contains("char") || dt.contains("text") || dt == "name"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_title_cases_each_word() {
        assert_eq!(display_name_for("order_items"), "Order Items");
        assert_eq!(display_name_for("USERS"), "Users");
        assert_eq!(display_name_for("customer__id"), "Customer Id");
        assert_eq!(display_name_for("khachhang"), "Khachhang");
    }

    #[test]
    fn text_type_family() {
        assert!(is_text_type("character varying"));
        assert!(is_text_type("text"));
        assert!(is_text_type("VARCHAR"));
        assert!(is_text_type("bpchar"));
        assert!(!is_text_type("integer"));
        assert!(!is_text_type("timestamp with time zone"));
        assert!(!is_text_type("jsonb"));
    }

    #[test]
    fn push_column_classifies_sets() {
        let mut t = TableMetadata::new("users");
        t.push_column("id", "integer", false);
        t.push_column("name", "character varying", false);
        t.push_column("password_hash", "text", true);

        assert_eq!(t.columns, vec!["id", "name", "password_hash"]);
        assert_eq!(t.searchable_columns, vec!["name"]);
        assert_eq!(t.countable_columns, vec!["id", "name"]);
        assert!(!t.is_column_searchable("password_hash"));
        assert!(!t.is_column_countable("password_hash"));
        assert_eq!(t.column_display_name("password_hash"), "Password Hash");
        assert_eq!(t.column_type("name"), Some("character varying"));
    }

    #[test]
    fn defaults_match_table_config() {
        let t = TableMetadata::new("orders");
        assert!(t.viewable && t.countable && t.searchable);
        assert_eq!(t.max_results, DEFAULT_MAX_RESULTS);
        assert_eq!(t.display_name, "Orders");
    }

    #[test]
    fn edge_defaults_and_validity() {
        let edge = RelationshipEdge::new("orders", "customers", "customer_id", "id");
        assert_eq!(edge.join_kind, JoinKind::Inner);
        assert_eq!(edge.cardinality, Cardinality::ManyToOne);
        assert!(edge.is_valid());
        assert!(!RelationshipEdge::new("orders", "", "customer_id", "id").is_valid());
        assert_eq!(
            edge.readable_description(),
            "orders INNER joined with customers through customer_id = id"
        );
        let described = edge.with_description("each order has a customer");
        assert_eq!(described.readable_description(), "each order has a customer");
    }

    #[test]
    fn both_edge_directions_to_one_table_are_kept() {
        let mut t = TableMetadata::new("employees");
        t.add_relationship(
            RelationshipEdge::new("employees", "departments", "id", "manager_id")
                .with_join_kind(JoinKind::Left)
                .with_cardinality(Cardinality::OneToMany),
        );
        t.add_relationship(RelationshipEdge::new(
            "employees",
            "departments",
            "department_id",
            "id",
        ));

        assert_eq!(t.edges_to("departments").count(), 2);
        assert_eq!(t.related_tables(), vec!["departments"]);
        let first = t.relationship_with("departments").unwrap();
        assert_eq!(first.join_kind, JoinKind::Left);
    }

    #[test]
    fn mention_matches_name_or_display_name() {
        let t = TableMetadata::new("order_items");
        assert!(t.mentioned_in("show ORDER_ITEMS please"));
        assert!(t.mentioned_in("how many order items are there"));
        assert!(!t.mentioned_in("how many orders"));
    }

    #[test]
    fn join_kind_serializes_uppercase() {
        let yaml = serde_yaml::to_string(&JoinKind::Left).unwrap();
        assert_eq!(yaml.trim(), "LEFT");
        let card: Cardinality = serde_yaml::from_str("ONE_TO_MANY").unwrap();
        assert_eq!(card, Cardinality::OneToMany);
    }
}
