//! Catalog construction.
//!
//! Runs once at startup: a table pass that applies the security policy and
//! collects columns and keys, then a relationship pass that turns foreign keys
//! between catalog tables into edges. Only a failure to enumerate tables is
//! fatal; per-table failures are logged and skipped.

use crate::adapter::SchemaSource;
use quarry_core::{
    Cardinality, Catalog, CatalogConfig, JoinKind, RelationshipEdge, TableMetadata,
};
use quarry_policy::SecurityPolicy;
use thiserror::Error;

/// Errors that prevent the catalog from being built.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The database could not be introspected at all.
    #[error("schema discovery failed: {0}")]
    Discovery(#[source] anyhow::Error),
}

/// Build the catalog: table pass followed by relationship pass.
pub async fn build_catalog<S>(
    source: &S,
    policy: &SecurityPolicy,
    config: &CatalogConfig,
) -> Result<Catalog, CatalogError>
where
    S: SchemaSource + ?Sized,
{
    let tables = source.table_names().await.map_err(CatalogError::Discovery)?;
    let mut catalog = Catalog::new();

    for table in tables {
        let decision = policy.table_decision(&table);
        if !decision.is_allowed() {
            tracing::debug!(table = %table, ?decision, "table excluded by policy");
            continue;
        }

        match discover_table(source, policy, config, &table).await {
            Ok(meta) => {
                tracing::debug!(
                    table = %table,
                    columns = meta.columns.len(),
                    searchable = meta.searchable_columns.len(),
                    "table added to catalog"
                );
                catalog.insert(meta);
            }
            Err(e) => {
                tracing::warn!(table = %table, error = %e, "skipping table: discovery failed");
            }
        }
    }

    build_relationships(source, &mut catalog).await;

    tracing::info!(
        tables = catalog.len(),
        edges = catalog.tables().map(|t| t.relationships.len()).sum::<usize>(),
        "catalog built"
    );
    Ok(catalog)
}

async fn discover_table<S>(
    source: &S,
    policy: &SecurityPolicy,
    config: &CatalogConfig,
    table: &str,
) -> anyhow::Result<TableMetadata>
where
    S: SchemaSource + ?Sized,
{
    let mut meta = TableMetadata::new(table);
    meta.max_results = config.default_max_results;
    meta.primary_keys = source.primary_keys(table).await?;

    for column in source.columns(table).await? {
        let sensitive = policy.is_sensitive_column(&column.name);
        meta.push_column(&column.name, &column.data_type, sensitive);
        if let Some(description) = column.description.filter(|d| !d.is_empty()) {
            meta.column_descriptions.insert(column.name, description);
        }
    }

    if let Some(o) = config.tables.get(table) {
        if let Some(display_name) = &o.display_name {
            meta.display_name = display_name.clone();
        }
        if let Some(max_results) = o.max_results {
            meta.max_results = max_results;
        }
        if let Some(viewable) = o.viewable {
            meta.viewable = viewable;
        }
        if let Some(countable) = o.countable {
            meta.countable = countable;
        }
        if let Some(searchable) = o.searchable {
            meta.searchable = searchable;
        }
    }

    Ok(meta)
}

/// Add foreign-key edges between catalog tables.
///
/// Parent side: `parent -> child`, LEFT / ONE_TO_MANY.
/// Child side: `child -> parent`, INNER / MANY_TO_ONE.
/// Self references and keys to tables outside the catalog are dropped.
pub async fn build_relationships<S>(source: &S, catalog: &mut Catalog)
where
    S: SchemaSource + ?Sized,
{
    let names: Vec<String> = catalog.table_names().map(String::from).collect();

    for table in &names {
        let mut edges = Vec::new();

        match source.exported_keys(table).await {
            Ok(keys) => {
                for fk in keys {
                    if fk.child_table == *table || !catalog.contains(&fk.child_table) {
                        continue;
                    }
                    edges.push(
                        RelationshipEdge::new(
                            table.as_str(),
                            fk.child_table,
                            fk.parent_column,
                            fk.child_column,
                        )
                        .with_join_kind(JoinKind::Left)
                        .with_cardinality(Cardinality::OneToMany),
                    );
                }
            }
            Err(e) => tracing::warn!(table = %table, error = %e, "failed to read exported keys"),
        }

        match source.imported_keys(table).await {
            Ok(keys) => {
                for fk in keys {
                    if fk.parent_table == *table || !catalog.contains(&fk.parent_table) {
                        continue;
                    }
                    edges.push(
                        RelationshipEdge::new(
                            table.as_str(),
                            fk.parent_table,
                            fk.child_column,
                            fk.parent_column,
                        )
                        .with_join_kind(JoinKind::Inner)
                        .with_cardinality(Cardinality::ManyToOne),
                    );
                }
            }
            Err(e) => tracing::warn!(table = %table, error = %e, "failed to read imported keys"),
        }

        if let Some(meta) = catalog.get_mut(table) {
            for edge in edges.into_iter().filter(RelationshipEdge::is_valid) {
                if !meta.relationships.contains(&edge) {
                    meta.add_relationship(edge);
                }
            }
        }
    }
}
