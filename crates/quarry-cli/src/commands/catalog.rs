//! `quarry catalog` command implementation.

use super::Startup;
use anyhow::{Result, bail};
use quarry_core::{QuarryConfig, TableMetadata};
use quarry_policy::SecurityPolicy;

pub async fn run(config: &QuarryConfig, table: Option<&str>, json: bool) -> Result<()> {
    let startup = Startup::connect(config).await?;
    let catalog = &startup.catalog;

    let tables: Vec<&TableMetadata> = match table {
        Some(name) => match catalog.get(name) {
            Some(t) => vec![t],
            None => bail!("table '{}' is not in the catalog", name),
        },
        None => catalog.tables().collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&tables)?);
        return Ok(());
    }

    if let Ok(version) = startup.source.server_version().await {
        println!("Server: {version}");
    }
    println!(
        "Schema: {} ({} tables, captured {})",
        startup.source.schema(),
        catalog.len(),
        catalog.captured_at().to_rfc3339()
    );
    for t in tables {
        print!("\n{}", describe(t, &startup.policy));
    }
    Ok(())
}

fn flag(on: bool) -> &'static str {
    if on { "yes" } else { "no" }
}

fn describe(table: &TableMetadata, policy: &SecurityPolicy) -> String {
    let mut out = format!("{} ({})\n", table.display_name, table.name);
    out.push_str(&format!(
        "  viewable: {}  countable: {}  searchable: {}  max results: {}\n",
        flag(table.viewable),
        flag(table.countable),
        flag(table.searchable),
        table.max_results
    ));
    if !table.primary_keys.is_empty() {
        out.push_str(&format!("  primary key: {}\n", table.primary_keys.join(", ")));
    }

    out.push_str("  columns:\n");
    for column in &table.columns {
        let mut tags = Vec::new();
        if policy.is_sensitive_column(column) {
            tags.push("sensitive");
        }
        if table.is_column_searchable(column) {
            tags.push("searchable");
        }
        out.push_str(&format!(
            "    {} {}",
            column,
            table.column_type(column).unwrap_or("unknown")
        ));
        if !tags.is_empty() {
            out.push_str(&format!(" [{}]", tags.join(", ")));
        }
        if let Some(description) = table.column_description(column) {
            out.push_str(&format!(" -- {description}"));
        }
        out.push('\n');
    }

    if !table.relationships.is_empty() {
        out.push_str("  relationships:\n");
        for edge in &table.relationships {
            out.push_str(&format!(
                "    {} ({})\n",
                edge.readable_description(),
                edge.cardinality
            ));
        }
    }
    out
}
