//! SQL synthesis.
//!
//! Three table-scoped builders produce [`Statement`]s: count, list and
//! pattern search. Table and column names always come from the catalog and
//! are interpolated as quoted identifiers after passing [`quote_ident`]. The
//! question text is never interpolated: search statements bind it as `$1`.

use crate::error::PlanError;
use quarry_core::{Catalog, RelationshipEdge, TableMetadata};
use serde::Serialize;

/// SQL text plus positional text parameters (`$1`, `$2`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<String>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, value: impl Into<String>) -> Self {
        self.params.push(value.into());
        self
    }

    /// The statement with every parameter substituted as a quoted literal.
    /// For logs and previews only; execution always binds.
    pub fn inline(&self) -> String {
        let mut sql = self.sql.clone();
        // Highest index first so `$1` never clobbers the prefix of `$10`.
        for (idx, value) in self.params.iter().enumerate().rev() {
            sql = sql.replace(&format!("${}", idx + 1), &quote_literal(value));
        }
        sql
    }
}

/// `O'Brien` -> `'O''Brien'`.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `KhachHang` -> `"KhachHang"`. Only `[A-Za-z0-9_]` names are accepted;
/// quoting keeps mixed case and reserved words (`order`, `user`) intact.
pub fn quote_ident(name: &str) -> Result<String, PlanError> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(PlanError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name))
}

/// `<KIND> JOIN <target> ON <source>.<sourceCol> = <target>.<targetCol>`
pub fn join_clause(edge: &RelationshipEdge) -> Result<String, PlanError> {
    let target = quote_ident(&edge.target_table)?;
    Ok(format!(
        "{} JOIN {} ON {}.{} = {}.{}",
        edge.join_kind,
        target,
        quote_ident(&edge.source_table)?,
        quote_ident(&edge.source_column)?,
        target,
        quote_ident(&edge.target_column)?
    ))
}

struct Join<'a> {
    clause: String,
    target: &'a TableMetadata,
}

/// One join per related catalog table accepted by `include`, using the
/// first edge discovered for that table. Joins that fail to build are
/// skipped.
fn plan_joins<'a>(
    table: &TableMetadata,
    catalog: &'a Catalog,
    include: impl Fn(&TableMetadata) -> bool,
) -> Vec<Join<'a>> {
    let mut joins = Vec::new();
    for related in table.related_tables() {
        let Some(target) = catalog.get(related) else {
            continue;
        };
        if !include(target) {
            continue;
        }
        let Some(edge) = table.relationship_with(related) else {
            continue;
        };
        match join_clause(edge) {
            Ok(clause) => joins.push(Join { clause, target }),
            Err(e) => tracing::warn!(
                table = %table.name,
                related,
                error = %e,
                "skipping join"
            ),
        }
    }
    joins
}

fn push_joins(sql: &mut String, joins: &[Join<'_>]) {
    for join in joins {
        sql.push(' ');
        sql.push_str(&join.clause);
    }
}

/// `SELECT COUNT(*) AS total FROM <t>` joined to related tables mentioned
/// in the question.
pub fn build_count(
    table: &TableMetadata,
    catalog: &Catalog,
    query: &str,
) -> Result<Statement, PlanError> {
    let mut sql = format!("SELECT COUNT(*) AS total FROM {}", quote_ident(&table.name)?);
    push_joins(&mut sql, &plan_joins(table, catalog, |t| t.mentioned_in(query)));
    Ok(Statement::new(sql))
}

/// `SELECT DISTINCT <t>.* FROM <t>` joined to related tables mentioned in
/// the question, capped at the table's `max_results`.
pub fn build_list(
    table: &TableMetadata,
    catalog: &Catalog,
    query: &str,
) -> Result<Statement, PlanError> {
    let name = quote_ident(&table.name)?;
    let mut sql = format!("SELECT DISTINCT {name}.* FROM {name}");
    push_joins(&mut sql, &plan_joins(table, catalog, |t| t.mentioned_in(query)));
    sql.push_str(&format!(" LIMIT {}", table.max_results));
    Ok(Statement::new(sql))
}

/// `SELECT DISTINCT <t>.* FROM <t>` joined to every related table, filtered
/// by `LIKE` over the searchable columns of the table and of every joined
/// table. With no searchable columns the statement is unfiltered.
pub fn build_search(
    table: &TableMetadata,
    catalog: &Catalog,
    query: &str,
) -> Result<Statement, PlanError> {
    let name = quote_ident(&table.name)?;
    let joins = plan_joins(table, catalog, |_| true);

    let mut predicates = Vec::new();
    let sources = std::iter::once(table).chain(
        joins
            .iter()
            .map(|j| j.target)
            .filter(|t| t.searchable),
    );
    for source in sources {
        let Ok(source_name) = quote_ident(&source.name) else {
            continue;
        };
        for column in &source.searchable_columns {
            match quote_ident(column) {
                Ok(column) => predicates.push(format!("{source_name}.{column} LIKE $1")),
                Err(e) => tracing::warn!(
                    table = %source.name,
                    error = %e,
                    "skipping search column"
                ),
            }
        }
    }

    let mut sql = format!("SELECT DISTINCT {name}.* FROM {name}");
    push_joins(&mut sql, &joins);

    let mut statement = Statement::new(String::new());
    if !predicates.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" OR "));
        statement = statement.with_param(format!("%{}%", query));
    }
    sql.push_str(&format!(" LIMIT {}", table.max_results));
    statement.sql = sql;
    Ok(statement)
}
