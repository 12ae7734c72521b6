use crate::adapter::{QueryExecutor, QuerySession};
use crate::format::{NO_MATCHING_TABLE, ResultFormatter, database_error};
use quarry_core::{Catalog, TableMetadata};
use quarry_planner::{
    Classification, Intent, IntentClassifier, KeywordClassifier, PlanError, Statement,
    build_count, build_list, build_search,
};
use quarry_policy::SecurityPolicy;
use serde::Serialize;
use std::sync::Arc;

/// Statements that would run for one table.
#[derive(Debug, Clone, Serialize)]
pub struct TablePlan {
    pub table: String,
    pub statements: Vec<Statement>,
    /// Why the table would render a fixed line instead of running anything.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

/// Classification plus per-table statements, without touching the database.
#[derive(Debug, Clone, Serialize)]
pub struct QueryPlan {
    pub classification: Classification,
    pub tables: Vec<TablePlan>,
}

/// Answers one question at a time against a shared, read-only catalog.
pub struct Orchestrator<E: QueryExecutor, C: IntentClassifier = KeywordClassifier> {
    catalog: Arc<Catalog>,
    policy: Arc<SecurityPolicy>,
    classifier: C,
    executor: E,
    formatter: ResultFormatter,
}

impl<E: QueryExecutor> Orchestrator<E> {
    pub fn new(catalog: Arc<Catalog>, policy: Arc<SecurityPolicy>, executor: E) -> Self {
        Self {
            catalog,
            policy,
            classifier: KeywordClassifier::default(),
            executor,
            formatter: ResultFormatter::default(),
        }
    }
}

impl<E: QueryExecutor, C: IntentClassifier> Orchestrator<E, C> {
    pub fn with_formatter(mut self, formatter: ResultFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn with_classifier<C2: IntentClassifier>(self, classifier: C2) -> Orchestrator<E, C2> {
        Orchestrator {
            catalog: self.catalog,
            policy: self.policy,
            classifier,
            executor: self.executor,
            formatter: self.formatter,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn classify(&self, query: &str) -> Classification {
        self.classifier.classify(query, &self.catalog)
    }

    /// Dry run: what `answer` would execute for `query`. COUNT_AND_LIST lists
    /// both statements even though the list only runs on a non-zero count.
    pub fn plan(&self, query: &str) -> Result<QueryPlan, PlanError> {
        let classification = self.classify(query);
        let mut tables = Vec::new();

        for name in &classification.tables {
            let table = self
                .catalog
                .get(name)
                .ok_or_else(|| PlanError::UnknownTable(name.clone()))?;

            let mut plan = TablePlan {
                table: name.clone(),
                statements: Vec::new(),
                skipped: None,
            };
            if !table.viewable {
                plan.skipped = Some("not viewable".to_string());
                tables.push(plan);
                continue;
            }

            let intent = classification.intent;
            if intent.wants_count() && !table.countable {
                plan.skipped = Some("count not enabled".to_string());
            } else if intent.wants_count() {
                plan.statements.push(build_count(table, &self.catalog, query)?);
            }
            match intent {
                Intent::List | Intent::CountAndList => {
                    plan.statements.push(build_list(table, &self.catalog, query)?);
                }
                Intent::Search if !table.searchable => {
                    plan.skipped = Some("search not enabled".to_string());
                }
                Intent::Search => {
                    plan.statements.push(build_search(table, &self.catalog, query)?);
                }
                Intent::Count => {}
            }
            tables.push(plan);
        }

        Ok(QueryPlan {
            classification,
            tables,
        })
    }

    /// Build the context block for one question.
    ///
    /// Never fails: a missing table set, a connection failure and per-table
    /// errors all render as text.
    pub async fn answer(&self, query: &str, is_database_query: bool) -> String {
        if !is_database_query {
            return String::new();
        }

        let classification = self.classify(query);
        if classification.is_unresolved() {
            tracing::info!("no relevant table for question");
            return NO_MATCHING_TABLE.to_string();
        }

        let mut session = match self.executor.acquire().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "failed to acquire connection");
                return database_error(e);
            }
        };

        let mut out = String::new();
        for name in &classification.tables {
            let Some(table) = self.catalog.get(name) else {
                continue;
            };
            out.push_str(&self.formatter.header(table));
            if let Err(e) = self
                .answer_table(&mut *session, table, classification.intent, query, &mut out)
                .await
            {
                tracing::warn!(table = %table.name, error = %e, "table query failed");
                out.push_str(&self.formatter.table_error(table, e));
            }
        }

        tracing::info!(
            intent = %classification.intent,
            tables = classification.tables.len(),
            "question answered"
        );
        out
    }

    async fn answer_table(
        &self,
        session: &mut dyn QuerySession,
        table: &TableMetadata,
        intent: Intent,
        query: &str,
        out: &mut String,
    ) -> anyhow::Result<()> {
        if !table.viewable {
            out.push_str(&self.formatter.not_viewable(table));
            return Ok(());
        }

        match intent {
            Intent::Count => {
                if table.countable {
                    let total = self.count(session, table, query).await?;
                    out.push_str(&self.formatter.count_line(table, total));
                } else {
                    out.push_str(&self.formatter.not_enabled(table, "Count"));
                }
            }
            Intent::List => {
                let statement = build_list(table, &self.catalog, query)?;
                self.rows(session, table, &statement, out).await?;
            }
            Intent::Search => {
                if table.searchable {
                    let statement = build_search(table, &self.catalog, query)?;
                    self.rows(session, table, &statement, out).await?;
                } else {
                    out.push_str(&self.formatter.not_enabled(table, "Search"));
                }
            }
            Intent::CountAndList => {
                if table.countable {
                    let total = self.count(session, table, query).await?;
                    out.push_str(&self.formatter.count_line(table, total));
                    if total == 0 {
                        return Ok(());
                    }
                } else {
                    out.push_str(&self.formatter.not_enabled(table, "Count"));
                }
                let statement = build_list(table, &self.catalog, query)?;
                self.rows(session, table, &statement, out).await?;
            }
        }
        Ok(())
    }

    async fn count(
        &self,
        session: &mut dyn QuerySession,
        table: &TableMetadata,
        query: &str,
    ) -> anyhow::Result<i64> {
        let statement = build_count(table, &self.catalog, query)?;
        tracing::debug!(table = %table.name, sql = %statement.inline(), "executing count");
        session.fetch_count(&statement).await
    }

    async fn rows(
        &self,
        session: &mut dyn QuerySession,
        table: &TableMetadata,
        statement: &Statement,
        out: &mut String,
    ) -> anyhow::Result<()> {
        tracing::debug!(table = %table.name, sql = %statement.inline(), "executing statement");
        let rows = session.fetch_rows(statement).await?;
        out.push_str(&self.formatter.rows(table, &rows, &self.policy));
        Ok(())
    }
}
