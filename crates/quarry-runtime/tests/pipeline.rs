//! End-to-end pipeline tests against in-memory schema and database fakes.

use async_trait::async_trait;
use quarry_core::{CatalogConfig, TableOverride};
use quarry_planner::{Intent, Resolution, Statement};
use quarry_policy::SecurityPolicy;
use quarry_runtime::{
    ColumnInfo, ForeignKeyInfo, NO_MATCHING_TABLE, Orchestrator, QueryExecutor, QuerySession,
    ResultRow, SchemaSource, build_catalog,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

struct ShopSchema {
    tables: BTreeMap<&'static str, Vec<ColumnInfo>>,
    keys: Vec<ForeignKeyInfo>,
}

impl ShopSchema {
    fn new() -> Self {
        let mut tables = BTreeMap::new();
        tables.insert(
            "orders",
            vec![
                ColumnInfo::new("id", "integer"),
                ColumnInfo::new("customer_id", "integer"),
                ColumnInfo::new("total", "numeric"),
                ColumnInfo::new("password_hint", "text"),
            ],
        );
        tables.insert(
            "customers",
            vec![ColumnInfo::new("id", "integer"), ColumnInfo::new("name", "text")],
        );
        tables.insert(
            "user_sessions",
            vec![ColumnInfo::new("id", "integer"), ColumnInfo::new("token", "text")],
        );
        let keys = vec![ForeignKeyInfo {
            parent_table: "customers".to_string(),
            parent_column: "id".to_string(),
            child_table: "orders".to_string(),
            child_column: "customer_id".to_string(),
        }];
        Self { tables, keys }
    }
}

#[async_trait]
impl SchemaSource for ShopSchema {
    async fn table_names(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.tables.keys().map(|t| t.to_string()).collect())
    }

    async fn primary_keys(&self, _table: &str) -> anyhow::Result<Vec<String>> {
        Ok(vec!["id".to_string()])
    }

    async fn columns(&self, table: &str) -> anyhow::Result<Vec<ColumnInfo>> {
        Ok(self.tables.get(table).cloned().unwrap_or_default())
    }

    async fn exported_keys(&self, table: &str) -> anyhow::Result<Vec<ForeignKeyInfo>> {
        Ok(self.keys.iter().filter(|k| k.parent_table == table).cloned().collect())
    }

    async fn imported_keys(&self, table: &str) -> anyhow::Result<Vec<ForeignKeyInfo>> {
        Ok(self.keys.iter().filter(|k| k.child_table == table).cloned().collect())
    }
}

#[derive(Default)]
struct FakeState {
    rows: Vec<(&'static str, Vec<ResultRow>)>,
    counts: Vec<(&'static str, i64)>,
    failing: Vec<&'static str>,
    acquire_error: Option<&'static str>,
    executed: Vec<Statement>,
    acquired: usize,
}

/// Canned responses are keyed by a fragment of the SQL text.
#[derive(Clone, Default)]
struct FakeDb {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDb {
    fn rows(self, fragment: &'static str, rows: Vec<ResultRow>) -> Self {
        self.state.lock().unwrap().rows.push((fragment, rows));
        self
    }

    fn count(self, fragment: &'static str, total: i64) -> Self {
        self.state.lock().unwrap().counts.push((fragment, total));
        self
    }

    fn failing(self, fragment: &'static str) -> Self {
        self.state.lock().unwrap().failing.push(fragment);
        self
    }

    fn unreachable(self, cause: &'static str) -> Self {
        self.state.lock().unwrap().acquire_error = Some(cause);
        self
    }

    fn executed(&self) -> Vec<Statement> {
        self.state.lock().unwrap().executed.clone()
    }

    fn acquired(&self) -> usize {
        self.state.lock().unwrap().acquired
    }

    fn record(&self, statement: &Statement) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.executed.push(statement.clone());
        if let Some(f) = state.failing.iter().find(|f| statement.sql.contains(**f)) {
            anyhow::bail!("statement matching '{f}' failed");
        }
        Ok(())
    }
}

#[async_trait]
impl QueryExecutor for FakeDb {
    async fn acquire(&self) -> anyhow::Result<Box<dyn QuerySession>> {
        let mut state = self.state.lock().unwrap();
        if let Some(cause) = state.acquire_error {
            anyhow::bail!("{cause}");
        }
        state.acquired += 1;
        Ok(Box::new(FakeSession { db: self.clone() }))
    }
}

struct FakeSession {
    db: FakeDb,
}

#[async_trait]
impl QuerySession for FakeSession {
    async fn fetch_rows(&mut self, statement: &Statement) -> anyhow::Result<Vec<ResultRow>> {
        self.db.record(statement)?;
        let state = self.db.state.lock().unwrap();
        Ok(state
            .rows
            .iter()
            .find(|(f, _)| statement.sql.contains(*f))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    async fn fetch_count(&mut self, statement: &Statement) -> anyhow::Result<i64> {
        self.db.record(statement)?;
        let state = self.db.state.lock().unwrap();
        Ok(state
            .counts
            .iter()
            .find(|(f, _)| statement.sql.contains(*f))
            .map(|(_, n)| *n)
            .unwrap_or(0))
    }
}

fn order_row() -> ResultRow {
    ResultRow::new()
        .with("id", Some("1"))
        .with("customer_id", Some("7"))
        .with("total", Some("12.50"))
        .with("password_hint", Some("first pet"))
}

fn customer_row() -> ResultRow {
    ResultRow::new().with("id", Some("7")).with("name", Some("Ada"))
}

async fn orchestrator_with(db: FakeDb, config: CatalogConfig) -> Orchestrator<FakeDb> {
    let policy = Arc::new(SecurityPolicy::new());
    let catalog = build_catalog(&ShopSchema::new(), &policy, &config)
        .await
        .unwrap();
    Orchestrator::new(Arc::new(catalog), policy, db)
}

async fn orchestrator(db: FakeDb) -> Orchestrator<FakeDb> {
    orchestrator_with(db, CatalogConfig::default()).await
}

#[tokio::test]
async fn list_expands_related_tables_and_masks_sensitive_columns() {
    let db = FakeDb::default()
        .rows(r#"FROM "orders""#, vec![order_row()])
        .rows(r#"FROM "customers""#, vec![customer_row()]);
    let orch = orchestrator(db.clone()).await;

    let classification = orch.classify("liệt kê orders");
    assert_eq!(classification.intent, Intent::List);
    assert_eq!(classification.resolution, Resolution::CatalogMention);
    assert_eq!(
        classification.tables.iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["customers", "orders"]
    );

    let out = orch.answer("liệt kê orders", true).await;
    assert_eq!(
        out,
        "=== Customers (customers) ===\n\
         --- Record 1 ---\n\
         Id: 7\n\
         Name: Ada\n\
         === Orders (orders) ===\n\
         --- Record 1 ---\n\
         Id: 1\n\
         Customer Id: 7\n\
         Total: 12.50\n\
         Password Hint: ******\n"
    );
    assert!(!out.contains("first pet"));

    let sql: Vec<String> = db.executed().into_iter().map(|s| s.sql).collect();
    assert_eq!(
        sql,
        vec![
            r#"SELECT DISTINCT "customers".* FROM "customers" LEFT JOIN "orders" ON "customers"."id" = "orders"."customer_id" LIMIT 100"#,
            r#"SELECT DISTINCT "orders".* FROM "orders" LIMIT 100"#,
        ]
    );
    assert_eq!(db.acquired(), 1);
}

#[tokio::test]
async fn count_and_list_lists_only_non_empty_tables() {
    let db = FakeDb::default()
        .count(r#"FROM "orders""#, 2)
        .count(r#"FROM "customers""#, 0)
        .rows(r#"FROM "orders""#, vec![order_row(), order_row()]);
    let orch = orchestrator(db.clone()).await;

    let out = orch.answer("list orders and how many", true).await;
    assert!(out.starts_with("=== Customers (customers) ===\nTotal Customers: 0\n=== Orders"));
    assert!(out.contains("Total Orders: 2\n--- Record 1 ---\n"));
    assert!(out.contains("--- Record 2 ---\n"));

    let sql: Vec<String> = db.executed().into_iter().map(|s| s.sql).collect();
    assert_eq!(
        sql,
        vec![
            r#"SELECT COUNT(*) AS total FROM "customers" LEFT JOIN "orders" ON "customers"."id" = "orders"."customer_id""#,
            r#"SELECT COUNT(*) AS total FROM "orders""#,
            r#"SELECT DISTINCT "orders".* FROM "orders" LIMIT 100"#,
        ]
    );
}

#[tokio::test]
async fn search_binds_the_question() {
    let db = FakeDb::default();
    let orch = orchestrator(db.clone()).await;

    let out = orch.answer("customers named O'Brien", true).await;
    assert_eq!(out.matches("No results found.").count(), 2);

    let executed = db.executed();
    assert_eq!(executed.len(), 2);
    assert_eq!(
        executed[0].sql,
        concat!(
            r#"SELECT DISTINCT "customers".* FROM "customers" LEFT JOIN "orders" ON "customers"."id" = "orders"."customer_id""#,
            r#" WHERE "customers"."name" LIKE $1 LIMIT 100"#
        )
    );
    assert_eq!(executed[0].params, vec!["%customers named O'Brien%"]);
    assert!(executed[0].inline().contains("LIKE '%customers named O''Brien%'"));

    assert_eq!(
        executed[1].sql,
        concat!(
            r#"SELECT DISTINCT "orders".* FROM "orders" INNER JOIN "customers" ON "orders"."customer_id" = "customers"."id""#,
            r#" WHERE "customers"."name" LIKE $1 LIMIT 100"#
        )
    );
}

#[tokio::test]
async fn no_relevant_table_skips_the_database() {
    let db = FakeDb::default();
    let orch = orchestrator(db.clone()).await;

    assert_eq!(orch.answer("weather tomorrow", true).await, NO_MATCHING_TABLE);
    assert_eq!(db.acquired(), 0);
    assert!(db.executed().is_empty());
}

#[tokio::test]
async fn non_database_question_returns_empty_context() {
    let db = FakeDb::default();
    let orch = orchestrator(db.clone()).await;

    assert_eq!(orch.answer("liệt kê orders", false).await, "");
    assert_eq!(db.acquired(), 0);
}

#[tokio::test]
async fn acquire_failure_renders_database_error() {
    let db = FakeDb::default().unreachable("pool timed out");
    let orch = orchestrator(db).await;

    assert_eq!(
        orch.answer("liệt kê orders", true).await,
        "Error accessing database: pool timed out"
    );
}

#[tokio::test]
async fn table_failure_does_not_abort_others() {
    let db = FakeDb::default()
        .failing(r#"FROM "customers""#)
        .rows(r#"FROM "orders""#, vec![order_row()]);
    let orch = orchestrator(db.clone()).await;

    let out = orch.answer("liệt kê orders", true).await;
    assert!(out.contains(
        "=== Customers (customers) ===\nError querying table customers: statement matching 'FROM \"customers\"' failed\n"
    ));
    assert!(out.contains("=== Orders (orders) ===\n--- Record 1 ---\n"));
    assert_eq!(db.executed().len(), 2);
}

#[tokio::test]
async fn synonym_resolution_for_customer_questions() {
    let db = FakeDb::default().count(r#"FROM "customers""#, 4);
    let orch = orchestrator(db).await;

    let classification = orch.classify("how many khách hàng");
    assert_eq!(classification.intent, Intent::Count);
    assert_eq!(classification.resolution, Resolution::Synonyms);
    assert_eq!(
        classification.tables.iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["customers"]
    );

    assert_eq!(
        orch.answer("how many khách hàng", true).await,
        "=== Customers (customers) ===\nTotal Customers: 4\n"
    );
}

#[tokio::test]
async fn disabled_flags_render_fixed_lines() {
    let mut config = CatalogConfig::default();
    config.tables.insert(
        "orders".to_string(),
        TableOverride {
            searchable: Some(false),
            ..Default::default()
        },
    );
    config.tables.insert(
        "customers".to_string(),
        TableOverride {
            viewable: Some(false),
            ..Default::default()
        },
    );
    let db = FakeDb::default();
    let orch = orchestrator_with(db.clone(), config).await;

    let out = orch.answer("orders from last week", true).await;
    assert_eq!(
        out,
        "=== Customers (customers) ===\n\
         Table Customers is not viewable.\n\
         === Orders (orders) ===\n\
         Search is not enabled for table Orders.\n"
    );
    assert!(db.executed().is_empty());
}

#[tokio::test]
async fn plan_lists_statements_without_executing() {
    let db = FakeDb::default();
    let orch = orchestrator(db.clone()).await;

    let plan = orch.plan("list orders and how many").unwrap();
    assert_eq!(plan.classification.intent, Intent::CountAndList);
    assert_eq!(plan.tables.len(), 2);

    let orders = plan.tables.iter().find(|t| t.table == "orders").unwrap();
    let sql: Vec<&str> = orders.statements.iter().map(|s| s.sql.as_str()).collect();
    assert_eq!(
        sql,
        vec![
            r#"SELECT COUNT(*) AS total FROM "orders""#,
            r#"SELECT DISTINCT "orders".* FROM "orders" LIMIT 100"#,
        ]
    );
    assert!(orders.skipped.is_none());
    assert_eq!(db.acquired(), 0);
}
