//! PostgreSQL implementations of the Quarry runtime traits.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use quarry_core::UpstreamConfig;
use quarry_planner::Statement;
use quarry_runtime::{QueryExecutor, QuerySession, ResultRow};
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column, Executor, PgPool, Postgres, Row, TypeInfo, ValueRef};
use std::time::Duration;

pub mod introspect;

pub use introspect::PgSchemaSource;

/// `SET search_path` for the configured schema. Statements name tables
/// unqualified, so every pooled connection resolves them here.
fn search_path_sql(schema: &str) -> String {
    format!("SET search_path TO \"{}\"", schema.replace('"', "\"\""))
}

/// Open the connection pool described by `upstream`.
pub async fn connect(upstream: &UpstreamConfig) -> anyhow::Result<PgPool> {
    let search_path = search_path_sql(&upstream.schema);
    let pool = PgPoolOptions::new()
        .max_connections(upstream.pool.max_connections)
        .acquire_timeout(Duration::from_secs(upstream.pool.acquire_timeout_seconds))
        .after_connect(move |conn, _meta| {
            let sql = search_path.clone();
            Box::pin(async move {
                conn.execute(sql.as_str()).await?;
                Ok(())
            })
        })
        .connect(&upstream.connection_string())
        .await?;
    tracing::info!(
        host = %upstream.host,
        database = %upstream.database,
        schema = %upstream.schema,
        max_connections = upstream.pool.max_connections,
        "connected to postgres"
    );
    Ok(pool)
}

/// Hands out pooled connections, one per question.
#[derive(Debug, Clone)]
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueryExecutor for PgExecutor {
    async fn acquire(&self) -> anyhow::Result<Box<dyn QuerySession>> {
        let conn = self.pool.acquire().await?;
        Ok(Box::new(PgSession { conn }))
    }
}

/// One pooled connection; returned to the pool on drop.
pub struct PgSession {
    conn: PoolConnection<Postgres>,
}

fn bind_all<'q>(statement: &'q Statement) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
    let mut query = sqlx::query(&statement.sql);
    for param in &statement.params {
        query = query.bind(param.as_str());
    }
    query
}

#[async_trait]
impl QuerySession for PgSession {
    async fn fetch_rows(&mut self, statement: &Statement) -> anyhow::Result<Vec<ResultRow>> {
        let rows = bind_all(statement).fetch_all(&mut *self.conn).await?;
        Ok(rows.iter().map(row_to_result).collect())
    }

    async fn fetch_count(&mut self, statement: &Statement) -> anyhow::Result<i64> {
        let row = bind_all(statement).fetch_one(&mut *self.conn).await?;
        Ok(row.try_get::<i64, _>("total")?)
    }
}

/// Convert a row to ordered (column, text) pairs.
fn row_to_result(row: &PgRow) -> ResultRow {
    ResultRow {
        values: row
            .columns()
            .iter()
            .map(|col| (col.name().to_string(), cell_text(row, col.ordinal(), col.type_info().name())))
            .collect(),
    }
}

fn decode<T>(row: &PgRow, idx: usize) -> Option<String>
where
    T: for<'r> sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres> + ToString,
{
    row.try_get::<Option<T>, _>(idx).ok().flatten().map(|v| v.to_string())
}

/// Text rendering of one cell. `None` only for SQL NULL; values of types
/// that cannot be decoded as text render as `<type>`.
fn cell_text(row: &PgRow, idx: usize, type_name: &str) -> Option<String> {
    let value = match type_name {
        "BOOL" => decode::<bool>(row, idx),
        "INT2" => decode::<i16>(row, idx),
        "INT4" => decode::<i32>(row, idx),
        "INT8" => decode::<i64>(row, idx),
        "FLOAT4" => decode::<f32>(row, idx),
        "FLOAT8" => decode::<f64>(row, idx),
        "NUMERIC" => decode::<BigDecimal>(row, idx),
        "UUID" => decode::<uuid::Uuid>(row, idx),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)
            .ok()
            .flatten()
            .map(|v| v.to_rfc3339()),
        "TIMESTAMP" => decode::<chrono::NaiveDateTime>(row, idx),
        "DATE" => decode::<chrono::NaiveDate>(row, idx),
        "TIME" => decode::<chrono::NaiveTime>(row, idx),
        "JSON" | "JSONB" => decode::<serde_json::Value>(row, idx),
        _ => decode::<String>(row, idx),
    };
    if value.is_some() {
        return value;
    }

    match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => None,
        _ => {
            tracing::debug!(column = idx, type_name, "cell not decodable as text");
            Some(format!("<{}>", type_name.to_lowercase()))
        }
    }
}
