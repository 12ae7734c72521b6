use async_trait::async_trait;
use quarry_runtime::{ColumnInfo, ForeignKeyInfo, SchemaSource};
use sqlx::{PgPool, Row};

const FOREIGN_KEYS_BASE: &str = r#"
    select
      kcu.table_name::text as child_table,
      kcu.column_name::text as child_column,
      pk.table_name::text as parent_table,
      pk.column_name::text as parent_column
    from information_schema.referential_constraints rc
    join information_schema.key_column_usage kcu
      on kcu.constraint_name = rc.constraint_name
     and kcu.constraint_schema = rc.constraint_schema
    join information_schema.key_column_usage pk
      on pk.constraint_name = rc.unique_constraint_name
     and pk.constraint_schema = rc.unique_constraint_schema
     and pk.ordinal_position = kcu.position_in_unique_constraint
    where rc.constraint_schema = $1
"#;

/// Schema introspection over `information_schema` for one Postgres schema.
#[derive(Debug, Clone)]
pub struct PgSchemaSource {
    pool: PgPool,
    schema: String,
}

impl PgSchemaSource {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub async fn server_version(&self) -> anyhow::Result<String> {
        let (version,): (String,) = sqlx::query_as("select version()")
            .fetch_one(&self.pool)
            .await?;
        Ok(version)
    }

    async fn foreign_keys(&self, side: &str, table: &str) -> anyhow::Result<Vec<ForeignKeyInfo>> {
        let sql = format!(
            "{FOREIGN_KEYS_BASE} and {side}.table_name = $2 order by rc.constraint_name, kcu.ordinal_position"
        );
        let rows = sqlx::query(&sql)
            .bind(&self.schema)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|r| -> anyhow::Result<ForeignKeyInfo> {
                Ok(ForeignKeyInfo {
                    parent_table: r.try_get("parent_table")?,
                    parent_column: r.try_get("parent_column")?,
                    child_table: r.try_get("child_table")?,
                    child_column: r.try_get("child_column")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl SchemaSource for PgSchemaSource {
    async fn table_names(&self) -> anyhow::Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            select table_name::text as table_name
            from information_schema.tables
            where table_type = 'BASE TABLE'
              and table_schema = $1
            order by table_name
            "#,
        )
        .bind(&self.schema)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| r.get::<String, _>("table_name"))
            .collect())
    }

    async fn primary_keys(&self, table: &str) -> anyhow::Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            select kcu.column_name::text as column_name
            from information_schema.table_constraints tc
            join information_schema.key_column_usage kcu
              on tc.constraint_name = kcu.constraint_name
             and tc.table_schema = kcu.table_schema
            where tc.constraint_type = 'PRIMARY KEY'
              and tc.table_schema = $1
              and tc.table_name = $2
            order by kcu.ordinal_position
            "#,
        )
        .bind(&self.schema)
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| r.get::<String, _>("column_name"))
            .collect())
    }

    async fn columns(&self, table: &str) -> anyhow::Result<Vec<ColumnInfo>> {
        let rows = sqlx::query(
            r#"
            select
              c.column_name::text as column_name,
              c.data_type::text as data_type,
              col_description(
                format('%I.%I', c.table_schema, c.table_name)::regclass,
                c.ordinal_position::int
              ) as description
            from information_schema.columns c
            where c.table_schema = $1 and c.table_name = $2
            order by c.ordinal_position
            "#,
        )
        .bind(&self.schema)
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for r in rows {
            columns.push(ColumnInfo {
                name: r.try_get("column_name")?,
                data_type: r.try_get("data_type")?,
                description: r.try_get("description")?,
            });
        }
        Ok(columns)
    }

    async fn exported_keys(&self, table: &str) -> anyhow::Result<Vec<ForeignKeyInfo>> {
        self.foreign_keys("pk", table).await
    }

    async fn imported_keys(&self, table: &str) -> anyhow::Result<Vec<ForeignKeyInfo>> {
        self.foreign_keys("kcu", table).await
    }
}
