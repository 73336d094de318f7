use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Row};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use super::query_builder::{QueryBuilder, SqlParam, SqlResult};
use super::{prepare_insert, prepare_update, OwnerFilter, PageWindow, Store, StoreError};

/// PostgreSQL-backed store.
///
/// Each resource maps to a table named after it whose columns match the
/// resource's JSON field names, for example:
///
/// ```sql
/// CREATE TABLE "order" (
///     id          UUID PRIMARY KEY,
///     user_id     UUID NOT NULL,
///     product_id  UUID,
///     quantity    INTEGER NOT NULL,
///     notes       TEXT NOT NULL DEFAULT '',
///     total       NUMERIC NOT NULL DEFAULT 0,
///     created_at  TIMESTAMPTZ NOT NULL,
///     updated_at  TIMESTAMPTZ NOT NULL
/// );
/// ```
///
/// JSON fields without a matching column are dropped on write.
pub struct PgStore {
    pool: PgPool,
    columns: RwLock<HashMap<String, Vec<String>>>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            columns: RwLock::new(HashMap::new()),
        }
    }

    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        if database_url.is_empty() {
            return Err(StoreError::ConfigMissing("DATABASE_URL"));
        }
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;

        info!("Created database pool ({} max connections)", max_connections);
        Ok(Self::new(pool))
    }

    /// Column names of a table, loaded once from information_schema.
    async fn table_columns(&self, table: &str) -> Result<Vec<String>, StoreError> {
        // Fast path: try read lock
        {
            let columns = self.columns.read().await;
            if let Some(found) = columns.get(table) {
                return Ok(found.clone());
            }
        }

        let SqlResult { query, .. } = QueryBuilder::columns();
        let rows = sqlx::query(&query).bind(table).fetch_all(&self.pool).await?;
        let found = rows
            .iter()
            .map(|row| row.try_get::<String, _>("column_name"))
            .collect::<Result<Vec<_>, _>>()?;
        if found.is_empty() {
            return Err(StoreError::QueryError(format!("table '{}' has no columns", table)));
        }

        let mut columns = self.columns.write().await;
        columns.insert(table.to_string(), found.clone());
        Ok(found)
    }

    // Columns both present on the table and supplied by the row, minus `exclude`.
    async fn writable_columns(
        &self,
        table: &str,
        row: &Map<String, Value>,
        exclude: &[&str],
    ) -> Result<Vec<String>, StoreError> {
        Ok(self
            .table_columns(table)
            .await?
            .into_iter()
            .filter(|c| row.contains_key(c) && !exclude.contains(&c.as_str()))
            .collect())
    }

    async fn fetch_row(&self, sql: SqlResult) -> Result<Option<Value>, StoreError> {
        let row = bind_params(sqlx::query(&sql.query), &sql.params)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| r.try_get::<Value, _>("row"))
            .transpose()
            .map_err(StoreError::from)
    }
}

fn bind_params<'q>(
    mut query: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
    params: &'q [SqlParam],
) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
    for param in params {
        query = match param {
            SqlParam::Uuid(id) => query.bind(*id),
            SqlParam::Json(value) => query.bind(sqlx::types::Json(value)),
        };
    }
    query
}

#[async_trait]
impl Store for PgStore {
    async fn count(&self, table: &str, filter: OwnerFilter) -> Result<i64, StoreError> {
        let sql = QueryBuilder::new(table)?.count(filter);
        let row = bind_params(sqlx::query(&sql.query), &sql.params)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("count")?)
    }

    async fn find_page(
        &self,
        table: &str,
        filter: OwnerFilter,
        window: PageWindow,
    ) -> Result<Vec<Value>, StoreError> {
        let sql = QueryBuilder::new(table)?.select_page(filter, window);
        let rows = bind_params(sqlx::query(&sql.query), &sql.params)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|r| r.try_get::<Value, _>("row").map_err(StoreError::from))
            .collect()
    }

    async fn find_by_id(
        &self,
        table: &str,
        filter: OwnerFilter,
        id: Uuid,
    ) -> Result<Option<Value>, StoreError> {
        let sql = QueryBuilder::new(table)?.select_by_id(filter, id);
        self.fetch_row(sql).await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, StoreError> {
        let builder = QueryBuilder::new(table)?;
        let row = prepare_insert(row)?;
        let columns = self.writable_columns(table, &row, &[]).await?;
        let sql = builder.insert(&columns, Value::Object(row));
        self.fetch_row(sql)
            .await?
            .ok_or_else(|| StoreError::QueryError("insert returned no row".to_string()))
    }

    async fn update(
        &self,
        table: &str,
        filter: OwnerFilter,
        id: Uuid,
        row: Value,
    ) -> Result<Option<Value>, StoreError> {
        let builder = QueryBuilder::new(table)?;
        let mut row = prepare_update(row, id)?;
        // Full replace: columns the body omits are written as NULL.
        for column in self.table_columns(table).await? {
            row.entry(column).or_insert(Value::Null);
        }
        let columns = self.writable_columns(table, &row, &["id", "created_at"]).await?;
        let sql = builder.update(&columns, filter, id, Value::Object(row));
        self.fetch_row(sql).await
    }

    async fn delete(&self, table: &str, filter: OwnerFilter, id: Uuid) -> Result<bool, StoreError> {
        let sql = QueryBuilder::new(table)?.delete(filter, id);
        let result = bind_params(sqlx::query(&sql.query), &sql.params)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("Closed database pool");
    }
}
