pub mod memory;
pub mod models;
pub mod postgres;
pub mod query_builder;
pub mod repository;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::resource::OWNER_FIELD;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use repository::{ListPage, RepositoryError, ScopedRepository};

/// Errors from persistence handles. Opaque to callers beyond "it failed".
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid table name: {0}")]
    InvalidTable(String),

    #[error("Row is not a JSON object")]
    InvalidRow,

    #[error("Row {0} already exists")]
    Duplicate(Uuid),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Row predicate derived from the request's access scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerFilter {
    /// Every row is visible.
    Unrestricted,
    /// Only rows whose owner reference equals the id.
    OwnedBy(Uuid),
    /// No row is visible.
    Nothing,
}

impl OwnerFilter {
    /// Evaluate the predicate against an in-memory row.
    pub fn admits(&self, row: &Map<String, Value>) -> bool {
        match self {
            OwnerFilter::Unrestricted => true,
            OwnerFilter::Nothing => false,
            OwnerFilter::OwnedBy(owner) => uuid_field(row, OWNER_FIELD) == Some(*owner),
        }
    }
}

/// Pagination bounds applied to a page fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub limit: i64,
    pub offset: i64,
}

/// Persistence handle driven by the scoped repository.
///
/// Rows travel as JSON objects; `table` is the resource name.
#[async_trait]
pub trait Store: Send + Sync {
    async fn count(&self, table: &str, filter: OwnerFilter) -> Result<i64, StoreError>;

    async fn find_page(
        &self,
        table: &str,
        filter: OwnerFilter,
        window: PageWindow,
    ) -> Result<Vec<Value>, StoreError>;

    async fn find_by_id(
        &self,
        table: &str,
        filter: OwnerFilter,
        id: Uuid,
    ) -> Result<Option<Value>, StoreError>;

    /// Insert a row, assigning `id` when absent and stamping timestamps.
    async fn insert(&self, table: &str, row: Value) -> Result<Value, StoreError>;

    /// Replace the row's writable fields. `None` when no visible row has the id.
    async fn update(
        &self,
        table: &str,
        filter: OwnerFilter,
        id: Uuid,
        row: Value,
    ) -> Result<Option<Value>, StoreError>;

    /// `false` when no visible row has the id.
    async fn delete(&self, table: &str, filter: OwnerFilter, id: Uuid) -> Result<bool, StoreError>;

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Release connections on shutdown.
    async fn close(&self) {}
}

/// Table names double as resource names: `[A-Za-z_][A-Za-z0-9_]*`.
pub(crate) fn validate_table_name(name: &str) -> Result<(), StoreError> {
    let mut chars = name.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(StoreError::InvalidTable(name.to_string()));
    }
    Ok(())
}

pub(crate) fn uuid_field(row: &Map<String, Value>, field: &str) -> Option<Uuid> {
    row.get(field)
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
}

/// Assign server-managed fields before an insert.
pub(crate) fn prepare_insert(row: Value) -> Result<Map<String, Value>, StoreError> {
    let Value::Object(mut map) = row else {
        return Err(StoreError::InvalidRow);
    };
    if uuid_field(&map, "id").is_none() {
        map.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
    }
    let now = Value::String(Utc::now().to_rfc3339());
    map.insert("created_at".to_string(), now.clone());
    map.insert("updated_at".to_string(), now);
    Ok(map)
}

/// Pin the id and refresh `updated_at`; `created_at` is never rewritten.
pub(crate) fn prepare_update(row: Value, id: Uuid) -> Result<Map<String, Value>, StoreError> {
    let Value::Object(mut map) = row else {
        return Err(StoreError::InvalidRow);
    };
    map.insert("id".to_string(), Value::String(id.to_string()));
    map.remove("created_at");
    map.insert("updated_at".to_string(), Value::String(Utc::now().to_rfc3339()));
    Ok(map)
}
