use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    prepare_insert, prepare_update, uuid_field, validate_table_name, OwnerFilter, PageWindow,
    Store, StoreError,
};

type Table = Vec<Map<String, Value>>;

/// In-process store keeping each table as an insertion-ordered row list.
///
/// Used for local development and the test suite.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows in a table regardless of ownership.
    pub async fn row_count(&self, table: &str) -> usize {
        self.tables.read().await.get(table).map(Vec::len).unwrap_or(0)
    }
}

fn has_id(row: &Map<String, Value>, id: Uuid) -> bool {
    uuid_field(row, "id") == Some(id)
}

#[async_trait]
impl Store for MemoryStore {
    async fn count(&self, table: &str, filter: OwnerFilter) -> Result<i64, StoreError> {
        validate_table_name(table)?;
        let tables = self.tables.read().await;
        let count = tables
            .get(table)
            .map(|rows| rows.iter().filter(|row| filter.admits(row)).count())
            .unwrap_or(0);
        Ok(count as i64)
    }

    async fn find_page(
        &self,
        table: &str,
        filter: OwnerFilter,
        window: PageWindow,
    ) -> Result<Vec<Value>, StoreError> {
        validate_table_name(table)?;
        let tables = self.tables.read().await;
        let Some(rows) = tables.get(table) else {
            return Ok(vec![]);
        };
        Ok(rows
            .iter()
            .filter(|row| filter.admits(row))
            .skip(window.offset.max(0) as usize)
            .take(window.limit.max(0) as usize)
            .map(|row| Value::Object(row.clone()))
            .collect())
    }

    async fn find_by_id(
        &self,
        table: &str,
        filter: OwnerFilter,
        id: Uuid,
    ) -> Result<Option<Value>, StoreError> {
        validate_table_name(table)?;
        let tables = self.tables.read().await;
        Ok(tables.get(table).and_then(|rows| {
            rows.iter()
                .find(|row| has_id(row, id) && filter.admits(row))
                .map(|row| Value::Object(row.clone()))
        }))
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, StoreError> {
        validate_table_name(table)?;
        let row = prepare_insert(row)?;
        let id = uuid_field(&row, "id").ok_or(StoreError::InvalidRow)?;

        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        if rows.iter().any(|existing| has_id(existing, id)) {
            return Err(StoreError::Duplicate(id));
        }
        rows.push(row.clone());
        Ok(Value::Object(row))
    }

    async fn update(
        &self,
        table: &str,
        filter: OwnerFilter,
        id: Uuid,
        row: Value,
    ) -> Result<Option<Value>, StoreError> {
        validate_table_name(table)?;
        let mut row = prepare_update(row, id)?;

        let mut tables = self.tables.write().await;
        let Some(existing) = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|r| has_id(r, id) && filter.admits(r)))
        else {
            return Ok(None);
        };

        if let Some(created_at) = existing.get("created_at") {
            row.insert("created_at".to_string(), created_at.clone());
        }
        *existing = row.clone();
        Ok(Some(Value::Object(row)))
    }

    async fn delete(&self, table: &str, filter: OwnerFilter, id: Uuid) -> Result<bool, StoreError> {
        validate_table_name(table)?;
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|row| !(has_id(row, id) && filter.admits(row)));
        Ok(rows.len() < before)
    }
}
