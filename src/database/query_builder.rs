use serde_json::Value;
use uuid::Uuid;

use super::{validate_table_name, OwnerFilter, PageWindow, StoreError};
use crate::resource::OWNER_FIELD;

/// Parameter bound to a generated statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Uuid(Uuid),
    Json(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<SqlParam>,
}

/// Builds the parameterised statements `PgStore` runs against one table.
///
/// Rows are read back through `row_to_json` and written through
/// `jsonb_populate_record`, so any table whose columns match the resource's
/// JSON field names works without per-type SQL.
pub struct QueryBuilder {
    table_name: String,
}

impl QueryBuilder {
    pub fn new(table_name: impl Into<String>) -> Result<Self, StoreError> {
        let table_name = table_name.into();
        validate_table_name(&table_name)?;
        Ok(Self { table_name })
    }

    fn table(&self) -> String {
        quote_identifier(&self.table_name)
    }

    pub fn count(&self, filter: OwnerFilter) -> SqlResult {
        let mut params = vec![];
        let predicate = owner_predicate(filter, &mut params);
        SqlResult {
            query: format!("SELECT COUNT(*) AS count FROM {} WHERE {}", self.table(), predicate),
            params,
        }
    }

    pub fn select_page(&self, filter: OwnerFilter, window: PageWindow) -> SqlResult {
        let mut params = vec![];
        let predicate = owner_predicate(filter, &mut params);
        SqlResult {
            query: format!(
                "SELECT row_to_json(t) AS row FROM (SELECT * FROM {} WHERE {} ORDER BY \"id\" LIMIT {} OFFSET {}) t",
                self.table(),
                predicate,
                window.limit.max(0),
                window.offset.max(0),
            ),
            params,
        }
    }

    pub fn select_by_id(&self, filter: OwnerFilter, id: Uuid) -> SqlResult {
        let mut params = vec![SqlParam::Uuid(id)];
        let predicate = owner_predicate(filter, &mut params);
        SqlResult {
            query: format!(
                "SELECT row_to_json(t) AS row FROM (SELECT * FROM {} WHERE \"id\" = $1 AND {}) t",
                self.table(),
                predicate,
            ),
            params,
        }
    }

    /// `columns` must already be restricted to columns that exist on the table.
    pub fn insert(&self, columns: &[String], row: Value) -> SqlResult {
        SqlResult {
            query: format!(
                "INSERT INTO {table} ({targets}) SELECT {sources} FROM jsonb_populate_record(NULL::{table}, $1) AS src RETURNING row_to_json({table}) AS row",
                table = self.table(),
                targets = column_list(columns, None),
                sources = column_list(columns, Some("src")),
            ),
            params: vec![SqlParam::Json(row)],
        }
    }

    pub fn update(&self, columns: &[String], filter: OwnerFilter, id: Uuid, row: Value) -> SqlResult {
        let mut params = vec![SqlParam::Json(row), SqlParam::Uuid(id)];
        let predicate = owner_predicate(filter, &mut params);
        let assignments = columns
            .iter()
            .map(|c| format!("{col} = src.{col}", col = quote_identifier(c)))
            .collect::<Vec<_>>()
            .join(", ");
        SqlResult {
            query: format!(
                "UPDATE {table} SET {assignments} FROM jsonb_populate_record(NULL::{table}, $1) AS src WHERE {table}.\"id\" = $2 AND {predicate} RETURNING row_to_json({table}) AS row",
                table = self.table(),
                assignments = assignments,
                predicate = qualify(&predicate, &self.table()),
            ),
            params,
        }
    }

    pub fn delete(&self, filter: OwnerFilter, id: Uuid) -> SqlResult {
        let mut params = vec![SqlParam::Uuid(id)];
        let predicate = owner_predicate(filter, &mut params);
        SqlResult {
            query: format!("DELETE FROM {} WHERE \"id\" = $1 AND {}", self.table(), predicate),
            params,
        }
    }

    pub fn columns() -> SqlResult {
        SqlResult {
            query: "SELECT column_name::text AS column_name FROM information_schema.columns WHERE table_schema = current_schema() AND table_name = $1 ORDER BY ordinal_position".to_string(),
            params: vec![],
        }
    }
}

/// Quote SQL identifier to prevent injection
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_list(columns: &[String], prefix: Option<&str>) -> String {
    columns
        .iter()
        .map(|c| match prefix {
            Some(p) => format!("{}.{}", p, quote_identifier(c)),
            None => quote_identifier(c),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

// Appends the owner parameter when needed and returns the SQL predicate.
fn owner_predicate(filter: OwnerFilter, params: &mut Vec<SqlParam>) -> String {
    match filter {
        OwnerFilter::Unrestricted => "TRUE".to_string(),
        OwnerFilter::Nothing => "FALSE".to_string(),
        OwnerFilter::OwnedBy(owner) => {
            params.push(SqlParam::Uuid(owner));
            format!("{} = ${}", quote_identifier(OWNER_FIELD), params.len())
        }
    }
}

// UPDATE ... FROM makes bare owner references ambiguous when the source record has the column too.
fn qualify(predicate: &str, table: &str) -> String {
    let owner = quote_identifier(OWNER_FIELD);
    if predicate.starts_with(&owner) {
        format!("{}.{}", table, predicate)
    } else {
        predicate.to_string()
    }
}
