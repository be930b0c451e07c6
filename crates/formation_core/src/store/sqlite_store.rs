//! SQLite implementation of [`DocumentStore`].
//!
//! # Responsibility
//! - Persist documents as JSON bodies in the `documents` table.
//! - Enforce declared unique fields through the `unique_keys` table.
//!
//! # Invariants
//! - A document row and its unique-key rows are written in one IMMEDIATE
//!   transaction; a collision rolls both back.
//! - Busy/locked failures surface as [`StoreError::Timeout`], never as a raw
//!   SQLite error.

use super::{Collection, Document, DocumentId, DocumentStore, Fields, Filter, StoreError, StoreResult};
use crate::db::SqliteFailureKind;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use serde_json::Value;
use uuid::Uuid;

/// SQLite-backed document store over a migrated connection.
///
/// The store borrows the connection; use one connection per thread.
pub struct SqliteDocumentStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDocumentStore<'conn> {
    /// Wraps a connection returned by [`open_db`](crate::db::open_db) or
    /// [`open_db_in_memory`](crate::db::open_db_in_memory).
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Counts documents in `collection`.
    pub fn count(&self, collection: Collection) -> StoreResult<u64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1;",
                [collection.slug()],
                |row| row.get::<_, i64>(0),
            )
            .map(|count| count.max(0) as u64)
            .map_err(|err| map_sqlite_error("count", err))
    }
}

impl DocumentStore for SqliteDocumentStore<'_> {
    fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        limit: u32,
    ) -> StoreResult<Vec<Document>> {
        filter.validate()?;

        let mut sql = String::from("SELECT id, body FROM documents WHERE collection = ?");
        let mut bind_values = vec![SqlValue::Text(collection.slug().to_string())];

        for (field, value) in filter.clauses() {
            bind_values.push(SqlValue::Text(format!("$.{field}")));
            match scalar_to_sql(value) {
                Some(sql_value) => {
                    sql.push_str(" AND json_extract(body, ?) = ?");
                    bind_values.push(sql_value);
                }
                None => sql.push_str(" AND json_extract(body, ?) IS NULL"),
            }
        }

        sql.push_str(" ORDER BY created_at ASC, rowid ASC LIMIT ?");
        bind_values.push(SqlValue::Integer(i64::from(limit)));

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|err| map_sqlite_error("find", err))?;
        let mut rows = stmt
            .query(params_from_iter(bind_values))
            .map_err(|err| map_sqlite_error("find", err))?;

        let mut documents = Vec::new();
        while let Some(row) = rows.next().map_err(|err| map_sqlite_error("find", err))? {
            documents.push(parse_document_row(collection, row)?);
        }

        Ok(documents)
    }

    fn create(&self, collection: Collection, fields: &Fields) -> StoreResult<Document> {
        let mut body = fields.clone();
        body.remove("id");

        let unique_keys = collection
            .unique_fields()
            .iter()
            .filter_map(|field| {
                body.get(*field)
                    .and_then(unique_key_value)
                    .map(|value| (*field, value))
            })
            .collect::<Vec<_>>();

        let body_text = serde_json::to_string(&body).map_err(|err| {
            StoreError::InvalidData(format!("{collection} body could not be encoded: {err}"))
        })?;
        let id: DocumentId = Uuid::new_v4();

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(|err| map_sqlite_error("create", err))?;

        tx.execute(
            "INSERT INTO documents (id, collection, body) VALUES (?1, ?2, ?3);",
            params![id.to_string(), collection.slug(), body_text],
        )
        .map_err(|err| map_sqlite_error("create", err))?;

        for (field, value) in unique_keys {
            let inserted = tx.execute(
                "INSERT INTO unique_keys (collection, field, value, document_id)
                 VALUES (?1, ?2, ?3, ?4);",
                params![collection.slug(), field, value.as_str(), id.to_string()],
            );
            match inserted {
                Ok(_) => {}
                Err(err) if is_unique_violation(&err) => {
                    return Err(StoreError::UniqueConstraintViolation {
                        collection,
                        field,
                        value,
                    });
                }
                Err(err) => return Err(map_sqlite_error("create", err)),
            }
        }

        tx.commit().map_err(|err| map_sqlite_error("create", err))?;

        Ok(Document {
            id,
            collection,
            fields: body,
        })
    }
}

fn parse_document_row(collection: Collection, row: &Row<'_>) -> StoreResult<Document> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        StoreError::InvalidData(format!("invalid uuid value `{id_text}` in documents.id"))
    })?;

    let body_text: String = row.get("body")?;
    let fields = match serde_json::from_str::<Value>(&body_text) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) => {
            return Err(StoreError::InvalidData(format!(
                "{collection} document {id} body is not a JSON object"
            )));
        }
        Err(err) => {
            return Err(StoreError::InvalidData(format!(
                "{collection} document {id} body is not valid JSON: {err}"
            )));
        }
    };

    Ok(Document {
        id,
        collection,
        fields,
    })
}

fn scalar_to_sql(value: &Value) -> Option<SqlValue> {
    match value {
        Value::Null => None,
        Value::Bool(flag) => Some(SqlValue::Integer(i64::from(*flag))),
        Value::Number(number) => Some(match number.as_i64() {
            Some(integer) => SqlValue::Integer(integer),
            None => SqlValue::Real(number.as_f64().unwrap_or(f64::NAN)),
        }),
        Value::String(text) => Some(SqlValue::Text(text.clone())),
        // Rejected by `Filter::validate`.
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn unique_key_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    SqliteFailureKind::of(err) == SqliteFailureKind::UniqueViolation
}

fn map_sqlite_error(operation: &'static str, err: rusqlite::Error) -> StoreError {
    match SqliteFailureKind::of(&err) {
        SqliteFailureKind::Busy => StoreError::Timeout { operation },
        SqliteFailureKind::UniqueViolation | SqliteFailureKind::Other => StoreError::from(err),
    }
}
