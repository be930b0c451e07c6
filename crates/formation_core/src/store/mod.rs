//! Document store contract consumed by the registration workflow.
//!
//! # Responsibility
//! - Define the collection-agnostic `find` / `create` interface.
//! - Define the store error taxonomy, including the distinguishable
//!   unique-constraint violation the workflow recovers from.
//!
//! # Invariants
//! - Ids are assigned by the store and never reused.
//! - `create` either persists the document together with all of its unique
//!   keys, or persists nothing.
//! - `find` returns matches in insertion order, so `limit = 1` yields the
//!   first record ever created for that filter.

mod sqlite_store;

pub use sqlite_store::SqliteDocumentStore;

use crate::db::DbError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static FIELD_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("valid field path regex")
});

/// Store-assigned document identifier.
pub type DocumentId = Uuid;

/// Document body: top-level field name to JSON value.
pub type Fields = Map<String, Value>;

pub type StoreResult<T> = Result<T, StoreError>;

/// Logical collections known to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Legal structures, unique by `siret`.
    Organizations,
    /// Learners, unique by `email`.
    Learners,
}

impl Collection {
    /// Stable slug used as the persisted collection name.
    pub fn slug(self) -> &'static str {
        match self {
            Self::Organizations => "structures-juridiques",
            Self::Learners => "apprenants",
        }
    }

    /// Top-level fields whose values must be distinct across the collection.
    pub fn unique_fields(self) -> &'static [&'static str] {
        match self {
            Self::Organizations => &["siret"],
            Self::Learners => &["email"],
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug {
            "structures-juridiques" => Some(Self::Organizations),
            "apprenants" => Some(Self::Learners),
            _ => None,
        }
    }
}

impl Display for Collection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

/// One stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub collection: Collection,
    pub fields: Fields,
}

impl Document {
    /// Builds an `InvalidData` error that names this document.
    pub fn invalid(&self, message: impl Display) -> StoreError {
        StoreError::InvalidData(format!(
            "{} document {}: {message}",
            self.collection, self.id
        ))
    }
}

/// Conjunction of `field == value` clauses.
///
/// Dotted paths (`contactPrincipal.email`) address nested fields. A `null`
/// value matches documents where the field is absent or null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    /// Filter with a single equality clause.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::default().and_eq(field, value)
    }

    /// Adds one more equality clause.
    pub fn and_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    pub fn clauses(&self) -> &[(String, Value)] {
        &self.clauses
    }

    /// Checks field paths and value kinds before any query is issued.
    pub fn validate(&self) -> StoreResult<()> {
        for (field, value) in &self.clauses {
            if !FIELD_PATH_RE.is_match(field) {
                return Err(StoreError::InvalidFilter(format!(
                    "invalid field path `{field}`"
                )));
            }
            if value.is_object() || value.is_array() {
                return Err(StoreError::InvalidFilter(format!(
                    "field `{field}` can only be compared to a scalar value"
                )));
            }
        }
        Ok(())
    }
}

/// Persistence interface over logical collections.
pub trait DocumentStore {
    /// Returns at most `limit` documents of `collection` matching `filter`.
    fn find(&self, collection: Collection, filter: &Filter, limit: u32)
        -> StoreResult<Vec<Document>>;

    /// Persists `fields` as a new document and returns it with its id.
    ///
    /// Fails with [`StoreError::UniqueConstraintViolation`] when a declared
    /// unique field collides with an existing document.
    fn create(&self, collection: Collection, fields: &Fields) -> StoreResult<Document>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for &S {
    fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        limit: u32,
    ) -> StoreResult<Vec<Document>> {
        (**self).find(collection, filter, limit)
    }

    fn create(&self, collection: Collection, fields: &Fields) -> StoreResult<Document> {
        (**self).create(collection, fields)
    }
}

/// Store operation errors.
#[derive(Debug)]
pub enum StoreError {
    /// A declared unique field collided with an existing document.
    UniqueConstraintViolation {
        collection: Collection,
        field: &'static str,
        value: String,
    },
    /// The database stayed locked past the busy timeout.
    Timeout { operation: &'static str },
    InvalidFilter(String),
    InvalidData(String),
    Db(DbError),
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueConstraintViolation { .. })
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UniqueConstraintViolation {
                collection,
                field,
                value,
            } => write!(
                f,
                "unique constraint violated: {collection}.{field} = `{value}` already exists"
            ),
            Self::Timeout { operation } => write!(f, "store {operation} timed out"),
            Self::InvalidFilter(message) => write!(f, "invalid filter: {message}"),
            Self::InvalidData(message) => write!(f, "invalid document data: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Serializes a record into a document body.
pub(crate) fn encode_fields<T: Serialize>(record: &T) -> StoreResult<Fields> {
    match serde_json::to_value(record) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(StoreError::InvalidData(format!(
            "record encoded to a non-object value: {other}"
        ))),
        Err(err) => Err(StoreError::InvalidData(format!(
            "record could not be encoded: {err}"
        ))),
    }
}

/// Deserializes a document body into a record.
pub(crate) fn decode_fields<T: DeserializeOwned>(document: &Document) -> StoreResult<T> {
    serde_json::from_value(Value::Object(document.fields.clone()))
        .map_err(|err| document.invalid(err))
}

#[cfg(test)]
mod tests {
    use super::{Collection, Filter, StoreError};
    use serde_json::json;

    #[test]
    fn collection_slugs_roundtrip() {
        for collection in [Collection::Organizations, Collection::Learners] {
            assert_eq!(Collection::from_slug(collection.slug()), Some(collection));
        }
        assert_eq!(Collection::from_slug("articles"), None);
    }

    #[test]
    fn filter_accepts_nested_paths_and_scalars() {
        let filter = Filter::eq("siret", "123").and_eq("contactPrincipal.email", json!(null));
        assert!(filter.validate().is_ok());
        assert_eq!(filter.clauses().len(), 2);
    }

    #[test]
    fn filter_rejects_injection_and_composite_values() {
        let err = Filter::eq("siret') OR 1=1 --", "x").validate().unwrap_err();
        assert!(matches!(err, StoreError::InvalidFilter(_)));

        let err = Filter::eq("tags", json!(["a"])).validate().unwrap_err();
        assert!(matches!(err, StoreError::InvalidFilter(_)));
    }
}
