//! Typed records persisted in the document store.
//!
//! # Responsibility
//! - Define the organization and learner shapes consumed by the workflow.
//! - Own the mapping between Rust fields and persisted document field names.
//!
//! # Invariants
//! - Persisted field names follow the document schema (`nom`, `siret`,
//!   `structureJuridique`, ...), never the Rust field names.
//! - Records are validated before every write and after every read.

pub mod learner;
pub mod organization;

use crate::store::{Document, DocumentId};

/// A decoded record paired with the id the store assigned to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record<T> {
    pub id: DocumentId,
    pub data: T,
}

impl<T> Record<T> {
    /// Decodes `document` with the given field decoder.
    pub(crate) fn decode<E>(
        document: &Document,
        decode: impl FnOnce(&Document) -> Result<T, E>,
    ) -> Result<Self, E> {
        Ok(Self {
            id: document.id,
            data: decode(document)?,
        })
    }
}
