//! Learner record and training lifecycle status.
//!
//! # Responsibility
//! - Define the person record tracked through the training lifecycle.
//! - Build the initial `prospect` record created by registration.
//!
//! # Invariants
//! - `email` is the uniqueness key; the store enforces it through the
//!   `email` unique field of [`Collection::Learners`](crate::store::Collection::Learners).
//! - `progress_percent` stays within `0..=100`.
//! - `organization`, when set, names an existing organization document. The
//!   learner does not own that organization's lifecycle.

use crate::store::{
    decode_fields, encode_fields, Document, DocumentId, Fields, StoreError, StoreResult,
};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Persisted field holding the learner email.
pub const EMAIL_FIELD: &str = "email";
/// Persisted field holding the organization reference.
pub const ORGANIZATION_FIELD: &str = "structureJuridique";

const MAX_PROGRESS_PERCENT: u8 = 100;

/// Training lifecycle state.
///
/// Serialized with the values used by the persisted document schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LearnerStatus {
    /// Registered interest, not enrolled yet.
    #[serde(rename = "prospect")]
    Prospect,
    #[serde(rename = "inscrit")]
    Enrolled,
    #[serde(rename = "en-formation")]
    InTraining,
    #[serde(rename = "termine")]
    Completed,
    #[serde(rename = "abandonne")]
    Abandoned,
}

/// Person record tracked through a training lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Learner {
    #[serde(rename = "nom")]
    pub last_name: String,
    #[serde(rename = "prenom")]
    pub first_name: String,
    pub email: String,
    #[serde(rename = "telephone", default)]
    pub phone: String,
    /// Calendar date as sent by the client; kept verbatim.
    #[serde(
        rename = "dateNaissance",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub birth_date: Option<String>,
    #[serde(rename = "numeroSecuriteSociale", default)]
    pub social_security_number: String,
    #[serde(rename = "numeroCotisantIndividuel", default)]
    pub contributor_number: String,
    #[serde(
        rename = "structureJuridique",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub organization: Option<DocumentId>,
    #[serde(rename = "programme", default)]
    pub program: String,
    #[serde(rename = "statut")]
    pub status: LearnerStatus,
    #[serde(rename = "progression", default)]
    pub progress_percent: u8,
    #[serde(default)]
    pub notes: String,
}

/// Validation failures for [`Learner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnerValidationError {
    EmptyLastName,
    EmptyFirstName,
    EmptyEmail,
    ProgressOutOfRange(u8),
}

impl Display for LearnerValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyLastName => write!(f, "learner last name must not be empty"),
            Self::EmptyFirstName => write!(f, "learner first name must not be empty"),
            Self::EmptyEmail => write!(f, "learner email must not be empty"),
            Self::ProgressOutOfRange(value) => {
                write!(f, "learner progress must be within 0..=100, got {value}")
            }
        }
    }
}

impl Error for LearnerValidationError {}

impl Learner {
    /// Creates the record registration persists for a new learner.
    ///
    /// # Invariants
    /// - `status` starts as [`LearnerStatus::Prospect`].
    /// - `progress_percent` starts at `0`.
    pub fn prospect(
        last_name: impl Into<String>,
        first_name: impl Into<String>,
        email: impl Into<String>,
        organization: DocumentId,
    ) -> Self {
        Self {
            last_name: last_name.into(),
            first_name: first_name.into(),
            email: email.into(),
            phone: String::new(),
            birth_date: None,
            social_security_number: String::new(),
            contributor_number: String::new(),
            organization: Some(organization),
            program: String::new(),
            status: LearnerStatus::Prospect,
            progress_percent: 0,
            notes: String::new(),
        }
    }

    pub fn validate(&self) -> Result<(), LearnerValidationError> {
        if self.last_name.trim().is_empty() {
            return Err(LearnerValidationError::EmptyLastName);
        }
        if self.first_name.trim().is_empty() {
            return Err(LearnerValidationError::EmptyFirstName);
        }
        if self.email.trim().is_empty() {
            return Err(LearnerValidationError::EmptyEmail);
        }
        if self.progress_percent > MAX_PROGRESS_PERCENT {
            return Err(LearnerValidationError::ProgressOutOfRange(
                self.progress_percent,
            ));
        }
        Ok(())
    }

    /// Validates and encodes this learner as a document body.
    pub fn to_fields(&self) -> StoreResult<Fields> {
        self.validate()
            .map_err(|err| StoreError::InvalidData(err.to_string()))?;
        encode_fields(self)
    }

    /// Decodes and validates a learner document.
    pub fn from_document(document: &Document) -> StoreResult<Self> {
        let learner: Self = decode_fields(document)?;
        learner
            .validate()
            .map_err(|err| document.invalid(err.to_string()))?;
        Ok(learner)
    }
}
