//! Organization (legal structure) record.
//!
//! # Invariants
//! - `registration_number` is the external uniqueness key; the store
//!   enforces it through the `siret` unique field of
//!   [`Collection::Organizations`](crate::store::Collection::Organizations).
//! - `name` and `registration_number` are never empty once validated.

use crate::store::{decode_fields, encode_fields, Document, Fields, StoreError, StoreResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Persisted field holding the registration number.
pub const REGISTRATION_NUMBER_FIELD: &str = "siret";

/// Primary contact person of an organization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPerson {
    #[serde(rename = "nom", default, deserialize_with = "null_as_empty")]
    pub last_name: String,
    #[serde(rename = "prenom", default, deserialize_with = "null_as_empty")]
    pub first_name: String,
    #[serde(rename = "fonction", default, deserialize_with = "null_as_empty")]
    pub role: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub email: String,
    #[serde(rename = "telephone", default, deserialize_with = "null_as_empty")]
    pub phone: String,
}

/// Reads an absent-or-null text attribute as `""`.
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl ContactPerson {
    /// Returns whether no contact attribute carries a value.
    pub fn is_empty(&self) -> bool {
        self.last_name.is_empty()
            && self.first_name.is_empty()
            && self.role.is_empty()
            && self.email.is_empty()
            && self.phone.is_empty()
    }
}

/// Legal or business entity learners are attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    #[serde(rename = "nom")]
    pub name: String,
    #[serde(rename = "siret")]
    pub registration_number: String,
    #[serde(rename = "codeApe", default)]
    pub activity_code: String,
    #[serde(rename = "adresse", default)]
    pub address: String,
    #[serde(rename = "codePostal", default)]
    pub postal_code: String,
    #[serde(rename = "ville", default)]
    pub city: String,
    #[serde(rename = "telephone", default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(
        rename = "contactPrincipal",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub primary_contact: Option<ContactPerson>,
}

/// Validation failures for [`Organization`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrganizationValidationError {
    EmptyName,
    EmptyRegistrationNumber,
}

impl Display for OrganizationValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "organization name must not be empty"),
            Self::EmptyRegistrationNumber => {
                write!(f, "organization registration number must not be empty")
            }
        }
    }
}

impl Error for OrganizationValidationError {}

impl Organization {
    /// Creates an organization with only its identity set.
    pub fn new(name: impl Into<String>, registration_number: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registration_number: registration_number.into(),
            activity_code: String::new(),
            address: String::new(),
            postal_code: String::new(),
            city: String::new(),
            phone: String::new(),
            email: String::new(),
            primary_contact: None,
        }
    }

    pub fn validate(&self) -> Result<(), OrganizationValidationError> {
        if self.name.trim().is_empty() {
            return Err(OrganizationValidationError::EmptyName);
        }
        if self.registration_number.trim().is_empty() {
            return Err(OrganizationValidationError::EmptyRegistrationNumber);
        }
        Ok(())
    }

    /// Validates and encodes this organization as a document body.
    pub fn to_fields(&self) -> StoreResult<Fields> {
        self.validate()
            .map_err(|err| StoreError::InvalidData(err.to_string()))?;
        encode_fields(self)
    }

    /// Decodes and validates an organization document.
    pub fn from_document(document: &Document) -> StoreResult<Self> {
        let organization: Self = decode_fields(document)?;
        organization
            .validate()
            .map_err(|err| document.invalid(err.to_string()))?;
        Ok(organization)
    }
}
