//! Learner registration workflow.
//!
//! # Responsibility
//! - Resolve (find or create) the organization named by a registration
//!   number, reject duplicate learners by email, and create the learner
//!   linked to the organization.
//! - Stay safe under concurrent or retried submissions of the same request.
//!
//! # Invariants
//! - Every required field is checked before the first store call.
//! - At most one organization and one learner are created per call.
//! - A unique-constraint violation never reaches the caller: on the
//!   organization it means another call won the race and the winner is
//!   reused; on the learner it becomes [`RegistrationError::Conflict`].
//! - No multi-step transaction spans organization and learner creation. A
//!   learner failure can leave a created organization behind; retrying the
//!   same request reuses it.

use crate::model::learner::{Learner, EMAIL_FIELD, ORGANIZATION_FIELD};
use crate::model::organization::{ContactPerson, Organization, REGISTRATION_NUMBER_FIELD};
use crate::model::Record;
use crate::store::{Collection, Document, DocumentId, DocumentStore, Filter, StoreError, StoreResult};
use log::{debug, error, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

const LEARNERS_DEFAULT_LIMIT: u32 = 50;
const LEARNERS_LIMIT_MAX: u32 = 200;

/// Registration input, deserialized from the request wire field names.
///
/// Every field is optional at this level; required fields are enforced by
/// [`RegisterLearnerRequest::validate`] so that missing data is reported as
/// a validation failure rather than a parse failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RegisterLearnerRequest {
    #[serde(rename = "nom")]
    pub last_name: Option<String>,
    #[serde(rename = "prenom")]
    pub first_name: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "siret")]
    pub registration_number: Option<String>,
    #[serde(rename = "telephone")]
    pub phone: Option<String>,
    #[serde(rename = "dateNaissance")]
    pub birth_date: Option<String>,
    #[serde(rename = "numeroSecuriteSociale")]
    pub social_security_number: Option<String>,
    #[serde(rename = "numeroCotisantIndividuel")]
    pub contributor_number: Option<String>,
    #[serde(rename = "structureNom")]
    pub organization_name: Option<String>,
    #[serde(rename = "codeApe")]
    pub activity_code: Option<String>,
    #[serde(rename = "adresse")]
    pub address: Option<String>,
    #[serde(rename = "codePostal")]
    pub postal_code: Option<String>,
    #[serde(rename = "ville")]
    pub city: Option<String>,
    #[serde(rename = "telephoneStructure")]
    pub organization_phone: Option<String>,
    #[serde(rename = "structureEmail")]
    pub organization_email: Option<String>,
    #[serde(rename = "contactPrincipal")]
    pub primary_contact: Option<ContactPerson>,
    #[serde(rename = "programme")]
    pub program: Option<String>,
    pub notes: Option<String>,
}

impl RegisterLearnerRequest {
    /// Builds a request carrying only the required fields.
    pub fn new(
        last_name: impl Into<String>,
        first_name: impl Into<String>,
        email: impl Into<String>,
        registration_number: impl Into<String>,
    ) -> Self {
        Self {
            last_name: Some(last_name.into()),
            first_name: Some(first_name.into()),
            email: Some(email.into()),
            registration_number: Some(registration_number.into()),
            ..Self::default()
        }
    }

    /// Checks and normalizes the request without touching the store.
    ///
    /// All missing required fields are reported together.
    pub fn validate(&self) -> Result<ValidatedRegistration, RequestValidationError> {
        let last_name = text(&self.last_name);
        let first_name = text(&self.first_name);
        let email = text(&self.email).to_lowercase();
        let registration_number = self
            .registration_number
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .collect::<String>();

        let missing = [
            ("nom", last_name.is_empty()),
            ("prenom", first_name.is_empty()),
            ("email", email.is_empty()),
            ("siret", registration_number.is_empty()),
        ]
        .into_iter()
        .filter_map(|(field, is_missing)| is_missing.then_some(field))
        .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(RequestValidationError::MissingFields(missing));
        }

        if !EMAIL_RE.is_match(&email) {
            return Err(RequestValidationError::InvalidEmail);
        }

        Ok(ValidatedRegistration {
            last_name,
            first_name,
            email,
            registration_number,
            request: self.clone(),
        })
    }
}

/// Request that passed [`RegisterLearnerRequest::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRegistration {
    pub last_name: String,
    pub first_name: String,
    /// Trimmed and lowercased.
    pub email: String,
    /// Whitespace removed.
    pub registration_number: String,
    request: RegisterLearnerRequest,
}

impl ValidatedRegistration {
    /// Organization to create when the registration number is unseen.
    ///
    /// Falls back to the registration number when no name was supplied,
    /// since an organization cannot be stored without one.
    pub fn organization(&self) -> Organization {
        let request = &self.request;
        let name = match text(&request.organization_name) {
            name if name.is_empty() => self.registration_number.clone(),
            name => name,
        };

        let mut organization = Organization::new(name, self.registration_number.clone());
        organization.activity_code = text(&request.activity_code);
        organization.address = text(&request.address);
        organization.postal_code = text(&request.postal_code);
        organization.city = text(&request.city);
        organization.phone = text(&request.organization_phone);
        organization.email = text(&request.organization_email);
        organization.primary_contact = request
            .primary_contact
            .clone()
            .filter(|contact| !contact.is_empty());
        organization
    }

    /// Prospect learner linked to `organization_id`.
    pub fn learner(&self, organization_id: DocumentId) -> Learner {
        let request = &self.request;
        let mut learner = Learner::prospect(
            self.last_name.clone(),
            self.first_name.clone(),
            self.email.clone(),
            organization_id,
        );
        learner.phone = text(&request.phone);
        learner.birth_date = Some(text(&request.birth_date)).filter(|date| !date.is_empty());
        learner.social_security_number = text(&request.social_security_number);
        learner.contributor_number = text(&request.contributor_number);
        learner.program = text(&request.program);
        learner.notes = text(&request.notes);
        learner
    }
}

/// Caller-fixable request problems. Raised before any store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestValidationError {
    /// Wire names of the required fields that were absent or blank.
    MissingFields(Vec<&'static str>),
    InvalidEmail,
}

impl Display for RequestValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingFields(fields) => {
                write!(f, "missing required fields: {}", fields.join(", "))
            }
            Self::InvalidEmail => write!(f, "email is not a valid address"),
        }
    }
}

impl Error for RequestValidationError {}

/// Steps of a single registration call, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStage {
    ValidatingInput,
    ResolvingOrganization,
    CheckingDuplicateLearner,
    CreatingLearner,
}

impl RegistrationStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ValidatingInput => "validating_input",
            Self::ResolvingOrganization => "resolving_organization",
            Self::CheckingDuplicateLearner => "checking_duplicate_learner",
            Self::CreatingLearner => "creating_learner",
        }
    }

    fn fail(self) -> impl FnOnce(StoreError) -> RegistrationError {
        move |source| RegistrationError::Store {
            stage: self,
            source,
        }
    }
}

impl Display for RegistrationStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of a registration call.
#[derive(Debug)]
pub enum RegistrationError {
    /// Required input missing or malformed. Nothing was written.
    Validation(RequestValidationError),
    /// A learner with this email already exists. No learner was written.
    Conflict { existing_learner_id: DocumentId },
    /// A store operation failed. Writes from earlier stages may persist.
    Store {
        stage: RegistrationStage,
        source: StoreError,
    },
    /// A unique key collided but its owner could not be read back.
    InconsistentState(&'static str),
}

impl RegistrationError {
    /// Stable machine-readable code used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::Conflict { .. } => "learner_conflict",
            Self::Store { .. } => "store_failed",
            Self::InconsistentState(_) => "inconsistent_state",
        }
    }
}

impl Display for RegistrationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Conflict {
                existing_learner_id,
            } => write!(
                f,
                "a learner with this email already exists: {existing_learner_id}"
            ),
            Self::Store { stage, source } => write!(f, "store failure while {stage}: {source}"),
            Self::InconsistentState(details) => {
                write!(f, "inconsistent registration state: {details}")
            }
        }
    }
}

impl Error for RegistrationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store { source, .. } => Some(source),
            Self::Conflict { .. } | Self::InconsistentState(_) => None,
        }
    }
}

impl From<RequestValidationError> for RegistrationError {
    fn from(value: RequestValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Successful registration result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationOutcome {
    pub learner_id: DocumentId,
    pub last_name: String,
    pub first_name: String,
    /// Stored form (trimmed, lowercased), not the submitted text.
    pub email: String,
    pub organization_id: DocumentId,
    /// Whether this call created the organization.
    pub organization_created: bool,
}

/// Registration use-case service over a document store.
pub struct RegistrationService<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> RegistrationService<S> {
    /// Creates a service using the provided store implementation.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Registers one learner under the organization named by `siret`.
    ///
    /// # Errors
    /// - [`RegistrationError::Validation`] before any store call.
    /// - [`RegistrationError::Conflict`] when the email is taken, carrying
    ///   the existing learner id.
    /// - [`RegistrationError::Store`] for any other store failure, tagged
    ///   with the failing stage.
    pub fn register_learner(
        &self,
        request: &RegisterLearnerRequest,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        let started_at = Instant::now();
        let result = self.run_registration(request);
        let duration_ms = started_at.elapsed().as_millis();

        match &result {
            Ok(outcome) => info!(
                "event=register_learner module=registration status=ok learner_id={} organization_id={} organization_created={} duration_ms={}",
                outcome.learner_id, outcome.organization_id, outcome.organization_created, duration_ms
            ),
            Err(RegistrationError::Store { stage, source }) => error!(
                "event=register_learner module=registration status=error error_code=store_failed stage={} duration_ms={} error={}",
                stage, duration_ms, source
            ),
            Err(err) => warn!(
                "event=register_learner module=registration status=rejected error_code={} duration_ms={}",
                err.code(),
                duration_ms
            ),
        }

        result
    }

    fn run_registration(
        &self,
        request: &RegisterLearnerRequest,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        let input = request.validate()?;

        let (organization_id, organization_created) = self.resolve_organization(&input)?;

        let stage = RegistrationStage::CheckingDuplicateLearner;
        if let Some(existing) = self
            .find_learner_document(&input.email)
            .map_err(stage.fail())?
        {
            return Err(RegistrationError::Conflict {
                existing_learner_id: existing.id,
            });
        }

        let stage = RegistrationStage::CreatingLearner;
        let learner = input.learner(organization_id);
        let fields = learner.to_fields().map_err(stage.fail())?;
        let created = match self.store.create(Collection::Learners, &fields) {
            Ok(document) => document,
            Err(err) if err.is_unique_violation() => {
                info!("event=learner_race module=registration status=lost action=requery");
                let winner = self
                    .find_learner_document(&input.email)
                    .map_err(stage.fail())?
                    .ok_or(RegistrationError::InconsistentState(
                        "learner email collided but no learner matches it",
                    ))?;
                return Err(RegistrationError::Conflict {
                    existing_learner_id: winner.id,
                });
            }
            Err(err) => return Err(stage.fail()(err)),
        };

        Ok(RegistrationOutcome {
            learner_id: created.id,
            last_name: learner.last_name,
            first_name: learner.first_name,
            email: learner.email,
            organization_id,
            organization_created,
        })
    }

    fn resolve_organization(
        &self,
        input: &ValidatedRegistration,
    ) -> Result<(DocumentId, bool), RegistrationError> {
        let stage = RegistrationStage::ResolvingOrganization;

        if let Some(existing) = self
            .find_organization_document(&input.registration_number)
            .map_err(stage.fail())?
        {
            debug!(
                "event=organization_resolve module=registration status=reused organization_id={}",
                existing.id
            );
            return Ok((existing.id, false));
        }

        let fields = input.organization().to_fields().map_err(stage.fail())?;
        match self.store.create(Collection::Organizations, &fields) {
            Ok(created) => {
                debug!(
                    "event=organization_resolve module=registration status=created organization_id={}",
                    created.id
                );
                Ok((created.id, true))
            }
            Err(err) if err.is_unique_violation() => {
                info!("event=organization_race module=registration status=lost action=requery");
                let winner = self
                    .find_organization_document(&input.registration_number)
                    .map_err(stage.fail())?
                    .ok_or(RegistrationError::InconsistentState(
                        "registration number collided but no organization matches it",
                    ))?;
                Ok((winner.id, false))
            }
            Err(err) => Err(stage.fail()(err)),
        }
    }

    /// Looks up an organization by registration number.
    ///
    /// Whitespace in `registration_number` is ignored, as on registration.
    pub fn find_organization(
        &self,
        registration_number: &str,
    ) -> StoreResult<Option<Record<Organization>>> {
        let normalized = registration_number.split_whitespace().collect::<String>();
        if normalized.is_empty() {
            return Ok(None);
        }

        self.find_organization_document(&normalized)?
            .map(|document| Record::decode(&document, Organization::from_document))
            .transpose()
    }

    /// Lists learners linked to an organization, oldest first.
    ///
    /// `limit` defaults to 50 and is clamped to 200.
    pub fn learners_of_organization(
        &self,
        organization_id: DocumentId,
        limit: Option<u32>,
    ) -> StoreResult<Vec<Record<Learner>>> {
        let filter = Filter::eq(ORGANIZATION_FIELD, organization_id.to_string());
        self.store
            .find(Collection::Learners, &filter, normalize_learners_limit(limit))?
            .iter()
            .map(|document| Record::decode(document, Learner::from_document))
            .collect()
    }

    fn find_organization_document(&self, registration_number: &str) -> StoreResult<Option<Document>> {
        let filter = Filter::eq(REGISTRATION_NUMBER_FIELD, registration_number);
        Ok(self
            .store
            .find(Collection::Organizations, &filter, 1)?
            .into_iter()
            .next())
    }

    fn find_learner_document(&self, email: &str) -> StoreResult<Option<Document>> {
        let filter = Filter::eq(EMAIL_FIELD, email);
        Ok(self
            .store
            .find(Collection::Learners, &filter, 1)?
            .into_iter()
            .next())
    }
}

fn normalize_learners_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => LEARNERS_DEFAULT_LIMIT,
        Some(value) => value.min(LEARNERS_LIMIT_MAX),
    }
}

fn text(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}
