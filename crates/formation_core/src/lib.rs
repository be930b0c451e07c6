//! Core domain logic for the training-organization records system.
//! This crate is the single source of truth for registration invariants.

pub mod api;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;

pub use api::{handle_register_learner, register_learner_response, ApiResponse};
pub use config::CoreConfig;
pub use logging::{default_log_level, init_logging, logging_status, LogDestination, LoggingSettings};
pub use model::learner::{Learner, LearnerStatus, LearnerValidationError};
pub use model::organization::{ContactPerson, Organization, OrganizationValidationError};
pub use model::Record;
pub use service::registration_service::{
    RegisterLearnerRequest, RegistrationError, RegistrationOutcome, RegistrationService,
    RegistrationStage, RequestValidationError, ValidatedRegistration,
};
pub use store::{
    Collection, Document, DocumentId, DocumentStore, Fields, Filter, SqliteDocumentStore,
    StoreError, StoreResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
