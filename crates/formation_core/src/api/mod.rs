//! Transport-agnostic request/response contract for learner registration.
//!
//! # Responsibility
//! - Parse the JSON request body into [`RegisterLearnerRequest`].
//! - Map workflow results onto the response envelope and a status code.
//!
//! # Invariants
//! - Handlers never panic; every failure becomes an envelope.
//! - `success` is `true` only with status 200.
//! - Store-level unique violations never appear here; the workflow has
//!   already translated them.
//! - `data.apprenant.email` echoes the stored email: trimmed and lowercased,
//!   the same form duplicate detection compares. It may differ from the
//!   submitted text.

use crate::service::registration_service::{
    RegisterLearnerRequest, RegistrationError, RegistrationOutcome, RegistrationService,
};
use crate::store::{DocumentId, DocumentStore};
use serde::Serialize;
use serde_json::error::Category;
use serde_json::Value;

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_CONFLICT: u16 = 409;
pub const STATUS_INTERNAL_ERROR: u16 = 500;

const REGISTERED_MESSAGE: &str = "Learner registered.";
const CONFLICT_MESSAGE: &str = "A learner with this email already exists";
const INTERNAL_MESSAGE: &str = "Learner registration failed";

/// Status code plus JSON body, ready for any transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }

    fn from_envelope(status: u16, envelope: Envelope) -> Self {
        // Envelope only holds strings and ids, so encoding cannot fail.
        let body = serde_json::to_value(envelope).unwrap_or(Value::Null);
        Self { status, body }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<RegisteredData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    apprenant_id: Option<DocumentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl Envelope {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            data: None,
            error: Some(error.into()),
            apprenant_id: None,
            details: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisteredData {
    apprenant: RegisteredLearner,
    structure_id: DocumentId,
}

#[derive(Debug, Serialize)]
struct RegisteredLearner {
    id: DocumentId,
    nom: String,
    prenom: String,
    email: String,
}

/// Handles a registration request body.
///
/// Malformed JSON and fields of the wrong type are answered like a
/// validation failure, each with its own message.
pub fn handle_register_learner<S: DocumentStore>(
    service: &RegistrationService<S>,
    body: &str,
) -> ApiResponse {
    match serde_json::from_str::<RegisterLearnerRequest>(body) {
        Ok(request) => register_learner_response(service.register_learner(&request)),
        Err(err) => ApiResponse::from_envelope(
            STATUS_BAD_REQUEST,
            Envelope::failure(body_error_message(&err)),
        ),
    }
}

fn body_error_message(err: &serde_json::Error) -> String {
    match err.classify() {
        Category::Data => format!("request field has the wrong type: {err}"),
        Category::Io | Category::Syntax | Category::Eof => {
            format!("request body is not valid JSON: {err}")
        }
    }
}

/// Maps a workflow result onto the response envelope.
pub fn register_learner_response(
    result: Result<RegistrationOutcome, RegistrationError>,
) -> ApiResponse {
    match result {
        Ok(outcome) => ApiResponse::from_envelope(
            STATUS_OK,
            Envelope {
                success: true,
                message: Some(REGISTERED_MESSAGE),
                data: Some(RegisteredData {
                    apprenant: RegisteredLearner {
                        id: outcome.learner_id,
                        nom: outcome.last_name,
                        prenom: outcome.first_name,
                        email: outcome.email,
                    },
                    structure_id: outcome.organization_id,
                }),
                error: None,
                apprenant_id: None,
                details: None,
            },
        ),
        Err(RegistrationError::Validation(err)) => {
            ApiResponse::from_envelope(STATUS_BAD_REQUEST, Envelope::failure(err.to_string()))
        }
        Err(RegistrationError::Conflict {
            existing_learner_id,
        }) => ApiResponse::from_envelope(
            STATUS_CONFLICT,
            Envelope {
                apprenant_id: Some(existing_learner_id),
                ..Envelope::failure(CONFLICT_MESSAGE)
            },
        ),
        Err(err @ (RegistrationError::Store { .. } | RegistrationError::InconsistentState(_))) => {
            ApiResponse::from_envelope(
                STATUS_INTERNAL_ERROR,
                Envelope {
                    details: Some(err.to_string()),
                    ..Envelope::failure(INTERNAL_MESSAGE)
                },
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{register_learner_response, STATUS_BAD_REQUEST, STATUS_CONFLICT, STATUS_INTERNAL_ERROR};
    use crate::service::registration_service::{
        RegistrationError, RegistrationStage, RequestValidationError,
    };
    use crate::store::StoreError;
    use uuid::Uuid;

    #[test]
    fn validation_maps_to_bad_request_without_extra_fields() {
        let response = register_learner_response(Err(RegistrationError::Validation(
            RequestValidationError::MissingFields(vec!["email"]),
        )));
        assert_eq!(response.status, STATUS_BAD_REQUEST);
        assert_eq!(response.body["success"], false);
        assert_eq!(response.body["error"], "missing required fields: email");
        assert!(response.body.get("details").is_none());
        assert!(response.body.get("apprenantId").is_none());
    }

    #[test]
    fn conflict_carries_existing_learner_id() {
        let existing = Uuid::new_v4();
        let response = register_learner_response(Err(RegistrationError::Conflict {
            existing_learner_id: existing,
        }));
        assert_eq!(response.status, STATUS_CONFLICT);
        assert_eq!(response.body["apprenantId"], existing.to_string());
    }

    #[test]
    fn store_failure_maps_to_internal_error_with_details() {
        let response = register_learner_response(Err(RegistrationError::Store {
            stage: RegistrationStage::CreatingLearner,
            source: StoreError::Timeout { operation: "create" },
        }));
        assert_eq!(response.status, STATUS_INTERNAL_ERROR);
        let details = response.body["details"].as_str().unwrap();
        assert!(details.contains("creating_learner"));
        assert!(details.contains("timed out"));
        assert!(!response.is_success());
    }
}
