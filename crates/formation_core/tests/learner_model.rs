use formation_core::{
    Collection, Document, Learner, LearnerStatus, LearnerValidationError, StoreError,
};
use serde_json::{json, Value};
use uuid::Uuid;

fn document(fields: Value) -> Document {
    match fields {
        Value::Object(fields) => Document {
            id: Uuid::new_v4(),
            collection: Collection::Learners,
            fields,
        },
        other => panic!("expected object, got {other}"),
    }
}

#[test]
fn prospect_sets_initial_lifecycle_state() {
    let organization_id = Uuid::new_v4();
    let learner = Learner::prospect("Martin", "Léa", "lea@example.com", organization_id);

    assert_eq!(learner.status, LearnerStatus::Prospect);
    assert_eq!(learner.progress_percent, 0);
    assert_eq!(learner.organization, Some(organization_id));
    assert_eq!(learner.birth_date, None);
    assert!(learner.validate().is_ok());
}

#[test]
fn serialization_uses_document_schema_fields() {
    let organization_id = Uuid::parse_str("11111111-2222-4333-8444-555555555555").unwrap();
    let mut learner = Learner::prospect("Martin", "Léa", "lea@example.com", organization_id);
    learner.birth_date = Some("1998-04-02".to_string());
    learner.status = LearnerStatus::InTraining;
    learner.progress_percent = 40;

    let fields = learner.to_fields().unwrap();
    assert_eq!(fields["nom"], "Martin");
    assert_eq!(fields["prenom"], "Léa");
    assert_eq!(fields["dateNaissance"], "1998-04-02");
    assert_eq!(fields["structureJuridique"], organization_id.to_string());
    assert_eq!(fields["statut"], "en-formation");
    assert_eq!(fields["progression"], 40);
    assert_eq!(fields["numeroSecuriteSociale"], "");

    let decoded = Learner::from_document(&document(Value::Object(fields))).unwrap();
    assert_eq!(decoded, learner);
}

#[test]
fn status_values_match_persisted_schema() {
    let statuses = [
        (LearnerStatus::Prospect, "prospect"),
        (LearnerStatus::Enrolled, "inscrit"),
        (LearnerStatus::InTraining, "en-formation"),
        (LearnerStatus::Completed, "termine"),
        (LearnerStatus::Abandoned, "abandonne"),
    ];
    for (status, wire) in statuses {
        assert_eq!(serde_json::to_value(status).unwrap(), wire);
    }
}

#[test]
fn validate_rejects_progress_above_one_hundred() {
    let mut learner = Learner::prospect("Martin", "Léa", "lea@example.com", Uuid::new_v4());
    learner.progress_percent = 101;

    assert_eq!(
        learner.validate(),
        Err(LearnerValidationError::ProgressOutOfRange(101))
    );
    assert!(matches!(
        learner.to_fields().unwrap_err(),
        StoreError::InvalidData(_)
    ));
}

#[test]
fn from_document_rejects_invalid_persisted_state() {
    let unknown_status = document(json!({
        "nom": "Martin",
        "prenom": "Léa",
        "email": "lea@example.com",
        "statut": "archived",
    }));
    assert!(matches!(
        Learner::from_document(&unknown_status).unwrap_err(),
        StoreError::InvalidData(_)
    ));

    let blank_name = document(json!({
        "nom": " ",
        "prenom": "Léa",
        "email": "lea@example.com",
        "statut": "prospect",
    }));
    let err = Learner::from_document(&blank_name).unwrap_err();
    assert!(err.to_string().contains("last name"));
}

#[test]
fn optional_fields_default_when_absent() {
    let minimal = document(json!({
        "nom": "Martin",
        "prenom": "Léa",
        "email": "lea@example.com",
        "statut": "inscrit",
    }));

    let learner = Learner::from_document(&minimal).unwrap();
    assert_eq!(learner.status, LearnerStatus::Enrolled);
    assert_eq!(learner.organization, None);
    assert_eq!(learner.progress_percent, 0);
    assert!(learner.notes.is_empty());
}
