use formation_core::db::{open_db, open_db_in_memory};
use formation_core::{Collection, DocumentStore, Fields, Filter, SqliteDocumentStore, StoreError};
use serde_json::{json, Value};
use std::time::Duration;

fn fields(value: Value) -> Fields {
    match value {
        Value::Object(fields) => fields,
        other => panic!("expected object, got {other}"),
    }
}

#[test]
fn create_assigns_id_and_find_returns_document() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::new(&conn);

    let created = store
        .create(
            Collection::Organizations,
            &fields(json!({"nom": "Acme SARL", "siret": "12345678900012"})),
        )
        .unwrap();
    assert!(!created.id.is_nil());
    assert_eq!(created.collection, Collection::Organizations);

    let found = store
        .find(
            Collection::Organizations,
            &Filter::eq("siret", "12345678900012"),
            1,
        )
        .unwrap();
    assert_eq!(found, vec![created]);
}

#[test]
fn duplicate_unique_field_is_rejected_and_nothing_is_written() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::new(&conn);
    let body = fields(json!({"nom": "Martin", "email": "lea@example.com"}));

    store.create(Collection::Learners, &body).unwrap();
    let err = store.create(Collection::Learners, &body).unwrap_err();

    match err {
        StoreError::UniqueConstraintViolation {
            collection,
            field,
            value,
        } => {
            assert_eq!(collection, Collection::Learners);
            assert_eq!(field, "email");
            assert_eq!(value, "lea@example.com");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.count(Collection::Learners).unwrap(), 1);
}

#[test]
fn unique_fields_are_scoped_to_their_collection() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::new(&conn);

    store
        .create(
            Collection::Organizations,
            &fields(json!({"nom": "Acme", "siret": "1", "email": "contact@acme.fr"})),
        )
        .unwrap();
    store
        .create(
            Collection::Organizations,
            &fields(json!({"nom": "Other", "siret": "2", "email": "contact@acme.fr"})),
        )
        .unwrap();
    store
        .create(
            Collection::Learners,
            &fields(json!({"nom": "Durand", "email": "contact@acme.fr"})),
        )
        .unwrap();

    assert_eq!(store.count(Collection::Organizations).unwrap(), 2);
    assert_eq!(store.count(Collection::Learners).unwrap(), 1);
}

#[test]
fn find_respects_limit_and_insertion_order() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::new(&conn);

    let ids = (0..3)
        .map(|index| {
            store
                .create(
                    Collection::Learners,
                    &fields(json!({
                        "email": format!("learner{index}@example.com"),
                        "programme": "bureautique",
                    })),
                )
                .unwrap()
                .id
        })
        .collect::<Vec<_>>();

    let filter = Filter::eq("programme", "bureautique");
    let first = store.find(Collection::Learners, &filter, 1).unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].id, ids[0]);

    let all = store.find(Collection::Learners, &filter, 10).unwrap();
    assert_eq!(all.iter().map(|doc| doc.id).collect::<Vec<_>>(), ids);
}

#[test]
fn find_matches_nested_numeric_and_null_fields() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::new(&conn);

    let with_contact = store
        .create(
            Collection::Organizations,
            &fields(json!({
                "siret": "1",
                "contactPrincipal": {"email": "boss@acme.fr"},
                "effectif": 12,
            })),
        )
        .unwrap();
    let without_contact = store
        .create(Collection::Organizations, &fields(json!({"siret": "2"})))
        .unwrap();

    let nested = store
        .find(
            Collection::Organizations,
            &Filter::eq("contactPrincipal.email", "boss@acme.fr"),
            10,
        )
        .unwrap();
    assert_eq!(nested.len(), 1);
    assert_eq!(nested[0].id, with_contact.id);

    let numeric = store
        .find(Collection::Organizations, &Filter::eq("effectif", 12), 10)
        .unwrap();
    assert_eq!(numeric.len(), 1);

    let missing = store
        .find(
            Collection::Organizations,
            &Filter::eq("contactPrincipal", Value::Null),
            10,
        )
        .unwrap();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].id, without_contact.id);
}

#[test]
fn find_rejects_invalid_field_path() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::new(&conn);

    let err = store
        .find(Collection::Learners, &Filter::eq("email'--", "x"), 1)
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidFilter(_)));
}

#[test]
fn create_ignores_client_supplied_id() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::new(&conn);

    let created = store
        .create(
            Collection::Learners,
            &fields(json!({"id": "forged", "email": "a@example.com"})),
        )
        .unwrap();
    assert!(!created.fields.contains_key("id"));

    let found = store
        .find(Collection::Learners, &Filter::eq("email", "a@example.com"), 1)
        .unwrap();
    assert_eq!(found[0].id, created.id);
}

#[test]
fn locked_database_surfaces_as_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("locked.db");
    let holder = open_db(&path).unwrap();
    let waiter = open_db(&path).unwrap();
    waiter.busy_timeout(Duration::from_millis(50)).unwrap();

    holder.execute_batch("BEGIN IMMEDIATE;").unwrap();
    let store = SqliteDocumentStore::new(&waiter);
    let err = store
        .create(Collection::Learners, &fields(json!({"email": "a@example.com"})))
        .unwrap_err();
    holder.execute_batch("ROLLBACK;").unwrap();

    assert!(matches!(err, StoreError::Timeout { operation: "create" }));
}

#[test]
fn creation_timestamps_have_millisecond_resolution() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteDocumentStore::new(&conn);

    for index in 0..5 {
        store
            .create(
                Collection::Learners,
                &fields(json!({"email": format!("learner{index}@example.com")})),
            )
            .unwrap();
        std::thread::sleep(Duration::from_millis(3));
    }

    let mut stmt = conn
        .prepare("SELECT created_at FROM documents ORDER BY rowid ASC")
        .unwrap();
    let stamps: Vec<i64> = stmt
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(stamps.len(), 5);
    assert!(
        stamps.windows(2).all(|pair| pair[0] < pair[1]),
        "timestamps not strictly increasing: {stamps:?}"
    );

    let now_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64;
    assert!((now_ms - stamps[4]).abs() < 60_000, "{} vs {now_ms}", stamps[4]);
}
