//! Integration tests for the dynatable-schema crate.

use dynatable_core::ColumnDefinition;
use dynatable_schema::{SchemaError, SchemaStore, checksum, default_header};

fn store_in(dir: &tempfile::TempDir) -> SchemaStore {
    let store = SchemaStore::new(dir.path().join("schema.dyn"));
    store.init(&default_header("dev.db")).unwrap();
    store
}

#[test]
fn test_create_then_list_contains_exactly_one_entry() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    let mut doc = store.load().unwrap();
    doc.add_table(
        "users",
        vec![
            ColumnDefinition::new("email", "String"),
            ColumnDefinition::new("age", "Int?"),
        ],
    )
    .unwrap();
    store.save(&doc).unwrap();

    let reloaded = store.load().unwrap();
    let matching: Vec<_> = reloaded
        .tables()
        .into_iter()
        .filter(|t| t.name == "users")
        .collect();
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].column_names(), vec!["id", "email", "age"]);
}

#[test]
fn test_duplicate_create_leaves_file_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    let mut doc = store.load().unwrap();
    doc.add_table("users", vec![ColumnDefinition::new("email", "String")])
        .unwrap();
    store.save(&doc).unwrap();
    let before = store.read_text().unwrap();

    let mut doc = store.load().unwrap();
    let err = doc
        .add_table("users", vec![ColumnDefinition::new("other", "Int")])
        .unwrap_err();
    assert!(matches!(err, SchemaError::DuplicateTable(_)));

    assert_eq!(store.read_text().unwrap(), before);
}

#[test]
fn test_invalid_rename_round_trip_is_identical() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    let text = dynatable_schema::add_table(
        &store.read_text().unwrap(),
        "users",
        vec![ColumnDefinition::new("email", "String")],
    )
    .unwrap();
    store.write_text(&text).unwrap();

    let before = store.read_text().unwrap();
    let result = dynatable_schema::rename_column(&before, "users", "nickname", "handle");
    assert!(matches!(result, Err(SchemaError::ColumnNotFound { .. })));

    let after = store.read_text().unwrap();
    assert_eq!(before, after);
    assert_eq!(checksum(&before), checksum(&after));
}

#[test]
fn test_header_survives_add_and_remove() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    let mut doc = store.load().unwrap();
    doc.add_table("a", vec![ColumnDefinition::new("x", "Int")]).unwrap();
    doc.add_table("b", vec![ColumnDefinition::new("y", "Int")]).unwrap();
    store.save(&doc).unwrap();

    let mut doc = store.load().unwrap();
    doc.remove_table("a").unwrap();
    doc.remove_table("b").unwrap();
    store.save(&doc).unwrap();

    assert_eq!(store.read_text().unwrap(), default_header("dev.db"));
}
