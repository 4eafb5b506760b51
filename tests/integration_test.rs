// tests/integration_test.rs

//! End-to-end tests for the generation pipeline: fragments -> merge ->
//! diff -> emit -> snapshot. Exercises the same sequence `fluentorm
//! generate` runs, without a database.

use fluentorm::schema::{CreateInput, FieldOpts, ForeignOpts, Fragment, NamedFragment, RefAction};
use fluentorm::{diff, emit, snapshot};
use tempfile::tempdir;

fn users_fragment() -> Box<dyn Fragment> {
    Box::new(NamedFragment {
        identifier: "001_users".to_string(),
        table_name: "users".to_string(),
        build: Box::new(|b| {
            b.uuid(
                "id",
                FieldOpts {
                    primary_key: true,
                    unique: true,
                    not_null: true,
                    create_input: Some(CreateInput::Excluded),
                    auto_generated: true,
                    default_value: Some("gen_random_uuid()".to_string()),
                    ..Default::default()
                },
            );
            b.string(
                "email",
                FieldOpts {
                    unique: true,
                    not_null: true,
                    ..Default::default()
                },
            );
            b.string("name", FieldOpts { not_null: true, ..Default::default() });
        }),
    })
}

fn posts_fragment() -> Box<dyn Fragment> {
    Box::new(NamedFragment {
        identifier: "002_posts".to_string(),
        table_name: "posts".to_string(),
        build: Box::new(|b| {
            b.uuid(
                "id",
                FieldOpts {
                    primary_key: true,
                    unique: true,
                    not_null: true,
                    auto_generated: true,
                    create_input: Some(CreateInput::Excluded),
                    default_value: Some("gen_random_uuid()".to_string()),
                    ..Default::default()
                },
            );
            b.uuid("user_id", FieldOpts { not_null: true, ..Default::default() });
            b.belongs_to("user", "user_id", ForeignOpts::to("users").on_delete(RefAction::Cascade));
        }),
    })
}

#[test]
fn first_generation_creates_tables_in_dependency_order() {
    let dir = tempdir().unwrap();
    let snapshot_path = dir.path().join(".fluent_snapshot.json");
    let migrations_dir = dir.path().join("migrations");

    let fragments = vec![posts_fragment(), users_fragment()];
    let current = fluentorm::schema::merge(&fragments).unwrap();
    let prior = snapshot::load(&snapshot_path).unwrap();
    assert!(prior.is_empty());

    let changes = diff::diff(&prior, &current).unwrap();
    let emitted = emit::emit(&changes, 1_700_000_000);
    let written = emit::write_all(&migrations_dir, &emitted).unwrap();
    assert_eq!(written.len(), emitted.len() * 2);

    let create_order: Vec<&str> = emitted
        .iter()
        .filter(|m| m.kind == "CreateTable")
        .map(|m| m.table.as_str())
        .collect();
    assert_eq!(create_order, vec!["users", "posts"]);

    let fk_index = emitted.iter().position(|m| m.kind == "AddForeignKey").unwrap();
    let last_create_index = emitted.iter().rposition(|m| m.kind == "CreateTable").unwrap();
    assert!(fk_index > last_create_index);

    snapshot::save(&snapshot_path, &current).unwrap();
    let reloaded = snapshot::load(&snapshot_path).unwrap();
    assert_eq!(reloaded.len(), current.len());
}

#[test]
fn second_generation_against_prior_snapshot_is_empty_when_unchanged() {
    let dir = tempdir().unwrap();
    let snapshot_path = dir.path().join(".fluent_snapshot.json");

    let fragments = vec![users_fragment()];
    let current = fluentorm::schema::merge(&fragments).unwrap();
    snapshot::save(&snapshot_path, &current).unwrap();

    let prior = snapshot::load(&snapshot_path).unwrap();
    let changes = diff::diff(&prior, &current).unwrap();
    assert!(changes.is_empty());
}

#[test]
fn adding_a_column_against_a_prior_snapshot_emits_one_add_column_migration() {
    let dir = tempdir().unwrap();
    let snapshot_path = dir.path().join(".fluent_snapshot.json");
    let migrations_dir = dir.path().join("migrations");

    let initial = fluentorm::schema::merge(&[users_fragment()]).unwrap();
    snapshot::save(&snapshot_path, &initial).unwrap();

    let extended_fragment: Box<dyn Fragment> = Box::new(NamedFragment {
        identifier: "001_users".to_string(),
        table_name: "users".to_string(),
        build: Box::new(|b| {
            b.uuid(
                "id",
                FieldOpts {
                    primary_key: true,
                    unique: true,
                    not_null: true,
                    create_input: Some(CreateInput::Excluded),
                    auto_generated: true,
                    default_value: Some("gen_random_uuid()".to_string()),
                    ..Default::default()
                },
            );
            b.string("email", FieldOpts { unique: true, not_null: true, ..Default::default() });
            b.string("name", FieldOpts { not_null: true, ..Default::default() });
            b.string("phone", FieldOpts::default());
        }),
    });

    let current = fluentorm::schema::merge(&[extended_fragment]).unwrap();
    let prior = snapshot::load(&snapshot_path).unwrap();
    let changes = diff::diff(&prior, &current).unwrap();

    let emitted = emit::emit(&changes, 1_700_000_100);
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].kind, "AddColumn");
    assert!(emitted[0].up_body.contains("ADD COLUMN phone TEXT;"));
    assert!(!emitted[0].up_body.contains("NOT NULL"));

    emit::write_all(&migrations_dir, &emitted).unwrap();
    let files = std::fs::read_dir(&migrations_dir).unwrap().count();
    assert_eq!(files, 2);
}
