// src/demo_schema.rs

//! A concrete, compiled-in fragment set for the `fluentorm` binary.
//!
//! Dynamic discovery of schema fragment files is an external collaborator —
//! this toolchain's core never walks a directory of schema sources. In a
//! real deployment, an embedding crate compiles its own `Fragment`
//! implementations and hands them to `schema::merge` directly. This binary
//! has no embedding crate of its own, so it ships with this fixed fragment
//! set for `generate` to run against.

use fluentorm::schema::{FieldOpts, ForeignOpts, Fragment, NamedFragment};

pub fn fragments() -> Vec<Box<dyn Fragment>> {
    vec![
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
                        create_input: Some(fluentorm::schema::CreateInput::Excluded),
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
                b.string(
                    "name",
                    FieldOpts {
                        not_null: true,
                        ..Default::default()
                    },
                );
            }),
        }),
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
                        create_input: Some(fluentorm::schema::CreateInput::Excluded),
                        default_value: Some("gen_random_uuid()".to_string()),
                        ..Default::default()
                    },
                );
                b.uuid(
                    "user_id",
                    FieldOpts {
                        not_null: true,
                        ..Default::default()
                    },
                );
                b.string("title", FieldOpts { not_null: true, ..Default::default() });
                b.belongs_to("user", "user_id", ForeignOpts::to("users").on_delete(fluentorm::schema::RefAction::Cascade));
            }),
        }),
    ]
}
