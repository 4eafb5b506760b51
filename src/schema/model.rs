// src/schema/model.rs

//! In-memory schema model: tables, fields, indexes, relationships.
//!
//! This module defines the data owned by the core between the builder (C2)
//! and everything downstream of it (merger, diff, emitter, snapshot). It is
//! deliberately inert: nothing here validates, merges, or serializes — see
//! `merger`, `snapshot`, and `diff` for those concerns.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the column types FluentORM understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Uuid,
    Text,
    Int4,
    Int8,
    Float4,
    Numeric,
    Bool,
    Timestamp,
    Json,
    Jsonb,
    Bytea,
}

impl FieldType {
    /// The PostgreSQL type name used by the emitter.
    pub fn sql_name(&self) -> &'static str {
        match self {
            FieldType::Uuid => "UUID",
            FieldType::Text => "TEXT",
            FieldType::Int4 => "INTEGER",
            FieldType::Int8 => "BIGINT",
            FieldType::Float4 => "REAL",
            FieldType::Numeric => "NUMERIC",
            FieldType::Bool => "BOOLEAN",
            FieldType::Timestamp => "TIMESTAMP",
            FieldType::Json => "JSON",
            FieldType::Jsonb => "JSONB",
            FieldType::Bytea => "BYTEA",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql_name())
    }
}

/// Whether a field participates in the generated `create` input struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreateInput {
    Required,
    Optional,
    Excluded,
}

/// A single column on a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default = "default_create_input")]
    pub create_input: CreateInput,
    #[serde(default = "default_true")]
    pub update_input: bool,
    #[serde(default)]
    pub redacted: bool,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub auto_generated: bool,
    #[serde(default)]
    pub auto_generate_type: Option<String>,
}

fn default_create_input() -> CreateInput {
    CreateInput::Required
}

fn default_true() -> bool {
    true
}

impl Field {
    /// A field is nullable in the DDL sense when it isn't `not_null`.
    pub fn is_nullable(&self) -> bool {
        !self.not_null
    }

    /// Apply a sparse `Alteration` to this field, overwriting only the
    /// attributes the alteration specifies.
    pub fn apply_alteration(&mut self, alt: &Alteration) {
        if let Some(t) = alt.field_type {
            self.field_type = t;
        }
        if let Some(v) = alt.primary_key {
            self.primary_key = v;
        }
        if let Some(v) = alt.unique {
            self.unique = v;
        }
        if let Some(v) = alt.not_null {
            self.not_null = v;
        }
        if let Some(v) = alt.create_input {
            self.create_input = v;
        }
        if let Some(v) = alt.update_input {
            self.update_input = v;
        }
        if let Some(v) = alt.redacted {
            self.redacted = v;
        }
        if let Some(ref v) = alt.default_value {
            self.default_value = v.clone();
        }
        if let Some(v) = alt.auto_generated {
            self.auto_generated = v;
        }
        if let Some(ref v) = alt.auto_generate_type {
            self.auto_generate_type = v.clone();
        }
    }
}

/// A sparse field override, applied after all builder `build()` calls for a
/// table have run. Only `Some` attributes overwrite the target field; `None`
/// means "leave as-is". `default_value`/`auto_generate_type` distinguish
/// "leave as-is" (`None`) from "explicitly clear" (`Some(None)`) by wrapping
/// the field's own `Option<String>` type.
#[derive(Debug, Clone, Default)]
pub struct Alteration {
    pub name: String,
    pub field_type: Option<FieldType>,
    pub primary_key: Option<bool>,
    pub unique: Option<bool>,
    pub not_null: Option<bool>,
    pub create_input: Option<CreateInput>,
    pub update_input: Option<bool>,
    pub redacted: Option<bool>,
    pub default_value: Option<Option<String>>,
    pub auto_generated: Option<bool>,
    pub auto_generate_type: Option<Option<String>>,
}

impl Alteration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A named, ordered group of columns, optionally unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

/// The kind of relationship a `Relationship` describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    ManyToOne,
    OneToOne,
    ManyToMany,
}

/// Referential action taken on delete/update of the referenced row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefAction {
    Cascade,
    SetNull,
    SetDefault,
    Restrict,
    NoAction,
}

impl RefAction {
    pub fn sql_name(&self) -> &'static str {
        match self {
            RefAction::Cascade => "CASCADE",
            RefAction::SetNull => "SET NULL",
            RefAction::SetDefault => "SET DEFAULT",
            RefAction::Restrict => "RESTRICT",
            RefAction::NoAction => "NO ACTION",
        }
    }
}

/// A foreign-key style relationship: `belongsTo`/`hasOne`/`manyToMany`,
/// always emitting a constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub name: String,
    #[serde(default)]
    pub column: String,
    #[serde(default)]
    pub references_table: String,
    #[serde(default)]
    pub references_column: String,
    pub kind: RelationshipKind,
    #[serde(default = "default_ref_action")]
    pub on_delete: RefAction,
    #[serde(default = "default_ref_action")]
    pub on_update: RefAction,
}

fn default_ref_action() -> RefAction {
    RefAction::NoAction
}

/// The inverse side of a `belongsTo`/`hasOne`: carries no DDL of its own,
/// used only to drive model codegen navigation from the parent table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HasManyMarker {
    pub name: String,
    pub foreign_table: String,
    pub foreign_column: String,
}

/// One table's full authoritative definition after merging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Not part of the snapshot wire shape — it's the map key under
    /// `tables`. Restored from that key on load; see `snapshot::load`.
    #[serde(skip)]
    pub table_name: String,
    pub fields: Vec<Field>,
    pub indexes: Vec<Index>,
    pub relationships: Vec<Relationship>,
    #[serde(rename = "has_many")]
    pub has_many: Vec<HasManyMarker>,
    #[serde(skip)]
    pub alterations: Vec<Alteration>,
    pub source_files: Vec<String>,
}

impl TableSchema {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Default::default()
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.name == name)
    }

    pub fn primary_key(&self) -> Option<&Field> {
        self.fields.iter().find(|f| f.primary_key)
    }

    /// All relationships that emit a foreign-key constraint. `has_many`
    /// markers live in a separate list and never reach here.
    pub fn foreign_keys(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.iter()
    }
}
