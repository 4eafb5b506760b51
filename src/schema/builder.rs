// src/schema/builder.rs

//! Fluent schema builder (C2).
//!
//! Fragments populate a `TableSchema` by calling the typed factory methods
//! below. Every call here is a pure append to the in-memory structure; no
//! validation happens at this layer. The merger (`schema::merger`) is where
//! invariants are checked, once across every fragment contributing to a
//! table, so a single pass can report all diagnostics with full context.

use super::model::{
    Alteration, CreateInput, Field, FieldType, HasManyMarker, Index, RefAction, Relationship,
    RelationshipKind, TableSchema,
};

/// Options shared by every field factory, built with the struct-update
/// pattern so a fragment only names the attributes it cares about.
#[derive(Debug, Clone, Default)]
pub struct FieldOpts {
    pub primary_key: bool,
    pub unique: bool,
    pub not_null: bool,
    pub create_input: Option<CreateInput>,
    pub update_input: Option<bool>,
    pub redacted: bool,
    pub default_value: Option<String>,
    pub auto_generated: bool,
    pub auto_generate_type: Option<String>,
}

impl FieldOpts {
    fn into_field(self, name: &str, field_type: FieldType) -> Field {
        Field {
            name: name.to_string(),
            field_type,
            primary_key: self.primary_key,
            unique: self.unique,
            not_null: self.not_null || self.primary_key,
            create_input: self.create_input.unwrap_or(CreateInput::Required),
            update_input: self.update_input.unwrap_or(true),
            redacted: self.redacted,
            default_value: self.default_value,
            auto_generated: self.auto_generated,
            auto_generate_type: self.auto_generate_type,
        }
    }
}

/// Options for `foreign`/`belongsTo`/`hasOne`/`manyToMany`. `on_delete`/
/// `on_update` are left unset (`None`) unless the caller names them
/// explicitly, so each convenience method can apply its own documented
/// default: `no_action` everywhere except `many_to_many`'s `on_delete`,
/// which defaults to `cascade`.
#[derive(Debug, Clone)]
pub struct ForeignOpts {
    pub references_table: String,
    pub references_column: String,
    pub on_delete: Option<RefAction>,
    pub on_update: Option<RefAction>,
}

impl ForeignOpts {
    pub fn to(references_table: impl Into<String>) -> Self {
        Self {
            references_table: references_table.into(),
            references_column: "id".to_string(),
            on_delete: None,
            on_update: None,
        }
    }

    pub fn references_column(mut self, column: impl Into<String>) -> Self {
        self.references_column = column.into();
        self
    }

    pub fn on_delete(mut self, action: RefAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    pub fn on_update(mut self, action: RefAction) -> Self {
        self.on_update = Some(action);
        self
    }
}

/// The append-only builder handed to fragments inside `build()`.
pub struct SchemaBuilder<'a> {
    table: &'a mut TableSchema,
}

impl<'a> SchemaBuilder<'a> {
    pub fn new(table: &'a mut TableSchema) -> Self {
        Self { table }
    }

    fn push_field(&mut self, name: &str, field_type: FieldType, opts: FieldOpts) -> &mut Self {
        self.table.fields.push(opts.into_field(name, field_type));
        self
    }

    pub fn uuid(&mut self, name: &str, opts: FieldOpts) -> &mut Self {
        self.push_field(name, FieldType::Uuid, opts)
    }

    pub fn string(&mut self, name: &str, opts: FieldOpts) -> &mut Self {
        self.push_field(name, FieldType::Text, opts)
    }

    pub fn integer(&mut self, name: &str, opts: FieldOpts) -> &mut Self {
        self.push_field(name, FieldType::Int4, opts)
    }

    pub fn big_int(&mut self, name: &str, opts: FieldOpts) -> &mut Self {
        self.push_field(name, FieldType::Int8, opts)
    }

    pub fn float(&mut self, name: &str, opts: FieldOpts) -> &mut Self {
        self.push_field(name, FieldType::Float4, opts)
    }

    pub fn numeric(&mut self, name: &str, opts: FieldOpts) -> &mut Self {
        self.push_field(name, FieldType::Numeric, opts)
    }

    pub fn boolean(&mut self, name: &str, opts: FieldOpts) -> &mut Self {
        self.push_field(name, FieldType::Bool, opts)
    }

    pub fn date_time(&mut self, name: &str, opts: FieldOpts) -> &mut Self {
        self.push_field(name, FieldType::Timestamp, opts)
    }

    pub fn json(&mut self, name: &str, opts: FieldOpts) -> &mut Self {
        self.push_field(name, FieldType::Json, opts)
    }

    pub fn jsonb(&mut self, name: &str, opts: FieldOpts) -> &mut Self {
        self.push_field(name, FieldType::Jsonb, opts)
    }

    pub fn binary(&mut self, name: &str, opts: FieldOpts) -> &mut Self {
        self.push_field(name, FieldType::Bytea, opts)
    }

    fn push_relationship(
        &mut self,
        name: &str,
        column: &str,
        kind: RelationshipKind,
        opts: ForeignOpts,
        default_on_delete: RefAction,
    ) -> &mut Self {
        self.table.relationships.push(Relationship {
            name: name.to_string(),
            column: column.to_string(),
            references_table: opts.references_table,
            references_column: opts.references_column,
            kind,
            on_delete: opts.on_delete.unwrap_or(default_on_delete),
            on_update: opts.on_update.unwrap_or(RefAction::NoAction),
        });
        self
    }

    /// Register a raw relationship, defaulting `on_delete`/`on_update` to
    /// `no_action` unless `opts` names them. The convenience methods below
    /// cover the common cases, each with its own documented default.
    pub fn foreign(&mut self, name: &str, column: &str, kind: RelationshipKind, opts: ForeignOpts) -> &mut Self {
        self.push_relationship(name, column, kind, opts, RefAction::NoAction)
    }

    /// `many_to_one`: the common "child references parent" relationship.
    pub fn belongs_to(&mut self, name: &str, column: &str, opts: ForeignOpts) -> &mut Self {
        self.push_relationship(name, column, RelationshipKind::ManyToOne, opts, RefAction::NoAction)
    }

    /// `one_to_one`: like `belongsTo` but the local column must be unique.
    pub fn has_one(&mut self, name: &str, column: &str, opts: ForeignOpts) -> &mut Self {
        self.push_relationship(name, column, RelationshipKind::OneToOne, opts, RefAction::NoAction)
    }

    /// `many_to_many`, defaulting `on_delete` to `cascade`.
    pub fn many_to_many(&mut self, name: &str, column: &str, opts: ForeignOpts) -> &mut Self {
        self.push_relationship(name, column, RelationshipKind::ManyToMany, opts, RefAction::Cascade)
    }

    /// The inverse side of a `belongsTo`/`hasOne`: carries no DDL, used only
    /// to drive model codegen navigation.
    pub fn has_many(&mut self, name: &str, foreign_table: &str, foreign_column: &str) -> &mut Self {
        self.table.has_many.push(HasManyMarker {
            name: name.to_string(),
            foreign_table: foreign_table.to_string(),
            foreign_column: foreign_column.to_string(),
        });
        self
    }

    /// Alias for `has_many` returning a `Vec`-flavored relationship marker;
    /// identical on the wire, offered for readability at call sites that
    /// model a collection explicitly.
    pub fn has_many_list(&mut self, name: &str, foreign_table: &str, foreign_column: &str) -> &mut Self {
        self.has_many(name, foreign_table, foreign_column)
    }

    /// Register a set of indexes in one call.
    pub fn add_indexes(&mut self, indexes: impl IntoIterator<Item = Index>) -> &mut Self {
        self.table.indexes.extend(indexes);
        self
    }

    /// Defer a sparse field override until after every fragment's `build()`
    /// for this table has completed.
    pub fn alter_field(&mut self, alteration: Alteration) -> &mut Self {
        self.table.alterations.push(alteration);
        self
    }

    pub fn alter_fields(&mut self, alterations: impl IntoIterator<Item = Alteration>) -> &mut Self {
        self.table.alterations.extend(alterations);
        self
    }
}

/// The contract a schema fragment file implements. `identifier`
/// is the lexicographic sort key the merger groups and orders fragments by
/// (typically the source file's name, numeric prefix first); `table_name`
/// is a constant; `build` is the side-effecting population step invoked by
/// the merger once per contributing fragment.
pub trait Fragment {
    fn identifier(&self) -> &str;
    fn table_name(&self) -> &str;
    fn build(&self, builder: &mut SchemaBuilder<'_>);
}

/// A concrete fragment built from a closure, the shape schema-directory
/// discovery constructs one of per file.
pub struct NamedFragment {
    pub identifier: String,
    pub table_name: String,
    pub build: Box<dyn Fn(&mut SchemaBuilder<'_>) + Send + Sync>,
}

impl Fragment for NamedFragment {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn table_name(&self) -> &str {
        &self.table_name
    }

    fn build(&self, builder: &mut SchemaBuilder<'_>) {
        (self.build)(builder)
    }
}
