// src/schema/mod.rs

//! The schema compiler front end: the in-memory model (C1), the fluent
//! builder fragments append to (C2), and the merger that turns many
//! fragments into one validated `SchemaSet` per table (C3).

pub mod builder;
pub mod merger;
pub mod model;

pub use builder::{FieldOpts, ForeignOpts, Fragment, NamedFragment, SchemaBuilder};
pub use merger::{merge, SchemaSet};
pub use model::{
    Alteration, CreateInput, Field, FieldType, HasManyMarker, Index, RefAction, Relationship,
    RelationshipKind, TableSchema,
};
