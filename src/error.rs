// src/error.rs

use thiserror::Error;

/// Core error types for FluentORM
#[derive(Error, Debug)]
pub enum Error {
    /// A merged table or field violates one of the schema invariants.
    #[error("schema error: table '{table}', field '{field}': {message}")]
    Schema {
        table: String,
        field: String,
        message: String,
    },

    /// The persisted snapshot could not be parsed.
    #[error("snapshot malformed: {0}")]
    SnapshotMalformed(String),

    /// The persisted snapshot declares a version this compiler doesn't understand.
    #[error("snapshot version {found} is unsupported (expected {expected})")]
    SnapshotVersionUnsupported { found: i32, expected: i32 },

    /// The diff engine could not produce a deterministic ordering.
    #[error("diff ambiguous: {0}")]
    DiffAmbiguous(String),

    /// A filesystem failure while writing a migration or snapshot file.
    #[error("emit I/O error writing {path}: {source}")]
    EmitIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// An applied migration's file is missing or its checksum no longer matches.
    #[error("migration '{name}' has been tampered with: stored checksum {stored}, file checksum {actual}")]
    MigrationTampered {
        name: String,
        stored: String,
        actual: String,
    },

    /// An applied migration's up-file is no longer present on disk.
    #[error("migration '{0}' is recorded as applied but its file is missing")]
    MigrationMissing(String),

    /// The database rejected an up or down file.
    #[error("migration '{name}' failed: {source}")]
    MigrationFailed {
        name: String,
        #[source]
        source: postgres::Error,
    },

    /// `down` was requested but no paired `_down.sql` file exists.
    #[error("no down migration available for '{0}'")]
    RollbackUnavailable(String),

    /// A required `FLUENT_DB_*` environment variable is absent.
    #[error("missing required environment variable: {0}")]
    MissingConfig(String),

    /// I/O errors not otherwise categorized above.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors for the snapshot document.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors surfaced directly by the PostgreSQL driver outside a specific
    /// migration context (connection setup, tracking-table queries).
    #[error("database error: {0}")]
    Database(#[from] postgres::Error),
}

/// Result type alias using FluentORM's Error type.
pub type Result<T> = std::result::Result<T, Error>;
