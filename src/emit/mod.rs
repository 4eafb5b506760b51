// src/emit/mod.rs

//! SQL emitter (C6): turns each `Change` into one up/down migration file
//! pair targeting PostgreSQL, with a deterministic name, a monotonically
//! assigned timestamp, and a checksum-stable body.

mod postgres_sql;

use crate::diff::{Change, ChangeSet};
use crate::error::{Error, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One emitted migration: the SQL body for `up` and `down`, plus the names
/// the runner will later discover on disk.
#[derive(Debug, Clone)]
pub struct EmittedMigration {
    pub timestamp: i64,
    pub slug: String,
    pub table: String,
    pub kind: String,
    pub up_name: String,
    pub down_name: String,
    pub up_body: String,
    pub down_body: String,
}

impl EmittedMigration {
    /// The up-file's base name without extension — this is the `name`
    /// column value stored in `_fluent_migrations`.
    pub fn base_name(&self) -> String {
        format!("{}_{}", self.timestamp, self.slug)
    }

    fn header(&self, generated_at: &str) -> String {
        format!(
            "-- Migration: {}\n-- Generated: {}\n-- Table: {}\n-- Type: {}\n",
            self.base_name(),
            generated_at,
            self.table,
            self.kind,
        )
    }

    /// Full up-file content: header followed by the SQL body.
    pub fn up_content(&self, generated_at: &str) -> String {
        format!("{}\n{}", self.header(generated_at), self.up_body)
    }

    /// Full down-file content: header followed by the SQL body.
    pub fn down_content(&self, generated_at: &str) -> String {
        format!("{}\n{}", self.header(generated_at), self.down_body)
    }
}

/// Emit every change in `changes` into `(up, down)` SQL bodies, assigning
/// timestamps from a counter seeded at `next_timestamp`. Deterministic:
/// identical inputs and seed produce byte-identical bodies (headers vary
/// only in their timestamp and are excluded from the checksum, see
/// `runner::checksum`).
pub fn emit(changes: &ChangeSet, next_timestamp: i64) -> Vec<EmittedMigration> {
    let mut timestamp = next_timestamp;
    let mut out = Vec::with_capacity(changes.len());
    for change in changes {
        let (kind, slug, up_body, down_body) = postgres_sql::render(change);
        out.push(EmittedMigration {
            timestamp,
            slug,
            table: change.table().to_string(),
            kind,
            up_name: String::new(),
            down_name: String::new(),
            up_body,
            down_body,
        });
        timestamp += 1;
    }

    for m in &mut out {
        m.up_name = format!("{}.sql", m.base_name());
        m.down_name = format!("{}_down.sql", m.base_name());
    }

    out
}

/// Scan `migrations_dir` for the highest timestamp already in use, so a new
/// emission call never reuses or rewinds a timestamp.
pub fn next_timestamp_seed(migrations_dir: &Path) -> Result<i64> {
    if !migrations_dir.exists() {
        return Ok(Utc::now().timestamp());
    }

    let mut max_seen: i64 = 0;
    for entry in std::fs::read_dir(migrations_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some((ts, _)) = name.split_once('_') {
            if let Ok(ts) = ts.parse::<i64>() {
                max_seen = max_seen.max(ts);
            }
        }
    }

    Ok(if max_seen == 0 {
        Utc::now().timestamp()
    } else {
        max_seen + 1
    })
}

/// Write every emitted migration to `migrations_dir`. Migration files are
/// write-once: an existing filename is refused rather than overwritten.
pub fn write_all(migrations_dir: &Path, migrations: &[EmittedMigration]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(migrations_dir).map_err(|e| Error::EmitIo {
        path: migrations_dir.display().to_string(),
        source: e,
    })?;

    let generated_at = Utc::now().to_rfc3339();
    let mut written = Vec::with_capacity(migrations.len() * 2);

    for m in migrations {
        let up_path = migrations_dir.join(&m.up_name);
        let down_path = migrations_dir.join(&m.down_name);

        if up_path.exists() || down_path.exists() {
            return Err(Error::EmitIo {
                path: up_path.display().to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "migration file already exists; migrations are write-once",
                ),
            });
        }

        debug!("writing {}", up_path.display());
        std::fs::write(&up_path, m.up_content(&generated_at)).map_err(|e| Error::EmitIo {
            path: up_path.display().to_string(),
            source: e,
        })?;
        std::fs::write(&down_path, m.down_content(&generated_at)).map_err(|e| Error::EmitIo {
            path: down_path.display().to_string(),
            source: e,
        })?;

        written.push(up_path);
        written.push(down_path);
    }

    info!("wrote {} migration file(s) to {}", migrations.len(), migrations_dir.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CreateInput, Field, FieldType, TableSchema};

    fn users_table() -> TableSchema {
        let mut t = TableSchema::new("users");
        t.fields.push(Field {
            name: "id".to_string(),
            field_type: FieldType::Uuid,
            primary_key: true,
            unique: true,
            not_null: true,
            create_input: CreateInput::Excluded,
            update_input: false,
            redacted: false,
            default_value: Some("gen_random_uuid()".to_string()),
            auto_generated: true,
            auto_generate_type: None,
        });
        t.fields.push(Field {
            name: "email".to_string(),
            field_type: FieldType::Text,
            primary_key: false,
            unique: true,
            not_null: true,
            create_input: CreateInput::Required,
            update_input: true,
            redacted: false,
            default_value: None,
            auto_generated: false,
            auto_generate_type: None,
        });
        t.fields.push(Field {
            name: "name".to_string(),
            field_type: FieldType::Text,
            primary_key: false,
            unique: false,
            not_null: true,
            create_input: CreateInput::Required,
            update_input: true,
            redacted: false,
            default_value: None,
            auto_generated: false,
            auto_generate_type: None,
        });
        t
    }

    #[test]
    fn scenario_a_create_table() {
        let changes = vec![Change::CreateTable(users_table())];
        let emitted = emit(&changes, 1000);
        assert_eq!(emitted.len(), 1);
        let m = &emitted[0];
        assert_eq!(m.base_name(), "1000_create_users");
        assert!(m.up_body.contains(r#"CREATE EXTENSION IF NOT EXISTS "uuid-ossp""#));
        assert!(m.up_body.contains("CREATE TABLE users"));
        assert!(m.up_body.contains("id UUID PRIMARY KEY DEFAULT gen_random_uuid()"));
        assert!(m.up_body.contains("email TEXT NOT NULL UNIQUE"));
        assert!(m.up_body.contains("name TEXT NOT NULL"));
        assert_eq!(m.down_body.trim(), "DROP TABLE IF EXISTS users CASCADE;");
    }

    #[test]
    fn timestamps_are_successive() {
        let changes = vec![
            Change::CreateTable(users_table()),
            Change::DropTable(users_table()),
        ];
        let emitted = emit(&changes, 5000);
        assert_eq!(emitted[0].timestamp, 5000);
        assert_eq!(emitted[1].timestamp, 5001);
    }

    #[test]
    fn emission_is_deterministic() {
        let changes = vec![Change::CreateTable(users_table())];
        let a = emit(&changes, 42);
        let b = emit(&changes, 42);
        assert_eq!(a[0].up_body, b[0].up_body);
        assert_eq!(a[0].down_body, b[0].down_body);
    }
}
