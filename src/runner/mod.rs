// src/runner/mod.rs

//! Migration runner (C7): discovers migration files, reconciles them
//! against the `_fluent_migrations` tracking table, and applies pending
//! migrations one at a time, each inside its own transaction.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CREATE_TRACKING_TABLE: &str = "
CREATE TABLE IF NOT EXISTS _fluent_migrations (
    id SERIAL PRIMARY KEY,
    name TEXT UNIQUE NOT NULL,
    checksum TEXT NOT NULL,
    applied_at TIMESTAMP NOT NULL DEFAULT now()
)";

/// One migration discovered on disk: an up file and, if present, its
/// paired `_down.sql`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub base_name: String,
    pub timestamp: i64,
    pub up_path: PathBuf,
    pub down_path: Option<PathBuf>,
}

/// One row from `_fluent_migrations`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    pub name: String,
    pub checksum: String,
}

/// Applied/pending names, safe to print without touching the database
/// beyond the tracking-table read already done during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub applied: Vec<String>,
    pub pending: Vec<String>,
}

/// `sha256` hex digest of `body`, the canonical checksum domain for the
/// tracking table: the hash covers the SQL body post-header.
pub fn checksum(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}

/// Strip trailing whitespace from each line, so editor reflow of an
/// already-applied file doesn't trip a tamper alarm.
pub fn normalize(body: &str) -> String {
    body.lines().map(|line| line.trim_end()).collect::<Vec<_>>().join("\n")
}

/// Drop the `-- Migration:` / `-- Generated:` / `-- Table:` / `-- Type:`
/// header block a migration file begins with, leaving only the SQL body.
pub fn strip_header(content: &str) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let mut body_start = 0;
    for (i, line) in lines.iter().enumerate() {
        if line.starts_with("--") || line.trim().is_empty() {
            body_start = i + 1;
        } else {
            break;
        }
    }
    lines[body_start..].join("\n")
}

/// Parse a migration filename of the form `^\d+_[a-z0-9_]+(_down)?\.sql$`.
/// Returns `(timestamp, slug, is_down)`.
fn parse_filename(name: &str) -> Option<(i64, String, bool)> {
    let stem = name.strip_suffix(".sql")?;
    let (stem, is_down) = match stem.strip_suffix("_down") {
        Some(s) => (s, true),
        None => (stem, false),
    };
    let (ts_part, slug) = stem.split_once('_')?;
    if ts_part.is_empty() || !ts_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if slug.is_empty() || !slug.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_') {
        return None;
    }
    let timestamp: i64 = ts_part.parse().ok()?;
    Some((timestamp, slug.to_string(), is_down))
}

/// List every migration in `migrations_dir`, pairing up/down files by base
/// name, sorted ascending by `(timestamp, base_name)`. Entries
/// with no up file (an orphaned `_down.sql`) are dropped.
pub fn discover(migrations_dir: &Path) -> Result<Vec<MigrationFile>> {
    if !migrations_dir.exists() {
        return Ok(Vec::new());
    }

    let mut by_base: std::collections::HashMap<String, MigrationFile> = std::collections::HashMap::new();
    for entry in std::fs::read_dir(migrations_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let Some((timestamp, slug, is_down)) = parse_filename(&name) else {
            continue;
        };
        let base_name = format!("{timestamp}_{slug}");
        let path = entry.path();
        let file = by_base.entry(base_name.clone()).or_insert_with(|| MigrationFile {
            base_name: base_name.clone(),
            timestamp,
            up_path: PathBuf::new(),
            down_path: None,
        });
        if is_down {
            file.down_path = Some(path);
        } else {
            file.up_path = path;
        }
    }

    let mut files: Vec<MigrationFile> = by_base
        .into_values()
        .filter(|f| f.up_path.as_os_str().len() > 0)
        .collect();
    files.sort_by(|a, b| (a.timestamp, &a.base_name).cmp(&(b.timestamp, &b.base_name)));
    Ok(files)
}

/// Verify one applied row's recorded checksum against the up file's
/// current, normalized, header-stripped body.
fn verify_checksum(record: &MigrationRecord, up_content: &str) -> Result<()> {
    let actual = checksum(&normalize(&strip_header(up_content)));
    if actual != record.checksum {
        return Err(Error::MigrationTampered {
            name: record.name.clone(),
            stored: record.checksum.clone(),
            actual,
        });
    }
    Ok(())
}

/// The files not yet present in `applied`, preserving discovery order.
fn pending_files(files: Vec<MigrationFile>, applied: &[MigrationRecord]) -> Vec<MigrationFile> {
    let applied_names: HashSet<&str> = applied.iter().map(|r| r.name.as_str()).collect();
    files
        .into_iter()
        .filter(|f| !applied_names.contains(f.base_name.as_str()))
        .collect()
}

/// Owns the single database connection a run operates against. Constructed
/// fresh from the environment and discarded at the end of the run — no
/// global mutable state.
pub struct Runner {
    client: postgres::Client,
    migrations_dir: PathBuf,
}

impl Runner {
    pub fn connect(config: &crate::config::Config, migrations_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = config.to_postgres_config().connect(postgres::NoTls)?;
        let mut runner = Self {
            client,
            migrations_dir: migrations_dir.into(),
        };
        runner.ensure_tracking_table()?;
        Ok(runner)
    }

    fn ensure_tracking_table(&mut self) -> Result<()> {
        self.client.batch_execute(CREATE_TRACKING_TABLE)?;
        Ok(())
    }

    fn applied_records(&mut self) -> Result<Vec<MigrationRecord>> {
        let rows = self.client.query("SELECT name, checksum FROM _fluent_migrations ORDER BY id", &[])?;
        Ok(rows
            .iter()
            .map(|row| MigrationRecord {
                name: row.get(0),
                checksum: row.get(1),
            })
            .collect())
    }

    /// Discover files, read applied rows, and verify every applied
    /// migration's checksum. Returns `(applied, pending)`. Reconciliation
    /// never writes — `status` uses it directly, `up`/`down` use it as the
    /// gate before any transaction opens.
    fn reconcile(&mut self) -> Result<(Vec<MigrationRecord>, Vec<MigrationFile>)> {
        let files = discover(&self.migrations_dir)?;
        let files_by_name: std::collections::HashMap<&str, &MigrationFile> =
            files.iter().map(|f| (f.base_name.as_str(), f)).collect();
        let applied = self.applied_records()?;

        for record in &applied {
            let file = files_by_name
                .get(record.name.as_str())
                .ok_or_else(|| Error::MigrationMissing(record.name.clone()))?;
            let content = std::fs::read_to_string(&file.up_path)?;
            verify_checksum(record, &content)?;
        }

        let pending = pending_files(files, &applied);
        Ok((applied, pending))
    }

    /// Apply every pending migration, in order, each in its own
    /// transaction. Returns the names applied. A no-op run (nothing
    /// pending) returns an empty vector.
    pub fn up(&mut self) -> Result<Vec<String>> {
        let (_, pending) = self.reconcile()?;
        let mut applied = Vec::with_capacity(pending.len());

        for file in pending {
            let content = std::fs::read_to_string(&file.up_path)?;
            let body = normalize(&strip_header(&content));
            let sum = checksum(&body);

            info!("applying migration {}", file.base_name);
            let fail = |source: postgres::Error| Error::MigrationFailed {
                name: file.base_name.clone(),
                source,
            };

            let mut tx = self.client.transaction().map_err(fail)?;
            tx.batch_execute(&body).map_err(fail)?;
            tx.execute(
                "INSERT INTO _fluent_migrations (name, checksum) VALUES ($1, $2)",
                &[&file.base_name, &sum],
            )
            .map_err(fail)?;
            tx.commit().map_err(fail)?;

            applied.push(file.base_name);
        }

        Ok(applied)
    }

    /// List applied and pending migrations without applying anything.
    pub fn status(&mut self) -> Result<StatusReport> {
        let (applied, pending) = self.reconcile()?;
        Ok(StatusReport {
            applied: applied.into_iter().map(|r| r.name).collect(),
            pending: pending.into_iter().map(|f| f.base_name).collect(),
        })
    }

    /// Roll back the most recently applied migration using its paired
    /// `_down.sql`. Single-step only; there is no multi-step rollback.
    pub fn down(&mut self) -> Result<String> {
        let (applied, _) = self.reconcile()?;
        let last = applied
            .last()
            .cloned()
            .ok_or_else(|| Error::RollbackUnavailable("no migrations are applied".to_string()))?;

        let files = discover(&self.migrations_dir)?;
        let file = files
            .into_iter()
            .find(|f| f.base_name == last.name)
            .ok_or_else(|| Error::MigrationMissing(last.name.clone()))?;
        let down_path = file
            .down_path
            .ok_or_else(|| Error::RollbackUnavailable(last.name.clone()))?;

        let content = std::fs::read_to_string(&down_path)?;
        let body = normalize(&strip_header(&content));

        let fail = |source: postgres::Error| Error::MigrationFailed {
            name: last.name.clone(),
            source,
        };

        debug!("rolling back {}", last.name);
        let mut tx = self.client.transaction().map_err(fail)?;
        tx.batch_execute(&body).map_err(fail)?;
        tx.execute("DELETE FROM _fluent_migrations WHERE name = $1", &[&last.name])
            .map_err(fail)?;
        tx.commit().map_err(fail)?;

        warn!("rolled back {}", last.name);
        Ok(last.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn up_file(content: &str) -> String {
        format!(
            "-- Migration: 1000_create_users\n-- Generated: 2024-01-01T00:00:00Z\n-- Table: users\n-- Type: CreateTable\n\n{content}"
        )
    }

    #[test]
    fn parses_valid_up_and_down_names() {
        assert_eq!(parse_filename("1000_create_users.sql"), Some((1000, "create_users".to_string(), false)));
        assert_eq!(parse_filename("1000_create_users_down.sql"), Some((1000, "create_users".to_string(), true)));
    }

    #[test]
    fn rejects_malformed_names() {
        assert_eq!(parse_filename("create_users.sql"), None);
        assert_eq!(parse_filename("1000-create-users.sql"), None);
        assert_eq!(parse_filename("1000_create_users.txt"), None);
    }

    #[test]
    fn discover_pairs_up_and_down_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("1000_create_users.sql"), "CREATE TABLE users ();").unwrap();
        std::fs::write(dir.path().join("1000_create_users_down.sql"), "DROP TABLE users;").unwrap();
        std::fs::write(dir.path().join("README.md"), "not a migration").unwrap();

        let files = discover(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].base_name, "1000_create_users");
        assert!(files[0].down_path.is_some());
    }

    #[test]
    fn discover_orders_by_timestamp_then_name() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("2000_add_index_email.sql"), "x").unwrap();
        std::fs::write(dir.path().join("1000_create_users.sql"), "x").unwrap();

        let files = discover(dir.path()).unwrap();
        assert_eq!(files[0].base_name, "1000_create_users");
        assert_eq!(files[1].base_name, "2000_add_index_email");
    }

    #[test]
    fn checksum_ignores_trailing_whitespace_reflow() {
        let a = normalize("CREATE TABLE users ();  \n");
        let b = normalize("CREATE TABLE users ();\n");
        assert_eq!(checksum(&a), checksum(&b));
    }

    #[test]
    fn checksum_changes_with_real_content_change() {
        let a = checksum(&normalize("CREATE TABLE users ();"));
        let b = checksum(&normalize("CREATE TABLE posts ();"));
        assert_ne!(a, b);
    }

    #[test]
    fn strip_header_drops_comment_block() {
        let content = up_file("CREATE TABLE users ();");
        assert_eq!(strip_header(&content), "CREATE TABLE users ();");
    }

    #[test]
    fn tampered_body_fails_verification() {
        let record = MigrationRecord {
            name: "1000_create_users".to_string(),
            checksum: checksum(&normalize("CREATE TABLE users ();")),
        };
        let tampered = up_file("CREATE TABLE users (evil_column text);");
        let err = verify_checksum(&record, &tampered).unwrap_err();
        assert!(matches!(err, Error::MigrationTampered { .. }));
    }

    #[test]
    fn untampered_body_verifies() {
        let body = "CREATE TABLE users ();";
        let record = MigrationRecord {
            name: "1000_create_users".to_string(),
            checksum: checksum(&normalize(body)),
        };
        let content = up_file(body);
        assert!(verify_checksum(&record, &content).is_ok());
    }

    #[test]
    fn pending_excludes_applied() {
        let files = vec![
            MigrationFile {
                base_name: "1000_create_users".to_string(),
                timestamp: 1000,
                up_path: PathBuf::from("1000_create_users.sql"),
                down_path: None,
            },
            MigrationFile {
                base_name: "2000_add_index_email".to_string(),
                timestamp: 2000,
                up_path: PathBuf::from("2000_add_index_email.sql"),
                down_path: None,
            },
        ];
        let applied = vec![MigrationRecord {
            name: "1000_create_users".to_string(),
            checksum: "deadbeef".to_string(),
        }];

        let pending = pending_files(files, &applied);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].base_name, "2000_add_index_email");
    }
}
