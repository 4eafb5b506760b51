// src/snapshot.rs

//! Snapshot store (C4): persists the merged `SchemaSet` as the diff
//! baseline for the next generation. Writes are atomic (temp file + rename)
//! so a crash mid-write never corrupts the prior snapshot.

use crate::error::{Error, Result};
use crate::schema::SchemaSet;
use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// The only snapshot format version this compiler understands.
pub const SNAPSHOT_VERSION: i32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotDocument {
    version: i32,
    generated_at: String,
    tables: IndexMap<String, crate::schema::TableSchema>,
}

/// Load the prior snapshot from `path`. A missing file yields an empty
/// `SchemaSet` (the first generation has no baseline to diff against).
pub fn load(path: impl AsRef<Path>) -> Result<SchemaSet> {
    let path = path.as_ref();
    if !path.exists() {
        info!("no snapshot at {}, starting from an empty schema set", path.display());
        return Ok(SchemaSet::new());
    }

    let content = std::fs::read_to_string(path)?;
    let doc: SnapshotDocument = serde_json::from_str(&content)
        .map_err(|e| Error::SnapshotMalformed(format!("{}: {e}", path.display())))?;

    if doc.version != SNAPSHOT_VERSION {
        return Err(Error::SnapshotVersionUnsupported {
            found: doc.version,
            expected: SNAPSHOT_VERSION,
        });
    }

    let mut set = SchemaSet::new();
    for (name, mut table) in doc.tables {
        table.table_name = name.clone();
        set.insert(name, table);
    }

    debug!("loaded snapshot with {} tables from {}", set.len(), path.display());
    Ok(set)
}

/// Write `set` to `path`, replacing any prior snapshot. Field order within
/// each table mirrors the in-memory order, so an unchanged schema produces
/// a byte-identical file.
pub fn save(path: impl AsRef<Path>, set: &SchemaSet) -> Result<()> {
    let path = path.as_ref();
    if set.is_empty() {
        warn!("saving an empty schema set to {}", path.display());
    }

    let doc = SnapshotDocument {
        version: SNAPSHOT_VERSION,
        generated_at: Utc::now().to_rfc3339(),
        tables: set.clone(),
    };

    let body = serde_json::to_string_pretty(&doc)?;

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, body).map_err(|e| Error::EmitIo {
        path: tmp_path.display().to_string(),
        source: e,
    })?;
    std::fs::rename(&tmp_path, path).map_err(|e| Error::EmitIo {
        path: path.display().to_string(),
        source: e,
    })?;

    info!("wrote snapshot for {} tables to {}", set.len(), path.display());
    Ok(())
}
