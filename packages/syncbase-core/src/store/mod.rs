//! Storage provisioning and the log store.
//!
//! Provisioning validates the schema, acquires the single-writer lease,
//! writes the versioned container manifest, and replays the change log
//! into the in-memory arena with its transient indexes.

mod index;
mod log;

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use syncbase_types::{validate_schema, TableDescriptor};

use crate::change::ChangeRecord;
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use index::LogIndex;
use log::ChangeLog;

const MANIFEST_FILE: &str = "schema.json";
const LOG_FILE: &str = "changes.log";
const LOCK_FILE: &str = "LOCK";

/// Name of the system container holding the change log.
pub const CHANGES_CONTAINER: &str = "_changes";

/// Provisioning manifest written to `schema.json`. Describes the
/// containers and secondary indexes the store was opened with; tables
/// hold no materialized rows, so their entries are shape metadata only.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoreManifest {
    /// Schema version; re-opening with the same version is a no-op
    pub version: u32,
    /// One container per table, keyed by table name
    pub containers: BTreeMap<String, ContainerManifest>,
    /// The `_changes` system container
    pub changes: ChangesManifest,
}

/// Per-table container entry.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ContainerManifest {
    /// Primary-key column the container is keyed by
    pub key_path: String,
    /// Secondary indexes: non-primary columns with supported scalar tags
    pub indexes: Vec<String>,
}

/// The `_changes` container entry.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ChangesManifest {
    /// Container name (always [`CHANGES_CONTAINER`])
    pub name: String,
    /// Auto-incrementing key
    pub key_path: String,
    /// Secondary indexes over change-record fields
    pub indexes: Vec<IndexManifest>,
}

/// One secondary index over the change log.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct IndexManifest {
    /// Index name
    pub name: String,
    /// Record fields the index covers
    pub key_path: Vec<String>,
    /// Whether the index enforces uniqueness
    pub unique: bool,
}

impl StoreManifest {
    fn build(version: u32, tables: &[TableDescriptor]) -> Result<Self> {
        let mut containers = BTreeMap::new();
        for table in tables {
            let primary = table.primary_column()?;
            containers.insert(
                table.name.clone(),
                ContainerManifest {
                    key_path: primary.name.clone(),
                    indexes: table
                        .index_columns()
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                },
            );
        }

        Ok(Self {
            version,
            containers,
            changes: ChangesManifest {
                name: CHANGES_CONTAINER.to_string(),
                key_path: "sequence".to_string(),
                indexes: vec![
                    IndexManifest {
                        name: "correlation_id".to_string(),
                        key_path: vec!["correlation_id".to_string()],
                        unique: true,
                    },
                    IndexManifest {
                        name: "object_store".to_string(),
                        key_path: vec!["object_store".to_string()],
                        unique: false,
                    },
                    IndexManifest {
                        name: "object_id".to_string(),
                        key_path: vec!["object_id".to_string()],
                        unique: false,
                    },
                    IndexManifest {
                        name: "object_store_object_id".to_string(),
                        key_path: vec!["object_store".to_string(), "object_id".to_string()],
                        unique: false,
                    },
                    IndexManifest {
                        name: "synced".to_string(),
                        key_path: vec!["synced".to_string()],
                        unique: false,
                    },
                ],
            },
        })
    }
}

/// Single-writer lease over the data directory. Held from open until the
/// store is dropped; a second opener fails instead of corrupting the log.
#[derive(Debug)]
struct WriterLease {
    path: PathBuf,
}

impl WriterLease {
    fn acquire(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(LOCK_FILE);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    SyncError::StorageOpen {
                        path: path.clone(),
                        reason: "store is held by another writer".to_string(),
                    }
                } else {
                    SyncError::StorageOpen {
                        path: path.clone(),
                        reason: format!("failed to acquire writer lease: {}", e),
                    }
                }
            })?;
        let _ = writeln!(file, "{}", std::process::id());
        Ok(Self { path })
    }
}

impl Drop for WriterLease {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release writer lease");
        }
    }
}

/// The provisioned store: durable arena plus transient indexes, guarded
/// upstream by the connection lock.
#[derive(Debug)]
pub(crate) struct LogStore {
    log: ChangeLog,
    index: LogIndex,
    _lease: WriterLease,
}

impl LogStore {
    /// Idempotently provisions the store and replays the log.
    ///
    /// Schema validation runs first: a descriptor without exactly one
    /// primary-key column aborts the open before any file is touched.
    pub fn open(config: &SyncConfig, tables: &[TableDescriptor]) -> Result<Self> {
        validate_schema(tables)?;
        let manifest = StoreManifest::build(config.schema_version, tables)?;

        fs::create_dir_all(&config.data_dir).map_err(|e| SyncError::StorageOpen {
            path: config.data_dir.clone(),
            reason: format!("failed to create data directory: {}", e),
        })?;
        let lease = WriterLease::acquire(&config.data_dir)?;

        Self::provision_manifest(&config.data_dir, manifest)?;

        let log = ChangeLog::open(&config.data_dir.join(LOG_FILE))?;
        let index = LogIndex::rebuild(log.records())?;

        tracing::debug!(
            data_dir = %config.data_dir.display(),
            tables = tables.len(),
            records = log.records().len(),
            "store opened"
        );

        Ok(Self {
            log,
            index,
            _lease: lease,
        })
    }

    /// Appends a record to the log and registers it in the indexes.
    pub fn append(&mut self, record: ChangeRecord) -> Result<u64> {
        let position = self.log.records().len();
        let sequence = self.log.append(record)?;
        // The arena grew by exactly one record at `position`.
        self.index
            .insert(position, &self.log.records()[position])?;
        Ok(sequence)
    }

    /// Every record for one table, in sequence order.
    pub fn table_records(&self, table: &str) -> impl Iterator<Item = &ChangeRecord> {
        let records = self.log.records();
        self.index
            .table_positions(table)
            .iter()
            .map(move |&p| &records[p])
    }

    /// One row's sub-sequence, selected via the composite index.
    pub fn row_records(&self, table: &str, object_id: &str) -> impl Iterator<Item = &ChangeRecord> {
        let records = self.log.records();
        self.index
            .row_positions(table, object_id)
            .iter()
            .map(move |&p| &records[p])
    }

    /// Number of committed records (used by tests to assert the log is
    /// append-only).
    pub fn record_count(&self) -> usize {
        self.log.records().len()
    }

    /// Writes the manifest if missing or if the schema version changed;
    /// re-opening with an unchanged version reuses the existing file.
    fn provision_manifest(data_dir: &Path, manifest: StoreManifest) -> Result<()> {
        let manifest_path = data_dir.join(MANIFEST_FILE);

        if manifest_path.exists() {
            let mut contents = String::new();
            File::open(&manifest_path)
                .and_then(|mut f| f.read_to_string(&mut contents))
                .map_err(|e| SyncError::StorageOpen {
                    path: manifest_path.clone(),
                    reason: format!("failed to read manifest: {}", e),
                })?;
            let existing: StoreManifest =
                serde_json::from_str(&contents).map_err(|e| SyncError::StorageOpen {
                    path: manifest_path.clone(),
                    reason: format!("failed to parse manifest: {}", e),
                })?;

            if existing.version == manifest.version {
                tracing::debug!(version = existing.version, "manifest up to date");
                return Ok(());
            }
            tracing::debug!(
                from = existing.version,
                to = manifest.version,
                "schema version bump, rewriting manifest"
            );
        }

        let json = serde_json::to_string_pretty(&manifest)
            .map_err(|e| SyncError::Serialization(e.to_string()))?;

        // Write to a temporary file, fsync, then rename into place.
        let temp_path = data_dir.join(format!("{}.tmp", MANIFEST_FILE));
        let mut file = File::create(&temp_path).map_err(|e| SyncError::StorageOpen {
            path: temp_path.clone(),
            reason: format!("failed to create temp manifest: {}", e),
        })?;
        file.write_all(json.as_bytes())
            .map_err(|e| SyncError::StorageOpen {
                path: temp_path.clone(),
                reason: format!("failed to write manifest: {}", e),
            })?;
        file.sync_all().map_err(|e| SyncError::StorageOpen {
            path: temp_path.clone(),
            reason: format!("failed to sync manifest: {}", e),
        })?;
        fs::rename(&temp_path, &manifest_path).map_err(|e| SyncError::StorageOpen {
            path: manifest_path,
            reason: format!("failed to rename manifest: {}", e),
        })?;

        Ok(())
    }
}
