//! Change records: the tagged, append-only units of the log.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use syncbase_types::StoredValue;
use uuid::Uuid;

/// Per-field before/after snapshot carried by an `Update` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDiff {
    /// Stored value observed when the update was computed
    pub original: StoredValue,
    /// Stored value the field was set to
    pub updated: StoredValue,
}

/// The three mutation shapes. Matched exhaustively wherever records are
/// folded; no variant carries fields outside its own payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChangeKind {
    /// Full row as storage-encoded values
    Insert {
        /// Column name to encoded value
        object: BTreeMap<String, StoredValue>,
    },
    /// Per-field diffs for every field the caller touched
    Update {
        /// Column name to before/after snapshot
        snapshot: BTreeMap<String, FieldDiff>,
    },
    /// Tombstone; no payload beyond the envelope
    Delete,
}

/// One record of the change log. Immutable once appended; `sequence` is
/// assigned by the store at append time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Store-assigned monotonic position in the log
    pub sequence: u64,
    /// Stable string identity of the logical row
    pub object_id: String,
    /// Table the record belongs to
    pub object_store: String,
    /// Globally unique id, reserved for remote reconciliation
    pub correlation_id: Uuid,
    /// Remote-acknowledgement flag, reserved; always written `false`
    pub synced: bool,
    /// The mutation payload
    pub kind: ChangeKind,
}

impl ChangeRecord {
    /// Builds an unsequenced record; the store assigns `sequence` when
    /// the append commits.
    pub(crate) fn new(object_store: &str, object_id: String, kind: ChangeKind) -> Self {
        Self {
            sequence: 0,
            object_id,
            object_store: object_store.to_string(),
            correlation_id: Uuid::new_v4(),
            synced: false,
            kind,
        }
    }
}
