//! Transient secondary indexes over the in-memory arena.
//!
//! Only the arena is durable; these maps are rebuilt from it on every
//! open and must never be persisted.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::change::ChangeRecord;
use crate::error::{Result, SyncError};

/// Arena-position indexes: by table, by `(table, object_id)`, plus the
/// unique correlation-id set.
#[derive(Debug, Default)]
pub(crate) struct LogIndex {
    by_table: HashMap<String, Vec<usize>>,
    by_row: HashMap<(String, String), Vec<usize>>,
    correlations: HashSet<Uuid>,
}

impl LogIndex {
    /// Rebuilds the index from a replayed arena.
    pub fn rebuild(records: &[ChangeRecord]) -> Result<Self> {
        let mut index = Self::default();
        for (position, record) in records.iter().enumerate() {
            index.insert(position, record)?;
        }
        Ok(index)
    }

    /// Registers one appended record at its arena position. Fails on a
    /// duplicate correlation id, which the unique index forbids.
    pub fn insert(&mut self, position: usize, record: &ChangeRecord) -> Result<()> {
        if !self.correlations.insert(record.correlation_id) {
            return Err(SyncError::Corruption(format!(
                "duplicate correlation id {}",
                record.correlation_id
            )));
        }

        self.by_table
            .entry(record.object_store.clone())
            .or_default()
            .push(position);
        self.by_row
            .entry((record.object_store.clone(), record.object_id.clone()))
            .or_default()
            .push(position);
        Ok(())
    }

    /// Arena positions of every record for one table, in sequence order.
    pub fn table_positions(&self, table: &str) -> &[usize] {
        self.by_table.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Arena positions of one row's sub-sequence, in sequence order.
    pub fn row_positions(&self, table: &str, object_id: &str) -> &[usize] {
        self.by_row
            .get(&(table.to_string(), object_id.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
