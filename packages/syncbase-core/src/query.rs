//! Query reconstruction: folding change records into current row state.
//!
//! Materialization is a pure left fold over a slice of the log in
//! sequence order. The fold is order-sensitive, not commutative: a later
//! record always wins on the fields it touches.

use std::collections::BTreeMap;

use syncbase_types::{Row, TableDescriptor, Value};

use crate::change::{ChangeKind, ChangeRecord};
use crate::error::{Result, SyncError};

/// Equality filter over supported scalar columns, applied to the
/// materialized rows after the fold completes.
pub type Filter = BTreeMap<String, Value>;

/// Ordered map from object id to materialized row.
///
/// Preserves discovery order: the order in which each distinct id first
/// appeared while folding. Deleting removes the entry entirely, so a
/// resurrected id re-enters at the end.
#[derive(Debug, Default)]
pub(crate) struct MaterializedRows {
    entries: Vec<(String, Row)>,
}

impl MaterializedRows {
    fn set(&mut self, object_id: &str, row: Row) {
        match self.entries.iter_mut().find(|(id, _)| id == object_id) {
            Some((_, existing)) => *existing = row,
            None => self.entries.push((object_id.to_string(), row)),
        }
    }

    fn get_mut(&mut self, object_id: &str) -> Option<&mut Row> {
        self.entries
            .iter_mut()
            .find(|(id, _)| id == object_id)
            .map(|(_, row)| row)
    }

    fn remove(&mut self, object_id: &str) {
        self.entries.retain(|(id, _)| id != object_id);
    }

    /// Rows in discovery order.
    pub fn into_rows(self) -> Vec<Row> {
        self.entries.into_iter().map(|(_, row)| row).collect()
    }

    /// The single row, for point lookups over a one-id sub-sequence.
    pub fn into_single(mut self) -> Option<Row> {
        self.entries.pop().map(|(_, row)| row)
    }
}

/// Folds records (already restricted to one table, in sequence order)
/// into current row state.
pub(crate) fn materialize<'a>(
    table: &TableDescriptor,
    records: impl Iterator<Item = &'a ChangeRecord>,
) -> Result<MaterializedRows> {
    let mut rows = MaterializedRows::default();

    for record in records {
        match &record.kind {
            ChangeKind::Insert { object } => {
                let mut row = Row::new();
                for (name, stored) in object {
                    let Some(column) = table.column(name) else {
                        // A column the current schema no longer names;
                        // skip it rather than failing the whole fold.
                        tracing::warn!(
                            table = %table.name,
                            column = %name,
                            sequence = record.sequence,
                            "skipping unknown column during replay"
                        );
                        continue;
                    };
                    row.insert(name.clone(), column.codec.from_storage(stored)?);
                }
                rows.set(&record.object_id, row);
            }
            ChangeKind::Update { snapshot } => {
                let Some(row) = rows.get_mut(&record.object_id) else {
                    // Truncated history: an update with no preceding
                    // insert is dropped for that id.
                    tracing::debug!(
                        table = %table.name,
                        object_id = %record.object_id,
                        sequence = record.sequence,
                        "dropping update for absent row"
                    );
                    continue;
                };
                for (name, diff) in snapshot {
                    let Some(column) = table.column(name) else {
                        tracing::warn!(
                            table = %table.name,
                            column = %name,
                            sequence = record.sequence,
                            "skipping unknown column during replay"
                        );
                        continue;
                    };
                    row.insert(name.clone(), column.codec.from_storage(&diff.updated)?);
                }
            }
            ChangeKind::Delete => rows.remove(&record.object_id),
        }
    }

    Ok(rows)
}

/// Validates a `where` filter against the table's schema.
pub(crate) fn validate_filter(table: &TableDescriptor, filter: &Filter) -> Result<()> {
    for column_name in filter.keys() {
        let column = table
            .column(column_name)
            .ok_or_else(|| SyncError::ColumnNotFound {
                table: table.name.clone(),
                column: column_name.clone(),
            })?;
        if !column.tag.supports_index() {
            return Err(SyncError::UnsupportedFilter {
                table: table.name.clone(),
                column: column_name.clone(),
            });
        }
    }
    Ok(())
}

/// Post-fold equality filter: a row matches when every filtered column
/// holds exactly the given value.
pub(crate) fn row_matches(row: &Row, filter: &Filter) -> bool {
    filter
        .iter()
        .all(|(column, value)| row.get(column) == Some(value))
}
