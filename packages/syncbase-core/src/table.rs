//! Table accessor: one table's mutation and query surface.

use std::sync::Arc;

use syncbase_types::{Row, TableDescriptor};
use tokio::sync::broadcast;

use crate::client::{ChangeNotice, Connection};
use crate::error::{Result, SyncError};
use crate::mutation;
use crate::query::{self, Filter};

/// Binds the mutation writer and the query-reconstruction engine to one
/// table's schema. Cheap to clone; all accessors share the connection,
/// so the store (and its writer lease) stays open until the client and
/// every accessor cloned from it have been dropped.
#[derive(Debug, Clone)]
pub struct TableAccessor {
    descriptor: Arc<TableDescriptor>,
    conn: Arc<Connection>,
    notify: broadcast::Sender<ChangeNotice>,
}

impl TableAccessor {
    pub(crate) fn new(
        descriptor: Arc<TableDescriptor>,
        conn: Arc<Connection>,
        notify: broadcast::Sender<ChangeNotice>,
    ) -> Self {
        Self {
            descriptor,
            conn,
            notify,
        }
    }

    /// Appends an `Insert` record for the row.
    ///
    /// The row must contain every non-nullable column without a default;
    /// defaulted columns are filled in. Notifies subscribers after the
    /// append commits.
    pub async fn insert(&self, row: Row) -> Result<()> {
        let record = mutation::build_insert(&self.descriptor, row)?;
        let object_id = record.object_id.clone();

        let store = self.conn.store().await?;
        {
            let mut guard = store.write().await;
            let sequence = guard.append(record)?;
            tracing::debug!(table = %self.descriptor.name, %object_id, sequence, "insert appended");
        }

        self.broadcast(object_id);
        Ok(())
    }

    /// Replays the row's sub-sequence, computes per-field diffs against
    /// its current value, and appends one `Update` record.
    ///
    /// The read and the append happen under one write lock so no other
    /// writer can interleave and stale the observed `original` values.
    /// Updating a row that does not exist (or was deleted) is rejected
    /// with [`SyncError::RowNotFound`].
    pub async fn update(&self, object_id: &str, partial: Row) -> Result<()> {
        let store = self.conn.store().await?;
        {
            let mut guard = store.write().await;

            let current = query::materialize(
                &self.descriptor,
                guard.row_records(&self.descriptor.name, object_id),
            )?
            .into_single()
            .ok_or_else(|| SyncError::RowNotFound {
                table: self.descriptor.name.clone(),
                object_id: object_id.to_string(),
            })?;

            let record = mutation::build_update(&self.descriptor, object_id, partial, &current)?;
            let sequence = guard.append(record)?;
            tracing::debug!(table = %self.descriptor.name, object_id, sequence, "update appended");
        }

        self.broadcast(object_id.to_string());
        Ok(())
    }

    /// Appends a `Delete` tombstone. Prior records for the id stay in
    /// the log untouched; deletion is represented, never enacted.
    pub async fn delete(&self, object_id: &str) -> Result<()> {
        let record = mutation::build_delete(&self.descriptor, object_id);

        let store = self.conn.store().await?;
        {
            let mut guard = store.write().await;
            let sequence = guard.append(record)?;
            tracing::debug!(table = %self.descriptor.name, object_id, sequence, "delete appended");
        }

        self.broadcast(object_id.to_string());
        Ok(())
    }

    /// Folds the table's records into current rows, in discovery order.
    ///
    /// The optional equality filter applies to the materialized rows
    /// after the fold, never to raw log records.
    pub async fn find_many(&self, filter: Option<Filter>) -> Result<Vec<Row>> {
        if let Some(filter) = &filter {
            query::validate_filter(&self.descriptor, filter)?;
        }

        let store = self.conn.store().await?;
        let rows = {
            let guard = store.read().await;
            query::materialize(&self.descriptor, guard.table_records(&self.descriptor.name))?
                .into_rows()
        };

        Ok(match filter {
            Some(filter) => rows
                .into_iter()
                .filter(|row| query::row_matches(row, &filter))
                .collect(),
            None => rows,
        })
    }

    /// Folds only the `(table, object_id)` sub-sequence via the composite
    /// index. Returns `Ok(None)` for a missing or tombstoned row.
    pub async fn find_unique(&self, object_id: &str) -> Result<Option<Row>> {
        let store = self.conn.store().await?;
        let guard = store.read().await;
        let row = query::materialize(
            &self.descriptor,
            guard.row_records(&self.descriptor.name, object_id),
        )?
        .into_single();
        Ok(row)
    }

    /// Fire-and-forget change notification; a send with no subscribers
    /// is not a failure and never rolls back the committed append.
    fn broadcast(&self, object_id: String) {
        let _ = self.notify.send(ChangeNotice {
            table: self.descriptor.name.clone(),
            object_id,
        });
    }
}
