//! Mutation writer: shapes rows into tagged change records.
//!
//! Builders here are pure; the table accessor appends their output under
//! the store's write lock so `update`'s read-then-append stays atomic.

use std::collections::BTreeMap;

use syncbase_types::{Row, StoredValue, TableDescriptor, Value};

use crate::change::{ChangeKind, ChangeRecord, FieldDiff};
use crate::error::{Result, SyncError};

/// Validates the insert shape, fills defaults, encodes every column, and
/// derives the object id from the encoded primary-key value.
///
/// Defaults fill only where the caller said nothing: an explicit `Null`
/// on a nullable column is stored as `Null`, not replaced by the
/// column's default.
pub(crate) fn build_insert(table: &TableDescriptor, row: Row) -> Result<ChangeRecord> {
    for name in row.keys() {
        if table.column(name).is_none() {
            return Err(SyncError::ColumnNotFound {
                table: table.name.clone(),
                column: name.clone(),
            });
        }
    }

    let mut object = BTreeMap::new();
    for column in &table.columns {
        let value = match row.get(&column.name) {
            Some(value) if !value.is_null() => value.clone(),
            Some(_) if column.nullable => Value::Null,
            _ => match &column.default {
                Some(default) => default.clone(),
                None if column.nullable => Value::Null,
                None => {
                    return Err(SyncError::NullConstraint {
                        table: table.name.clone(),
                        column: column.name.clone(),
                    })
                }
            },
        };
        object.insert(column.name.clone(), column.codec.to_storage(&value)?);
    }

    let primary = table.primary_column()?;
    let object_id = derive_object_id(table, &object[&primary.name])?;

    Ok(ChangeRecord::new(
        &table.name,
        object_id,
        ChangeKind::Insert { object },
    ))
}

/// Builds the tombstone for one row. Prior records are never touched;
/// deletion lives only in the log.
pub(crate) fn build_delete(table: &TableDescriptor, object_id: &str) -> ChangeRecord {
    ChangeRecord::new(&table.name, object_id.to_string(), ChangeKind::Delete)
}

/// Computes the per-field snapshot against the row's current value and
/// builds one `Update` record carrying all touched fields.
///
/// `current` is the row materialized from this id's sub-sequence by the
/// caller, under the same lock that will perform the append.
///
/// Touching the primary-key column is rejected; the object id would no
/// longer match the row's key.
pub(crate) fn build_update(
    table: &TableDescriptor,
    object_id: &str,
    partial: Row,
    current: &Row,
) -> Result<ChangeRecord> {
    let mut snapshot = BTreeMap::new();
    for (name, value) in &partial {
        let column = table
            .column(name)
            .ok_or_else(|| SyncError::ColumnNotFound {
                table: table.name.clone(),
                column: name.clone(),
            })?;
        if column.primary {
            return Err(SyncError::ImmutableColumn {
                table: table.name.clone(),
                column: name.clone(),
            });
        }

        let original = match current.get(name) {
            Some(existing) => column.codec.to_storage(existing)?,
            None => StoredValue::Null,
        };
        snapshot.insert(
            name.clone(),
            FieldDiff {
                original,
                updated: column.codec.to_storage(value)?,
            },
        );
    }

    Ok(ChangeRecord::new(
        &table.name,
        object_id.to_string(),
        ChangeKind::Update { snapshot },
    ))
}

fn derive_object_id(table: &TableDescriptor, key: &StoredValue) -> Result<String> {
    if key.is_null() {
        return Err(SyncError::NullConstraint {
            table: table.name.clone(),
            column: table.primary_column()?.name.clone(),
        });
    }
    Ok(key.to_string())
}
