//! End-to-end tests for the client facade: provisioning, mutations,
//! reconstruction, persistence across reopen, and notifications.

use std::collections::BTreeMap;
use std::path::Path;

use tempfile::tempdir;

use syncbase_core::{SyncClient, SyncConfig, SyncError};
use syncbase_types::{ColumnDescriptor, Row, ScalarType, TableDescriptor, Value};

fn todos_table() -> TableDescriptor {
    TableDescriptor::new(
        "todos",
        vec![
            ColumnDescriptor::new("id", ScalarType::String).primary_key(),
            ColumnDescriptor::new("description", ScalarType::String).not_null(),
            ColumnDescriptor::new("completed", ScalarType::Boolean)
                .not_null()
                .default_value(Value::Bool(false)),
        ],
    )
}

fn users_table() -> TableDescriptor {
    TableDescriptor::new(
        "users",
        vec![
            ColumnDescriptor::new("id", ScalarType::String).primary_key(),
            ColumnDescriptor::new("name", ScalarType::String).not_null(),
            ColumnDescriptor::new("age", ScalarType::Number).not_null(),
        ],
    )
}

fn client_at(dir: &Path) -> SyncClient {
    let config = SyncConfig {
        data_dir: dir.to_path_buf(),
        ..Default::default()
    };
    SyncClient::new(vec![todos_table(), users_table()], config).unwrap()
}

fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[tokio::test]
async fn test_insert_then_find_many_fills_defaults() {
    let dir = tempdir().unwrap();
    let client = client_at(dir.path());
    let todos = client.table("todos").unwrap();

    todos
        .insert(row(&[
            ("id", Value::from("a")),
            ("description", Value::from("x")),
        ]))
        .await
        .unwrap();

    let rows = todos.find_many(None).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], Value::from("a"));
    assert_eq!(rows[0]["description"], Value::from("x"));
    assert_eq!(rows[0]["completed"], Value::from(false));
}

#[tokio::test]
async fn test_delete_then_find_many_excludes_id_but_log_remains() {
    let dir = tempdir().unwrap();
    let client = client_at(dir.path());
    let todos = client.table("todos").unwrap();

    todos
        .insert(row(&[
            ("id", Value::from("a")),
            ("description", Value::from("x")),
        ]))
        .await
        .unwrap();
    todos.delete("a").await.unwrap();

    assert!(todos.find_many(None).await.unwrap().is_empty());
    assert_eq!(todos.find_unique("a").await.unwrap(), None);

    // Deletion is represented in the log, never enacted by erasure: both
    // records are still physically present.
    let log_len = std::fs::metadata(dir.path().join("changes.log"))
        .unwrap()
        .len();
    assert!(log_len > 0);

    // The lease lives as long as any accessor clone, so both must go
    // before a second writer can open the store.
    drop(todos);
    drop(client);

    let reopened = client_at(dir.path());
    let todos = reopened.table("todos").unwrap();
    assert!(todos.find_many(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_merges_untouched_fields() {
    let dir = tempdir().unwrap();
    let client = client_at(dir.path());
    let todos = client.table("todos").unwrap();

    todos
        .insert(row(&[
            ("id", Value::from("a")),
            ("description", Value::from("x")),
            ("completed", Value::from(false)),
        ]))
        .await
        .unwrap();
    todos
        .update("a", row(&[("completed", Value::from(true))]))
        .await
        .unwrap();

    let rows = todos.find_many(None).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], Value::from("a"));
    assert_eq!(rows[0]["description"], Value::from("x"));
    assert_eq!(rows[0]["completed"], Value::from(true));
}

#[tokio::test]
async fn test_update_missing_row_is_rejected() {
    let dir = tempdir().unwrap();
    let client = client_at(dir.path());
    let todos = client.table("todos").unwrap();

    let err = todos
        .update("ghost", row(&[("completed", Value::from(true))]))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::RowNotFound { .. }));

    // A deleted row counts as missing too.
    todos
        .insert(row(&[
            ("id", Value::from("a")),
            ("description", Value::from("x")),
        ]))
        .await
        .unwrap();
    todos.delete("a").await.unwrap();
    let err = todos
        .update("a", row(&[("completed", Value::from(true))]))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::RowNotFound { .. }));
}

#[tokio::test]
async fn test_update_cannot_rewrite_primary_key() {
    let dir = tempdir().unwrap();
    let client = client_at(dir.path());
    let todos = client.table("todos").unwrap();

    todos
        .insert(row(&[
            ("id", Value::from("a")),
            ("description", Value::from("x")),
        ]))
        .await
        .unwrap();

    let err = todos
        .update("a", row(&[("id", Value::from("b"))]))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::ImmutableColumn { .. }));

    // The row keeps its identity.
    assert!(todos.find_unique("a").await.unwrap().is_some());
    assert!(todos.find_unique("b").await.unwrap().is_none());
}

#[tokio::test]
async fn test_resurrection_after_delete() {
    let dir = tempdir().unwrap();
    let client = client_at(dir.path());
    let todos = client.table("todos").unwrap();

    todos
        .insert(row(&[
            ("id", Value::from("a")),
            ("description", Value::from("first")),
        ]))
        .await
        .unwrap();
    todos.delete("a").await.unwrap();
    todos
        .insert(row(&[
            ("id", Value::from("a")),
            ("description", Value::from("second")),
            ("completed", Value::from(true)),
        ]))
        .await
        .unwrap();

    let rows = todos.find_many(None).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["description"], Value::from("second"));
    assert_eq!(rows[0]["completed"], Value::from(true));
}

#[tokio::test]
async fn test_find_unique_missing_returns_none() {
    let dir = tempdir().unwrap();
    let client = client_at(dir.path());
    let todos = client.table("todos").unwrap();

    assert_eq!(todos.find_unique("missing").await.unwrap(), None);
}

#[tokio::test]
async fn test_find_many_where_filters_post_fold() {
    let dir = tempdir().unwrap();
    let client = client_at(dir.path());
    let todos = client.table("todos").unwrap();

    todos
        .insert(row(&[
            ("id", Value::from("a")),
            ("description", Value::from("done")),
            ("completed", Value::from(true)),
        ]))
        .await
        .unwrap();
    todos
        .insert(row(&[
            ("id", Value::from("b")),
            ("description", Value::from("open")),
        ]))
        .await
        .unwrap();
    // Filtering sees materialized state, so a later update is reflected.
    todos
        .update("b", row(&[("completed", Value::from(true))]))
        .await
        .unwrap();

    let mut filter = BTreeMap::new();
    filter.insert("completed".to_string(), Value::from(true));
    let rows = todos.find_many(Some(filter)).await.unwrap();
    assert_eq!(rows.len(), 2);

    let mut filter = BTreeMap::new();
    filter.insert("completed".to_string(), Value::from(false));
    assert!(todos.find_many(Some(filter)).await.unwrap().is_empty());

    let mut filter = BTreeMap::new();
    filter.insert("bogus".to_string(), Value::from(true));
    assert!(matches!(
        todos.find_many(Some(filter)).await.unwrap_err(),
        SyncError::ColumnNotFound { .. }
    ));
}

#[tokio::test]
async fn test_rows_come_back_in_discovery_order() {
    let dir = tempdir().unwrap();
    let client = client_at(dir.path());
    let todos = client.table("todos").unwrap();

    for id in ["c", "a", "b"] {
        todos
            .insert(row(&[
                ("id", Value::from(id)),
                ("description", Value::from(id)),
            ]))
            .await
            .unwrap();
    }

    let rows = todos.find_many(None).await.unwrap();
    let ids: Vec<_> = rows.iter().map(|r| r["id"].clone()).collect();
    assert_eq!(
        ids,
        vec![Value::from("c"), Value::from("a"), Value::from("b")]
    );
}

#[tokio::test]
async fn test_tables_are_isolated() {
    let dir = tempdir().unwrap();
    let client = client_at(dir.path());
    let todos = client.table("todos").unwrap();
    let users = client.table("users").unwrap();

    todos
        .insert(row(&[
            ("id", Value::from("a")),
            ("description", Value::from("x")),
        ]))
        .await
        .unwrap();
    users
        .insert(row(&[
            ("id", Value::from("a")),
            ("name", Value::from("ada")),
            ("age", Value::from(36.0)),
        ]))
        .await
        .unwrap();
    users.delete("a").await.unwrap();

    // Same object id in another table is untouched by the delete.
    assert_eq!(todos.find_many(None).await.unwrap().len(), 1);
    assert!(users.find_many(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let dir = tempdir().unwrap();

    {
        let client = client_at(dir.path());
        let todos = client.table("todos").unwrap();
        todos
            .insert(row(&[
                ("id", Value::from("a")),
                ("description", Value::from("x")),
            ]))
            .await
            .unwrap();
        todos
            .update("a", row(&[("completed", Value::from(true))]))
            .await
            .unwrap();
    }

    let client = client_at(dir.path());
    let todos = client.table("todos").unwrap();
    let rows = todos.find_many(None).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["completed"], Value::from(true));
}

#[tokio::test]
async fn test_second_writer_is_refused() {
    let dir = tempdir().unwrap();
    let first = client_at(dir.path());
    let second = client_at(dir.path());

    // First client holds the lease from its first operation onward.
    first
        .table("todos")
        .unwrap()
        .insert(row(&[
            ("id", Value::from("a")),
            ("description", Value::from("x")),
        ]))
        .await
        .unwrap();

    let err = second
        .table("todos")
        .unwrap()
        .find_many(None)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::StorageOpen { .. }));

    // Dropping the first client releases the lease.
    drop(first);
    assert_eq!(
        second
            .table("todos")
            .unwrap()
            .find_many(None)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_subscribers_get_notices_after_commit() {
    let dir = tempdir().unwrap();
    let client = client_at(dir.path());
    let mut notices = client.subscribe();
    let todos = client.table("todos").unwrap();

    todos
        .insert(row(&[
            ("id", Value::from("a")),
            ("description", Value::from("x")),
        ]))
        .await
        .unwrap();
    todos
        .update("a", row(&[("completed", Value::from(true))]))
        .await
        .unwrap();
    todos.delete("a").await.unwrap();

    for _ in 0..3 {
        let notice = notices.recv().await.unwrap();
        assert_eq!(notice.table, "todos");
        assert_eq!(notice.object_id, "a");
    }
}

#[tokio::test]
async fn test_date_and_big_int_columns_round_trip() {
    use chrono::TimeZone;

    let dir = tempdir().unwrap();
    let table = TableDescriptor::new(
        "events",
        vec![
            ColumnDescriptor::new("id", ScalarType::String).primary_key(),
            ColumnDescriptor::new("at", ScalarType::Date).not_null(),
            ColumnDescriptor::new("amount", ScalarType::BigInt).not_null(),
        ],
    );
    let config = SyncConfig {
        data_dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    let at = chrono::Utc.with_ymd_and_hms(2024, 2, 29, 8, 0, 0).unwrap();

    {
        let client = SyncClient::new(vec![table.clone()], config.clone()).unwrap();
        let events = client.table("events").unwrap();
        events
            .insert(row(&[
                ("id", Value::from("e1")),
                ("at", Value::Date(at)),
                ("amount", Value::BigInt(170_141_183_460_469_231_731_687_303_715)),
            ]))
            .await
            .unwrap();
    }

    // Values decode identically after a disk round trip.
    let client = SyncClient::new(vec![table], config).unwrap();
    let found = client
        .table("events")
        .unwrap()
        .find_unique("e1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found["at"], Value::Date(at));
    assert_eq!(
        found["amount"],
        Value::BigInt(170_141_183_460_469_231_731_687_303_715)
    );
}
