//! Client facade: per-table accessors over one shared store connection.

use std::sync::Arc;

use syncbase_types::{validate_schema, TableDescriptor};
use tokio::sync::{broadcast, OnceCell, RwLock};

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::store::LogStore;
use crate::table::TableAccessor;

/// Event delivered to subscribers after a mutation commits.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeNotice {
    /// Table the mutation targeted
    pub table: String,
    /// Stable identity of the affected row
    pub object_id: String,
}

/// Shared, lazily opened store connection.
///
/// Construction is synchronous; the store itself (lease, manifest, log
/// replay) is opened on the first operation and reused afterwards.
#[derive(Debug)]
pub(crate) struct Connection {
    config: SyncConfig,
    tables: Vec<TableDescriptor>,
    store: OnceCell<RwLock<LogStore>>,
}

impl Connection {
    fn new(config: SyncConfig, tables: Vec<TableDescriptor>) -> Self {
        Self {
            config,
            tables,
            store: OnceCell::new(),
        }
    }

    pub(crate) async fn store(&self) -> Result<&RwLock<LogStore>> {
        self.store
            .get_or_try_init(|| async { LogStore::open(&self.config, &self.tables).map(RwLock::new) })
            .await
    }
}

/// The facade: one [`TableAccessor`] per table, addressable by name, plus
/// the change-notification subscription interface.
#[derive(Debug)]
pub struct SyncClient {
    tables: Vec<Arc<TableDescriptor>>,
    conn: Arc<Connection>,
    notify: broadcast::Sender<ChangeNotice>,
}

impl SyncClient {
    /// Builds the facade over the given schema.
    ///
    /// Validates the whole schema eagerly: a descriptor without exactly
    /// one primary-key column fails construction, so nothing is ever
    /// provisioned for a malformed schema.
    pub fn new(tables: Vec<TableDescriptor>, config: SyncConfig) -> Result<Self> {
        validate_schema(&tables)?;

        let (notify, _) = broadcast::channel(config.notify_capacity);
        let conn = Arc::new(Connection::new(config, tables.clone()));
        let tables = tables.into_iter().map(Arc::new).collect();

        Ok(Self {
            tables,
            conn,
            notify,
        })
    }

    /// Returns the accessor for one table.
    pub fn table(&self, name: &str) -> Result<TableAccessor> {
        let descriptor = self
            .tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| SyncError::TableNotFound(name.to_string()))?;
        Ok(TableAccessor::new(
            Arc::clone(descriptor),
            Arc::clone(&self.conn),
            self.notify.clone(),
        ))
    }

    /// Subscribes to change notifications. Each successful mutation
    /// delivers one [`ChangeNotice`] after its append commits.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotice> {
        self.notify.subscribe()
    }

    /// Names of the tables this client was built with.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }
}
