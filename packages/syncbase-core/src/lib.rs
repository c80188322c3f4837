//! Change-log engine for the syncbase data layer.
//!
//! Provides storage provisioning, the append-only change log, the
//! mutation writer, the query-reconstruction engine, and the client
//! facade that binds them per table.

pub mod change;
pub mod client;
pub mod config;
pub mod error;
pub mod mutation;
pub mod query;
pub mod store;
pub mod table;

pub use change::{ChangeKind, ChangeRecord, FieldDiff};
pub use client::{ChangeNotice, SyncClient};
pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use query::Filter;
pub use table::TableAccessor;
