//! Engine configuration.

use std::path::PathBuf;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Data directory holding the manifest and the change log
    pub data_dir: PathBuf,
    /// Schema version; a bump rewrites the provisioning manifest
    pub schema_version: u32,
    /// Capacity of the change-notification broadcast channel
    pub notify_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            schema_version: 1,
            notify_capacity: 64,
        }
    }
}
