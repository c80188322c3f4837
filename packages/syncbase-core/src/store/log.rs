//! Durable append-only arena backing the change log.
//!
//! On-disk format is a sequence of frames:
//! `[len: u32 LE][crc32: u32 LE][serde_json record bytes]`.
//! Appends write one frame and fsync before the record is considered
//! committed. Replay verifies every checksum; a torn or corrupt frame
//! fails the open rather than silently dropping history.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use crc32fast::Hasher;

use crate::change::ChangeRecord;
use crate::error::{Result, SyncError};

const FRAME_HEADER_LEN: usize = 8;

/// The durable arena: every committed record, in sequence order, plus the
/// open file handle used for appends.
#[derive(Debug)]
pub(crate) struct ChangeLog {
    file: File,
    records: Vec<ChangeRecord>,
    next_sequence: u64,
}

impl ChangeLog {
    /// Opens (or creates) the log file and replays every frame into the
    /// in-memory arena.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        let records = Self::replay(&bytes)?;
        let next_sequence = records.last().map(|r| r.sequence + 1).unwrap_or(1);

        tracing::debug!(
            records = records.len(),
            next_sequence,
            path = %path.display(),
            "change log replayed"
        );

        Ok(Self {
            file,
            records,
            next_sequence,
        })
    }

    /// Appends a record, assigning its sequence number. The record is
    /// durable (written and fsynced) before this returns.
    pub fn append(&mut self, mut record: ChangeRecord) -> Result<u64> {
        record.sequence = self.next_sequence;

        let payload = serde_json::to_vec(&record)
            .map_err(|e| SyncError::Serialization(e.to_string()))?;
        let mut hasher = Hasher::new();
        hasher.update(&payload);
        let crc = hasher.finalize();

        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&payload);

        self.file
            .write_all(&frame)
            .map_err(|e| SyncError::Transaction(format!("append failed: {}", e)))?;
        self.file
            .sync_data()
            .map_err(|e| SyncError::Transaction(format!("sync failed: {}", e)))?;

        let sequence = record.sequence;
        self.records.push(record);
        self.next_sequence += 1;
        Ok(sequence)
    }

    /// All committed records in sequence order.
    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    fn replay(bytes: &[u8]) -> Result<Vec<ChangeRecord>> {
        let mut records = Vec::new();
        let mut offset = 0usize;

        while offset < bytes.len() {
            if bytes.len() - offset < FRAME_HEADER_LEN {
                return Err(SyncError::Corruption(format!(
                    "truncated frame header at byte {}",
                    offset
                )));
            }

            let len = u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap()) as usize;
            let expected_crc =
                u32::from_le_bytes(bytes[offset + 4..offset + 8].try_into().unwrap());
            let payload_start = offset + FRAME_HEADER_LEN;

            if bytes.len() - payload_start < len {
                return Err(SyncError::Corruption(format!(
                    "truncated frame payload at byte {} (want {} bytes)",
                    payload_start, len
                )));
            }

            let payload = &bytes[payload_start..payload_start + len];
            let mut hasher = Hasher::new();
            hasher.update(payload);
            if hasher.finalize() != expected_crc {
                return Err(SyncError::Corruption(format!(
                    "checksum mismatch in frame at byte {}",
                    offset
                )));
            }

            let record: ChangeRecord = serde_json::from_slice(payload)
                .map_err(|e| SyncError::Corruption(format!("undecodable record: {}", e)))?;

            let expected = records.len() as u64 + 1;
            if record.sequence != expected {
                return Err(SyncError::Corruption(format!(
                    "sequence gap: expected {}, found {}",
                    expected, record.sequence
                )));
            }

            records.push(record);
            offset = payload_start + len;
        }

        Ok(records)
    }
}
