//! Database Error Types
//!
//! Error types raised by the bundled store implementation: snapshot I/O,
//! malformed or inconsistent snapshots, and batches that would break
//! referential integrity. Callers of the `NodeStore` trait see these wrapped
//! in `anyhow::Error`.

use std::path::PathBuf;
use thiserror::Error;

/// Store operation errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to read or write a snapshot file
    #[error("Snapshot I/O failed for {path}: {source}")]
    SnapshotIo {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Snapshot file is not valid JSON of the expected shape
    #[error("Snapshot format invalid: {0}")]
    SnapshotFormat(#[from] serde_json::Error),

    /// Snapshot parsed but violates a hierarchy invariant
    #[error("Snapshot is inconsistent: {0}")]
    CorruptSnapshot(String),

    /// Batch referenced a node that does not exist
    #[error("Node does not exist in store: {id}")]
    MissingNode { id: String },

    /// Batch tried to remove a node that still has children
    #[error("Node {id} still has children")]
    HasChildren { id: String },

    /// Batch would leave a node pointing at a missing parent
    #[error("Node {id} references missing parent {parent_id}")]
    MissingParent { id: String, parent_id: String },
}

impl DatabaseError {
    /// Create a snapshot I/O error
    pub fn snapshot_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SnapshotIo {
            path: path.into(),
            source,
        }
    }

    /// Create a corrupt snapshot error
    pub fn corrupt_snapshot(msg: impl Into<String>) -> Self {
        Self::CorruptSnapshot(msg.into())
    }

    /// Create a missing node error
    pub fn missing_node(id: impl Into<String>) -> Self {
        Self::MissingNode { id: id.into() }
    }

    /// Create a missing parent error
    pub fn missing_parent(id: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self::MissingParent {
            id: id.into(),
            parent_id: parent_id.into(),
        }
    }
}
