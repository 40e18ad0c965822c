//! Kiosk Shell Persistence
//!
//! Per-installation identity and the per-instance configuration document.
//! Both live as pretty-printed JSON files in the storage directory and are
//! replaced with a write-to-temp-then-rename sequence, so a crash never
//! leaves a half-written file at the canonical path.

use std::path::PathBuf;

mod atomic;
pub mod identity;
pub mod model;
pub mod schema;
pub mod store;

pub use identity::{InstanceId, InstanceIdentity, Resolution, ResolvedIdentity};
pub use model::{
    ConfigDocument, InstanceConfig, InstanceRecord, StartupData, WindowGeometry, WindowState,
    DEFAULT_REFRESH_INTERVAL_SECONDS, DEFAULT_SYSTEM_NAME, DEFAULT_URL,
};
pub use store::{ConfigStore, InitOutcome};

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Failed to create storage directory {path:?}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Invalid instance id: {0}")]
    InvalidIdentity(String),
}

/// Coarse classification callers can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Directory,
    Read,
    Parse,
    Write,
    IdentityValidation,
}

impl PersistenceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PersistenceError::Directory { .. } => ErrorKind::Directory,
            PersistenceError::Read { .. } => ErrorKind::Read,
            PersistenceError::Parse { .. } => ErrorKind::Parse,
            PersistenceError::Write { .. } | PersistenceError::Serialize(_) => ErrorKind::Write,
            PersistenceError::InvalidIdentity(_) => ErrorKind::IdentityValidation,
        }
    }

    /// True when the file simply does not exist yet
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PersistenceError::Read { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}
