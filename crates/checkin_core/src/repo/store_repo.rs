//! Store repository contract and persistence errors.
//!
//! # Responsibility
//! - Provide the load/persist seam between the service and storage.
//! - Report whether a store already exists, which gates legacy migration.
//!
//! # Invariants
//! - `load` never fails; unreadable state is logged and treated as empty.
//! - `persist` writes the complete store or returns an error.

use crate::store::IdentityStore;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub type RepoResult<T> = Result<T, RepoError>;

/// Persistence failure while writing the store.
#[derive(Debug)]
pub enum RepoError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Csv {
        path: PathBuf,
        source: csv::Error,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to write `{}`: {source}", path.display())
            }
            Self::Csv { path, source } => {
                write!(f, "failed to encode `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Csv { source, .. } => Some(source),
        }
    }
}

impl RepoError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Repository interface for the identity store.
pub trait StoreRepository {
    /// Whether a store has been written before. Content is irrelevant.
    fn store_exists(&self) -> bool;
    /// Loads the full store, degrading to empty tables on read errors.
    fn load(&self) -> IdentityStore;
    /// Rewrites every file from the given store.
    fn persist(&self, store: &IdentityStore) -> RepoResult<()>;
    /// De-identified export file handed to remote sync, if this backend has one.
    fn deidentified_export_path(&self) -> Option<&Path> {
        None
    }
}
