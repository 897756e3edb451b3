//! Best-effort publication of the de-identified export.
//!
//! # Responsibility
//! - Define the remote sync seam used after a check-in is durable.
//! - Run sync on a detached thread so it can never block or fail a check-in.
//!
//! # Invariants
//! - Sync only ever receives the de-identified export path.
//! - Sync errors are logged and dropped; they never reach the caller.

mod git_push;

pub use git_push::GitRemoteSync;

use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Sync failure. Only ever logged.
#[derive(Debug)]
pub enum SyncError {
    MissingRepo(PathBuf),
    MissingExport(PathBuf),
    Io(std::io::Error),
    GitFailed { step: &'static str, status: String },
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRepo(path) => write!(f, "sync repo not found: {}", path.display()),
            Self::MissingExport(path) => write!(f, "export file not found: {}", path.display()),
            Self::Io(err) => write!(f, "{err}"),
            Self::GitFailed { step, status } => write!(f, "git {step} failed: {status}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// What a successful sync did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Pushed,
    NoChanges,
}

/// Destination for the de-identified export.
pub trait RemoteSync: Send + Sync {
    fn push(&self, export_path: &Path) -> Result<SyncOutcome, SyncError>;
}

/// Runs `sync` on a detached thread and logs the result.
///
/// Returns the thread handle so short-lived processes can wait for it after
/// reporting their own result. `None` means the thread could not be started.
pub fn dispatch_detached(sync: Arc<dyn RemoteSync>, export_path: PathBuf) -> Option<JoinHandle<()>> {
    let spawned = std::thread::Builder::new()
        .name("deid-sync".to_string())
        .spawn(move || match sync.push(&export_path) {
            Ok(outcome) => info!("event=deid_sync module=sync status=ok outcome={outcome:?}"),
            Err(err) => warn!(
                "event=deid_sync module=sync status=error error_code=sync_failed error={err}"
            ),
        });

    match spawned {
        Ok(handle) => Some(handle),
        Err(err) => {
            warn!("event=deid_sync module=sync status=error error_code=spawn_failed error={err}");
            None
        }
    }
}
