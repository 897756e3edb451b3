//! Git-backed remote sync.
//!
//! Copies the export into a local clone when it lives elsewhere, then runs
//! `git add`, `git commit` and `git push` there. A commit with nothing
//! staged counts as success with no changes.

use super::{RemoteSync, SyncError, SyncOutcome};
use crate::model::timestamp::{format_timestamp, now_local};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Pushes the de-identified export through a local git clone.
#[derive(Debug, Clone)]
pub struct GitRemoteSync {
    repo_path: PathBuf,
}

impl GitRemoteSync {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    /// Places the export inside the clone and returns its repo-relative path.
    fn stage_export(&self, export_path: &Path) -> Result<PathBuf, SyncError> {
        if let Ok(relative) = export_path.strip_prefix(&self.repo_path) {
            return Ok(relative.to_path_buf());
        }
        let file_name = export_path
            .file_name()
            .ok_or_else(|| SyncError::MissingExport(export_path.to_path_buf()))?;
        fs::copy(export_path, self.repo_path.join(file_name))?;
        Ok(PathBuf::from(file_name))
    }

    fn git(&self, args: &[&str]) -> Result<Output, SyncError> {
        Ok(Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()?)
    }
}

impl RemoteSync for GitRemoteSync {
    fn push(&self, export_path: &Path) -> Result<SyncOutcome, SyncError> {
        if !self.repo_path.is_dir() {
            return Err(SyncError::MissingRepo(self.repo_path.clone()));
        }
        if !export_path.is_file() {
            return Err(SyncError::MissingExport(export_path.to_path_buf()));
        }

        let relative = self.stage_export(export_path)?;
        let relative = relative.to_string_lossy();

        let add = self.git(&["add", relative.as_ref()])?;
        if !add.status.success() {
            return Err(SyncError::GitFailed {
                step: "add",
                status: add.status.to_string(),
            });
        }

        let message = format!("De-identified export {}", format_timestamp(now_local()));
        let commit = self.git(&["commit", "-m", message.as_str()])?;
        if !commit.status.success() {
            return Ok(SyncOutcome::NoChanges);
        }

        let push = self.git(&["push"])?;
        if !push.status.success() {
            return Err(SyncError::GitFailed {
                step: "push",
                status: push.status.to_string(),
            });
        }
        Ok(SyncOutcome::Pushed)
    }
}
