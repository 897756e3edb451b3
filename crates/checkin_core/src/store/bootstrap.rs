//! Process-start store initialization.
//!
//! # Responsibility
//! - Load the existing store, or run the one-time legacy migration.
//!
//! # Invariants
//! - Migration runs only when the repository reports no store at all.
//!   Presence, not content, is the gate: an emptied store never re-migrates.
//! - A legacy file that cannot be read or decoded yields an empty store and
//!   writes nothing.
//! - Migrated state is persisted once before it is returned.

use super::IdentityStore;
use crate::migration::{migrate_legacy, MigrationReport};
use crate::model::timestamp::{now_local, Timestamp};
use crate::repo::store_repo::{RepoResult, StoreRepository};
use log::{info, warn};
use std::path::Path;

/// Where the initial in-memory state came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOrigin {
    Loaded,
    Migrated(MigrationReport),
    Empty,
}

/// Initializes the store for a kiosk process.
///
/// # Errors
/// - Returns a repository error when freshly migrated state cannot be written.
pub fn initialize<R: StoreRepository>(
    repo: &R,
    legacy_path: Option<&Path>,
) -> RepoResult<(IdentityStore, StoreOrigin)> {
    if repo.store_exists() {
        return Ok((repo.load(), StoreOrigin::Loaded));
    }

    let legacy_bytes = legacy_path.and_then(|path| {
        if !path.exists() {
            return None;
        }
        match std::fs::read(path) {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                warn!(
                    "event=legacy_migrate module=store status=skip error_code=legacy_unreadable error={err}"
                );
                None
            }
        }
    });

    initialize_from(repo, legacy_bytes.as_deref(), now_local())
}

/// Same as [`initialize`] with legacy bytes and clock supplied by the caller.
///
/// # Errors
/// - Returns a repository error when freshly migrated state cannot be written.
pub fn initialize_from<R: StoreRepository>(
    repo: &R,
    legacy_bytes: Option<&[u8]>,
    now: Timestamp,
) -> RepoResult<(IdentityStore, StoreOrigin)> {
    if repo.store_exists() {
        return Ok((repo.load(), StoreOrigin::Loaded));
    }

    let Some(bytes) = legacy_bytes else {
        info!("event=store_init module=store status=ok origin=empty");
        return Ok((IdentityStore::new(), StoreOrigin::Empty));
    };

    match migrate_legacy(bytes, now) {
        Ok((store, report)) => {
            repo.persist(&store)?;
            info!(
                "event=legacy_migrate module=store status=ok profiles={} visits={} minted_ids={}",
                report.profiles, report.visits, report.minted_ids
            );
            Ok((store, StoreOrigin::Migrated(report)))
        }
        Err(err) => {
            warn!(
                "event=legacy_migrate module=store status=skip error_code=legacy_invalid error={err}"
            );
            Ok((IdentityStore::new(), StoreOrigin::Empty))
        }
    }
}
