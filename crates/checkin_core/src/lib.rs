//! Core record-linkage and identity store for the check-in kiosk.
//! All identity invariants live in this crate; front-ends only submit
//! check-ins and render outcomes.

pub mod config;
pub mod logging;
pub mod matching;
pub mod migration;
pub mod model;
pub mod normalize;
pub mod repo;
pub mod service;
pub mod store;
pub mod sync;

pub use config::{KioskConfig, StoreLayout};
pub use logging::{default_log_level, flush_logging, init_logging, logging_status, LoggingError};
pub use model::identity::{IdentityId, Participant, Person};
pub use repo::flat_file_repo::FlatFileRepository;
pub use repo::store_repo::{RepoError, RepoResult, StoreRepository};
pub use service::checkin_service::{
    CheckInAction, CheckInError, CheckInOutcome, CheckInRequest, CheckInService, ValidationError,
};
pub use store::{DeidentifiedVisit, IdentityStore, StoreError};
pub use sync::{GitRemoteSync, RemoteSync, SyncError, SyncOutcome};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
