//! One-time import of the legacy single-file profile store.
//!
//! # Responsibility
//! - Convert legacy JSON bytes into an initial `IdentityStore`.
//! - Stay free of I/O; gating and persistence live in `store::bootstrap`.
//!
//! # Invariants
//! - Every migrated identity gets a unique id; a reusable legacy guid is kept.
//! - Visits are renumbered 1..N in file order.
//! - No secondary, newsletter or contact-update data is produced.

mod legacy;

pub use legacy::{migrate_legacy, MigrationError, MigrationReport};
