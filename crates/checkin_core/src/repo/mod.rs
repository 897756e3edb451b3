//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the load/persist contract the check-in service depends on.
//! - Isolate flat-file encoding details from matching and workflow logic.
//!
//! # Invariants
//! - Reads are resilient: missing or unreadable files load as empty tables.
//! - Writes are whole-file and atomic per file; any write failure is returned.
//!
//! # See also
//! - `crate::config::StoreLayout` for the file set.

mod atomic_write;
pub mod flat_file_repo;
mod rows;
pub mod store_repo;

pub use atomic_write::write_atomic;
