//! Identity and visit domain model.
//!
//! # Responsibility
//! - Define typed records for the two identity projections and their history.
//! - Own contact-channel bookkeeping shared by both projections.
//!
//! # Invariants
//! - Every identity is keyed by a stable `IdentityId`, never reused.
//! - Optional attributes are `Option`, never sentinel strings.
//! - Contact history is append-only.

pub mod contact;
pub mod identity;
pub mod timestamp;
pub mod visit;
