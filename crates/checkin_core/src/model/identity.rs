//! Identity projections: `Person` and its visit-bearing `Participant`.
//!
//! # Responsibility
//! - Define the deduplicated identity record used for matching.
//! - Define the participant projection that carries visit history.
//!
//! # Invariants
//! - `id` is stable and never reused for another identity.
//! - A `Participant` always shares its `id` with exactly one `Person`.
//! - `Participant::visits` is numbered contiguously from 1.

use super::contact::ContactBook;
use super::timestamp::Timestamp;
use super::visit::{ConsentChoice, Visit};
use chrono::NaiveDate;
use uuid::Uuid;

/// Stable identifier shared by both identity projections.
pub type IdentityId = Uuid;

/// Deduplicated identity record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub id: IdentityId,
    /// Display form as entered, trimmed.
    pub first_name: String,
    pub last_name: String,
    pub dob: Option<NaiveDate>,
    pub contacts: ContactBook,
    pub created_at: Timestamp,
    pub last_seen_at: Option<Timestamp>,
}

/// Visit-bearing projection of an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: IdentityId,
    pub first_name: String,
    pub last_name: String,
    pub dob: Option<NaiveDate>,
    pub contacts: ContactBook,
    /// Consent given when the participant was first recorded.
    pub consent: Option<ConsentChoice>,
    pub created_at: Timestamp,
    pub visits: Vec<Visit>,
}

impl Person {
    /// Builds the participant projection for this identity, without visits.
    pub fn to_participant(&self, consent: Option<ConsentChoice>, created_at: Timestamp) -> Participant {
        Participant {
            id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            dob: self.dob,
            contacts: self.contacts.clone(),
            consent,
            created_at,
            visits: Vec::new(),
        }
    }
}

impl Participant {
    /// Number the next visit would receive: one past the highest recorded.
    pub fn next_visit_number(&self) -> u32 {
        self.visits
            .iter()
            .map(|visit| visit.visit_number)
            .max()
            .unwrap_or(0)
            .saturating_add(1)
    }

    /// Reassigns visit numbers 1..=N in current list order.
    pub fn renumber_visits(&mut self) {
        for (visit, number) in self.visits.iter_mut().zip(1u32..) {
            visit.visit_number = number;
        }
    }

    /// Whether visit numbers run 1..=N without gaps or duplicates.
    pub fn has_contiguous_visits(&self) -> bool {
        self.visits
            .iter()
            .enumerate()
            .all(|(index, visit)| usize::try_from(visit.visit_number).ok() == Some(index + 1))
    }
}
