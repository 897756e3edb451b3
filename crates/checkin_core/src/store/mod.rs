//! In-memory identity store.
//!
//! # Responsibility
//! - Own the "People" and "Participants" projections for the running kiosk.
//! - Enforce identity uniqueness on every insert.
//! - Provide the de-identified visit view for downstream export.
//!
//! # Invariants
//! - Each `IdentityId` has exactly one `Person` and at most one `Participant`.
//! - A `Participant` is only inserted after its `Person`.
//! - Iteration order is insertion order; matching tie-breaks rely on it.

pub mod bootstrap;
mod deidentified;

pub use deidentified::DeidentifiedVisit;

use crate::model::identity::{IdentityId, Participant, Person};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Invariant violations rejected by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    DuplicateIdentity(IdentityId),
    MissingPerson(IdentityId),
    IdMismatch {
        person: IdentityId,
        participant: IdentityId,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateIdentity(id) => write!(f, "identity already exists: {id}"),
            Self::MissingPerson(id) => write!(f, "no person record for identity: {id}"),
            Self::IdMismatch {
                person,
                participant,
            } => write!(
                f,
                "person id {person} does not match participant id {participant}"
            ),
        }
    }
}

impl Error for StoreError {}

/// Both identity projections held in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityStore {
    people: Vec<Person>,
    participants: Vec<Participant>,
}

impl IdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn people(&self) -> &[Person] {
        &self.people
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    pub fn person(&self, id: IdentityId) -> Option<&Person> {
        self.people.iter().find(|person| person.id == id)
    }

    pub fn person_mut(&mut self, id: IdentityId) -> Option<&mut Person> {
        self.people.iter_mut().find(|person| person.id == id)
    }

    pub fn participant(&self, id: IdentityId) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|participant| participant.id == id)
    }

    pub fn participant_mut(&mut self, id: IdentityId) -> Option<&mut Participant> {
        self.participants
            .iter_mut()
            .find(|participant| participant.id == id)
    }

    /// Inserts a brand-new identity with both projections.
    pub fn insert_identity(
        &mut self,
        person: Person,
        participant: Participant,
    ) -> StoreResult<()> {
        if person.id != participant.id {
            return Err(StoreError::IdMismatch {
                person: person.id,
                participant: participant.id,
            });
        }
        self.insert_person(person)?;
        self.insert_participant(participant)
    }

    /// Inserts a person record. Rejects an id that is already known.
    pub fn insert_person(&mut self, person: Person) -> StoreResult<()> {
        if self.person(person.id).is_some() {
            return Err(StoreError::DuplicateIdentity(person.id));
        }
        self.people.push(person);
        Ok(())
    }

    /// Inserts the participant projection for an existing person.
    pub fn insert_participant(&mut self, participant: Participant) -> StoreResult<()> {
        if self.person(participant.id).is_none() {
            return Err(StoreError::MissingPerson(participant.id));
        }
        if self.participant(participant.id).is_some() {
            return Err(StoreError::DuplicateIdentity(participant.id));
        }
        self.participants.push(participant);
        Ok(())
    }

    /// Total number of visits across all participants.
    pub fn visit_count(&self) -> usize {
        self.participants
            .iter()
            .map(|participant| participant.visits.len())
            .sum()
    }

    /// Every visit with identifying fields removed, in store order.
    pub fn deidentified_visits(&self) -> Vec<DeidentifiedVisit> {
        self.participants
            .iter()
            .flat_map(|participant| {
                participant
                    .visits
                    .iter()
                    .map(|visit| DeidentifiedVisit::from_visit(participant.id, visit))
            })
            .collect()
    }
}
