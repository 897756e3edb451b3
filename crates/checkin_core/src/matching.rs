//! DOB-first identity matching.
//!
//! # Responsibility
//! - Restrict candidates to People sharing the exact date of birth.
//! - Score candidates on name, email and phone corroboration.
//!
//! # Invariants
//! - Absent DOB never matches anything.
//! - Only a strictly higher score replaces the current best candidate, so
//!   ties resolve to the first candidate in store order.
//! - A candidate below `MATCH_THRESHOLD` is never returned. DOB plus a single
//!   contact channel is not enough to merge.

use crate::model::identity::Person;
use crate::normalize::{normalize_email, normalize_name, normalize_phone};
use chrono::NaiveDate;

/// Minimum confirmation score required to merge into an existing identity.
pub const MATCH_THRESHOLD: u8 = 2;

const NAME_WEIGHT: u8 = 2;
const EMAIL_WEIGHT: u8 = 1;
const PHONE_WEIGHT: u8 = 1;

/// Identifying fields of one incoming check-in.
#[derive(Debug, Clone, Copy)]
pub struct MatchQuery<'a> {
    pub dob: Option<NaiveDate>,
    pub first_name: &'a str,
    pub last_name: &'a str,
    /// Raw email; normalized before comparison.
    pub email: &'a str,
    /// Raw phone; normalized before comparison.
    pub phone: &'a str,
}

/// Accepted candidate and the score it reached.
#[derive(Debug, Clone, Copy)]
pub struct MatchResult<'p> {
    pub person: &'p Person,
    pub score: u8,
}

/// Finds the existing identity for a check-in, if any.
pub fn find_person<'p>(people: &'p [Person], query: &MatchQuery<'_>) -> Option<MatchResult<'p>> {
    let dob = query.dob?;
    let first_name = normalize_name(query.first_name);
    let last_name = normalize_name(query.last_name);
    let email = normalize_email(query.email);
    let phone = normalize_phone(query.phone);

    let mut best: Option<MatchResult<'p>> = None;
    for person in people.iter().filter(|person| person.dob == Some(dob)) {
        let score = confirmation_score(
            person,
            &first_name,
            &last_name,
            email.as_deref(),
            phone.as_deref(),
        );
        if best.map_or(true, |current| score > current.score) {
            best = Some(MatchResult { person, score });
        }
    }

    best.filter(|candidate| candidate.score >= MATCH_THRESHOLD)
}

fn confirmation_score(
    person: &Person,
    first_name: &str,
    last_name: &str,
    email: Option<&str>,
    phone: Option<&str>,
) -> u8 {
    let mut score = 0;
    if normalize_name(&person.first_name) == first_name
        && normalize_name(&person.last_name) == last_name
    {
        score += NAME_WEIGHT;
    }
    if email.is_some_and(|value| person.contacts.knows_email(value)) {
        score += EMAIL_WEIGHT;
    }
    if phone.is_some_and(|value| person.contacts.knows_phone(value)) {
        score += PHONE_WEIGHT;
    }
    score
}
