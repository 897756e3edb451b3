//! Contact channels and their append-only change history.
//!
//! # Responsibility
//! - Hold primary, secondary and newsletter channels for one projection.
//! - Apply check-in contact observations and log every real change.
//!
//! # Invariants
//! - Stored values are already normalized.
//! - Lists never hold duplicates; a secondary never repeats the primary.
//! - Filling an empty primary is not a change and is not logged.
//! - Values are only ever appended, never overwritten or removed.

use super::timestamp::Timestamp;
use crate::normalize::{normalize_email, normalize_phone};
use serde::{Deserialize, Serialize};

/// Channel a contact update applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactKind {
    Email,
    Phone,
    NewsletterEmail,
    NewsletterPhone,
}

impl ContactKind {
    /// Stable flat-file label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::NewsletterEmail => "newsletter_email",
            Self::NewsletterPhone => "newsletter_phone",
        }
    }

    /// Parses a stored label.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "email" => Some(Self::Email),
            "phone" => Some(Self::Phone),
            "newsletter_email" => Some(Self::NewsletterEmail),
            "newsletter_phone" => Some(Self::NewsletterPhone),
            _ => None,
        }
    }

    fn normalize(self, raw: &str) -> Option<String> {
        match self {
            Self::Email | Self::NewsletterEmail => normalize_email(raw),
            Self::Phone | Self::NewsletterPhone => normalize_phone(raw),
        }
    }
}

/// One logged contact change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactUpdate {
    pub kind: ContactKind,
    /// Normalized value that was added.
    pub value: String,
    pub added_at: Timestamp,
    /// Visit that triggered the change. Absent only in hand-edited files.
    pub visit_number: Option<u32>,
    pub visit_at: Option<Timestamp>,
}

/// The visit a contact observation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitRef {
    pub visit_number: u32,
    pub visited_at: Timestamp,
}

/// Outcome of observing a primary-capable channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactChange {
    /// Nothing supplied, invalid, or already known.
    Unchanged,
    /// Primary was empty and now holds the supplied value.
    FilledPrimary,
    /// Value differed from the primary and was appended to secondary.
    AddedSecondary,
}

/// Contact channels plus their update log for one identity projection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactBook {
    pub primary_email: Option<String>,
    pub primary_phone: Option<String>,
    pub secondary_emails: Vec<String>,
    pub secondary_phones: Vec<String>,
    pub newsletter_emails: Vec<String>,
    pub newsletter_phones: Vec<String>,
    pub updates: Vec<ContactUpdate>,
}

impl ContactBook {
    /// Creates a book seeded with primaries normalized from raw input.
    pub fn with_primaries(email: &str, phone: &str) -> Self {
        Self {
            primary_email: normalize_email(email),
            primary_phone: normalize_phone(phone),
            ..Self::default()
        }
    }

    /// Applies an email supplied at a matched check-in.
    pub fn observe_email(&mut self, raw: &str, visit: VisitRef, now: Timestamp) -> ContactChange {
        observe_primary_channel(
            &mut self.primary_email,
            &mut self.secondary_emails,
            &mut self.updates,
            ContactKind::Email,
            raw,
            visit,
            now,
        )
    }

    /// Applies a phone supplied at a matched check-in.
    pub fn observe_phone(&mut self, raw: &str, visit: VisitRef, now: Timestamp) -> ContactChange {
        observe_primary_channel(
            &mut self.primary_phone,
            &mut self.secondary_phones,
            &mut self.updates,
            ContactKind::Phone,
            raw,
            visit,
            now,
        )
    }

    /// Appends a newsletter email if not yet known. Returns whether it was added.
    pub fn add_newsletter_email(&mut self, raw: &str, visit: VisitRef, now: Timestamp) -> bool {
        append_channel(
            &mut self.newsletter_emails,
            &mut self.updates,
            ContactKind::NewsletterEmail,
            raw,
            visit,
            now,
        )
    }

    /// Appends a newsletter phone if not yet known. Returns whether it was added.
    pub fn add_newsletter_phone(&mut self, raw: &str, visit: VisitRef, now: Timestamp) -> bool {
        append_channel(
            &mut self.newsletter_phones,
            &mut self.updates,
            ContactKind::NewsletterPhone,
            raw,
            visit,
            now,
        )
    }

    /// Whether a normalized email equals the primary or any secondary email.
    pub fn knows_email(&self, normalized: &str) -> bool {
        self.primary_email.as_deref() == Some(normalized)
            || self.secondary_emails.iter().any(|value| value == normalized)
    }

    /// Whether a normalized phone equals the primary or any secondary phone.
    pub fn knows_phone(&self, normalized: &str) -> bool {
        self.primary_phone.as_deref() == Some(normalized)
            || self.secondary_phones.iter().any(|value| value == normalized)
    }
}

fn observe_primary_channel(
    primary: &mut Option<String>,
    secondary: &mut Vec<String>,
    updates: &mut Vec<ContactUpdate>,
    kind: ContactKind,
    raw: &str,
    visit: VisitRef,
    now: Timestamp,
) -> ContactChange {
    let Some(normalized) = kind.normalize(raw) else {
        return ContactChange::Unchanged;
    };

    match primary {
        None => {
            *primary = Some(normalized);
            ContactChange::FilledPrimary
        }
        Some(current) if *current == normalized => ContactChange::Unchanged,
        Some(_) => {
            if secondary.contains(&normalized) {
                return ContactChange::Unchanged;
            }
            secondary.push(normalized.clone());
            updates.push(new_update(kind, normalized, visit, now));
            ContactChange::AddedSecondary
        }
    }
}

fn append_channel(
    list: &mut Vec<String>,
    updates: &mut Vec<ContactUpdate>,
    kind: ContactKind,
    raw: &str,
    visit: VisitRef,
    now: Timestamp,
) -> bool {
    let Some(normalized) = kind.normalize(raw) else {
        return false;
    };
    if list.contains(&normalized) {
        return false;
    }
    list.push(normalized.clone());
    updates.push(new_update(kind, normalized, visit, now));
    true
}

fn new_update(kind: ContactKind, value: String, visit: VisitRef, now: Timestamp) -> ContactUpdate {
    ContactUpdate {
        kind,
        value,
        added_at: now,
        visit_number: Some(visit.visit_number),
        visit_at: Some(visit.visited_at),
    }
}
