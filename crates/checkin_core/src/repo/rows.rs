//! Flat-file row shapes and their conversion to typed records.
//!
//! # Invariants
//! - Column names and order are the public file format; do not reorder.
//! - Absent values are written as empty cells and read back as `None`.
//! - Decoding re-normalizes contact values so loaded books honour the
//!   dedupe and primary/secondary rules even for hand-edited files.
//! - Decode errors name the column only, never the cell content.
//! - Only an unreadable key (`guid`, `visit_number`, contact `type`/`value`)
//!   rejects a row. Any other unreadable column is defaulted and reported, so
//!   an identity is never dropped for a damaged timestamp.

use crate::model::contact::{ContactBook, ContactKind, ContactUpdate};
use crate::model::identity::{IdentityId, Participant, Person};
use crate::model::timestamp::{format_timestamp, parse_timestamp, Timestamp};
use crate::model::visit::{ConsentChoice, EnteredBy, Visit};
use crate::normalize::{format_iso_date, normalize_email, normalize_phone, parse_iso_date};
use crate::store::DeidentifiedVisit;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const LIST_SEPARATOR: &str = "|";

/// Decoded record plus the non-key columns that had to be defaulted.
#[derive(Debug)]
pub(super) struct Decoded<T> {
    pub(super) value: T,
    pub(super) defaulted: Vec<&'static str>,
}

pub(super) const PEOPLE_COLUMNS: &[&str] = &[
    "guid",
    "first_name",
    "last_name",
    "dob",
    "primary_email",
    "primary_phone",
    "secondary_emails",
    "secondary_phones",
    "newsletter_emails",
    "newsletter_phones",
    "created_at",
    "last_seen_at",
];

pub(super) const PARTICIPANT_COLUMNS: &[&str] = &[
    "guid",
    "first_name",
    "last_name",
    "dob",
    "email",
    "phone",
    "secondary_emails",
    "secondary_phones",
    "newsletter_emails",
    "newsletter_phones",
    "consent_contact",
    "created_at",
];

pub(super) const VISIT_COLUMNS: &[&str] = &[
    "guid",
    "visit_number",
    "visit_datetime",
    "visit_date",
    "visit_time",
    "tubric_study_code",
    "consent_contact",
    "entered_by",
];

pub(super) const CONTACT_UPDATE_COLUMNS: &[&str] = &[
    "guid",
    "type",
    "value",
    "added_at",
    "visit_number",
    "visit_datetime",
];

pub(super) const DEIDENTIFIED_COLUMNS: &[&str] = &[
    "guid",
    "visit_number",
    "visit_datetime",
    "visit_date",
    "visit_time",
    "tubric_study_code",
];

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub(super) struct PersonRow {
    guid: String,
    first_name: String,
    last_name: String,
    dob: String,
    primary_email: String,
    primary_phone: String,
    secondary_emails: String,
    secondary_phones: String,
    newsletter_emails: String,
    newsletter_phones: String,
    created_at: String,
    last_seen_at: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub(super) struct ParticipantRow {
    guid: String,
    first_name: String,
    last_name: String,
    dob: String,
    email: String,
    phone: String,
    secondary_emails: String,
    secondary_phones: String,
    newsletter_emails: String,
    newsletter_phones: String,
    consent_contact: String,
    created_at: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub(super) struct VisitRow {
    guid: String,
    visit_number: String,
    visit_datetime: String,
    visit_date: String,
    visit_time: String,
    tubric_study_code: String,
    consent_contact: String,
    entered_by: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub(super) struct ContactUpdateRow {
    guid: String,
    #[serde(rename = "type")]
    kind: String,
    value: String,
    added_at: String,
    visit_number: String,
    visit_datetime: String,
}

#[derive(Debug, Serialize)]
pub(super) struct DeidentifiedRow {
    guid: String,
    visit_number: String,
    visit_datetime: String,
    visit_date: String,
    visit_time: String,
    tubric_study_code: String,
}

impl PersonRow {
    pub(super) fn encode(person: &Person) -> Self {
        let book = &person.contacts;
        Self {
            guid: person.id.to_string(),
            first_name: person.first_name.clone(),
            last_name: person.last_name.clone(),
            dob: encode_date(person.dob),
            primary_email: book.primary_email.clone().unwrap_or_default(),
            primary_phone: book.primary_phone.clone().unwrap_or_default(),
            secondary_emails: join_list(&book.secondary_emails),
            secondary_phones: join_list(&book.secondary_phones),
            newsletter_emails: join_list(&book.newsletter_emails),
            newsletter_phones: join_list(&book.newsletter_phones),
            created_at: format_timestamp(person.created_at),
            last_seen_at: encode_timestamp(person.last_seen_at),
        }
    }

    /// `created_at` falls back to `last_seen_at`, then to `loaded_at`.
    pub(super) fn decode(self, loaded_at: Timestamp) -> Result<Decoded<Person>, String> {
        let id = decode_id(&self.guid)?;
        let mut defaulted = Vec::new();
        let last_seen_at = optional_timestamp(&self.last_seen_at, "last_seen_at", &mut defaulted);
        let created_at = timestamp_column(
            &self.created_at,
            "created_at",
            || last_seen_at.unwrap_or(loaded_at),
            &mut defaulted,
        );
        let contacts = decode_book(
            &self.primary_email,
            &self.primary_phone,
            &self.secondary_emails,
            &self.secondary_phones,
            &self.newsletter_emails,
            &self.newsletter_phones,
        );
        let person = Person {
            id,
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            dob: decode_date(&self.dob),
            contacts,
            created_at,
            last_seen_at,
        };
        Ok(Decoded {
            value: person,
            defaulted,
        })
    }
}

impl ParticipantRow {
    pub(super) fn encode(participant: &Participant) -> Self {
        let book = &participant.contacts;
        Self {
            guid: participant.id.to_string(),
            first_name: participant.first_name.clone(),
            last_name: participant.last_name.clone(),
            dob: encode_date(participant.dob),
            email: book.primary_email.clone().unwrap_or_default(),
            phone: book.primary_phone.clone().unwrap_or_default(),
            secondary_emails: join_list(&book.secondary_emails),
            secondary_phones: join_list(&book.secondary_phones),
            newsletter_emails: join_list(&book.newsletter_emails),
            newsletter_phones: join_list(&book.newsletter_phones),
            consent_contact: participant
                .consent
                .map(|consent| consent.as_str().to_string())
                .unwrap_or_default(),
            created_at: format_timestamp(participant.created_at),
        }
    }

    /// `created_at` falls back to `fallback_created_at(id)`.
    pub(super) fn decode(
        self,
        fallback_created_at: impl FnOnce(IdentityId) -> Timestamp,
    ) -> Result<Decoded<Participant>, String> {
        let id = decode_id(&self.guid)?;
        let mut defaulted = Vec::new();
        let created_at = timestamp_column(
            &self.created_at,
            "created_at",
            || fallback_created_at(id),
            &mut defaulted,
        );
        let contacts = decode_book(
            &self.email,
            &self.phone,
            &self.secondary_emails,
            &self.secondary_phones,
            &self.newsletter_emails,
            &self.newsletter_phones,
        );
        let participant = Participant {
            id,
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            dob: decode_date(&self.dob),
            contacts,
            consent: ConsentChoice::parse(&self.consent_contact),
            created_at,
            visits: Vec::new(),
        };
        Ok(Decoded {
            value: participant,
            defaulted,
        })
    }
}

impl VisitRow {
    pub(super) fn encode(id: IdentityId, visit: &Visit) -> Self {
        Self {
            guid: id.to_string(),
            visit_number: visit.visit_number.to_string(),
            visit_datetime: format_timestamp(visit.visited_at),
            visit_date: visit.visit_date(),
            visit_time: visit.visit_time(),
            tubric_study_code: visit.study_code.clone().unwrap_or_default(),
            consent_contact: visit
                .consent
                .map(|consent| consent.as_str().to_string())
                .unwrap_or_default(),
            entered_by: visit
                .entered_by
                .map(|role| role.as_str().to_string())
                .unwrap_or_default(),
        }
    }

    /// `visit_datetime` falls back to the split date/time columns, then to
    /// `loaded_at`.
    pub(super) fn decode(
        self,
        loaded_at: Timestamp,
    ) -> Result<Decoded<(IdentityId, Visit)>, String> {
        let id = decode_id(&self.guid)?;
        let visit_number = self
            .visit_number
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|number| *number > 0)
            .ok_or_else(|| "invalid value in column `visit_number`".to_string())?;
        let mut defaulted = Vec::new();
        let visited_at = timestamp_column(
            &self.visit_datetime,
            "visit_datetime",
            || {
                split_timestamp(&self.visit_date, &self.visit_time)
                    .or_else(|| date_as_midnight(&self.visit_date))
                    .unwrap_or(loaded_at)
            },
            &mut defaulted,
        );
        let visit = Visit {
            visit_number,
            visited_at,
            study_code: non_empty(&self.tubric_study_code),
            consent: ConsentChoice::parse(&self.consent_contact),
            entered_by: EnteredBy::parse(&self.entered_by),
        };
        Ok(Decoded {
            value: (id, visit),
            defaulted,
        })
    }
}

impl ContactUpdateRow {
    pub(super) fn encode(id: IdentityId, update: &ContactUpdate) -> Self {
        Self {
            guid: id.to_string(),
            kind: update.kind.as_str().to_string(),
            value: update.value.clone(),
            added_at: format_timestamp(update.added_at),
            visit_number: update
                .visit_number
                .map(|number| number.to_string())
                .unwrap_or_default(),
            visit_datetime: encode_timestamp(update.visit_at),
        }
    }

    /// `added_at` falls back to `visit_datetime`, then to `loaded_at`.
    pub(super) fn decode(
        self,
        loaded_at: Timestamp,
    ) -> Result<Decoded<(IdentityId, ContactUpdate)>, String> {
        let id = decode_id(&self.guid)?;
        let kind = ContactKind::parse(&self.kind)
            .ok_or_else(|| "invalid value in column `type`".to_string())?;
        let value = match kind {
            ContactKind::Email | ContactKind::NewsletterEmail => normalize_email(&self.value),
            ContactKind::Phone | ContactKind::NewsletterPhone => normalize_phone(&self.value),
        }
        .ok_or_else(|| "invalid value in column `value`".to_string())?;
        let mut defaulted = Vec::new();
        let visit_at = optional_timestamp(&self.visit_datetime, "visit_datetime", &mut defaulted);
        let added_at = timestamp_column(
            &self.added_at,
            "added_at",
            || visit_at.unwrap_or(loaded_at),
            &mut defaulted,
        );
        let update = ContactUpdate {
            kind,
            value,
            added_at,
            visit_number: self.visit_number.trim().parse::<u32>().ok(),
            visit_at,
        };
        Ok(Decoded {
            value: (id, update),
            defaulted,
        })
    }
}

impl DeidentifiedRow {
    pub(super) fn encode(visit: &DeidentifiedVisit) -> Self {
        Self {
            guid: visit.identity_id.to_string(),
            visit_number: visit.visit_number.to_string(),
            visit_datetime: format_timestamp(visit.visited_at),
            visit_date: visit.visit_date(),
            visit_time: visit.visit_time(),
            tubric_study_code: visit.study_code.clone().unwrap_or_default(),
        }
    }
}

fn decode_id(value: &str) -> Result<IdentityId, String> {
    Uuid::parse_str(value.trim()).map_err(|_| "invalid value in column `guid`".to_string())
}

/// Reads a required timestamp. An unreadable cell is recorded in `defaulted`
/// and replaced by its date at midnight, or by `fallback()`.
fn timestamp_column(
    value: &str,
    column: &'static str,
    fallback: impl FnOnce() -> Timestamp,
    defaulted: &mut Vec<&'static str>,
) -> Timestamp {
    if let Some(parsed) = parse_timestamp(value) {
        return parsed;
    }
    defaulted.push(column);
    date_as_midnight(value).unwrap_or_else(fallback)
}

/// Reads an optional timestamp; an empty cell is `None` without complaint.
fn optional_timestamp(
    value: &str,
    column: &'static str,
    defaulted: &mut Vec<&'static str>,
) -> Option<Timestamp> {
    if value.trim().is_empty() {
        return None;
    }
    let parsed = parse_timestamp(value);
    if parsed.is_some() {
        return parsed;
    }
    defaulted.push(column);
    date_as_midnight(value)
}

fn date_as_midnight(value: &str) -> Option<Timestamp> {
    parse_iso_date(value.trim()).and_then(|date| date.and_hms_opt(0, 0, 0))
}

fn split_timestamp(date: &str, time: &str) -> Option<Timestamp> {
    if date.trim().is_empty() || time.trim().is_empty() {
        return None;
    }
    parse_timestamp(&format!("{}T{}", date.trim(), time.trim()))
}

fn encode_timestamp(value: Option<Timestamp>) -> String {
    value.map(format_timestamp).unwrap_or_default()
}

fn encode_date(value: Option<NaiveDate>) -> String {
    value.map(format_iso_date).unwrap_or_default()
}

fn decode_date(value: &str) -> Option<NaiveDate> {
    parse_iso_date(value)
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn join_list(values: &[String]) -> String {
    values.join(LIST_SEPARATOR)
}

fn decode_book(
    primary_email: &str,
    primary_phone: &str,
    secondary_emails: &str,
    secondary_phones: &str,
    newsletter_emails: &str,
    newsletter_phones: &str,
) -> ContactBook {
    let primary_email = normalize_email(primary_email);
    let primary_phone = normalize_phone(primary_phone);
    ContactBook {
        secondary_emails: split_list(secondary_emails, normalize_email, primary_email.as_deref()),
        secondary_phones: split_list(secondary_phones, normalize_phone, primary_phone.as_deref()),
        newsletter_emails: split_list(newsletter_emails, normalize_email, None),
        newsletter_phones: split_list(newsletter_phones, normalize_phone, None),
        primary_email,
        primary_phone,
        updates: Vec::new(),
    }
}

fn split_list(
    raw: &str,
    normalize: fn(&str) -> Option<String>,
    exclude: Option<&str>,
) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for item in raw.split(LIST_SEPARATOR) {
        let Some(normalized) = normalize(item) else {
            continue;
        };
        if exclude == Some(normalized.as_str()) || values.contains(&normalized) {
            continue;
        }
        values.push(normalized);
    }
    values
}
