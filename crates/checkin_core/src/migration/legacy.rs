//! Legacy `{"profiles": [...]}` document conversion.

use crate::model::contact::ContactBook;
use crate::model::identity::{IdentityId, Participant, Person};
use crate::model::timestamp::{parse_timestamp, Timestamp};
use crate::model::visit::{ConsentChoice, EnteredBy, Visit};
use crate::normalize::{normalize_dob, parse_iso_date};
use crate::store::IdentityStore;
use chrono::NaiveDate;
use log::warn;
use serde::Deserialize;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Legacy document could not be decoded.
#[derive(Debug)]
pub enum MigrationError {
    Json(serde_json::Error),
}

impl Display for MigrationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "invalid legacy profile document: {err}"),
        }
    }
}

impl Error for MigrationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for MigrationError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Counters describing one migration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub profiles: usize,
    pub visits: usize,
    /// Profiles whose legacy guid was missing, malformed or duplicated.
    pub minted_ids: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LegacyDocument {
    profiles: Vec<LegacyProfile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LegacyProfile {
    guid: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    dob: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    consent_contact: Option<String>,
    created_at: Option<String>,
    visits: Vec<LegacyVisit>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LegacyVisit {
    visit_datetime: Option<String>,
    tubric_study_code: Option<String>,
    consent_contact: Option<String>,
    entered_by: Option<String>,
}

/// Converts legacy profile bytes into a store snapshot.
///
/// `now` fills timestamps the legacy file left blank.
///
/// # Errors
/// - Returns `MigrationError::Json` when the bytes are not a legacy document.
pub fn migrate_legacy(
    bytes: &[u8],
    now: Timestamp,
) -> Result<(IdentityStore, MigrationReport), MigrationError> {
    let document: LegacyDocument = serde_json::from_slice(bytes)?;
    let mut store = IdentityStore::new();
    let mut report = MigrationReport::default();
    let mut seen: HashSet<IdentityId> = HashSet::new();

    for profile in document.profiles {
        let id = match profile.guid.as_deref().and_then(parse_guid) {
            Some(id) if seen.insert(id) => id,
            _ => {
                report.minted_ids += 1;
                mint_unique(&mut seen)
            }
        };
        let (person, participant) = convert_profile(id, profile, now);
        report.profiles += 1;
        report.visits += participant.visits.len();
        if let Err(err) = store.insert_identity(person, participant) {
            warn!("event=legacy_migrate module=migration status=skip reason={err}");
        }
    }

    Ok((store, report))
}

fn convert_profile(id: IdentityId, profile: LegacyProfile, now: Timestamp) -> (Person, Participant) {
    let created_at = profile
        .created_at
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or(now);
    let first_name = text(profile.first_name.as_deref());
    let last_name = text(profile.last_name.as_deref());
    let dob = profile.dob.as_deref().and_then(legacy_dob);
    let contacts = ContactBook::with_primaries(
        &text(profile.email.as_deref()),
        &text(profile.phone.as_deref()),
    );
    let consent = profile.consent_contact.as_deref().and_then(ConsentChoice::parse);

    let visits = profile
        .visits
        .into_iter()
        .zip(1u32..)
        .map(|(visit, visit_number)| Visit {
            visit_number,
            visited_at: visit
                .visit_datetime
                .as_deref()
                .and_then(parse_timestamp)
                .unwrap_or(now),
            study_code: visit
                .tubric_study_code
                .map(|code| code.trim().to_string())
                .filter(|code| !code.is_empty()),
            consent: visit.consent_contact.as_deref().and_then(ConsentChoice::parse),
            entered_by: visit.entered_by.as_deref().and_then(EnteredBy::parse),
        })
        .collect::<Vec<_>>();

    let person = Person {
        id,
        first_name,
        last_name,
        dob,
        contacts,
        created_at,
        last_seen_at: profile.created_at.as_deref().and_then(parse_timestamp),
    };
    let mut participant = person.to_participant(consent, created_at);
    participant.visits = visits;
    (person, participant)
}

fn parse_guid(value: &str) -> Option<IdentityId> {
    Uuid::parse_str(value.trim()).ok()
}

fn mint_unique(seen: &mut HashSet<IdentityId>) -> IdentityId {
    loop {
        let id = Uuid::new_v4();
        if seen.insert(id) {
            return id;
        }
    }
}

fn legacy_dob(value: &str) -> Option<NaiveDate> {
    parse_iso_date(value).or_else(|| normalize_dob(value))
}

fn text(value: Option<&str>) -> String {
    value.unwrap_or_default().trim().to_string()
}
