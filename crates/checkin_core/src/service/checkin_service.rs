//! Check-in submission use-case.
//!
//! # Responsibility
//! - Validate one check-in, link it to an identity, record the visit and
//!   contact changes, and persist the full store before returning.
//! - Hand the de-identified export to remote sync once the state is durable.
//!
//! # Invariants
//! - Validation failures are returned before matching runs.
//! - Mutations are applied to a copy of the store; the live store is only
//!   replaced after every file was written. A failed write changes nothing.
//! - Person and Participant receive identical contact observations.
//! - Log lines carry ids, action tags and visit numbers only.

use crate::matching::{find_person, MatchQuery};
use crate::model::contact::{ContactBook, VisitRef};
use crate::model::identity::{IdentityId, Person};
use crate::model::timestamp::{now_local, Timestamp};
use crate::model::visit::{ConsentChoice, EnteredBy, Visit};
use crate::normalize::{normalize_dob, normalize_phone, parse_iso_date};
use crate::repo::store_repo::{RepoError, RepoResult, StoreRepository};
use crate::store::bootstrap::{self, StoreOrigin};
use crate::store::{DeidentifiedVisit, IdentityStore, StoreError, StoreResult};
use crate::sync::{dispatch_detached, RemoteSync};
use chrono::NaiveDate;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use uuid::Uuid;

/// Check-in form state gathered by a front-end.
///
/// Field names follow the kiosk front-end payload. Unknown keys are ignored
/// and `null` reads as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CheckInRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// `MM-DD-YYYY` as typed, or the canonical `YYYY-MM-DD`.
    pub dob: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub newsletter_email: Option<String>,
    pub newsletter_phone: Option<String>,
    pub consent_contact: Option<ConsentChoice>,
    #[serde(rename = "is_guardian", alias = "entered_by")]
    pub entered_by: Option<EnteredBy>,
    #[serde(rename = "tubric_study_code", alias = "study_code")]
    pub study_code: Option<String>,
}

/// How a check-in was linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckInAction {
    CreatedNew,
    MatchedExisting,
}

impl CheckInAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreatedNew => "created_new",
            Self::MatchedExisting => "matched_existing",
        }
    }
}

impl Display for CheckInAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckInOutcome {
    pub identity_id: IdentityId,
    pub action: CheckInAction,
    /// Visit just recorded, without identifying fields.
    pub visit: DeidentifiedVisit,
}

/// Input rejected before matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    MissingFirstName,
    MissingLastName,
    InvalidDob,
    InvalidPhone,
}

impl ValidationError {
    /// Stable machine-readable code for logs and callers.
    pub fn code(self) -> &'static str {
        match self {
            Self::MissingFirstName => "missing_first_name",
            Self::MissingLastName => "missing_last_name",
            Self::InvalidDob => "invalid_dob",
            Self::InvalidPhone => "invalid_phone",
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingFirstName => write!(f, "first name is required"),
            Self::MissingLastName => write!(f, "last name is required"),
            Self::InvalidDob => write!(f, "date of birth must be entered as MM-DD-YYYY"),
            Self::InvalidPhone => write!(f, "phone must contain exactly 10 digits"),
        }
    }
}

impl Error for ValidationError {}

/// Service error for check-in submissions.
#[derive(Debug)]
pub enum CheckInError {
    Validation(ValidationError),
    Store(StoreError),
    /// Store could not be written; the check-in was not recorded.
    Repo(RepoError),
}

impl Display for CheckInError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "invalid check-in: {err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "check-in not saved: {err}"),
        }
    }
}

impl Error for CheckInError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<ValidationError> for CheckInError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for CheckInError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<RepoError> for CheckInError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Required fields after validation.
struct ValidatedCheckIn<'a> {
    first_name: &'a str,
    last_name: &'a str,
    dob: NaiveDate,
}

/// Check-in service over a store repository.
pub struct CheckInService<R: StoreRepository> {
    repo: R,
    store: IdentityStore,
    origin: StoreOrigin,
    remote_sync: Option<Arc<dyn RemoteSync>>,
    pending_sync: Vec<JoinHandle<()>>,
}

impl<R: StoreRepository> CheckInService<R> {
    /// Opens the service, loading the store or migrating the legacy file.
    ///
    /// # Errors
    /// - Returns a repository error when migrated state cannot be written.
    pub fn open(repo: R, legacy_path: Option<&Path>) -> RepoResult<Self> {
        let (store, origin) = bootstrap::initialize(&repo, legacy_path)?;
        Ok(Self::from_parts(repo, store, origin))
    }

    /// Creates a service over an already-initialized store.
    pub fn with_store(repo: R, store: IdentityStore) -> Self {
        Self::from_parts(repo, store, StoreOrigin::Loaded)
    }

    fn from_parts(repo: R, store: IdentityStore, origin: StoreOrigin) -> Self {
        Self {
            repo,
            store,
            origin,
            remote_sync: None,
            pending_sync: Vec::new(),
        }
    }

    /// Enables best-effort publication of the de-identified export.
    pub fn with_remote_sync(mut self, sync: Arc<dyn RemoteSync>) -> Self {
        self.remote_sync = Some(sync);
        self
    }

    pub fn store(&self) -> &IdentityStore {
        &self.store
    }

    pub fn origin(&self) -> StoreOrigin {
        self.origin
    }

    /// Submits one check-in stamped with the current local time.
    ///
    /// # Errors
    /// - `Validation` when required fields are missing or malformed.
    /// - `Repo` when the store could not be written; nothing was recorded.
    pub fn submit(&mut self, request: &CheckInRequest) -> Result<CheckInOutcome, CheckInError> {
        self.submit_at(request, now_local())
    }

    /// Submits one check-in stamped with `now`.
    ///
    /// # Errors
    /// - Same as [`CheckInService::submit`].
    pub fn submit_at(
        &mut self,
        request: &CheckInRequest,
        now: Timestamp,
    ) -> Result<CheckInOutcome, CheckInError> {
        let started_at = Instant::now();
        let checked = match validate(request) {
            Ok(checked) => checked,
            Err(err) => {
                warn!(
                    "event=checkin_submit module=service status=rejected error_code={}",
                    err.code()
                );
                return Err(err.into());
            }
        };

        let mut next = self.store.clone();
        let query = MatchQuery {
            dob: Some(checked.dob),
            first_name: checked.first_name,
            last_name: checked.last_name,
            email: text(&request.email),
            phone: text(&request.phone),
        };
        let matched = find_person(next.people(), &query).map(|hit| (hit.person.id, hit.score));

        let (identity_id, action, visit) = match matched {
            Some((id, score)) => {
                info!("event=checkin_match module=service status=matched guid={id} score={score}");
                let visit = merge_visit(&mut next, id, request, now)?;
                (id, CheckInAction::MatchedExisting, visit)
            }
            None => {
                let (id, visit) = create_identity(&mut next, request, &checked, now)?;
                (id, CheckInAction::CreatedNew, visit)
            }
        };

        self.repo.persist(&next)?;
        self.store = next;

        info!(
            "event=checkin_submit module=service status=ok action={} guid={} visit_number={} duration_ms={}",
            action,
            identity_id,
            visit.visit_number,
            started_at.elapsed().as_millis()
        );
        self.dispatch_sync();

        Ok(CheckInOutcome {
            identity_id,
            action,
            visit: DeidentifiedVisit::from_visit(identity_id, &visit),
        })
    }

    /// Waits for remote sync work started by earlier submissions.
    pub fn wait_for_sync(&mut self) {
        for handle in self.pending_sync.drain(..) {
            if handle.join().is_err() {
                warn!("event=deid_sync module=service status=error error_code=sync_thread_panicked");
            }
        }
    }

    fn dispatch_sync(&mut self) {
        let Some(sync) = self.remote_sync.clone() else {
            return;
        };
        let Some(export_path) = self.repo.deidentified_export_path() else {
            return;
        };
        self.pending_sync.retain(|handle| !handle.is_finished());
        if let Some(handle) = dispatch_detached(sync, export_path.to_path_buf()) {
            self.pending_sync.push(handle);
        }
    }
}

fn validate(request: &CheckInRequest) -> Result<ValidatedCheckIn<'_>, ValidationError> {
    let first_name = text(&request.first_name).trim();
    if first_name.is_empty() {
        return Err(ValidationError::MissingFirstName);
    }
    let last_name = text(&request.last_name).trim();
    if last_name.is_empty() {
        return Err(ValidationError::MissingLastName);
    }
    let raw_dob = text(&request.dob);
    let dob = normalize_dob(raw_dob)
        .or_else(|| parse_iso_date(raw_dob))
        .ok_or(ValidationError::InvalidDob)?;
    if normalize_phone(text(&request.phone)).is_none() {
        return Err(ValidationError::InvalidPhone);
    }

    Ok(ValidatedCheckIn {
        first_name,
        last_name,
        dob,
    })
}

/// Records a visit on an existing identity and returns it.
fn merge_visit(
    store: &mut IdentityStore,
    id: IdentityId,
    request: &CheckInRequest,
    now: Timestamp,
) -> StoreResult<Visit> {
    if store.participant(id).is_none() {
        let person = store.person(id).ok_or(StoreError::MissingPerson(id))?;
        let mut participant = person.to_participant(request.consent_contact, now);
        participant.contacts.updates.clear();
        warn!("event=checkin_match module=service status=repair guid={id} reason=participant_missing");
        store.insert_participant(participant)?;
    }

    let participant = store
        .participant_mut(id)
        .ok_or(StoreError::MissingPerson(id))?;
    let visit = build_visit(request, participant.next_visit_number(), now);
    let visit_ref = VisitRef {
        visit_number: visit.visit_number,
        visited_at: now,
    };
    apply_contacts(&mut participant.contacts, request, visit_ref, now);
    participant.visits.push(visit.clone());

    let person = store.person_mut(id).ok_or(StoreError::MissingPerson(id))?;
    apply_contacts(&mut person.contacts, request, visit_ref, now);
    person.last_seen_at = Some(now);

    Ok(visit)
}

/// Creates both projections for a new identity at visit 1.
fn create_identity(
    store: &mut IdentityStore,
    request: &CheckInRequest,
    checked: &ValidatedCheckIn<'_>,
    now: Timestamp,
) -> StoreResult<(IdentityId, Visit)> {
    let id = mint_identity_id(store);
    let visit = build_visit(request, 1, now);
    let visit_ref = VisitRef {
        visit_number: visit.visit_number,
        visited_at: now,
    };

    let mut contacts = ContactBook::with_primaries(text(&request.email), text(&request.phone));
    contacts.add_newsletter_email(text(&request.newsletter_email), visit_ref, now);
    contacts.add_newsletter_phone(text(&request.newsletter_phone), visit_ref, now);

    let person = Person {
        id,
        first_name: checked.first_name.to_string(),
        last_name: checked.last_name.to_string(),
        dob: Some(checked.dob),
        contacts,
        created_at: now,
        last_seen_at: Some(now),
    };
    let mut participant = person.to_participant(request.consent_contact, now);
    participant.visits.push(visit.clone());
    store.insert_identity(person, participant)?;

    Ok((id, visit))
}

fn apply_contacts(book: &mut ContactBook, request: &CheckInRequest, visit: VisitRef, now: Timestamp) {
    book.observe_email(text(&request.email), visit, now);
    book.observe_phone(text(&request.phone), visit, now);
    book.add_newsletter_email(text(&request.newsletter_email), visit, now);
    book.add_newsletter_phone(text(&request.newsletter_phone), visit, now);
}

fn build_visit(request: &CheckInRequest, visit_number: u32, now: Timestamp) -> Visit {
    Visit {
        visit_number,
        visited_at: now,
        study_code: request
            .study_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_string),
        consent: request.consent_contact,
        entered_by: request.entered_by,
    }
}

fn mint_identity_id(store: &IdentityStore) -> IdentityId {
    loop {
        let id = Uuid::new_v4();
        if store.person(id).is_none() {
            return id;
        }
    }
}

fn text(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or_default()
}
