use checkin_core::model::contact::ContactKind;
use checkin_core::model::timestamp::parse_timestamp;
use checkin_core::{
    CheckInAction, CheckInError, CheckInRequest, CheckInService, FlatFileRepository,
    IdentityStore, RemoteSync, RepoError, RepoResult, StoreLayout, StoreRepository, SyncError,
    SyncOutcome, ValidationError,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn request(first: &str, last: &str, dob: &str, email: &str, phone: &str) -> CheckInRequest {
    CheckInRequest {
        first_name: Some(first.to_string()),
        last_name: Some(last.to_string()),
        dob: Some(dob.to_string()),
        email: Some(email.to_string()),
        phone: Some(phone.to_string()),
        ..CheckInRequest::default()
    }
}

fn jane() -> CheckInRequest {
    request("Jane", "Doe", "03-14-2007", "jane@x.com", "215-555-1234")
}

fn open_service(root: &Path) -> CheckInService<FlatFileRepository> {
    let layout = StoreLayout::new(root.join("private"), root.join("public"));
    CheckInService::open(FlatFileRepository::new(layout), None).unwrap()
}

#[test]
fn repeat_visit_links_to_same_identity_and_records_new_phone() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = open_service(dir.path());

    let first = service.submit(&jane()).unwrap();
    assert_eq!(first.action, CheckInAction::CreatedNew);
    assert_eq!(first.visit.visit_number, 1);

    let mut again = jane();
    again.phone = Some("215-555-9999".to_string());
    let second = service.submit(&again).unwrap();
    assert_eq!(second.action, CheckInAction::MatchedExisting);
    assert_eq!(second.identity_id, first.identity_id);
    assert_eq!(second.visit.visit_number, 2);

    let store = service.store();
    assert_eq!(store.len(), 1);
    let person = store.person(first.identity_id).unwrap();
    assert_eq!(person.contacts.primary_phone.as_deref(), Some("2155551234"));
    assert_eq!(person.contacts.secondary_phones, vec!["2155559999".to_string()]);
    assert_eq!(person.contacts.updates.len(), 1);
    assert_eq!(person.contacts.updates[0].kind, ContactKind::Phone);
    assert_eq!(person.contacts.updates[0].visit_number, Some(2));

    let participant = store.participant(first.identity_id).unwrap();
    assert_eq!(participant.contacts, person.contacts);
    assert_eq!(participant.visits.len(), 2);
}

#[test]
fn shared_birthday_with_different_details_creates_two_identities() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = open_service(dir.path());

    let alex = service
        .submit(&request("Alex", "Kim", "2000-01-01", "alex@x.com", "2155550001"))
        .unwrap();
    let sam = service
        .submit(&request("Sam", "Lee", "01-01-2000", "sam@x.com", "2155550002"))
        .unwrap();

    assert_eq!(sam.action, CheckInAction::CreatedNew);
    assert_ne!(alex.identity_id, sam.identity_id);
    assert_eq!(service.store().len(), 2);
}

#[test]
fn birthday_and_email_alone_do_not_merge() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = open_service(dir.path());

    service.submit(&jane()).unwrap();
    let other = service
        .submit(&request("Janet", "Smith", "03-14-2007", "JANE@x.com ", "2155550000"))
        .unwrap();

    assert_eq!(other.action, CheckInAction::CreatedNew);
}

#[test]
fn birthday_with_email_and_phone_merges_despite_name_change() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = open_service(dir.path());

    let first = service.submit(&jane()).unwrap();
    let renamed = service
        .submit(&request("Janie", "Doe-Smith", "03-14-2007", "jane@x.com", "(215) 555-1234"))
        .unwrap();

    assert_eq!(renamed.action, CheckInAction::MatchedExisting);
    assert_eq!(renamed.identity_id, first.identity_id);
}

#[test]
fn name_matching_ignores_case_and_spacing() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = open_service(dir.path());

    let first = service.submit(&jane()).unwrap();
    let echo = service
        .submit(&request("  JANE ", "doe", "03-14-2007", "", "2155557777"))
        .unwrap();

    assert_eq!(echo.identity_id, first.identity_id);
    let person = service.store().person(first.identity_id).unwrap();
    assert_eq!(person.first_name, "Jane");
}

#[test]
fn resubmitting_identical_check_in_only_adds_a_visit() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = open_service(dir.path());

    let first = service.submit(&jane()).unwrap();
    service.submit(&jane()).unwrap();
    let third = service.submit(&jane()).unwrap();

    assert_eq!(third.identity_id, first.identity_id);
    assert_eq!(third.visit.visit_number, 3);
    let person = service.store().person(first.identity_id).unwrap();
    assert!(person.contacts.secondary_emails.is_empty());
    assert!(person.contacts.secondary_phones.is_empty());
    assert!(person.contacts.updates.is_empty());

    let numbers: Vec<u32> = service
        .store()
        .participant(first.identity_id)
        .unwrap()
        .visits
        .iter()
        .map(|visit| visit.visit_number)
        .collect();
    assert_eq!(numbers, vec![1, 2, 3]);
}

#[test]
fn empty_primary_is_filled_without_logging() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = open_service(dir.path());

    let first = service
        .submit(&request("Jane", "Doe", "03-14-2007", "", "2155551234"))
        .unwrap();
    service.submit(&jane()).unwrap();

    let person = service.store().person(first.identity_id).unwrap();
    assert_eq!(person.contacts.primary_email.as_deref(), Some("jane@x.com"));
    assert!(person.contacts.updates.is_empty());
}

#[test]
fn newsletter_contacts_are_seeded_and_appended_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = open_service(dir.path());

    let mut signup = jane();
    signup.newsletter_email = Some("News@X.com".to_string());
    let first = service.submit(&signup).unwrap();

    let mut later = jane();
    later.newsletter_email = Some("news@x.com".to_string());
    later.newsletter_phone = Some("215 555 0100".to_string());
    service.submit(&later).unwrap();

    let participant = service.store().participant(first.identity_id).unwrap();
    assert_eq!(participant.contacts.newsletter_emails, vec!["news@x.com".to_string()]);
    assert_eq!(participant.contacts.newsletter_phones, vec!["2155550100".to_string()]);
    let kinds: Vec<ContactKind> = participant
        .contacts
        .updates
        .iter()
        .map(|update| update.kind)
        .collect();
    assert_eq!(kinds, vec![ContactKind::NewsletterEmail, ContactKind::NewsletterPhone]);
}

#[test]
fn invalid_input_is_rejected_before_any_write() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = open_service(dir.path());

    let mut bad_phone = jane();
    bad_phone.phone = Some("555-1234".to_string());
    let err = service.submit(&bad_phone).unwrap_err();
    assert!(matches!(
        err,
        CheckInError::Validation(ValidationError::InvalidPhone)
    ));

    let mut bad_dob = jane();
    bad_dob.dob = Some("14/03/2007".to_string());
    assert!(matches!(
        service.submit(&bad_dob),
        Err(CheckInError::Validation(ValidationError::InvalidDob))
    ));

    assert!(service.store().is_empty());
    assert!(!dir.path().join("private").exists());
}

#[test]
fn study_code_and_role_are_kept_on_the_visit() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = open_service(dir.path());
    let now = parse_timestamp("2024-06-01T09:30:00").unwrap();

    let payload = r#"{
        "first_name": "Jane",
        "last_name": "Doe",
        "dob": "03-14-2007",
        "phone": "2155551234",
        "consent_contact": "Yes",
        "is_guardian": "guardian",
        "tubric_study_code": " STUDY-7 "
    }"#;
    let parsed: CheckInRequest = serde_json::from_str(payload).unwrap();
    let outcome = service.submit_at(&parsed, now).unwrap();

    assert_eq!(outcome.visit.study_code.as_deref(), Some("STUDY-7"));
    assert_eq!(outcome.visit.visit_date(), "2024-06-01");
    assert_eq!(outcome.visit.visit_time(), "09:30:00");
}

struct FailingRepository;

impl StoreRepository for FailingRepository {
    fn store_exists(&self) -> bool {
        false
    }

    fn load(&self) -> IdentityStore {
        IdentityStore::new()
    }

    fn persist(&self, _store: &IdentityStore) -> RepoResult<()> {
        Err(RepoError::Io {
            path: "/unwritable/guid_people.csv".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }
}

#[test]
fn failed_persist_leaves_store_unchanged() {
    let mut service = CheckInService::with_store(FailingRepository, IdentityStore::new());

    let err = service.submit(&jane()).unwrap_err();

    assert!(matches!(err, CheckInError::Repo(_)));
    assert!(service.store().is_empty());
}

#[derive(Default)]
struct RejectingSync {
    calls: AtomicUsize,
    pushed: Mutex<Vec<PathBuf>>,
}

impl RemoteSync for RejectingSync {
    fn push(&self, export_path: &Path) -> Result<SyncOutcome, SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pushed.lock().unwrap().push(export_path.to_path_buf());
        Err(SyncError::GitFailed {
            step: "push",
            status: "exit status: 128".to_string(),
        })
    }
}

#[test]
fn failing_remote_sync_does_not_fail_the_check_in() {
    let dir = tempfile::tempdir().unwrap();
    let layout = StoreLayout::new(dir.path().join("private"), dir.path().join("public"));
    let sync = Arc::new(RejectingSync::default());
    let mut service = CheckInService::open(FlatFileRepository::new(layout.clone()), None)
        .unwrap()
        .with_remote_sync(sync.clone());

    let first = service.submit(&jane()).unwrap();
    let second = service.submit(&jane()).unwrap();
    service.wait_for_sync();

    assert_eq!(first.action, CheckInAction::CreatedNew);
    assert_eq!(second.action, CheckInAction::MatchedExisting);
    assert_eq!(sync.calls.load(Ordering::SeqCst), 2);
    let pushed = sync.pushed.lock().unwrap();
    assert!(pushed.iter().all(|path| path == &layout.deidentified_visits));
    assert_eq!(service.store().visit_count(), 2);
}
