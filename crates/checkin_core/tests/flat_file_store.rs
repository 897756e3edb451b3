use checkin_core::model::timestamp::parse_timestamp;
use checkin_core::store::bootstrap::{initialize, initialize_from, StoreOrigin};
use checkin_core::{
    CheckInAction, CheckInRequest, CheckInService, FlatFileRepository, IdentityId, StoreLayout,
    StoreRepository,
};
use std::fs;
use std::path::Path;

const LEGACY: &str = r#"{
    "profiles": [
        {
            "guid": "0b7c6f8e-2d51-4c1a-9a57-3f3e2b1d4c5a",
            "first_name": "Jane",
            "last_name": "Doe",
            "dob": "2007-03-14",
            "email": "jane@x.com",
            "phone": "215-555-1234",
            "consent_contact": "Yes",
            "created_at": "2023-09-01T10:00:00",
            "visits": [
                {"visit_datetime": "2023-09-01T10:00:00", "tubric_study_code": "S-1"},
                {"visit_datetime": "2023-10-02T11:15:00"}
            ]
        }
    ]
}"#;

fn layout(root: &Path) -> StoreLayout {
    StoreLayout::new(root.join("private"), root.join("public"))
}

fn jane(phone: &str) -> CheckInRequest {
    CheckInRequest {
        first_name: Some("Jane".to_string()),
        last_name: Some("Doe".to_string()),
        dob: Some("03-14-2007".to_string()),
        email: Some("jane@x.com".to_string()),
        phone: Some(phone.to_string()),
        study_code: Some("S-2".to_string()),
        ..CheckInRequest::default()
    }
}

fn overwrite_cells(path: &Path, column: &str, value: &str, row_filter: impl Fn(usize) -> bool) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers = reader.headers().unwrap().clone();
    let target = headers.iter().position(|name| name == column).unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().map(|row| row.unwrap()).collect();

    let mut writer = csv::Writer::from_path(path).unwrap();
    writer.write_record(&headers).unwrap();
    for (index, row) in rows.iter().enumerate() {
        let cells: Vec<&str> = row
            .iter()
            .enumerate()
            .map(|(cell, current)| {
                if cell == target && row_filter(index) {
                    value
                } else {
                    current
                }
            })
            .collect();
        writer.write_record(&cells).unwrap();
    }
    writer.flush().unwrap();
}

fn visit_numbers(service: &CheckInService<FlatFileRepository>, id: IdentityId) -> Vec<u32> {
    service
        .store()
        .participant(id)
        .unwrap()
        .visits
        .iter()
        .map(|visit| visit.visit_number)
        .collect()
}

fn header_line(path: &Path) -> String {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .next()
        .unwrap()
        .to_string()
}

#[test]
fn store_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let repo = FlatFileRepository::new(layout(dir.path()));
    let mut service = CheckInService::open(repo, None).unwrap();

    let first = service.submit(&jane("2155551234")).unwrap();
    service.submit(&jane("2155559999")).unwrap();
    let before = service.store().clone();

    let reloaded = FlatFileRepository::new(layout(dir.path()));
    assert!(reloaded.store_exists());
    let after = reloaded.load();

    assert_eq!(after, before);
    let participant = after.participant(first.identity_id).unwrap();
    assert_eq!(participant.visits.len(), 2);
    assert_eq!(participant.contacts.secondary_phones, vec!["2155559999".to_string()]);
}

#[test]
fn reopened_service_keeps_numbering_visits() {
    let dir = tempfile::tempdir().unwrap();
    let first = {
        let repo = FlatFileRepository::new(layout(dir.path()));
        let mut service = CheckInService::open(repo, None).unwrap();
        service.submit(&jane("2155551234")).unwrap()
    };

    let repo = FlatFileRepository::new(layout(dir.path()));
    let mut service = CheckInService::open(repo, None).unwrap();
    assert_eq!(service.origin(), StoreOrigin::Loaded);
    let second = service.submit(&jane("2155551234")).unwrap();

    assert_eq!(second.action, CheckInAction::MatchedExisting);
    assert_eq!(second.identity_id, first.identity_id);
    assert_eq!(second.visit.visit_number, 2);
}

#[test]
fn every_table_is_written_with_headers() {
    let dir = tempfile::tempdir().unwrap();
    let layout = layout(dir.path());
    let mut service = CheckInService::open(FlatFileRepository::new(layout.clone()), None).unwrap();
    service.submit(&jane("2155551234")).unwrap();

    assert!(header_line(&layout.people).starts_with("guid,first_name,last_name,dob,primary_email"));
    assert_eq!(
        header_line(&layout.people_contact_updates),
        "guid,type,value,added_at,visit_number,visit_datetime"
    );
    assert!(header_line(&layout.participants).starts_with("guid,first_name,last_name,dob,email,phone"));
    assert_eq!(
        header_line(&layout.participant_visits),
        "guid,visit_number,visit_datetime,visit_date,visit_time,tubric_study_code,consent_contact,entered_by"
    );
    assert_eq!(
        header_line(&layout.deidentified_visits),
        "guid,visit_number,visit_datetime,visit_date,visit_time,tubric_study_code"
    );
}

#[test]
fn deidentified_export_carries_no_identifying_values() {
    let dir = tempfile::tempdir().unwrap();
    let layout = layout(dir.path());
    let mut service = CheckInService::open(FlatFileRepository::new(layout.clone()), None).unwrap();
    let outcome = service.submit(&jane("2155551234")).unwrap();

    let export = fs::read_to_string(&layout.deidentified_visits).unwrap();
    assert!(export.contains(&outcome.identity_id.to_string()));
    assert!(export.contains("S-2"));
    for secret in ["Jane", "Doe", "jane@x.com", "2155551234", "2007-03-14"] {
        assert!(!export.contains(secret), "export leaked {secret}");
    }
    assert!(!layout.deidentified_visits.starts_with(dir.path().join("private")));
}

#[test]
fn malformed_rows_are_skipped_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let layout = layout(dir.path());
    let mut service = CheckInService::open(FlatFileRepository::new(layout.clone()), None).unwrap();
    let outcome = service.submit(&jane("2155551234")).unwrap();

    let mut visits = fs::read_to_string(&layout.participant_visits).unwrap();
    visits.push_str("not-a-guid,1,2024-01-01T00:00:00,,,,,\n");
    visits.push_str(&format!("{},zero,garbage,,,,,\n", outcome.identity_id));
    fs::write(&layout.participant_visits, visits).unwrap();

    let store = FlatFileRepository::new(layout).load();
    let participant = store.participant(outcome.identity_id).unwrap();
    assert_eq!(participant.visits.len(), 1);
}

#[test]
fn unreadable_store_loads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let layout = layout(dir.path());
    fs::create_dir_all(layout.people.parent().unwrap()).unwrap();
    fs::write(&layout.people, [0xff, 0xfe, 0x00, b'\n', 0xff]).unwrap();

    let repo = FlatFileRepository::new(layout);
    assert!(repo.store_exists());
    assert!(repo.load().is_empty());
}

#[test]
fn participant_without_person_is_repaired_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let layout = layout(dir.path());
    let mut service = CheckInService::open(FlatFileRepository::new(layout.clone()), None).unwrap();
    let outcome = service.submit(&jane("2155551234")).unwrap();

    fs::write(&layout.people, "guid,first_name\n").unwrap();

    let store = FlatFileRepository::new(layout).load();
    let person = store.person(outcome.identity_id).unwrap();
    assert_eq!(person.first_name, "Jane");
    assert_eq!(person.contacts.primary_phone.as_deref(), Some("2155551234"));
}

#[test]
fn legacy_file_is_migrated_once_and_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let legacy_path = dir.path().join("tubric_profiles.json");
    fs::write(&legacy_path, LEGACY).unwrap();

    let repo = FlatFileRepository::new(layout(dir.path()));
    let mut service = CheckInService::open(repo, Some(&legacy_path)).unwrap();
    let StoreOrigin::Migrated(report) = service.origin() else {
        panic!("expected migration, got {:?}", service.origin());
    };
    assert_eq!(report.profiles, 1);
    assert_eq!(report.visits, 2);
    assert_eq!(report.minted_ids, 0);

    let outcome = service.submit(&jane("2155551234")).unwrap();
    assert_eq!(outcome.action, CheckInAction::MatchedExisting);
    assert_eq!(
        outcome.identity_id.to_string(),
        "0b7c6f8e-2d51-4c1a-9a57-3f3e2b1d4c5a"
    );
    assert_eq!(outcome.visit.visit_number, 3);

    let repo = FlatFileRepository::new(layout(dir.path()));
    let (_, origin) = initialize(&repo, Some(&legacy_path)).unwrap();
    assert_eq!(origin, StoreOrigin::Loaded);
}

#[test]
fn emptied_store_is_never_remigrated() {
    let dir = tempfile::tempdir().unwrap();
    let layout = layout(dir.path());
    let now = parse_timestamp("2024-06-01T09:00:00").unwrap();
    let repo = FlatFileRepository::new(layout.clone());

    let (migrated, origin) = initialize_from(&repo, Some(LEGACY.as_bytes()), now).unwrap();
    assert!(matches!(origin, StoreOrigin::Migrated(_)));
    assert_eq!(migrated.len(), 1);

    fs::write(&layout.people, "guid\n").unwrap();
    fs::write(&layout.participants, "guid\n").unwrap();

    let (store, origin) = initialize_from(&repo, Some(LEGACY.as_bytes()), now).unwrap();
    assert_eq!(origin, StoreOrigin::Loaded);
    assert!(store.is_empty());
}

#[test]
fn corrupt_legacy_file_starts_empty_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let layout = layout(dir.path());
    let repo = FlatFileRepository::new(layout.clone());
    let now = parse_timestamp("2024-06-01T09:00:00").unwrap();

    let (store, origin) = initialize_from(&repo, Some(b"{not json"), now).unwrap();

    assert_eq!(origin, StoreOrigin::Empty);
    assert!(store.is_empty());
    assert!(!layout.people.exists());
}

#[test]
fn damaged_created_at_keeps_identity_and_its_visits() {
    let dir = tempfile::tempdir().unwrap();
    let layout = layout(dir.path());
    let first = {
        let mut service =
            CheckInService::open(FlatFileRepository::new(layout.clone()), None).unwrap();
        let first = service.submit(&jane("2155551234")).unwrap();
        service.submit(&jane("2155551234")).unwrap();
        first
    };
    overwrite_cells(&layout.people, "created_at", "2023-09-01", |_| true);
    overwrite_cells(&layout.participants, "created_at", "not a date", |_| true);

    let mut service = CheckInService::open(FlatFileRepository::new(layout.clone()), None).unwrap();
    let person = service.store().person(first.identity_id).unwrap();
    assert_eq!(person.created_at, parse_timestamp("2023-09-01T00:00:00").unwrap());
    let participant = service.store().participant(first.identity_id).unwrap();
    assert_eq!(participant.created_at, participant.visits[0].visited_at);

    let third = service.submit(&jane("2155551234")).unwrap();
    assert_eq!(third.action, CheckInAction::MatchedExisting);
    assert_eq!(third.identity_id, first.identity_id);
    assert_eq!(third.visit.visit_number, 3);
    assert_eq!(service.store().len(), 1);

    let reloaded = FlatFileRepository::new(layout).load();
    assert_eq!(reloaded.participant(first.identity_id).unwrap().visits.len(), 3);
}

#[test]
fn damaged_visit_datetime_keeps_numbering_contiguous() {
    let dir = tempfile::tempdir().unwrap();
    let layout = layout(dir.path());
    let first = {
        let mut service =
            CheckInService::open(FlatFileRepository::new(layout.clone()), None).unwrap();
        let first = service.submit(&jane("2155551234")).unwrap();
        service.submit(&jane("2155551234")).unwrap();
        service.submit(&jane("2155551234")).unwrap();
        first
    };
    overwrite_cells(&layout.participant_visits, "visit_datetime", "2024-01-01", |row| row == 1);

    let mut service = CheckInService::open(FlatFileRepository::new(layout), None).unwrap();
    let visits = &service.store().participant(first.identity_id).unwrap().visits;
    assert_eq!(visits[1].visited_at, parse_timestamp("2024-01-01T00:00:00").unwrap());

    let fourth = service.submit(&jane("2155551234")).unwrap();
    assert_eq!(fourth.visit.visit_number, 4);
    assert_eq!(visit_numbers(&service, first.identity_id), vec![1, 2, 3, 4]);
}

#[test]
fn duplicate_visit_numbers_are_renumbered_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let layout = layout(dir.path());
    let first = {
        let mut service =
            CheckInService::open(FlatFileRepository::new(layout.clone()), None).unwrap();
        let first = service.submit(&jane("2155551234")).unwrap();
        service.submit(&jane("2155551234")).unwrap();
        service.submit(&jane("2155551234")).unwrap();
        first
    };
    overwrite_cells(&layout.participant_visits, "visit_number", "3", |row| row == 1);

    let mut service = CheckInService::open(FlatFileRepository::new(layout), None).unwrap();
    assert_eq!(visit_numbers(&service, first.identity_id), vec![1, 2, 3]);

    let fourth = service.submit(&jane("2155551234")).unwrap();
    assert_eq!(fourth.visit.visit_number, 4);
}
