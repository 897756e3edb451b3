//! Flat-file (CSV) implementation of the store repository.
//!
//! # Responsibility
//! - Read the People/Participants tables and their child tables into one
//!   consistent `IdentityStore`.
//! - Rewrite every table, plus the de-identified export, after each mutation.
//!
//! # Invariants
//! - A missing or unreadable table loads as empty. A row is skipped only when
//!   its key is unreadable; other damaged columns are defaulted and logged.
//! - Loaded visits are renumbered 1..N when the file has gaps or duplicates.
//! - Child rows (visits, contact updates) attach to their identity by `guid`.
//! - Each file is replaced atomically; headers are written even when empty.
//! - Log lines carry table names and counts only, never row content.

use super::atomic_write::write_atomic;
use super::rows::{
    ContactUpdateRow, Decoded, DeidentifiedRow, ParticipantRow, PersonRow, VisitRow,
    CONTACT_UPDATE_COLUMNS, DEIDENTIFIED_COLUMNS, PARTICIPANT_COLUMNS, PEOPLE_COLUMNS,
    VISIT_COLUMNS,
};
use super::store_repo::{RepoError, RepoResult, StoreRepository};
use crate::config::StoreLayout;
use crate::model::contact::{ContactBook, ContactUpdate};
use crate::model::identity::{IdentityId, Participant, Person};
use crate::model::timestamp::{now_local, Timestamp};
use crate::model::visit::Visit;
use crate::store::IdentityStore;
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

/// Store repository backed by the kiosk CSV files.
#[derive(Debug, Clone)]
pub struct FlatFileRepository {
    layout: StoreLayout,
}

impl FlatFileRepository {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }
}

impl StoreRepository for FlatFileRepository {
    fn store_exists(&self) -> bool {
        self.layout.people.exists() || self.layout.participants.exists()
    }

    fn load(&self) -> IdentityStore {
        let started_at = Instant::now();
        let loaded_at = now_local();

        let people = decode_rows(
            read_table::<PersonRow>(&self.layout.people, "people"),
            "people",
            |row| row.decode(loaded_at),
        );
        let person_updates = group_by_id(decode_rows(
            read_table::<ContactUpdateRow>(&self.layout.people_contact_updates, "people_contact_updates"),
            "people_contact_updates",
            |row| row.decode(loaded_at),
        ));
        let visits = group_by_id(decode_rows(
            read_table::<VisitRow>(&self.layout.participant_visits, "participant_visits"),
            "participant_visits",
            |row| row.decode(loaded_at),
        ));
        let first_visit_at = earliest_visits(&visits);
        let participants = decode_rows(
            read_table::<ParticipantRow>(&self.layout.participants, "participants"),
            "participants",
            |row| row.decode(|id| first_visit_at.get(&id).copied().unwrap_or(loaded_at)),
        );
        let participant_updates = group_by_id(decode_rows(
            read_table::<ContactUpdateRow>(
                &self.layout.participant_contact_updates,
                "participant_contact_updates",
            ),
            "participant_contact_updates",
            |row| row.decode(loaded_at),
        ));

        let store = assemble(
            people,
            person_updates,
            participants,
            visits,
            participant_updates,
        );
        info!(
            "event=store_load module=repo status=ok people={} participants={} visits={} duration_ms={}",
            store.len(),
            store.participants().len(),
            store.visit_count(),
            started_at.elapsed().as_millis()
        );
        store
    }

    fn persist(&self, store: &IdentityStore) -> RepoResult<()> {
        let started_at = Instant::now();
        match self.write_all_tables(store) {
            Ok(()) => {
                info!(
                    "event=store_persist module=repo status=ok people={} visits={} duration_ms={}",
                    store.len(),
                    store.visit_count(),
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=store_persist module=repo status=error duration_ms={} error_code=store_write_failed error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn deidentified_export_path(&self) -> Option<&Path> {
        Some(self.layout.deidentified_visits.as_path())
    }
}

impl FlatFileRepository {
    fn write_all_tables(&self, store: &IdentityStore) -> RepoResult<()> {
        let layout = &self.layout;

        write_table(
            &layout.people,
            PEOPLE_COLUMNS,
            store.people().iter().map(PersonRow::encode),
        )?;
        write_table(
            &layout.people_contact_updates,
            CONTACT_UPDATE_COLUMNS,
            store.people().iter().flat_map(|person| {
                person
                    .contacts
                    .updates
                    .iter()
                    .map(move |update| ContactUpdateRow::encode(person.id, update))
            }),
        )?;
        write_table(
            &layout.participants,
            PARTICIPANT_COLUMNS,
            store.participants().iter().map(ParticipantRow::encode),
        )?;
        write_table(
            &layout.participant_visits,
            VISIT_COLUMNS,
            store.participants().iter().flat_map(|participant| {
                participant
                    .visits
                    .iter()
                    .map(move |visit| VisitRow::encode(participant.id, visit))
            }),
        )?;
        write_table(
            &layout.participant_contact_updates,
            CONTACT_UPDATE_COLUMNS,
            store.participants().iter().flat_map(|participant| {
                participant
                    .contacts
                    .updates
                    .iter()
                    .map(move |update| ContactUpdateRow::encode(participant.id, update))
            }),
        )?;
        write_table(
            &layout.deidentified_visits,
            DEIDENTIFIED_COLUMNS,
            store
                .deidentified_visits()
                .iter()
                .map(DeidentifiedRow::encode),
        )?;
        Ok(())
    }
}

fn write_table<T: Serialize>(
    path: &Path,
    columns: &[&str],
    rows: impl IntoIterator<Item = T>,
) -> RepoResult<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer
        .write_record(columns)
        .map_err(|err| RepoError::csv(path, err))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|err| RepoError::csv(path, err))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| RepoError::io(path, err.into_error()))?;
    write_atomic(path, &bytes)
}

fn read_table<T: DeserializeOwned>(path: &Path, table: &str) -> Vec<T> {
    if !path.exists() {
        debug!("event=table_read module=repo status=skip table={table} reason=missing");
        return Vec::new();
    }

    let mut reader = match csv::ReaderBuilder::new().flexible(true).from_path(path) {
        Ok(reader) => reader,
        Err(err) => {
            warn!(
                "event=table_read module=repo status=error table={table} error_code=table_unreadable error={err}"
            );
            return Vec::new();
        }
    };
    if let Err(err) = reader.headers() {
        warn!(
            "event=table_read module=repo status=error table={table} error_code=header_unreadable error={err}"
        );
        return Vec::new();
    }

    let mut rows = Vec::new();
    for (index, record) in reader.deserialize::<T>().enumerate() {
        match record {
            Ok(row) => rows.push(row),
            Err(_) => warn!(
                "event=table_read module=repo status=skip table={table} row={} reason=malformed_row",
                index + 1
            ),
        }
    }
    rows
}

fn decode_rows<R, T>(
    rows: Vec<R>,
    table: &str,
    mut decode: impl FnMut(R) -> Result<Decoded<T>, String>,
) -> Vec<T> {
    let mut decoded = Vec::with_capacity(rows.len());
    for (index, row) in rows.into_iter().enumerate() {
        match decode(row) {
            Ok(Decoded { value, defaulted }) => {
                if !defaulted.is_empty() {
                    warn!(
                        "event=row_decode module=repo status=repair table={table} row={} defaulted={}",
                        index + 1,
                        defaulted.join("|")
                    );
                }
                decoded.push(value);
            }
            Err(reason) => warn!(
                "event=row_decode module=repo status=skip table={table} row={} reason={reason}",
                index + 1
            ),
        }
    }
    decoded
}

fn earliest_visits(visits: &HashMap<IdentityId, Vec<Visit>>) -> HashMap<IdentityId, Timestamp> {
    visits
        .iter()
        .filter_map(|(id, own)| own.iter().map(|visit| visit.visited_at).min().map(|at| (*id, at)))
        .collect()
}

fn group_by_id<T>(rows: Vec<(IdentityId, T)>) -> HashMap<IdentityId, Vec<T>> {
    let mut grouped: HashMap<IdentityId, Vec<T>> = HashMap::new();
    for (id, value) in rows {
        grouped.entry(id).or_default().push(value);
    }
    grouped
}

fn assemble(
    people: Vec<Person>,
    mut person_updates: HashMap<IdentityId, Vec<ContactUpdate>>,
    participants: Vec<Participant>,
    mut visits: HashMap<IdentityId, Vec<Visit>>,
    mut participant_updates: HashMap<IdentityId, Vec<ContactUpdate>>,
) -> IdentityStore {
    let mut store = IdentityStore::new();

    for mut person in people {
        person.contacts.updates = person_updates.remove(&person.id).unwrap_or_default();
        if let Err(err) = store.insert_person(person) {
            warn!("event=store_load module=repo status=skip table=people reason={err}");
        }
    }

    for mut participant in participants {
        let id = participant.id;
        participant.contacts.updates = participant_updates.remove(&id).unwrap_or_default();
        let mut own_visits = visits.remove(&id).unwrap_or_default();
        own_visits.sort_by_key(|visit| (visit.visit_number, visit.visited_at));
        participant.visits = own_visits;
        if !participant.has_contiguous_visits() {
            warn!("event=store_load module=repo status=repair table=participant_visits guid={id} reason=visits_renumbered");
            participant.renumber_visits();
        }

        if store.person(id).is_none() {
            warn!("event=store_load module=repo status=repair table=people guid={id} reason=person_missing_for_participant");
            if let Err(err) = store.insert_person(person_from_participant(&participant)) {
                warn!("event=store_load module=repo status=skip table=people reason={err}");
            }
        }
        if let Err(err) = store.insert_participant(participant) {
            warn!("event=store_load module=repo status=skip table=participants reason={err}");
        }
    }

    let orphan_visits: usize = visits.values().map(Vec::len).sum();
    if orphan_visits > 0 {
        warn!("event=store_load module=repo status=skip table=participant_visits orphan_rows={orphan_visits}");
    }
    let orphan_updates: usize = person_updates
        .values()
        .chain(participant_updates.values())
        .map(Vec::len)
        .sum();
    if orphan_updates > 0 {
        warn!("event=store_load module=repo status=skip table=contact_updates orphan_rows={orphan_updates}");
    }

    store
}

fn person_from_participant(participant: &Participant) -> Person {
    Person {
        id: participant.id,
        first_name: participant.first_name.clone(),
        last_name: participant.last_name.clone(),
        dob: participant.dob,
        contacts: ContactBook {
            updates: Vec::new(),
            ..participant.contacts.clone()
        },
        created_at: participant.created_at,
        last_seen_at: participant.visits.last().map(|visit| visit.visited_at),
    }
}
