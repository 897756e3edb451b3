//! Kiosk configuration and on-disk layout.
//!
//! # Responsibility
//! - Resolve data, log and sync locations from the environment.
//! - Name every flat file the store reads or writes.
//!
//! # Invariants
//! - Identifying files live only under `private_dir`.
//! - The de-identified export lives only under `deid_dir`.
//! - Blank environment values are treated as unset.

use std::path::{Path, PathBuf};

pub const ENV_PRIVATE_DIR: &str = "CHECKIN_PRIVATE_DIR";
pub const ENV_DEID_DIR: &str = "CHECKIN_DEID_DIR";
pub const ENV_LEGACY_FILE: &str = "CHECKIN_LEGACY_FILE";
pub const ENV_LOG_DIR: &str = "CHECKIN_LOG_DIR";
pub const ENV_LOG_LEVEL: &str = "CHECKIN_LOG_LEVEL";
pub const ENV_SYNC_REPO: &str = "CHECKIN_SYNC_REPO";

const DEFAULT_PRIVATE_DIR: &str = "ID-data";
const DEFAULT_DEID_DIR: &str = "Database";
const DEFAULT_LEGACY_FILE: &str = "tubric_profiles.json";
const EXPORT_SUBDIR: &str = "db_exports";

pub const PEOPLE_FILE: &str = "guid_people.csv";
pub const PEOPLE_CONTACT_UPDATES_FILE: &str = "guid_contact_updates.csv";
pub const PARTICIPANTS_FILE: &str = "participants.csv";
pub const PARTICIPANT_VISITS_FILE: &str = "participant_visits.csv";
pub const PARTICIPANT_CONTACT_UPDATES_FILE: &str = "participant_contact_updates.csv";
pub const DEIDENTIFIED_VISITS_FILE: &str = "deidentified_visits.csv";

/// Paths of every flat file that makes up the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    pub people: PathBuf,
    pub people_contact_updates: PathBuf,
    pub participants: PathBuf,
    pub participant_visits: PathBuf,
    pub participant_contact_updates: PathBuf,
    pub deidentified_visits: PathBuf,
}

impl StoreLayout {
    /// Lays files out as `<private_dir>/db_exports/*` and
    /// `<deid_dir>/db_exports/deidentified_visits.csv`.
    pub fn new(private_dir: impl AsRef<Path>, deid_dir: impl AsRef<Path>) -> Self {
        let full = private_dir.as_ref().join(EXPORT_SUBDIR);
        let deid = deid_dir.as_ref().join(EXPORT_SUBDIR);
        Self {
            people: full.join(PEOPLE_FILE),
            people_contact_updates: full.join(PEOPLE_CONTACT_UPDATES_FILE),
            participants: full.join(PARTICIPANTS_FILE),
            participant_visits: full.join(PARTICIPANT_VISITS_FILE),
            participant_contact_updates: full.join(PARTICIPANT_CONTACT_UPDATES_FILE),
            deidentified_visits: deid.join(DEIDENTIFIED_VISITS_FILE),
        }
    }
}

/// Runtime configuration for one kiosk process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KioskConfig {
    pub private_dir: PathBuf,
    pub deid_dir: PathBuf,
    pub legacy_file: PathBuf,
    /// Log directory. Logging stays off when unset.
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    /// Local clone that receives the de-identified export. Sync is off when unset.
    pub sync_repo: Option<PathBuf>,
}

impl KioskConfig {
    /// Resolves configuration from `CHECKIN_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            private_dir: read(ENV_PRIVATE_DIR)
                .map_or_else(|| PathBuf::from(DEFAULT_PRIVATE_DIR), PathBuf::from),
            deid_dir: read(ENV_DEID_DIR).map_or_else(|| PathBuf::from(DEFAULT_DEID_DIR), PathBuf::from),
            legacy_file: read(ENV_LEGACY_FILE)
                .map_or_else(|| PathBuf::from(DEFAULT_LEGACY_FILE), PathBuf::from),
            log_dir: read(ENV_LOG_DIR).map(PathBuf::from),
            log_level: read(ENV_LOG_LEVEL),
            sync_repo: read(ENV_SYNC_REPO).map(PathBuf::from),
        }
    }

    pub fn layout(&self) -> StoreLayout {
        StoreLayout::new(&self.private_dir, &self.deid_dir)
    }
}
