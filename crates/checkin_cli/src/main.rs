//! Kiosk back-end entry point.
//!
//! # Responsibility
//! - Read one check-in as JSON from stdin and submit it to the core store.
//! - Print `{"guid": ..., "action": ...}` on success, exit 1 on failure.
//!
//! Configuration comes from `CHECKIN_*` environment variables.

use checkin_core::{
    default_log_level, flush_logging, init_logging, CheckInAction, CheckInRequest, CheckInService,
    FlatFileRepository, GitRemoteSync, KioskConfig,
};
use serde::Serialize;
use std::io::Read;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct SubmitResponse {
    guid: String,
    action: CheckInAction,
}

fn main() -> ExitCode {
    let result = run();
    flush_logging();
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("checkin: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let config = KioskConfig::from_env();
    start_logging(&config);

    let request = read_request()?;

    let repo = FlatFileRepository::new(config.layout());
    let mut service = CheckInService::open(repo, Some(config.legacy_file.as_path()))
        .map_err(|err| format!("failed to open store: {err}"))?;
    if let Some(sync_repo) = &config.sync_repo {
        service = service.with_remote_sync(Arc::new(GitRemoteSync::new(sync_repo)));
    }

    let outcome = service.submit(&request).map_err(|err| err.to_string())?;
    let response = SubmitResponse {
        guid: outcome.identity_id.to_string(),
        action: outcome.action,
    };
    let body = serde_json::to_string(&response)
        .map_err(|err| format!("failed to encode response: {err}"))?;
    println!("{body}");

    service.wait_for_sync();
    Ok(())
}

fn read_request() -> Result<CheckInRequest, String> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .map_err(|err| format!("failed to read stdin: {err}"))?;
    if input.trim().is_empty() {
        return Ok(CheckInRequest::default());
    }
    serde_json::from_str(&input).map_err(|err| format!("invalid check-in payload: {err}"))
}

fn start_logging(config: &KioskConfig) {
    let Some(log_dir) = config.log_dir.as_deref() else {
        return;
    };
    let level = config.log_level.as_deref().unwrap_or(default_log_level());
    // Logging is optional; a bad setting must not block the check-in.
    if let Err(err) = init_logging(level, &log_dir.to_string_lossy()) {
        eprintln!("checkin: logging disabled: {err}");
    }
}
