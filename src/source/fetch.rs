use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::SyncError;
use crate::logging::log;

const REQUEST_TIMEOUT_SECS: u64 = 25;

/// GET the draw feed. Transport errors, non-2xx statuses and non-JSON bodies are fatal.
pub fn fetch_payload(url: &str) -> Result<Value> {
    log(format!("Fetching draw feed -> {url}"));
    let client = Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|err| SyncError::Fetch(format!("failed to build http client: {err}")))?;
    let response = client
        .get(url)
        .send()
        .map_err(|err| SyncError::Fetch(format!("GET {url}: {err}")))?;
    let status = response.status();
    if !status.is_success() {
        return Err(SyncError::Fetch(format!("GET {url} returned {status}")).into());
    }
    let json: Value = response
        .json()
        .map_err(|err| SyncError::Fetch(format!("GET {url} returned invalid JSON: {err}")))?;
    Ok(json)
}

/// Load a payload captured earlier instead of fetching it.
pub fn read_payload_file(path: &Path) -> Result<Value> {
    log(format!("Reading draw payload from {}", path.display()));
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let json = serde_json::from_str(&raw)
        .map_err(|err| SyncError::Payload(format!("{}: {err}", path.display())))?;
    Ok(json)
}
