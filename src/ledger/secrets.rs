use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::SyncError;

#[derive(Debug, Deserialize)]
struct SecretsFile {
    endpoint: Option<String>,
}

/// Read the feed endpoint URL from the secrets JSON file (`{"endpoint": "..."}`).
pub fn load_endpoint(path: &Path) -> Result<String, SyncError> {
    let raw = fs::read_to_string(path)
        .map_err(|err| SyncError::SecretsInvalid(format!("{}: {err}", path.display())))?;
    let parsed: SecretsFile = serde_json::from_str(&raw)
        .map_err(|err| SyncError::SecretsInvalid(format!("{}: {err}", path.display())))?;
    match parsed.endpoint.as_deref().map(str::trim) {
        Some(endpoint) if !endpoint.is_empty() => Ok(endpoint.to_string()),
        _ => Err(SyncError::SecretsInvalid(format!(
            "{}: missing `endpoint`",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn endpoint_is_trimmed() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("config.json");
        fs::write(&path, r#"{"endpoint": "  https://feed.example/pick3  ", "other": 1}"#)
            .expect("write secrets");
        assert_eq!(
            load_endpoint(&path).expect("endpoint"),
            "https://feed.example/pick3"
        );
    }

    #[test]
    fn missing_file_key_or_json_are_fatal() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("config.json");
        assert!(matches!(load_endpoint(&path), Err(SyncError::SecretsInvalid(_))));

        fs::write(&path, r#"{"url": "https://feed.example"}"#).expect("write");
        assert!(matches!(load_endpoint(&path), Err(SyncError::SecretsInvalid(_))));

        fs::write(&path, "{not json").expect("write");
        assert!(matches!(load_endpoint(&path), Err(SyncError::SecretsInvalid(_))));
    }
}
