use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct LedgerPaths {
    pub home: PathBuf,
    pub workbook_path: PathBuf,
    pub secrets_file: PathBuf,
    pub config_file: PathBuf,
    pub logs_dir: PathBuf,
    pub repo_dir: PathBuf,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<LedgerPaths> {
    let home = match env::var("PICK3_HOME") {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => required_home_dir()?.join("pick3"),
    };

    let workbook_path = env_or_default_path("PICK3_WORKBOOK", home.join("draws.workbook.json"));
    let secrets_file = env_or_default_path("PICK3_SECRETS_FILE", home.join("secrets/config.json"));
    let config_file = env_or_default_path("PICK3_CONFIG_PATH", home.join("config.toml"));
    let logs_dir = env_or_default_path("PICK3_LOGS_DIR", home.join("logs"));
    let repo_dir = match env::var("PICK3_REPO_DIR") {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => env::current_dir()?,
    };

    Ok(LedgerPaths {
        home,
        workbook_path,
        secrets_file,
        config_file,
        logs_dir,
        repo_dir,
    })
}
