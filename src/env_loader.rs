use std::env;
use std::path::PathBuf;

include!(concat!(env!("OUT_DIR"), "/env_allowlist.rs"));

fn fallback_dotenv_path(pick3_home: Option<PathBuf>, home_dir: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(home) = pick3_home {
        return Some(home.join(".env"));
    }
    Some(home_dir?.join("pick3/.env"))
}

pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let fallback = fallback_dotenv_path(
        env::var_os("PICK3_HOME").map(PathBuf::from),
        dirs::home_dir(),
    );

    let Some(path) = fallback else {
        return;
    };
    if path.is_file() {
        let _ = dotenvy::from_path(&path);
    }
}

/// `PICK3_*` variables present in the environment that no code path reads.
pub fn unknown_env_keys<I>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out = keys
        .into_iter()
        .filter(|key| key.starts_with("PICK3_"))
        .filter(|key| !GENERATED_ENV_ALLOWLIST.contains(&key.as_str()))
        .collect::<Vec<_>>();
    out.sort();
    out
}
