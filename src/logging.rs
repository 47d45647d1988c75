use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const LOG_FILE_NAME: &str = "pick3-sync.log";

static LOG_FILE: OnceLock<PathBuf> = OnceLock::new();

/// Route `log` lines to `<logs_dir>/pick3-sync.log` in addition to stderr.
pub fn init(logs_dir: &Path) {
    let _ = LOG_FILE.set(logs_dir.join(LOG_FILE_NAME));
}

fn timestamp() -> String {
    Local::now().format("[%m/%d/%Y %I:%M:%S %p]").to_string()
}

/// Timestamped line on stderr and in the durable log. Never fails.
pub fn log(msg: impl AsRef<str>) {
    let line = format!("{} {}", timestamp(), msg.as_ref());
    let _ = writeln!(std::io::stderr(), "{line}");

    let Some(path) = LOG_FILE.get() else {
        return;
    };
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let _ = writeln!(file, "{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::timestamp;

    #[test]
    fn timestamp_uses_twelve_hour_clock() {
        let ts = timestamp();
        assert!(ts.starts_with('[') && ts.ends_with(']'));
        assert!(ts.ends_with("AM]") || ts.ends_with("PM]"));
        assert_eq!(ts.len(), "[10/19/2026 04:05:06 PM]".len());
    }
}
