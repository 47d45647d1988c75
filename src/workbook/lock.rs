use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::ledger::util::pid_alive;
use crate::logging::log;

pub const RELEASE_TIMEOUT: Duration = Duration::from_secs(8);
const RELEASE_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Free,
    StaleLockCleared,
    HolderTerminated(u32),
}

/// Exclusive advisory lock on `<workbook>.lock`; the file holds the owner's pid.
#[derive(Debug)]
pub struct WorkbookLock {
    file: File,
    path: PathBuf,
}

pub fn lock_path_for(workbook: &Path) -> PathBuf {
    let mut name = workbook
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    workbook.with_file_name(name)
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("failed to open lock file {}", path.display()))
}

fn read_holder_pid(file: &mut File) -> Option<u32> {
    let mut raw = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut raw).ok()?;
    raw.lines()
        .find(|line| !line.trim().is_empty())
        .and_then(|line| line.trim().parse::<u32>().ok())
}

impl WorkbookLock {
    pub fn acquire(path: &Path) -> Result<Self> {
        let mut file = open_lock_file(path)?;
        if file.try_lock_exclusive().is_err() {
            let holder = read_holder_pid(&mut file)
                .map(|pid| pid.to_string())
                .unwrap_or_else(|| "<unknown>".to_string());
            anyhow::bail!(
                "workbook lock {} is held by pid {holder}",
                path.display()
            );
        }
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        writeln!(file, "{}", std::process::id())?;
        file.flush()?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn release(self) -> Result<()> {
        let _ = self.file.set_len(0);
        FileExt::unlock(&self.file)
            .with_context(|| format!("failed to unlock {}", self.path.display()))?;
        drop(self.file);
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err)
                .with_context(|| format!("failed to remove lock file {}", self.path.display())),
        }
    }
}

fn send_terminate(pid: u32) -> Result<()> {
    let status = if cfg!(windows) {
        Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/F"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .context("failed to run `taskkill /PID`")?
    } else {
        Command::new("kill")
            .arg("-TERM")
            .arg(pid.to_string())
            .status()
            .context("failed to send SIGTERM with `kill -TERM`")?
    };
    if status.success() || !pid_alive(pid) {
        return Ok(());
    }
    anyhow::bail!("failed to terminate pid {pid} and process is still alive")
}

/// Kill every instance of the host application by image name. Exit status is ignored:
/// "no such process" is the normal case.
pub fn kill_host_process(name: &str) {
    let name = name.trim();
    if name.is_empty() {
        return;
    }
    let (tool, args): (&str, Vec<&str>) = if cfg!(windows) {
        ("taskkill", vec!["/IM", name, "/F"])
    } else {
        ("pkill", vec!["-x", name])
    };
    let Ok(bin) = which::which(tool) else {
        log(format!("{tool} not found; cannot stop host process {name}"));
        return;
    };
    match Command::new(bin)
        .args(&args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(status) => log(format!("Stopped host process {name} (exit={status})")),
        Err(err) => log(format!("failed to stop host process {name}: {err}")),
    }
}

/// Ensure nobody holds the workbook lock, terminating a live holder if needed.
pub fn force_release(
    lock_path: &Path,
    host_process: Option<&str>,
    timeout: Duration,
) -> Result<ReleaseOutcome> {
    if let Some(name) = host_process {
        kill_host_process(name);
    }

    if !lock_path.exists() {
        return Ok(ReleaseOutcome::Free);
    }

    let mut file = open_lock_file(lock_path)?;
    if file.try_lock_exclusive().is_ok() {
        FileExt::unlock(&file)?;
        drop(file);
        let _ = fs::remove_file(lock_path);
        log(format!("Removed stale workbook lock {}", lock_path.display()));
        return Ok(ReleaseOutcome::StaleLockCleared);
    }

    let Some(pid) = read_holder_pid(&mut file) else {
        anyhow::bail!(
            "workbook lock {} is held but records no pid",
            lock_path.display()
        );
    };
    if pid == std::process::id() {
        anyhow::bail!(
            "workbook lock {} is already held by this process",
            lock_path.display()
        );
    }

    log(format!("Workbook lock held by pid {pid}; terminating it"));
    send_terminate(pid)?;
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if file.try_lock_exclusive().is_ok() {
            FileExt::unlock(&file)?;
            drop(file);
            let _ = fs::remove_file(lock_path);
            return Ok(ReleaseOutcome::HolderTerminated(pid));
        }
        thread::sleep(RELEASE_POLL_INTERVAL);
    }

    anyhow::bail!(
        "timed out waiting for pid {pid} to release {} after {}s",
        lock_path.display(),
        timeout.as_secs()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lock_path_appends_suffix() {
        assert_eq!(
            lock_path_for(Path::new("/srv/pick3/draws.workbook.json")),
            PathBuf::from("/srv/pick3/draws.workbook.json.lock")
        );
    }

    #[test]
    fn acquire_is_exclusive_until_released() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("book.json.lock");

        let held = WorkbookLock::acquire(&path).expect("first acquire");
        let raw = fs::read_to_string(&path).expect("read lock");
        assert_eq!(raw.trim(), std::process::id().to_string());

        let err = WorkbookLock::acquire(&path).expect_err("second acquire must fail");
        assert!(format!("{err:#}").contains("is held by pid"));

        held.release().expect("release");
        assert!(!path.exists());
        WorkbookLock::acquire(&path)
            .expect("reacquire")
            .release()
            .expect("release again");
    }

    #[test]
    fn force_release_clears_stale_lock_file() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("book.json.lock");
        fs::write(&path, "999999\n").expect("write stale lock");

        let got = force_release(&path, None, Duration::from_millis(10)).expect("release");
        assert_eq!(got, ReleaseOutcome::StaleLockCleared);
        assert!(!path.exists());
    }

    #[test]
    fn force_release_refuses_to_kill_itself() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("book.json.lock");
        let held = WorkbookLock::acquire(&path).expect("acquire");

        let err = force_release(&path, None, Duration::from_millis(10)).expect_err("self-held");
        assert!(format!("{err:#}").contains("already held by this process"));
        held.release().expect("release");
    }

    #[test]
    fn force_release_without_lock_file_is_free() {
        let tmp = tempdir().expect("tempdir");
        let got = force_release(&tmp.path().join("missing.lock"), None, RELEASE_TIMEOUT)
            .expect("free");
        assert_eq!(got, ReleaseOutcome::Free);
    }
}
