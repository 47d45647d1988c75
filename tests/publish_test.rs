#![cfg(unix)]

use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_fake_git(bin_path: &Path, trace: &Path, push_rc: i32) {
    let script = format!(
        "#!/usr/bin/env bash\necho \"$*\" >> '{}'\nif [ \"$1\" = push ]; then exit {push_rc}; fi\nif [ \"$1\" = commit ]; then echo 'nothing to commit'; exit 1; fi\nexit 0\n",
        trace.display()
    );
    fs::write(bin_path, script).expect("write fake git");
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(bin_path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(bin_path, perms).expect("chmod");
}

fn publish(tmp: &Path, git: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("pick3-sync");
    cmd.current_dir(tmp)
        .env("PICK3_HOME", tmp)
        .env("PICK3_REPO_DIR", tmp)
        .env("PICK3_GIT_BIN", git)
        .arg("publish");
    cmd
}

#[test]
fn publish_runs_git_steps_in_order_and_ignores_commit_failure() {
    let tmp = tempdir().expect("tempdir");
    let git = tmp.path().join("git");
    let trace = tmp.path().join("trace.txt");
    write_fake_git(&git, &trace, 0);

    publish(tmp.path(), &git)
        .args(["-m", "nightly draws"])
        .assert()
        .success()
        .stdout(predicate::str::contains("git_commit_rc=1"))
        .stdout(predicate::str::contains("git_push_rc=0"));

    let calls = fs::read_to_string(&trace).expect("trace");
    assert_eq!(
        calls,
        "add -A\ncommit -m nightly draws\npull --rebase\npush\n"
    );
}

#[test]
fn failed_push_fails_publish() {
    let tmp = tempdir().expect("tempdir");
    let git = tmp.path().join("git");
    let trace = tmp.path().join("trace.txt");
    write_fake_git(&git, &trace, 128);

    publish(tmp.path(), &git)
        .assert()
        .failure()
        .stdout(predicate::str::contains("! git push exited with 128"));

    let calls = fs::read_to_string(&trace).expect("trace");
    assert!(calls.contains("commit -m Auto pipeline update"));
}
