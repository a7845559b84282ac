use mcpflow::engine::CancellationFlag;
use mcpflow::executors::{run_command, CommandFailure, CommandSpec};
use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;

fn write_script(path: &Path, body: &str) {
    fs::write(path, body).expect("write script");
    let mut perms = fs::metadata(path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod");
}

fn spec(binary: &Path, cwd: &Path) -> CommandSpec {
    CommandSpec {
        binary: binary.display().to_string(),
        args: vec![],
        cwd: cwd.to_path_buf(),
        env: BTreeMap::new(),
    }
}

#[test]
fn stdout_and_stderr_are_captured_on_success() {
    let dir = tempdir().expect("tempdir");
    let bin = dir.path().join("ok-mock");
    write_script(&bin, "#!/bin/sh\necho 'out line'\necho 'err line' 1>&2\n");

    let output = run_command(
        &spec(&bin, dir.path()),
        Duration::from_secs(5),
        &CancellationFlag::new(),
    )
    .expect("success");
    assert_eq!(output.stdout.trim(), "out line");
    assert_eq!(output.stderr.trim(), "err line");
}

#[test]
fn env_entries_reach_the_child() {
    let dir = tempdir().expect("tempdir");
    let bin = dir.path().join("env-mock");
    write_script(&bin, "#!/bin/sh\necho \"$PAYLOAD\"\n");

    let mut command = spec(&bin, dir.path());
    command
        .env
        .insert("PAYLOAD".to_string(), "from-parent".to_string());
    let output = run_command(&command, Duration::from_secs(5), &CancellationFlag::new())
        .expect("success");
    assert_eq!(output.stdout.trim(), "from-parent");
}

#[test]
fn non_zero_exit_is_explicit_with_streams() {
    let dir = tempdir().expect("tempdir");
    let bin = dir.path().join("fail-mock");
    write_script(&bin, "#!/bin/sh\necho 'boom' 1>&2\nexit 17\n");

    let err = run_command(
        &spec(&bin, dir.path()),
        Duration::from_secs(5),
        &CancellationFlag::new(),
    )
    .expect_err("expected failure");
    let CommandFailure::NonZeroExit {
        exit_code, stderr, ..
    } = err
    else {
        panic!("expected non-zero exit");
    };
    assert_eq!(exit_code, 17);
    assert!(stderr.contains("boom"));
}

#[test]
fn missing_binary_is_distinguished_from_other_io() {
    let dir = tempdir().expect("tempdir");
    let missing = dir.path().join("not-installed");
    let err = run_command(
        &spec(&missing, dir.path()),
        Duration::from_secs(5),
        &CancellationFlag::new(),
    )
    .expect_err("expected failure");
    assert!(matches!(err, CommandFailure::MissingBinary { .. }));
}

#[test]
fn deadline_kills_a_slow_child() {
    let dir = tempdir().expect("tempdir");
    let bin = dir.path().join("slow-mock");
    write_script(&bin, "#!/bin/sh\nsleep 30\n");

    let err = run_command(
        &spec(&bin, dir.path()),
        Duration::from_millis(200),
        &CancellationFlag::new(),
    )
    .expect_err("expected timeout");
    assert!(matches!(err, CommandFailure::Timeout { .. }));
}

#[test]
fn cancellation_kills_a_running_child() {
    let dir = tempdir().expect("tempdir");
    let bin = dir.path().join("sleep-mock");
    write_script(&bin, "#!/bin/sh\nsleep 30\n");

    let cancel = CancellationFlag::new();
    let canceler = cancel.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        canceler.cancel();
    });

    let err = run_command(&spec(&bin, dir.path()), Duration::from_secs(30), &cancel)
        .expect_err("expected cancellation");
    assert!(matches!(err, CommandFailure::Canceled));
    handle.join().expect("canceler thread");
}
