use std::{fs, process::Command};

use tempfile::TempDir;

fn show_with(json_logs: bool) -> (String, String) {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");
    let ledger = dir.path().join("predictions.json");
    fs::write(&config, format!("ledger_path = '{}'\n", ledger.display())).unwrap();

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_gridcast"));
    cmd.env("RUST_LOG", "info").arg("--config").arg(&config).arg("show");
    if json_logs {
        cmd.arg("--json-logs");
    }
    let output = cmd.output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    (
        String::from_utf8(output.stdout).unwrap(),
        String::from_utf8(output.stderr).unwrap(),
    )
}

#[test]
fn json_logs_stay_off_stdout() {
    let (stdout, stderr) = show_with(true);

    assert_eq!(stdout, "No pending forecast.\nNo labeled history yet.\n");
    assert!(stderr.contains("no ledger yet"));
    assert!(stderr.lines().any(|l| l.starts_with('{')));
}

#[test]
fn text_logs_stay_off_stdout() {
    let (stdout, stderr) = show_with(false);

    assert_eq!(stdout, "No pending forecast.\nNo labeled history yet.\n");
    assert!(stderr.contains("no ledger yet"));
}
