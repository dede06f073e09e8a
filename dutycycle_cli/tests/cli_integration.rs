use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

// Minimal valid config; state goes next to it so runs never touch the cwd.
fn write_config(dir: &Path, extra: &str) -> PathBuf {
    let state = dir.join("state.toml");
    let toml = format!(
        r#"
[peer]
id = 7
address = "0x3F0C8E"

[persistence]
state_file = "{}"

[[valve_drives]]
address = "0x1F00AA"
channels = [1]
{extra}
"#,
        state.display()
    );
    let path = dir.join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn dutycycle() -> Command {
    let mut cmd = Command::cargo_bin("dutycycle").unwrap();
    cmd.arg("--log-level").arg("warn");
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["plan", "--address", "0x3F0C8E", "--count", "2"], 0, "ticks", "stdout")]
#[case(&["plan", "--address", "0x01000000"], 2, "24-bit", "stderr")]
#[case(&["plan"], 2, "required", "stderr")]
#[case(&["resume", "--address", "0x3F0C8E", "--last-event-us", "0", "--counter", "3", "--now-us", "3600000000"], 0, "fresh", "stdout")]
#[case(&["check-config"], 1, "needs --config", "stderr")]
#[case(&["run", "--valve", "120"], 2, "120", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let mut cmd = dutycycle();
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn plan_json_lines_follow_the_counter() {
    let out = dutycycle()
        .args(["--json", "plan", "--address", "0x3F0C8E", "--counter", "254", "--count", "3"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).expect("json line"))
        .collect();
    assert_eq!(lines.len(), 3);
    let counters: Vec<u64> = lines.iter().map(|v| v["counter"].as_u64().unwrap()).collect();
    assert_eq!(counters, vec![254, 255, 0]);
    for v in &lines {
        let len = v["cycle_length"].as_u64().unwrap();
        assert!((480..=735).contains(&len), "cycle length {len}");
    }
    let d0 = lines[0]["deadline_us"].as_i64().unwrap();
    let d1 = lines[1]["deadline_us"].as_i64().unwrap();
    assert!(d1 > d0);
}

#[rstest]
fn resume_json_for_recent_history() {
    let now: i64 = 1_700_000_000_000_000;
    let last = now - 7_000_000;
    let out = dutycycle()
        .arg("--json")
        .arg("resume")
        .args(["--address", "0x3F0C8E", "--counter", "10"])
        .arg(format!("--last-event-us={last}"))
        .arg(format!("--now-us={now}"))
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["mode"], "resumed");
    let next = v["next_deadline_us"].as_i64().unwrap();
    assert!(next > now - 7_000_000);
}

#[rstest]
fn check_config_accepts_valid_file() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), "");
    dutycycle()
        .arg("--config")
        .arg(&cfg)
        .arg("check-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("config ok: peer 3F0C8E, 1 valve drive(s)"));
}

#[rstest]
#[case("[timing]\nfine_lead_ticks = 0\n", "fine_lead_ticks")]
#[case("[decalcification]\nhour = 24\n", "decalcification.hour")]
#[case("[valve]\ninitial_percent = 101\n", "initial_percent")]
fn check_config_rejects_invalid_values(#[case] extra: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), extra);
    dutycycle()
        .arg("--config")
        .arg(&cfg)
        .arg("check-config")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration is invalid"))
        .stderr(predicate::str::contains(needle));
}

#[rstest]
fn json_mode_reports_errors_as_objects() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    let out = dutycycle()
        .arg("--json")
        .arg("--config")
        .arg(&missing)
        .arg("check-config")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8(out.stderr).unwrap();
    let last = stderr.lines().last().expect("error line");
    let v: serde_json::Value = serde_json::from_str(last).expect("json error");
    assert_eq!(v["reason"], "Error");
    assert!(v["message"].as_str().unwrap().contains("could not be loaded"));
}

#[rstest]
fn run_persists_state_and_stops_after_duration() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), "");
    dutycycle()
        .arg("--config")
        .arg(&cfg)
        .args(["run", "--valve", "50", "--duration-s", "1", "--fresh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("stopped: peer 3F0C8E"))
        .stdout(predicate::str::contains("valve 0/128"));

    let state = fs::read_to_string(dir.path().join("state.toml")).unwrap();
    assert!(state.contains("1005 = 128"), "{state}");
    assert!(state.contains("1006"), "{state}");
    assert!(state.contains("1007"), "{state}");
}
