use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

const VALID_CONFIG: &str = r#"
[target]
identity = "someone"

[credentials]
id = "watcher"
secret = "hunter2-very-secret"

[recorder]
address = "ws://127.0.0.1:1"
credential = "obs-password"

[polling]
live_check_interval_secs = 30
end_check_interval_secs = 5

[logging]
file = false
"#;

fn write_config(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("Failed to write config");
    path
}

fn livewatch(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_livewatch"))
        .args(args)
        .env("HOME", home)
        .env_remove("LIVEWATCH_CONFIG")
        .env_remove("LIVEWATCH_SECRET")
        .env_remove("LIVEWATCH_RECORDER_CREDENTIAL")
        .env_remove("LIVEWATCH_DEBUG_LOG")
        .stdin(Stdio::null())
        .output()
        .expect("Failed to spawn livewatch")
}

#[test]
fn check_config_prints_redacted_summary() {
    let home = TempDir::new().unwrap();
    let config = write_config(home.path(), "config.toml", VALID_CONFIG);

    let output = livewatch(
        home.path(),
        &["check-config", "--config", config.to_str().unwrap()],
    );

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Configuration OK"));
    assert!(stdout.contains("someone"));
    assert!(stdout.contains("credential set"));
    assert!(!stdout.contains("hunter2-very-secret"));
    assert!(!stdout.contains("obs-password"));
}

#[test]
fn check_config_uses_default_location() {
    let home = TempDir::new().unwrap();
    let dir = home.path().join(".livewatch");
    std::fs::create_dir_all(&dir).unwrap();
    write_config(&dir, "config.toml", VALID_CONFIG);

    let output = livewatch(home.path(), &["check-config"]);

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Configuration OK"));
}

#[test]
fn invalid_interval_is_rejected() {
    let home = TempDir::new().unwrap();
    let config = write_config(
        home.path(),
        "config.toml",
        &VALID_CONFIG.replace(
            "live_check_interval_secs = 30",
            "live_check_interval_secs = 0",
        ),
    );

    let output = livewatch(
        home.path(),
        &["check-config", "--config", config.to_str().unwrap()],
    );

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("polling.live_check_interval_secs"));
}

#[test]
fn missing_config_fails() {
    let home = TempDir::new().unwrap();
    let missing = home.path().join("nope.toml");

    let output = livewatch(
        home.path(),
        &["check-config", "--config", missing.to_str().unwrap()],
    );

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn run_exits_nonzero_when_recorder_is_unreachable() {
    let home = TempDir::new().unwrap();
    let config = write_config(home.path(), "config.toml", VALID_CONFIG);

    let output = livewatch(
        home.path(),
        &["run", "--config", config.to_str().unwrap()],
    );

    assert_eq!(output.status.code(), Some(1));
    assert!(!home.path().join(".livewatch").join("logs").exists());
}
