// Integration tests for CLI commands
// Run with: cargo test --test cli_commands_test

use std::io::Write;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

fn clinic_push(config_dir: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_clinic-push"));
    cmd.env("CLINIC_PUSH_CONFIG_DIR", config_dir.path())
        .env("CLINIC_PUSH_SUBSCRIPTIONS", config_dir.path().join("subs.json"))
        .env_remove("VAPID_PUBLIC_KEY")
        .env_remove("VAPID_PRIVATE_KEY")
        .env_remove("VAPID_SUBJECT");
    cmd
}

fn stdout_json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

fn generate_keys(dir: &TempDir) -> (String, String) {
    let output = clinic_push(dir).arg("generate-keys").output().unwrap();
    let keys = stdout_json(&output);
    (
        keys["publicKey"].as_str().unwrap().to_string(),
        keys["privateKey"].as_str().unwrap().to_string(),
    )
}

/// Test the generate-keys and check-config commands
#[test]
fn test_generate_keys_then_check_config() {
    let dir = TempDir::new().unwrap();
    let (public_key, private_key) = generate_keys(&dir);

    let output = clinic_push(&dir)
        .arg("check-config")
        .env("VAPID_PUBLIC_KEY", &public_key)
        .env("VAPID_PRIVATE_KEY", &private_key)
        .output()
        .unwrap();
    assert_eq!(stdout_json(&output)["publicKey"], public_key.as_str());

    // generate-keys never writes key material
    assert!(!dir.path().join("config.json").exists());
}

/// Test that check-config fails without keys
#[test]
fn test_check_config_without_keys_fails() {
    let dir = TempDir::new().unwrap();
    let output = clinic_push(&dir).arg("check-config").output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("VAPID"));
}

/// Test send from stdin for a recipient with no subscriptions
#[test]
fn test_send_without_subscriptions() {
    let dir = TempDir::new().unwrap();
    let (public_key, private_key) = generate_keys(&dir);

    let mut child = clinic_push(&dir)
        .arg("send")
        .env("VAPID_PUBLIC_KEY", &public_key)
        .env("VAPID_PRIVATE_KEY", &private_key)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(br#"{"userId":"patient-1","title":"Reminder","body":"Tomorrow"}"#)
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert_eq!(
        stdout_json(&output),
        serde_json::json!({"sent": 0, "removed": 0, "failed": 0, "reason": "no_subscriptions"})
    );
}

/// Test that an invalid request is rejected
#[test]
fn test_send_rejects_missing_title() {
    let dir = TempDir::new().unwrap();
    let (public_key, private_key) = generate_keys(&dir);
    let request = dir.path().join("request.json");
    std::fs::write(&request, r#"{"recipientId":"patient-1","body":"B"}"#).unwrap();

    let output = clinic_push(&dir)
        .args(["send", "--request"])
        .arg(&request)
        .env("VAPID_PUBLIC_KEY", &public_key)
        .env("VAPID_PRIVATE_KEY", &private_key)
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("title is required"));
}

/// Test subscribe and unsubscribe round trip through the store file
#[test]
fn test_subscribe_and_unsubscribe() {
    let dir = TempDir::new().unwrap();
    let (browser_public, _) = generate_keys(&dir);
    let sub_file = dir.path().join("sub.json");
    std::fs::write(
        &sub_file,
        serde_json::json!({
            "endpoint": "https://fcm.googleapis.com/fcm/send/abc",
            "expirationTime": null,
            "keys": {"p256dh": browser_public, "auth": "BTBZMqHH6r4Tts7J_aSIgg"}
        })
        .to_string(),
    )
    .unwrap();

    let output = clinic_push(&dir)
        .args(["subscribe", "--recipient", "patient-1", "--subscription"])
        .arg(&sub_file)
        .output()
        .unwrap();
    let id = stdout_json(&output)["id"].as_str().unwrap().to_string();

    let stored = std::fs::read_to_string(dir.path().join("subs.json")).unwrap();
    assert!(stored.contains("fcm.googleapis.com"));

    let output = clinic_push(&dir).args(["unsubscribe", "--id", &id]).output().unwrap();
    assert_eq!(stdout_json(&output)["removed"], true);
}
