//! Integration tests for `tamra --json`
//!
//! Every command run with `--json` must print one JSON document on stdout.

use serde_json::Value;
use std::path::Path;
use std::process::Command;

fn run_tamra(dir: &Path, args: &[&str]) -> Value {
    let output = Command::new(env!("CARGO_BIN_EXE_tamra"))
        .current_dir(dir)
        .env("RUST_LOG", "off")
        .arg("--data-dir")
        .arg(dir.join("data"))
        .arg("--json")
        .args(args)
        .output()
        .expect("failed to run tamra");

    assert!(
        output.status.success(),
        "tamra {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

#[test]
fn test_profile_and_admin_commands_print_json() {
    let dir = tempfile::tempdir().unwrap();

    let signup = run_tamra(dir.path(), &["signup", "--id", "alice"]);
    assert_eq!(signup["account"]["id"], "alice");

    let streak = run_tamra(dir.path(), &["streak", "alice", "3"]);
    assert_eq!(streak["account"], "alice");
    assert_eq!(streak["streak"], 3);

    let payout = run_tamra(
        dir.path(),
        &[
            "payout",
            "7EcDhSYGxXyscszYEp35KHN8vvw3svAuLKTzXwCFLtV",
            "--account",
            "alice",
        ],
    );
    assert_eq!(
        payout["payout_address"],
        "7EcDhSYGxXyscszYEp35KHN8vvw3svAuLKTzXwCFLtV"
    );

    let rename = run_tamra(dir.path(), &["rename", "Alice A.", "--account", "alice"]);
    assert_eq!(rename["display_name"], "Alice A.");

    let award = run_tamra(dir.path(), &["award", "alice", "1500"]);
    assert_eq!(award["awarded"], 1500);

    let show = run_tamra(dir.path(), &["show", "alice"]);
    assert_eq!(show["balance"], 1500);
    assert_eq!(show["level"], 2);
    assert_eq!(show["mining_streak"], 3);
}
