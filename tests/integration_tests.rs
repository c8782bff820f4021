//! Integration tests for photosweep
//!
//! These drive the binary end to end: configuration files, the stage
//! listing and scripted sessions against an in-memory library.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Helper to create a photosweep Command
fn photosweep() -> Command {
    cargo_bin_cmd!("photosweep")
}

/// Helper to create a temporary project directory
fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

const LIBRARY: &str = r#"{
    "photos": [
        { "id": 1, "uri": "content://media/1" },
        { "id": 2, "uri": "content://media/2" },
        { "id": 3, "uri": "content://media/3" }
    ],
    "albums": [{ "id": "trips", "name": "Trips" }],
    "album_paths": { "trips": "/storage/Pictures/Trips" },
    "requires_confirmation": false
}"#;

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_photosweep_help() {
        photosweep()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("simulate"));
    }

    #[test]
    fn test_photosweep_version() {
        photosweep().arg("--version").assert().success();
    }

    #[test]
    fn test_stages_default_sequence_includes_classify() {
        photosweep()
            .arg("stages")
            .assert()
            .success()
            .stdout(predicate::str::contains("classify"))
            .stdout(predicate::str::contains("victory"));
    }

    #[test]
    fn test_stages_with_classify_on_swipe() {
        photosweep()
            .args(["stages", "--classify-on-swipe"])
            .assert()
            .success()
            .stdout(predicate::str::contains("compare"))
            .stdout(predicate::str::contains("classify").not());
    }
}

// =============================================================================
// Configuration Tests
// =============================================================================

mod config {
    use super::*;

    #[test]
    fn test_config_init_creates_file() {
        let dir = create_temp_project();

        photosweep()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created sweep.toml"));

        assert!(dir.path().join(".photosweep/sweep.toml").exists());
    }

    #[test]
    fn test_config_init_idempotent() {
        let dir = create_temp_project();

        photosweep()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success();

        photosweep()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
    }

    #[test]
    fn test_config_validate_reports_warnings() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".photosweep")).unwrap();
        fs::write(
            dir.path().join(".photosweep/sweep.toml"),
            "[ledger]\ncapacity = 0\n",
        )
        .unwrap();

        photosweep()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("ledger.capacity"));
    }

    #[test]
    fn test_config_show_effective_values() {
        let dir = create_temp_project();

        photosweep()
            .current_dir(dir.path())
            .env("PHOTOSWEEP_TRANSFER", "move")
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("transfer = \"move\""));
    }

    #[test]
    fn test_config_rejects_malformed_file() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".photosweep")).unwrap();
        fs::write(dir.path().join(".photosweep/sweep.toml"), "[ledger\n").unwrap();

        photosweep()
            .current_dir(dir.path())
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("sweep.toml"));
    }
}

// =============================================================================
// Simulation Tests
// =============================================================================

mod simulate {
    use super::*;

    #[test]
    fn test_full_session_reaches_victory() {
        let dir = create_temp_project();
        let library = write_file(&dir, "library.json", LIBRARY);
        let intents = write_file(
            &dir,
            "intents.json",
            r#"[
                { "intent": "start" },
                { "intent": "swipe", "photo": 1, "decision": "keep" },
                { "intent": "swipe", "photo": 2, "decision": "maybe" },
                { "intent": "swipe", "photo": 3, "decision": "trash" },
                { "intent": "resolve", "photo": 2, "disposition": "keep" },
                { "intent": "classify_to_album", "album": "trips" },
                { "intent": "classify_to_album", "album": "trips" },
                { "intent": "request_permanent_delete" }
            ]"#,
        );

        photosweep()
            .current_dir(dir.path())
            .arg("simulate")
            .arg("--library")
            .arg(&library)
            .arg("--intents")
            .arg(&intents)
            .assert()
            .success()
            .stdout(predicate::str::contains("\"stage\": \"victory\""))
            .stdout(predicate::str::contains("\"event\": \"batch\""))
            .stdout(predicate::str::contains("\"error\"").not());
    }

    #[test]
    fn test_rejected_intent_is_reported_and_replay_continues() {
        let dir = create_temp_project();
        let library = write_file(&dir, "library.json", LIBRARY);
        let intents = write_file(
            &dir,
            "intents.json",
            r#"[
                { "intent": "start" },
                { "intent": "skip_classify" },
                { "intent": "swipe", "photo": 1, "decision": "maybe" }
            ]"#,
        );

        photosweep()
            .current_dir(dir.path())
            .arg("simulate")
            .arg("--library")
            .arg(&library)
            .arg("--intents")
            .arg(&intents)
            .assert()
            .success()
            .stdout(predicate::str::contains("\"error\""))
            .stdout(predicate::str::contains("\"unsorted_remaining\": 2"))
            .stdout(predicate::str::contains("\"can_undo\": true"));
    }

    #[test]
    fn test_confirmation_flow_deletes_after_confirm() {
        let dir = create_temp_project();
        let library = write_file(
            &dir,
            "library.json",
            &LIBRARY.replace(
                "\"requires_confirmation\": false",
                "\"requires_confirmation\": true",
            ),
        );
        let intents = write_file(
            &dir,
            "intents.json",
            r#"[
                { "intent": "start" },
                { "intent": "swipe", "photo": 1, "decision": "trash" },
                { "intent": "swipe", "photo": 2, "decision": "trash" },
                { "intent": "swipe", "photo": 3, "decision": "trash" },
                { "intent": "request_advance" },
                { "intent": "request_advance" },
                { "intent": "request_permanent_delete" },
                { "intent": "confirm_delete", "token": "delete-1", "confirmed": true }
            ]"#,
        );

        photosweep()
            .current_dir(dir.path())
            .arg("simulate")
            .arg("--library")
            .arg(&library)
            .arg("--intents")
            .arg(&intents)
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "\"event\": \"delete_awaiting_confirmation\"",
            ))
            .stdout(predicate::str::contains("\"stage\": \"victory\""));
    }

    #[test]
    fn test_daily_task_target_from_config() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".photosweep")).unwrap();
        fs::write(
            dir.path().join(".photosweep/sweep.toml"),
            "[workflow]\ndaily_task_target = 2\n",
        )
        .unwrap();
        let library = write_file(&dir, "library.json", LIBRARY);
        let intents = write_file(
            &dir,
            "intents.json",
            r#"[
                { "intent": "start", "mode": "daily_task" },
                { "intent": "swipe", "photo": 1, "decision": "keep" }
            ]"#,
        );

        photosweep()
            .current_dir(dir.path())
            .arg("simulate")
            .arg("--library")
            .arg(&library)
            .arg("--intents")
            .arg(&intents)
            .assert()
            .success()
            .stdout(predicate::str::contains("\"unsorted_remaining\": 1"))
            .stdout(predicate::str::contains("\"target\": 2"));
    }

    #[test]
    fn test_missing_library_fails() {
        let dir = create_temp_project();
        let intents = write_file(&dir, "intents.json", "[]");

        photosweep()
            .current_dir(dir.path())
            .args(["simulate", "--library", "missing.json", "--intents"])
            .arg(&intents)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to read library file"));
    }
}
