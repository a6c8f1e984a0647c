//! CLI integration tests

use predicates::prelude::*;
use sg_test_helpers::prelude::*;

#[test]
fn test_studyguide_help() {
    studyguide_command()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("StudyGuide"));
}

#[test]
fn test_studyguide_version() {
    studyguide_command()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_init_creates_workspace() {
    let temp = temp_dir();

    studyguide_command()
        .current_dir(temp.path())
        .arg("init")
        .assert()
        .success()
        .stderr(predicate::str::contains("Workspace initialized"));

    assert!(temp.path().join(".studyguide/config.toml").exists());
    assert!(temp.path().join(".studyguide/autosave").is_dir());

    let config = std::fs::read_to_string(temp.path().join(".studyguide/config.toml")).unwrap();
    assert!(config.contains("studyguide-default"));
}

#[test]
fn test_init_is_idempotent() {
    let temp = temp_dir();
    studyguide_command()
        .current_dir(temp.path())
        .arg("init")
        .assert()
        .success();

    studyguide_command()
        .current_dir(temp.path())
        .arg("init")
        .assert()
        .success()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_color_is_deterministic() {
    let workspace = init_workspace();

    studyguide_command()
        .current_dir(workspace.path())
        .args(["color", "a"])
        .assert()
        .success()
        .stdout(predicate::eq("hsl(97, 70%, 50%)\n"));

    studyguide_command()
        .current_dir(workspace.path())
        .args(["color", "alice"])
        .assert()
        .success()
        .stdout(contains_hsl_color());
}

#[test]
fn test_color_follows_presence_config() {
    let workspace = workspace_with_config("[presence]\nsaturation = 40\nlightness = 60\n");

    studyguide_command()
        .current_dir(workspace.path())
        .args(["color", "ab"])
        .assert()
        .success()
        .stdout(predicate::eq("hsl(225, 40%, 60%)\n"));
}

#[test]
fn test_simulate_converges_and_draws_cursors() {
    let workspace = init_workspace();

    studyguide_command()
        .current_dir(workspace.path())
        .args(["simulate", "--room", "r1", "--users", "alice,bob", "--text", "hi"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Room r1 (2 participants)"))
        .stdout(predicate::str::contains("text: \"hi\"").count(2))
        .stdout(predicate::str::contains("cursor: alice at 2+0"))
        .stderr(stderr_not_contains(&["ERROR", "WARN"]));
}

#[test]
fn test_simulate_json_output() {
    let workspace = init_workspace();

    let output = studyguide_command()
        .current_dir(workspace.path())
        .args(["simulate", "--users", "alice,bob,carol", "--text", "notes", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let reports: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let reports = reports.as_array().unwrap();
    assert_eq!(reports.len(), 3);
    for report in reports {
        assert_eq!(report["text"], "notes");
        assert_eq!(report["state"], "Joined");
    }
    // Bob sees alice's caret but not his own.
    let bob_cursors = reports[1]["cursors"].as_array().unwrap();
    assert_eq!(bob_cursors.len(), 1);
    assert_eq!(bob_cursors[0]["name"], "alice");
    assert_eq!(bob_cursors[0]["index"], 5);
}

#[test]
fn test_inspect_reads_autosave_snapshot() {
    let workspace = init_workspace();

    studyguide_command()
        .current_dir(workspace.path())
        .args(["simulate", "--room", "chem", "--text", "H2O"])
        .assert()
        .success();

    assert!(workspace
        .path()
        .join(".studyguide/autosave/studyguide_chem.json")
        .exists());

    studyguide_command()
        .current_dir(workspace.path())
        .args(["inspect", "--room", "chem"])
        .assert()
        .success()
        .stdout(predicate::eq("H2O\n"));

    studyguide_command()
        .current_dir(workspace.path())
        .args(["inspect", "--room", "chem", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"insert\": \"H2O\""));
}

#[test]
fn test_inspect_missing_snapshot_fails() {
    let workspace = init_workspace();

    studyguide_command()
        .current_dir(workspace.path())
        .args(["inspect", "--room", "nowhere"])
        .assert()
        .code(sg_common::EXIT_ERROR)
        .stderr(predicate::str::contains("Snapshot not found for room nowhere"));
}

#[test]
fn test_invalid_config_exit_code() {
    let workspace = workspace_with_config("[editor]\ntext_field = \"\"\n");

    studyguide_command()
        .current_dir(workspace.path())
        .args(["color", "alice"])
        .assert()
        .code(sg_common::EXIT_CONFIG_ERROR)
        .stderr(predicate::str::contains("text_field"));
}

#[test]
fn test_logging_section_applies_without_flags() {
    let workspace = workspace_with_config("[logging]\nverbose = true\njson = true\n");

    studyguide_command()
        .current_dir(workspace.path())
        .env_remove("RUST_LOG")
        .args(["color", "alice"])
        .assert()
        .success()
        .stderr(predicate::str::contains("\"level\":\"DEBUG\""))
        .stderr(predicate::str::contains("StudyGuide CLI started"));
}

#[test]
fn test_invalid_command() {
    studyguide_command()
        .arg("invalid-command")
        .assert()
        .failure();
}
