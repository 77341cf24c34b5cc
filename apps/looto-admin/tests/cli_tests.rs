//! Integration tests for looto-admin CLI commands.
//!
//! Uses tempfile for testing file-based operations.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use looto_admin::cli::{
    CliError, cmd_create_admin, cmd_export, cmd_import, cmd_init, cmd_status,
};
use looto_core::{Backoffice, Credentials, Role};
use std::path::PathBuf;
use tempfile::TempDir;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Create a temporary directory for tests.
fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Create a sample fixture JSON file.
fn create_fixture_json(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("fixture.json");
    let content = r#"{
        "users": [
            {"name": "Asha", "phone": "9000000001", "deposit": 100000},
            {"name": "Ravi", "phone": "9000000002", "deposit": 50000}
        ],
        "rooms": [
            {
                "code": "ROOM1",
                "gameType": "classic",
                "entryFee": 10000,
                "maxPlayers": 4,
                "creator": "9000000001",
                "players": ["9000000001", "9000000002"],
                "start": true
            }
        ],
        "winnerRequests": [
            {
                "room": "ROOM1",
                "declaredBy": "9000000002",
                "winner": "9000000002",
                "feePercent": 5,
                "evidence": {"description": "final board", "screenshots": ["s1.png"]}
            }
        ],
        "withdrawals": [
            {"user": "9000000001", "amount": 25000, "upiId": "asha@bank"}
        ]
    }"#;
    std::fs::write(&path, content).unwrap();
    path
}

// =============================================================================
// INIT COMMAND TESTS
// =============================================================================

#[test]
fn test_init_creates_database() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("looto.redb");

    let result = cmd_init(&db_path, false);
    assert!(result.is_ok());
    assert!(db_path.exists());
}

#[test]
fn test_init_fails_if_exists_without_force() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("looto.redb");

    cmd_init(&db_path, false).unwrap();

    let result = cmd_init(&db_path, false);
    assert!(matches!(result, Err(CliError::AlreadyExists(_))));
}

#[test]
fn test_init_with_force_starts_empty() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("looto.redb");
    let fixture = create_fixture_json(&temp);

    cmd_init(&db_path, false).unwrap();
    cmd_import(&db_path, &fixture).unwrap();

    cmd_init(&db_path, true).unwrap();
    let counts = cmd_status(&db_path, false).unwrap();
    assert_eq!(counts.users, 0);
    assert_eq!(counts.transactions, 0);
}

// =============================================================================
// CREATE-ADMIN COMMAND TESTS
// =============================================================================

#[test]
fn test_create_admin_can_log_in() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("looto.redb");
    cmd_init(&db_path, false).unwrap();

    let profile = cmd_create_admin(&db_path, "ops", "long enough secret", "moderator").unwrap();
    assert_eq!(profile.role, Role::Moderator);

    let office = Backoffice::open(&db_path).unwrap();
    let grant = office
        .login(&Credentials {
            username: "ops".into(),
            password: "long enough secret".into(),
        })
        .unwrap();
    assert_eq!(grant.admin.id, profile.id);
}

#[test]
fn test_create_admin_rejects_unknown_role() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("looto.redb");
    cmd_init(&db_path, false).unwrap();

    let result = cmd_create_admin(&db_path, "ops", "long enough secret", "owner");
    assert!(matches!(result, Err(CliError::Core(_))));
}

#[test]
fn test_create_admin_rejects_duplicate() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("looto.redb");
    cmd_init(&db_path, false).unwrap();

    cmd_create_admin(&db_path, "ops", "long enough secret", "admin").unwrap();
    let result = cmd_create_admin(&db_path, "ops", "another long secret", "admin");
    assert!(result.is_err());
}

// =============================================================================
// IMPORT COMMAND TESTS
// =============================================================================

#[test]
fn test_import_replays_fixture() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("looto.redb");
    let fixture = create_fixture_json(&temp);
    cmd_init(&db_path, false).unwrap();

    let summary = cmd_import(&db_path, &fixture).unwrap();
    assert_eq!(summary.users, 2);
    assert_eq!(summary.rooms, 1);
    assert_eq!(summary.winner_requests, 1);
    assert_eq!(summary.withdrawals, 1);

    let counts = cmd_status(&db_path, true).unwrap();
    assert_eq!(counts.users, 2);
    assert_eq!(counts.rooms, 1);
    assert_eq!(counts.winner_requests, 1);
    assert_eq!(counts.withdrawal_requests, 1);
    // 2 deposits, 2 entry fees, 1 withdrawal
    assert_eq!(counts.transactions, 5);
}

#[test]
fn test_import_unknown_phone_fails() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("looto.redb");
    let fixture = temp.path().join("bad.json");
    std::fs::write(
        &fixture,
        r#"{"withdrawals": [{"user": "9999999999", "amount": 100, "upiId": "x@y"}]}"#,
    )
    .unwrap();
    cmd_init(&db_path, false).unwrap();

    let result = cmd_import(&db_path, &fixture);
    assert!(matches!(result, Err(CliError::Import(_))));
}

#[test]
fn test_import_invalid_json_fails() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("looto.redb");
    let fixture = temp.path().join("broken.json");
    std::fs::write(&fixture, "{ not json").unwrap();
    cmd_init(&db_path, false).unwrap();

    let result = cmd_import(&db_path, &fixture);
    assert!(matches!(result, Err(CliError::Json(_))));
}

// =============================================================================
// EXPORT COMMAND TESTS
// =============================================================================

#[test]
fn test_export_writes_json_file() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("looto.redb");
    let fixture = create_fixture_json(&temp);
    let output = temp.path().join("rooms.json");
    cmd_init(&db_path, false).unwrap();
    cmd_import(&db_path, &fixture).unwrap();

    let rows = cmd_export(&db_path, "rooms", None, None, Some(&output)).unwrap();
    assert_eq!(rows, 1);

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    let rooms = written.as_array().unwrap();
    assert_eq!(rooms[0]["code"], "ROOM1");
    assert_eq!(rooms[0]["playerDetails"].as_array().unwrap().len(), 2);
}

#[test]
fn test_export_window_excludes_past() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("looto.redb");
    let fixture = create_fixture_json(&temp);
    let output = temp.path().join("users.json");
    cmd_init(&db_path, false).unwrap();
    cmd_import(&db_path, &fixture).unwrap();

    let rows = cmd_export(
        &db_path,
        "users",
        None,
        Some("2000-01-01"),
        Some(&output),
    )
    .unwrap();
    assert_eq!(rows, 0);
}

#[test]
fn test_export_rejects_unknown_kind() {
    let temp = create_temp_dir();
    let db_path = temp.path().join("looto.redb");
    cmd_init(&db_path, false).unwrap();

    let result = cmd_export(&db_path, "sessions", None, None, None);
    assert!(matches!(result, Err(CliError::Core(_))));
}
