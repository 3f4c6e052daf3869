//! Tests for error types

use std::path::PathBuf;

use spectre_monitor::Error;

#[test]
fn test_log_not_found_error() {
    let error = Error::LogNotFound(PathBuf::from("/run/STDOUT.0000"));
    let error_str = format!("{error}");
    assert!(error_str.contains("Log file not found"));
    assert!(error_str.contains("/run/STDOUT.0000"));
}

#[test]
fn test_invalid_name_error() {
    let error = Error::InvalidName {
        name: "../x".to_string(),
        reason: "name contains a path separator",
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("Invalid store name"));
    assert!(error_str.contains("../x"));
    assert!(error_str.contains("path separator"));
}

#[test]
fn test_invalid_id_error() {
    let error = Error::InvalidId("a/b".to_string());
    assert!(format!("{error}").contains("Invalid document id"));
}

#[test]
fn test_persist_error() {
    let error = Error::Persist {
        path: PathBuf::from("/db/e/m/1.json"),
        source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("Failed to persist document"));
    assert!(error_str.contains("1.json"));
    assert!(error_str.contains("denied"));
}

#[test]
fn test_io_error_conversion() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let error: Error = io_error.into();
    assert!(format!("{error}").contains("IO error"));
}

#[test]
fn test_json_error_conversion() {
    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let error: Error = json_error.into();
    assert!(format!("{error}").contains("JSON error"));
}

#[test]
fn test_error_debug() {
    let error = Error::InvalidId("../x".to_string());
    assert!(format!("{error:?}").contains("InvalidId"));
}
