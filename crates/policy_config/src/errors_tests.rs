//! Tests for configuration error types.

use super::*;

#[test]
fn test_invalid_helper_builds_invalid_configuration() {
    let err = ConfigurationError::invalid("license_states", "must not be empty");

    assert_eq!(
        err.to_string(),
        "Invalid configuration: license_states - must not be empty"
    );
    match err {
        ConfigurationError::InvalidConfiguration { field, reason } => {
            assert_eq!(field, "license_states");
            assert_eq!(reason, "must not be empty");
        }
        _ => panic!("Expected InvalidConfiguration variant"),
    }
}

#[test]
fn test_file_not_found_display() {
    let err = ConfigurationError::FileNotFound {
        path: "/etc/approvals/engine.toml".to_string(),
    };

    assert_eq!(
        err.to_string(),
        "Configuration file not found: /etc/approvals/engine.toml"
    );
}

#[test]
fn test_store_unavailable_display_includes_project() {
    let err = ConfigurationError::StoreUnavailable {
        project_id: 42,
        reason: "connection reset".to_string(),
    };

    assert!(err.to_string().contains("project 42"));
    assert!(err.to_string().contains("connection reset"));
}

#[test]
fn test_errors_are_comparable_and_cloneable() {
    let original = ConfigurationError::ParseError {
        reason: "expected `=`".to_string(),
    };
    let cloned = original.clone();

    assert_eq!(original, cloned);
    assert_ne!(
        original,
        ConfigurationError::ParseError {
            reason: "other".to_string()
        }
    );
}
