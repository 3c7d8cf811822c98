use nova_config::{ConfigValidationError, ConfigWarning, NovaConfig};
use tempfile::tempdir;

#[test]
fn reports_unknown_keys_with_full_paths() {
    let text = r#"
typo = 1

[logging]
levl = "debug"

[text_change]
keep_preview_edit = true
"#;

    let (_config, diagnostics) =
        NovaConfig::load_from_str_with_diagnostics(text).expect("config should parse");

    assert_eq!(
        diagnostics.unknown_keys,
        vec!["logging.levl", "text_change.keep_preview_edit", "typo"]
    );
}

#[test]
fn reports_deprecated_preview_alias() {
    let text = r#"
[text_change]
track_preview_edits = true
"#;

    let (config, diagnostics) =
        NovaConfig::load_from_str_with_diagnostics(text).expect("config should parse");

    assert!(config.text_change.keep_preview_edits);
    assert!(diagnostics.unknown_keys.is_empty());
    assert_eq!(
        diagnostics.warnings,
        vec![ConfigWarning::DeprecatedKey {
            path: "text_change.track_preview_edits".to_string(),
            message: "text_change.track_preview_edits is deprecated; use text_change.keep_preview_edits instead"
                .to_string(),
        }]
    );
}

#[test]
fn reports_invalid_logging_level() {
    let text = r#"
[logging]
level = "nova=verbose"
"#;

    let (_config, diagnostics) =
        NovaConfig::load_from_str_with_diagnostics(text).expect("config should parse");

    assert!(
        diagnostics
            .warnings
            .iter()
            .any(|warning| matches!(warning, ConfigWarning::LoggingLevelInvalid { value, .. } if value == "nova=verbose")),
        "{diagnostics:?}"
    );
}

#[test]
fn reports_blank_text_type_and_zero_buffer() {
    let text = r#"
[logging]
buffer_lines = 0

[text_change]
text_type = "  "
"#;

    let (config, diagnostics) =
        NovaConfig::load_from_str_with_diagnostics(text).expect("config should parse");

    assert!(!diagnostics.is_ok());
    assert_eq!(
        diagnostics.errors,
        vec![ConfigValidationError::InvalidValue {
            toml_path: "logging.buffer_lines".to_string(),
            message: "must be >= 1".to_string(),
        }]
    );
    assert!(diagnostics.warnings.iter().any(|warning| matches!(
        warning,
        ConfigWarning::InvalidValue { toml_path, .. } if toml_path == "text_change.text_type"
    )));
    assert_eq!(config.change_options().text_type, None);
}

#[test]
fn reports_missing_log_directory_relative_to_config_file() {
    let dir = tempdir().expect("tempdir");
    let config_path = dir.path().join("nova.toml");
    std::fs::write(
        &config_path,
        r#"
[logging]
file = "logs/nova.log"
"#,
    )
    .expect("write config");

    let (_config, diagnostics) =
        NovaConfig::load_from_path_with_diagnostics(&config_path).expect("config should parse");
    assert_eq!(
        diagnostics.warnings,
        vec![ConfigWarning::LoggingFileDirectoryMissing {
            toml_path: "logging.file".to_string(),
            resolved: dir.path().join("logs/nova.log"),
        }]
    );

    std::fs::create_dir(dir.path().join("logs")).expect("create logs dir");
    let (_config, diagnostics) =
        NovaConfig::load_from_path_with_diagnostics(&config_path).expect("config should parse");
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
}
