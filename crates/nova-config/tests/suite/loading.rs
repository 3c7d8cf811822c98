use nova_config::{ConfigError, NovaConfig, TextChangeConfig};
use nova_text_change::{ActivationMode, EditGroup, EditTree, SharedDocument, TextChange, TextRange};
use tempfile::tempdir;

#[test]
fn empty_config_uses_defaults() {
    let (config, diagnostics) =
        NovaConfig::load_from_str_with_diagnostics("").expect("config should parse");

    assert_eq!(config, NovaConfig::default());
    assert!(diagnostics.is_empty());
    assert_eq!(config.logging.level, "info");
    assert!(config.logging.stderr);
    assert_eq!(config.text_change, TextChangeConfig::default());
    assert_eq!(config.text_change.diff_context_lines, 3);
}

#[test]
fn loads_text_change_section_from_file() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("nova.toml");
    std::fs::write(
        &path,
        r#"
[logging]
level = "debug"
json = true

[text_change]
activation = "overwrite"
keep_preview_edits = true
text_type = "java"
diff_context_lines = 1
"#,
    )
    .expect("write config");

    let config = NovaConfig::load_from_path(&path).expect("config should load");
    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.json);

    let options = config.change_options();
    assert_eq!(options.activation, ActivationMode::Overwrite);
    assert!(options.keep_preview_edits);
    assert_eq!(options.text_type.as_deref(), Some("java"));
    assert_eq!(options.diff_context_lines, 1);
}

#[test]
fn rejects_unknown_activation_mode() {
    let err = NovaConfig::load_from_str_with_diagnostics(
        r#"
[text_change]
activation = "sometimes"
"#,
    )
    .expect_err("unknown variant");
    assert!(matches!(err, ConfigError::Toml(_)), "{err}");
}

#[test]
fn missing_file_reports_path() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("absent.toml");
    let err = NovaConfig::load_from_path(&path).expect_err("file is missing");
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("absent.toml"), "{err}");
}

#[test]
fn configured_options_drive_text_changes() {
    let (config, _) = NovaConfig::load_from_str_with_diagnostics(
        r#"
[text_change]
activation = "overwrite"
keep_preview_edits = true
text_type = "java"
"#,
    )
    .expect("config should parse");

    let document = SharedDocument::new("int x;");
    let mut change =
        TextChange::with_options("Rename", Box::new(document), &config.change_options());
    let mut tree = EditTree::multi(TextRange::new(0.into(), 6.into()));
    let edit = tree
        .add_replace(tree.root(), TextRange::new(4.into(), 5.into()), "count")
        .expect("edit fits");
    change.set_edit(tree);
    let group = change.add_edit_group(EditGroup::new("rename", [edit]));

    assert_eq!(change.text_type(), "java");
    change.set_group_active(group, false);
    change.set_active(true);
    assert!(change.is_group_active(group));

    assert_eq!(change.preview_content().expect("preview"), "int count;");
    assert!(change.preview_edit(edit).is_some());
}

#[test]
fn configured_diff_context_reaches_preview_diff() {
    let (config, _) = NovaConfig::load_from_str_with_diagnostics(
        r#"
[text_change]
diff_context_lines = 0
"#,
    )
    .expect("config should parse");

    let document = SharedDocument::new("one\ntwo\nthree\n");
    let mut change =
        TextChange::with_options("lines.txt", Box::new(document), &config.change_options());
    change.set_edit(EditTree::replace(TextRange::new(4.into(), 7.into()), "TWO"));
    assert_eq!(change.diff_context_lines(), 0);

    let diff = change.preview_diff().expect("diff");
    assert!(diff.contains("-two\n+TWO\n"), "{diff}");
    assert!(!diff.contains(" one\n"), "{diff}");
    assert!(!diff.contains(" three\n"), "{diff}");
}
