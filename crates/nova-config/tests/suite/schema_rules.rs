use nova_config::json_schema;

fn schema_value() -> serde_json::Value {
    serde_json::to_value(json_schema()).expect("schema serializes")
}

#[test]
fn json_schema_lists_activation_modes() {
    let value = schema_value();
    let modes = value
        .pointer("/definitions/TextChangeConfig/properties/activation/enum")
        .and_then(|v| v.as_array())
        .expect("activation enum exists");
    let modes: Vec<&str> = modes.iter().filter_map(|v| v.as_str()).collect();
    assert_eq!(modes, vec!["conjunction", "overwrite"]);
}

#[test]
fn json_schema_includes_deprecated_track_preview_edits_alias() {
    let value = schema_value();
    let alias = value
        .pointer("/definitions/TextChangeConfig/properties/track_preview_edits")
        .expect("track_preview_edits schema property exists");
    assert_eq!(alias.get("deprecated").and_then(|v| v.as_bool()), Some(true));

    let all_of = value
        .pointer("/definitions/TextChangeConfig/allOf")
        .and_then(|v| v.as_array())
        .expect("TextChangeConfig includes allOf constraints");
    assert!(all_of.iter().any(|entry| {
        entry
            .pointer("/not/required")
            .and_then(|v| v.as_array())
            .is_some_and(|keys| keys.len() == 2)
    }));
}

#[test]
fn json_schema_rejects_blank_text_type() {
    let value = schema_value();
    let text_type = value
        .pointer("/definitions/TextChangeConfig/properties/text_type")
        .expect("text_type property exists");
    assert_eq!(text_type.get("minLength").and_then(|v| v.as_u64()), Some(1));
}

#[test]
fn json_schema_requires_positive_buffer_lines() {
    let value = schema_value();
    let minimum = value
        .pointer("/definitions/LoggingConfig/properties/buffer_lines/minimum")
        .and_then(|v| v.as_f64());
    assert_eq!(minimum, Some(1.0));
}
