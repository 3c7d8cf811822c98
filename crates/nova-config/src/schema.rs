use schemars::schema::{InstanceType, RootSchema, Schema, SchemaObject};
use schemars::schema_for;
use serde_json::json;

use crate::NovaConfig;

/// JSON schema for `nova.toml`.
///
/// This schema is intended for editor tooling (TOML JSON schema integration) and CI validation.
#[must_use]
pub fn json_schema() -> RootSchema {
    let mut schema = schema_for!(NovaConfig);
    apply_semantic_constraints(&mut schema);
    schema
}

pub(crate) fn activation_mode_schema(
    _generator: &mut schemars::r#gen::SchemaGenerator,
) -> Schema {
    SchemaObject {
        instance_type: Some(InstanceType::String.into()),
        enum_values: Some(vec![json!("conjunction"), json!("overwrite")]),
        ..SchemaObject::default()
    }
    .into()
}

fn apply_semantic_constraints(schema: &mut RootSchema) {
    // The runtime rejects blank text types with a warning; make editors flag them too.
    add_property_constraint(
        schema,
        "TextChangeConfig",
        "text_type",
        schema_from_json(json!({
            "type": ["string", "null"],
            "minLength": 1,
            "pattern": "\\S",
            "default": null
        })),
    );

    allow_deprecated_aliases(schema);
}

fn allow_deprecated_aliases(schema: &mut RootSchema) {
    // Keep the schema aligned with what the runtime accepts (serde aliases), while still steering
    // users away from legacy keys.
    add_property_constraint(
        schema,
        "TextChangeConfig",
        "track_preview_edits",
        schema_from_json(json!({
            "deprecated": true,
            "description": "Deprecated alias for `text_change.keep_preview_edits`.",
            "type": "boolean"
        })),
    );
    push_definition_all_of(
        schema,
        "TextChangeConfig",
        schema_from_json(json!({
            "not": { "required": ["keep_preview_edits", "track_preview_edits"] }
        })),
    );
}

fn schema_from_json(value: serde_json::Value) -> Schema {
    serde_json::from_value(value).expect("valid json schema")
}

fn add_property_constraint(
    schema: &mut RootSchema,
    definition_name: &str,
    property_name: &str,
    property_schema: Schema,
) {
    let Some(Schema::Object(obj)) = schema.definitions.get_mut(definition_name) else {
        return;
    };
    obj.object()
        .properties
        .insert(property_name.to_string(), property_schema);
}

fn push_definition_all_of(schema: &mut RootSchema, definition_name: &str, constraint: Schema) {
    let Some(Schema::Object(obj)) = schema.definitions.get_mut(definition_name) else {
        return;
    };
    obj.subschemas()
        .all_of
        .get_or_insert_with(Vec::new)
        .push(constraint);
}
