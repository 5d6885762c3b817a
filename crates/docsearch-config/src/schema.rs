use schemars::schema::{RootSchema, Schema};
use schemars::schema_for;
use serde_json::json;

use crate::SearchConfig;

/// JSON schema for `docsearch.toml`, for editor tooling and CI validation.
#[must_use]
pub fn json_schema() -> RootSchema {
    let mut schema = schema_for!(SearchConfig);
    apply_semantic_constraints(&mut schema);
    schema
}

fn apply_semantic_constraints(schema: &mut RootSchema) {
    // Only explicit keys are checked; JSON Schema does not apply defaults.
    push_all_of(
        schema,
        schema_from_json(json!({
            "properties": {
                "index": {
                    "properties": {
                        "section": { "type": "string", "minLength": 1, "pattern": "^[^/\\\\]+$" },
                        "root": { "type": "string", "minLength": 1 },
                        "buckets": { "type": "string", "minLength": 1 }
                    }
                }
            }
        })),
    );

    push_all_of(
        schema,
        schema_from_json(json!({
            "properties": {
                "logging": {
                    "properties": {
                        "level": { "type": "string", "minLength": 1 }
                    }
                }
            }
        })),
    );
}

fn push_all_of(root: &mut RootSchema, schema: Schema) {
    let subschemas = root.schema.subschemas();
    subschemas.all_of.get_or_insert_with(Vec::new).push(schema);
}

fn schema_from_json(value: serde_json::Value) -> Schema {
    serde_json::from_value(value).unwrap_or(Schema::Bool(true))
}
