//! Strict JSON schema generation for structured outputs
//!
//! Uses `schemars` to derive the schema from the response type, then
//! rewrites it into the shape OpenAI-compatible strict mode accepts.

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Types that can be requested as structured output
///
/// Implemented for every `JsonSchema + DeserializeOwned` type.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// Generates a strict-mode schema for this type
    ///
    /// Strict mode requires:
    /// 1. `additionalProperties: false` on every object schema
    /// 2. Every property listed in `required`, nullable ones included
    /// 3. No `$ref` indirection
    fn strict_schema() -> Value {
        let schema = schema_for!(Self);
        let mut value = serde_json::to_value(schema).unwrap_or_default();

        fix_object_schemas(&mut value);
        inline_refs(&mut value);

        if let Value::Object(map) = &mut value {
            map.remove("definitions");
            map.remove("$schema");
        }

        value
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

/// Adds `additionalProperties: false` and makes every property required
fn fix_object_schemas(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if map.get("type") == Some(&Value::String("object".to_string())) {
                map.insert("additionalProperties".to_string(), Value::Bool(false));

                if let Some(Value::Object(props)) = map.get("properties") {
                    let all_keys: Vec<Value> =
                        props.keys().map(|k| Value::String(k.clone())).collect();
                    map.insert("required".to_string(), Value::Array(all_keys));
                }
            }

            for (_, v) in map.iter_mut() {
                fix_object_schemas(v);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                fix_object_schemas(item);
            }
        }
        _ => {}
    }
}

/// Replaces every `{"$ref": "#/definitions/X"}` with the definition of X
fn inline_refs(value: &mut Value) {
    let definitions = match value {
        Value::Object(map) => map.get("definitions").cloned(),
        _ => None,
    };

    if let Some(defs) = definitions {
        inline_refs_recursive(value, &defs);
    }
}

fn inline_refs_recursive(value: &mut Value, defs: &Value) {
    match value {
        Value::Object(map) => {
            let target = map
                .get("$ref")
                .and_then(Value::as_str)
                .and_then(|r| r.strip_prefix("#/definitions/"))
                .and_then(|name| defs.get(name))
                .cloned();

            if let Some(mut resolved) = target {
                inline_refs_recursive(&mut resolved, defs);
                *value = resolved;
                return;
            }

            for (key, v) in map.iter_mut() {
                if key != "definitions" {
                    inline_refs_recursive(v, defs);
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                inline_refs_recursive(item, defs);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RankedUrlList, ResourceList, TagOutput};

    fn contains_key(value: &Value, key: &str) -> bool {
        match value {
            Value::Object(map) => {
                map.contains_key(key) || map.values().any(|v| contains_key(v, key))
            }
            Value::Array(items) => items.iter().any(|v| contains_key(v, key)),
            _ => false,
        }
    }

    #[test]
    fn test_ranked_url_schema() {
        let schema = RankedUrlList::strict_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["additionalProperties"], false);
        assert_eq!(schema["required"], serde_json::json!(["ranked_urls"]));
    }

    #[test]
    fn test_nested_refs_are_inlined() {
        let schema = ResourceList::strict_schema();
        assert!(!contains_key(&schema, "$ref"));
        assert!(!contains_key(&schema, "definitions"));

        let item = &schema["properties"]["resources"]["items"];
        assert_eq!(item["additionalProperties"], false);
        let required = item["required"].as_array().unwrap();
        assert!(required.contains(&Value::String("resource_name".to_string())));
    }

    #[test]
    fn test_enum_schema_lists_tags() {
        let schema = TagOutput::strict_schema();
        let rendered = schema.to_string();
        assert!(rendered.contains("adult_day_care"));
        assert!(!contains_key(&schema, "$ref"));
    }
}
