//! JSON Schema to Gemini schema conversion.
//!
//! Gemini accepts an OpenAPI-flavoured subset of JSON Schema: type names are
//! upper case, nullability is a flag rather than a `"null"` type member, and
//! several keywords are rejected outright. The transform is pure and
//! recursive; it never mutates its input.

use serde_json::{Map, Value};

/// Keywords Gemini rejects.
const STRIPPED_KEYWORDS: &[&str] = &[
    "$ref",
    "$schema",
    "$defs",
    "definitions",
    "default",
    "additionalProperties",
];

/// Convert a JSON Schema into the form Gemini's `functionDeclarations` accept.
pub fn to_gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(convert_object(map)),
        Value::Array(items) => Value::Array(items.iter().map(to_gemini_schema).collect()),
        other => other.clone(),
    }
}

fn convert_object(map: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::with_capacity(map.len());

    for (key, value) in map {
        if STRIPPED_KEYWORDS.contains(&key.as_str()) {
            continue;
        }
        match key.as_str() {
            "type" => convert_type(value, &mut out),
            // Keys under `properties` are property names, not keywords.
            "properties" => {
                let converted = match value {
                    Value::Object(props) => Value::Object(
                        props
                            .iter()
                            .map(|(name, prop)| (name.clone(), to_gemini_schema(prop)))
                            .collect(),
                    ),
                    other => other.clone(),
                };
                out.insert(key.clone(), converted);
            }
            _ => {
                out.insert(key.clone(), to_gemini_schema(value));
            }
        }
    }

    out
}

fn convert_type(value: &Value, out: &mut Map<String, Value>) {
    match value {
        Value::String(t) => {
            out.insert("type".into(), Value::String(t.to_uppercase()));
        }
        // ["string", "null"] -> "STRING" + nullable
        Value::Array(types) => {
            let names: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
            if let Some(first) = names.iter().find(|t| **t != "null") {
                out.insert("type".into(), Value::String(first.to_uppercase()));
            }
            if names.contains(&"null") {
                out.insert("nullable".into(), Value::Bool(true));
            }
        }
        other => {
            out.insert("type".into(), other.clone());
        }
    }
}

/// Whether a converted schema declares at least one property.
///
/// Gemini rejects `OBJECT` parameters with an empty property set, so callers
/// omit `parameters` entirely in that case.
pub fn has_properties(schema: &Value) -> bool {
    schema
        .get("properties")
        .and_then(Value::as_object)
        .is_some_and(|props| !props.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn upper_cases_types_recursively() {
        let schema = json!({
            "type": "object",
            "properties": {
                "url": {"type": "string"},
                "lines": {"type": "array", "items": {"type": "integer"}}
            }
        });
        let out = to_gemini_schema(&schema);
        assert_eq!(out["type"], "OBJECT");
        assert_eq!(out["properties"]["url"]["type"], "STRING");
        assert_eq!(out["properties"]["lines"]["type"], "ARRAY");
        assert_eq!(out["properties"]["lines"]["items"]["type"], "INTEGER");
    }

    #[test]
    fn strips_unsupported_keywords_at_every_level() {
        let schema = json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "object",
            "additionalProperties": false,
            "$defs": {"x": {"type": "string"}},
            "properties": {
                "mode": {"type": "string", "default": "fast", "enum": ["fast", "slow"]},
                "nested": {
                    "type": "object",
                    "additionalProperties": {"type": "string"},
                    "properties": {
                        "inner": {"$ref": "#/$defs/x", "description": "ref'd"}
                    }
                }
            }
        });
        let out = to_gemini_schema(&schema);
        assert!(out.get("$schema").is_none());
        assert!(out.get("additionalProperties").is_none());
        assert!(out.get("$defs").is_none());
        assert!(out["properties"]["mode"].get("default").is_none());
        assert_eq!(out["properties"]["mode"]["enum"], json!(["fast", "slow"]));
        let nested = &out["properties"]["nested"];
        assert!(nested.get("additionalProperties").is_none());
        assert!(nested["properties"]["inner"].get("$ref").is_none());
        assert_eq!(nested["properties"]["inner"]["description"], "ref'd");
    }

    #[test]
    fn property_names_that_look_like_keywords_survive() {
        let schema = json!({
            "type": "object",
            "properties": {
                "default": {"type": "string"},
                "type": {"type": "string"}
            }
        });
        let out = to_gemini_schema(&schema);
        assert_eq!(out["properties"]["default"]["type"], "STRING");
        assert_eq!(out["properties"]["type"]["type"], "STRING");
    }

    #[test]
    fn nullable_type_arrays() {
        let out = to_gemini_schema(&json!({"type": ["null", "string"]}));
        assert_eq!(out["type"], "STRING");
        assert_eq!(out["nullable"], true);
    }

    #[test]
    fn any_of_branches_are_converted() {
        let out = to_gemini_schema(&json!({
            "anyOf": [{"type": "string"}, {"type": "number", "default": 1}]
        }));
        assert_eq!(out["anyOf"][0]["type"], "STRING");
        assert_eq!(out["anyOf"][1]["type"], "NUMBER");
        assert!(out["anyOf"][1].get("default").is_none());
    }

    #[test]
    fn input_is_untouched() {
        let schema = json!({"type": "object", "default": {}});
        let _ = to_gemini_schema(&schema);
        assert_eq!(schema["type"], "object");
        assert!(schema.get("default").is_some());
    }

    #[test]
    fn property_detection() {
        assert!(!has_properties(&json!({"type": "OBJECT"})));
        assert!(!has_properties(&json!({"type": "OBJECT", "properties": {}})));
        assert!(has_properties(&json!({"properties": {"a": {}}})));
    }
}
