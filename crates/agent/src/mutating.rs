//! Tools that change backend state and therefore need operator approval.

use serde_json::{Map, Value};

/// Where a mutating tool keeps the parts of its arguments an approval shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutatingTool {
    pub name: &'static str,
    /// Argument carrying the new text; replaced by an edited decision
    pub payload_field: &'static str,
    /// Argument naming the object being changed
    pub object_field: &'static str,
    /// Argument addressing the object on the backend
    pub locator_field: &'static str,
}

/// The allow-list. Anything not named here runs without approval.
pub const MUTATING_TOOLS: &[MutatingTool] = &[
    MutatingTool {
        name: "write_source",
        payload_field: "source",
        object_field: "object_name",
        locator_field: "url",
    },
    MutatingTool {
        name: "create_object",
        payload_field: "source",
        object_field: "object_name",
        locator_field: "url",
    },
];

impl MutatingTool {
    /// Look a tool up in the allow-list.
    pub fn lookup(name: &str) -> Option<&'static MutatingTool> {
        MUTATING_TOOLS.iter().find(|t| t.name == name)
    }

    /// The proposed new text, or `""` when the model left it out.
    pub fn payload(&self, arguments: &Value) -> String {
        string_field(arguments, self.payload_field).unwrap_or_default()
    }

    pub fn locator(&self, arguments: &Value) -> Option<String> {
        string_field(arguments, self.locator_field).filter(|url| !url.is_empty())
    }

    /// Display name for the approval prompt. Falls back to the locator.
    pub fn object_name(&self, arguments: &Value) -> String {
        string_field(arguments, self.object_field)
            .filter(|name| !name.is_empty())
            .or_else(|| self.locator(arguments))
            .unwrap_or_else(|| "(unnamed object)".to_string())
    }

    /// Copy of `arguments` with the payload replaced by `text`.
    pub fn with_payload(&self, arguments: &Value, text: String) -> Value {
        let mut object = match arguments {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        object.insert(self.payload_field.to_string(), Value::String(text));
        Value::Object(object)
    }
}

fn string_field(arguments: &Value, field: &str) -> Option<String> {
    arguments.get(field).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn allow_list_lookup() {
        assert!(MutatingTool::lookup("write_source").is_some());
        assert!(MutatingTool::lookup("create_object").is_some());
        assert!(MutatingTool::lookup("read_source").is_none());
    }

    #[test]
    fn fields_are_read_from_arguments() {
        let tool = MutatingTool::lookup("write_source").unwrap();
        let args = json!({"object_name": "ZCL_ORDERS", "url": "/src/zcl_orders", "source": "new"});
        assert_eq!(tool.payload(&args), "new");
        assert_eq!(tool.locator(&args).as_deref(), Some("/src/zcl_orders"));
        assert_eq!(tool.object_name(&args), "ZCL_ORDERS");
    }

    #[test]
    fn object_name_falls_back_to_locator() {
        let tool = MutatingTool::lookup("create_object").unwrap();
        assert_eq!(tool.object_name(&json!({"url": "/src/x"})), "/src/x");
        assert_eq!(tool.object_name(&json!({})), "(unnamed object)");
    }

    #[test]
    fn payload_replacement_keeps_other_fields() {
        let tool = MutatingTool::lookup("write_source").unwrap();
        let args = json!({"object_name": "A", "url": "/a", "source": "old"});
        let edited = tool.with_payload(&args, "edited".into());
        assert_eq!(edited, json!({"object_name": "A", "url": "/a", "source": "edited"}));
        assert_eq!(args["source"], "old");
    }
}
