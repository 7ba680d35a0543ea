//! MCP-visible tool definitions and the JSON Schema fragments they carry.

use std::collections::BTreeMap;

use serde::Serialize;

/// Maximum length of a tool name, imposed by MCP clients.
pub const TOOL_NAME_MAX_LEN: usize = 64;

/// A callable operation derived from an API schema, as exposed over MCP.
///
/// The name must be unique within one server process; regeneration with the
/// same source replaces prior tools of the same name.
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    /// Unique tool name: lowercase alphanumerics plus `_` and `-`, at most
    /// [`TOOL_NAME_MAX_LEN`] characters.
    pub name: String,

    /// Natural-language explanation of what the tool does.
    pub description: String,

    /// Structure of the argument object. The root type is always `object`.
    #[serde(rename = "inputSchema")]
    pub input_schema: JsonSchema,

    /// Structure of a successful result, when the schema declares one.
    #[serde(rename = "outputSchema", skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<JsonSchema>,
}

/// A JSON Schema fragment.
///
/// This is a deliberately small subset: `object`, `array`, the JSON
/// primitives, `format` and `enum` cover everything the generators emit.
/// Properties use a sorted map so serialization is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct JsonSchema {
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub schema_type: String,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, JsonSchema>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<JsonSchema>>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub format: String,

    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<serde_json::Value>,
}

impl JsonSchema {
    pub fn typed(schema_type: &str) -> Self {
        Self {
            schema_type: schema_type.to_string(),
            ..Default::default()
        }
    }

    pub fn string() -> Self {
        Self::typed("string")
    }

    pub fn integer() -> Self {
        Self::typed("integer")
    }

    pub fn number() -> Self {
        Self::typed("number")
    }

    pub fn boolean() -> Self {
        Self::typed("boolean")
    }

    /// A `string` schema with a format qualifier (e.g. `byte` for base64).
    pub fn string_with_format(format: &str) -> Self {
        Self {
            schema_type: "string".to_string(),
            format: format.to_string(),
            ..Default::default()
        }
    }

    /// An `object` schema with no declared properties.
    pub fn empty_object() -> Self {
        Self::typed("object")
    }

    pub fn object(properties: BTreeMap<String, JsonSchema>, required: Vec<String>) -> Self {
        Self {
            schema_type: "object".to_string(),
            properties,
            required,
            ..Default::default()
        }
    }

    pub fn array(items: JsonSchema) -> Self {
        Self {
            schema_type: "array".to_string(),
            items: Some(Box::new(items)),
            ..Default::default()
        }
    }

    pub fn is_object(&self) -> bool {
        self.schema_type == "object"
    }

    /// Render as a `serde_json::Value` for the MCP wire representation.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_schema_serialization() {
        let schema = JsonSchema::string_with_format("byte");
        let value = schema.to_value();
        assert_eq!(value["type"], "string");
        assert_eq!(value["format"], "byte");
        assert!(value.get("properties").is_none());
    }

    #[test]
    fn test_object_schema_serialization() {
        let mut props = BTreeMap::new();
        props.insert("id".to_string(), JsonSchema::integer());
        props.insert("verbose".to_string(), JsonSchema::boolean());
        let schema = JsonSchema::object(props, vec!["id".to_string()]);

        let value = schema.to_value();
        assert_eq!(value["type"], "object");
        assert_eq!(value["properties"]["id"]["type"], "integer");
        assert_eq!(value["required"][0], "id");
    }

    #[test]
    fn test_array_schema_serialization() {
        let schema = JsonSchema::array(JsonSchema::string());
        let value = schema.to_value();
        assert_eq!(value["type"], "array");
        assert_eq!(value["items"]["type"], "string");
    }

    #[test]
    fn test_tool_serialization_uses_camel_case() {
        let tool = Tool {
            name: "store_getitem".to_string(),
            description: "Executes GET /items/{id}".to_string(),
            input_schema: JsonSchema::empty_object(),
            output_schema: None,
        };
        let value = serde_json::to_value(&tool).unwrap();
        assert!(value.get("inputSchema").is_some());
        assert!(value.get("outputSchema").is_none());
    }
}
