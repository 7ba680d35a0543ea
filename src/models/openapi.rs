//! Typed OpenAPI document model.
//!
//! Only the parts of OpenAPI 3.x the tool generator consumes are modeled.
//! Maps are sorted so that iterating a document is deterministic for
//! identical input bytes.

use std::collections::BTreeMap;

use serde::Deserialize;

/// An OpenAPI 3.x document.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct OpenApiDocument {
    pub openapi: Option<String>,
    pub info: Option<Info>,
    #[serde(default)]
    pub servers: Vec<Server>,
    #[serde(default)]
    pub paths: BTreeMap<String, PathItem>,
    pub components: Option<Components>,
}

impl OpenApiDocument {
    pub fn title(&self) -> &str {
        self.info.as_ref().map(|i| i.title.as_str()).unwrap_or("")
    }

    /// Resolve a local `#/components/schemas/<name>` reference.
    pub fn resolve_schema(&self, reference: &str) -> Option<&SchemaObject> {
        let name = reference.strip_prefix("#/components/schemas/")?;
        self.components.as_ref()?.schemas.get(name)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Info {
    #[serde(default)]
    pub title: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Components {
    #[serde(default)]
    pub schemas: BTreeMap<String, SchemaObject>,
}

/// One path entry; operations keyed by HTTP method.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PathItem {
    pub get: Option<Operation>,
    pub put: Option<Operation>,
    pub post: Option<Operation>,
    pub delete: Option<Operation>,
    pub options: Option<Operation>,
    pub head: Option<Operation>,
    pub patch: Option<Operation>,
    pub trace: Option<Operation>,
}

impl PathItem {
    /// Operations in a fixed method order, so generation order is stable.
    pub fn operations(&self) -> Vec<(&'static str, &Operation)> {
        let mut ops = Vec::new();
        for (method, op) in [
            ("GET", &self.get),
            ("PUT", &self.put),
            ("POST", &self.post),
            ("DELETE", &self.delete),
            ("OPTIONS", &self.options),
            ("HEAD", &self.head),
            ("PATCH", &self.patch),
            ("TRACE", &self.trace),
        ] {
            if let Some(op) = op {
                ops.push((method, op));
            }
        }
        ops
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Operation {
    #[serde(rename = "operationId")]
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(rename = "requestBody")]
    pub request_body: Option<RequestBody>,
    #[serde(default)]
    pub responses: BTreeMap<String, Response>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Parameter {
    pub name: String,
    /// `path`, `query`, `header` or `cookie`.
    #[serde(rename = "in")]
    pub location: String,
    #[serde(default)]
    pub required: bool,
    pub schema: Option<SchemaObject>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RequestBody {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub content: BTreeMap<String, MediaType>,
}

impl RequestBody {
    pub fn json_schema(&self) -> Option<&SchemaObject> {
        self.content.get("application/json")?.schema.as_ref()
    }

    /// First declared content type, used when no JSON body is present.
    pub fn first_content_type(&self) -> Option<&str> {
        self.content.keys().next().map(|s| s.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Response {
    pub description: Option<String>,
    #[serde(default)]
    pub content: BTreeMap<String, MediaType>,
}

impl Response {
    pub fn json_schema(&self) -> Option<&SchemaObject> {
        self.content.get("application/json")?.schema.as_ref()
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct MediaType {
    pub schema: Option<SchemaObject>,
}

/// A schema object, possibly a `$ref` to `#/components/schemas/<name>`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SchemaObject {
    #[serde(rename = "$ref")]
    pub reference: Option<String>,
    #[serde(rename = "type")]
    pub schema_type: Option<SchemaType>,
    pub format: Option<String>,
    #[serde(rename = "enum")]
    pub enum_values: Option<Vec<serde_json::Value>>,
    pub properties: Option<BTreeMap<String, SchemaObject>>,
    pub required: Option<Vec<String>>,
    pub items: Option<Box<SchemaObject>>,
}

/// OpenAPI 3.1 allows `type` to be a list; 3.0 uses a single string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SchemaType {
    One(String),
    Many(Vec<String>),
}

impl SchemaType {
    /// The effective type. With multiple types the first wins; the caller
    /// is expected to log a warning.
    pub fn primary(&self) -> Option<&str> {
        match self {
            SchemaType::One(t) => Some(t.as_str()),
            SchemaType::Many(ts) => ts.first().map(|s| s.as_str()),
        }
    }

    pub fn is_union(&self) -> bool {
        matches!(self, SchemaType::Many(ts) if ts.len() > 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r##"
openapi: "3.0.0"
info:
  title: Store
  version: "1.0"
servers:
  - url: https://api.example.com/v1
paths:
  /items/{id}:
    get:
      operationId: getItem
      parameters:
        - name: id
          in: path
          required: true
          schema:
            type: integer
        - name: verbose
          in: query
          schema:
            type: boolean
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema:
                $ref: "#/components/schemas/Item"
components:
  schemas:
    Item:
      type: object
      properties:
        id:
          type: integer
"##;

    #[test]
    fn test_parse_yaml_document() {
        let doc: OpenApiDocument = serde_yaml::from_str(DOC).unwrap();
        assert_eq!(doc.title(), "Store");
        assert_eq!(doc.servers[0].url, "https://api.example.com/v1");

        let item = &doc.paths["/items/{id}"];
        let ops = item.operations();
        assert_eq!(ops.len(), 1);
        let (method, op) = ops[0];
        assert_eq!(method, "GET");
        assert_eq!(op.operation_id.as_deref(), Some("getItem"));
        assert_eq!(op.parameters.len(), 2);
        assert_eq!(op.parameters[0].location, "path");
        assert!(op.parameters[0].required);
    }

    #[test]
    fn test_resolve_component_ref() {
        let doc: OpenApiDocument = serde_yaml::from_str(DOC).unwrap();
        let resolved = doc.resolve_schema("#/components/schemas/Item").unwrap();
        assert_eq!(resolved.schema_type.as_ref().unwrap().primary(), Some("object"));
        assert!(doc.resolve_schema("#/components/schemas/Missing").is_none());
    }

    #[test]
    fn test_schema_type_union_takes_first() {
        let ty: SchemaType = serde_yaml::from_str(r#"["string", "null"]"#).unwrap();
        assert_eq!(ty.primary(), Some("string"));
        assert!(ty.is_union());
    }

    #[test]
    fn test_parse_json_document() {
        // JSON is a YAML subset; the same parse path covers both.
        let json = r#"{"openapi":"3.0.0","info":{"title":"T"},"paths":{}}"#;
        let doc: OpenApiDocument = serde_yaml::from_str(json).unwrap();
        assert_eq!(doc.title(), "T");
    }
}
