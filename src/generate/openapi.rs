//! OpenAPI operation to tool projection.

use std::collections::BTreeMap;

use url::Url;

use crate::error::BridgeError;
use crate::models::{
    InvocationDetails, JsonSchema, OpenApiDocument, Operation, SchemaObject, Tool, Transport,
};
use crate::utils::{sanitize_name, unique_strings};

/// Reserved property name for non-object request bodies.
const REQUEST_BODY_PARAM: &str = "requestBody";

/// Cap for `$ref` recursion; anything deeper collapses to an empty object.
const MAX_SCHEMA_DEPTH: usize = 32;

/// Generate one tool per `(path, method, operation)`.
///
/// Fails the whole document only when no usable server URL can be
/// determined; individual operations that cannot be converted are skipped
/// with a warning.
pub fn generate(
    source: &str,
    doc: &OpenApiDocument,
) -> Result<Vec<(Tool, InvocationDetails)>, BridgeError> {
    let (host, base_path) = host_and_base_path(source, doc)?;
    tracing::info!(host = %host, base_path = %base_path, "Determined host for generation");

    let mut namespace = sanitize_name(doc.title());
    if namespace.is_empty() {
        namespace = "openapi".to_string();
    }

    let mut pairs = Vec::new();
    let mut skipped = 0usize;
    for (path, item) in &doc.paths {
        for (method, op) in item.operations() {
            let name = tool_name(&namespace, path, method, op);
            match build_pair(doc, &host, &base_path, path, method, op, &name) {
                Ok(pair) => pairs.push(pair),
                Err(err) => {
                    tracing::warn!(tool = %name, error = %err, "Skipping operation");
                    skipped += 1;
                }
            }
        }
    }

    tracing::info!(
        generated = pairs.len(),
        skipped,
        "Finished generating tools from OpenAPI schema"
    );
    Ok(pairs)
}

fn build_pair(
    doc: &OpenApiDocument,
    host: &str,
    base_path: &str,
    path: &str,
    method: &str,
    op: &Operation,
    name: &str,
) -> Result<(Tool, InvocationDetails), BridgeError> {
    let description = op
        .description
        .clone()
        .filter(|s| !s.is_empty())
        .or_else(|| op.summary.clone().filter(|s| !s.is_empty()))
        .unwrap_or_else(|| format!("Executes {} {}", method, path));

    let (input_schema, body) = build_input_schema(doc, op)?;
    let output_schema = build_output_schema(doc, op);

    let tool = Tool {
        name: name.to_string(),
        description,
        input_schema,
        output_schema,
    };

    let mut details = InvocationDetails {
        transport: Transport::Http,
        host: host.to_string(),
        base_path: base_path.to_string(),
        method: method.to_uppercase(),
        path: path.to_string(),
        body_param: body.body_param,
        content_type: body.content_type,
        ..Default::default()
    };
    for param in &op.parameters {
        match param.location.as_str() {
            "path" => details.path_params.push(param.name.clone()),
            "query" => details.query_params.push(param.name.clone()),
            // Only statically declared header values are wired; dynamic
            // header parameters are surfaced in logs.
            "header" => {
                tracing::debug!(param = %param.name, "Header parameter found, not wired into invocation")
            }
            "cookie" => {
                tracing::debug!(param = %param.name, "Cookie parameter skipped for invocation")
            }
            other => tracing::warn!(param = %param.name, location = %other, "Unknown parameter location"),
        }
    }

    Ok((tool, details))
}

/// How the request body participates in invocation.
struct BodyBinding {
    /// Empty when the body is composed from leftover arguments.
    body_param: String,
    /// Empty when the operation declares no body.
    content_type: String,
}

/// Merge path/query parameters and the JSON request body into one `object`
/// input schema.
fn build_input_schema(
    doc: &OpenApiDocument,
    op: &Operation,
) -> Result<(JsonSchema, BodyBinding), BridgeError> {
    let mut properties: BTreeMap<String, JsonSchema> = BTreeMap::new();
    let mut required = Vec::new();

    for param in &op.parameters {
        if param.location != "path" && param.location != "query" {
            continue;
        }
        let Some(schema) = &param.schema else {
            tracing::warn!(param = %param.name, "Parameter has no schema, skipping");
            continue;
        };
        properties.insert(param.name.clone(), convert_schema(doc, schema, 0)?);
        if param.required {
            required.push(param.name.clone());
        }
    }

    let mut binding = BodyBinding {
        body_param: String::new(),
        content_type: String::new(),
    };

    if let Some(request_body) = &op.request_body {
        if let Some(body_schema) = request_body.json_schema() {
            binding.content_type = "application/json".to_string();
            let converted = convert_schema(doc, body_schema, 0)?;
            if converted.is_object() {
                // Hoist the body object's top-level properties; on a name
                // collision the parameter wins.
                for (prop_name, prop) in converted.properties {
                    if properties.contains_key(&prop_name) {
                        tracing::warn!(field = %prop_name, "Name collision between parameter and body field");
                    } else {
                        properties.insert(prop_name, prop);
                    }
                }
                required.extend(converted.required);
            } else {
                if properties.contains_key(REQUEST_BODY_PARAM) {
                    return Err(BridgeError::Generate(format!(
                        "cannot represent non-object request body: '{}' is already a parameter",
                        REQUEST_BODY_PARAM
                    )));
                }
                properties.insert(REQUEST_BODY_PARAM.to_string(), converted);
                if request_body.required {
                    required.push(REQUEST_BODY_PARAM.to_string());
                }
                binding.body_param = REQUEST_BODY_PARAM.to_string();
            }
        } else if let Some(content_type) = request_body.first_content_type() {
            tracing::warn!(content_type = %content_type, "Request body has no JSON schema; passing through as a single argument");
            binding.content_type = content_type.to_string();
            binding.body_param = REQUEST_BODY_PARAM.to_string();
        }
    }

    let schema = JsonSchema::object(properties, unique_strings(required));
    Ok((schema, binding))
}

/// Pick the success response schema: `200`, then `201`, then any `2xx`;
/// `application/json` content only.
fn build_output_schema(doc: &OpenApiDocument, op: &Operation) -> Option<JsonSchema> {
    let response = op
        .responses
        .get("200")
        .or_else(|| op.responses.get("201"))
        .or_else(|| {
            op.responses
                .iter()
                .find(|(code, _)| code.starts_with('2'))
                .map(|(_, r)| r)
        })?;
    let schema = response.json_schema()?;
    match convert_schema(doc, schema, 0) {
        Ok(converted) => Some(converted),
        Err(err) => {
            tracing::warn!(error = %err, "Failed to convert response schema, omitting output schema");
            None
        }
    }
}

/// `{namespace}_{operationId}` when available, otherwise
/// `{namespace}_{method}_{path parts}` with `{placeholder}` segments
/// dropped.
fn tool_name(namespace: &str, path: &str, method: &str, op: &Operation) -> String {
    if let Some(op_id) = op.operation_id.as_deref().filter(|s| !s.is_empty()) {
        return format!("{}_{}", namespace, sanitize_name(op_id));
    }

    let mut parts = vec![namespace.to_string(), method.to_lowercase()];
    for segment in path.trim_matches('/').split('/') {
        if segment.is_empty() || (segment.starts_with('{') && segment.ends_with('}')) {
            continue;
        }
        let cleaned = sanitize_name(segment);
        if !cleaned.is_empty() {
            parts.push(cleaned);
        }
    }
    parts.join("_")
}

/// Determine `scheme://authority` and base path from the first usable
/// `servers` entry. Relative server URLs resolve against the schema source.
fn host_and_base_path(
    source: &str,
    doc: &OpenApiDocument,
) -> Result<(String, String), BridgeError> {
    if doc.servers.is_empty() {
        return Err(BridgeError::Generate(
            "no servers defined in OpenAPI document".to_string(),
        ));
    }

    let base_source = Url::parse(source).ok();

    for server in &doc.servers {
        if server.url.is_empty() {
            continue;
        }
        let resolved = match Url::parse(&server.url) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => match &base_source {
                Some(base) => match base.join(&server.url) {
                    Ok(url) => url,
                    Err(_) => continue,
                },
                None => {
                    tracing::warn!(server = %server.url, "Cannot resolve relative server URL without a source URL");
                    continue;
                }
            },
            Err(_) => continue,
        };

        if (resolved.scheme() == "http" || resolved.scheme() == "https")
            && resolved.host_str().is_some()
        {
            let mut host = format!("{}://{}", resolved.scheme(), resolved.host_str().unwrap());
            if let Some(port) = resolved.port() {
                host.push_str(&format!(":{}", port));
            }
            let mut base_path = resolved.path().to_string();
            if base_path.len() > 1 && base_path.ends_with('/') {
                base_path.pop();
            }
            if base_path == "/" {
                base_path.clear();
            }
            return Ok((host, base_path));
        }
    }

    Err(BridgeError::Generate(
        "no suitable HTTP/HTTPS server URL found in OpenAPI document".to_string(),
    ))
}

/// Recursive OpenAPI schema to JSON Schema conversion.
fn convert_schema(
    doc: &OpenApiDocument,
    schema: &SchemaObject,
    depth: usize,
) -> Result<JsonSchema, BridgeError> {
    if depth > MAX_SCHEMA_DEPTH {
        return Ok(JsonSchema::empty_object());
    }

    if let Some(reference) = &schema.reference {
        return match doc.resolve_schema(reference) {
            Some(resolved) => convert_schema(doc, resolved, depth + 1),
            None => {
                tracing::debug!(reference = %reference, "Unresolvable schema reference, using empty object");
                Ok(JsonSchema::empty_object())
            }
        };
    }

    let schema_type = match &schema.schema_type {
        Some(ty) => {
            if ty.is_union() {
                tracing::warn!("Multiple schema types found, using the first");
            }
            ty.primary().unwrap_or("").to_string()
        }
        None => String::new(),
    };

    let mut converted = JsonSchema {
        schema_type: schema_type.clone(),
        format: schema.format.clone().unwrap_or_default(),
        enum_values: schema.enum_values.clone().unwrap_or_default(),
        ..Default::default()
    };

    match schema_type.as_str() {
        "object" => {
            converted.required = schema.required.clone().unwrap_or_default();
            if let Some(props) = &schema.properties {
                for (name, prop) in props {
                    converted
                        .properties
                        .insert(name.clone(), convert_schema(doc, prop, depth + 1)?);
                }
            }
        }
        "array" => match &schema.items {
            Some(items) => {
                converted.items = Some(Box::new(convert_schema(doc, items, depth + 1)?));
            }
            None => {
                tracing::warn!("Array schema without 'items' definition");
            }
        },
        "string" | "number" | "integer" | "boolean" | "" => {}
        other => {
            tracing::warn!(schema_type = %other, "Unsupported schema type, treating as string");
            converted.schema_type = "string".to_string();
        }
    }

    Ok(converted)
}
