//! gRPC service to tool projection and the protobuf-to-JSON-Schema mapping.

use prost_reflect::{FieldDescriptor, Kind, MessageDescriptor};

use crate::error::BridgeError;
use crate::models::{GrpcSchema, InvocationDetails, JsonSchema, Tool, Transport};
use crate::utils::shorten_rpc_tool_name;

/// Nesting cap for message conversion; self-referential messages collapse
/// to a bare object schema past this point.
const MAX_MESSAGE_DEPTH: usize = 16;

/// Generate one tool per unary RPC discovered via reflection.
pub fn generate(
    source: &str,
    schema: &GrpcSchema,
) -> Result<Vec<(Tool, InvocationDetails)>, BridgeError> {
    let pairs = rpc_tools(schema, Transport::Grpc, source, "");
    tracing::info!(count = pairs.len(), "Finished generating gRPC tools");
    Ok(pairs)
}

/// Shared worker for the gRPC, proto and Connect generators: one tool per
/// unary method, streaming methods skipped with a warning.
pub(crate) fn rpc_tools(
    schema: &GrpcSchema,
    transport: Transport,
    host: &str,
    server_endpoint: &str,
) -> Vec<(Tool, InvocationDetails)> {
    let mut pairs = Vec::new();
    for service in &schema.services {
        for method in &service.methods {
            if method.is_streaming() {
                tracing::warn!(
                    service = %service.fqn,
                    method = %method.name,
                    "Skipping streaming method"
                );
                continue;
            }

            let name = shorten_rpc_tool_name(&service.fqn, &method.name);
            let tool = Tool {
                name,
                description: format!("Calls {}.{} gRPC method", service.fqn, method.name),
                input_schema: message_to_schema(&method.input, 0),
                output_schema: Some(message_to_schema(&method.output, 0)),
            };

            let details = InvocationDetails {
                transport,
                host: host.to_string(),
                method: format!("/{}/{}", service.fqn, method.name),
                service_fqn: service.fqn.clone(),
                method_name: method.name.clone(),
                server_endpoint: server_endpoint.to_string(),
                descriptor_pool: Some(schema.pool.clone()),
                ..Default::default()
            };
            pairs.push((tool, details));
        }
    }
    pairs
}

/// Convert a message descriptor to an `object` schema over its fields.
///
/// Proto3 fields are optional, so the `required` list stays empty unless
/// the descriptor explicitly marks a field required.
pub(crate) fn message_to_schema(message: &MessageDescriptor, depth: usize) -> JsonSchema {
    if depth > MAX_MESSAGE_DEPTH {
        return JsonSchema::empty_object();
    }

    let mut schema = JsonSchema::empty_object();
    for field in message.fields() {
        let name = field_json_name(&field);
        schema.properties.insert(name.clone(), field_to_schema(&field, depth));
        if field.cardinality() == prost_reflect::Cardinality::Required {
            schema.required.push(name);
        }
    }
    schema
}

fn field_json_name(field: &FieldDescriptor) -> String {
    let json_name = field.json_name();
    if json_name.is_empty() {
        field.name().to_string()
    } else {
        json_name.to_string()
    }
}

fn field_to_schema(field: &FieldDescriptor, depth: usize) -> JsonSchema {
    // Maps come first: they present as repeated entry messages.
    if field.is_map() {
        return JsonSchema::empty_object();
    }
    if field.is_list() {
        return JsonSchema::array(kind_to_schema(&field.kind(), depth));
    }
    kind_to_schema(&field.kind(), depth)
}

fn kind_to_schema(kind: &Kind, depth: usize) -> JsonSchema {
    match kind {
        Kind::Double | Kind::Float => JsonSchema::number(),
        Kind::Int32
        | Kind::Int64
        | Kind::Uint32
        | Kind::Uint64
        | Kind::Sint32
        | Kind::Sint64
        | Kind::Fixed32
        | Kind::Fixed64
        | Kind::Sfixed32
        | Kind::Sfixed64 => JsonSchema::integer(),
        Kind::Bool => JsonSchema::boolean(),
        Kind::String => JsonSchema::string(),
        Kind::Bytes => JsonSchema::string_with_format("byte"),
        Kind::Message(message) => message_to_schema(message, depth + 1),
        Kind::Enum(_) => JsonSchema::string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::grpc_schema_for_test;

    const SVC: &str = r#"
syntax = "proto3";
package pkg;

service Svc {
  rpc Say(Req) returns (Resp);
  rpc Watch(Req) returns (stream Resp);
}

message Req { string sentence = 1; }
message Resp { string sentence = 1; }
"#;

    #[test]
    fn test_reflection_happy_path() {
        let schema = grpc_schema_for_test(SVC);
        let pairs = generate("grpc://localhost:50051", &schema).unwrap();

        // The streaming method produces no tool.
        assert_eq!(pairs.len(), 1);
        let (tool, details) = &pairs[0];
        assert_eq!(tool.name, "svc-say");
        assert_eq!(tool.input_schema.schema_type, "object");
        assert_eq!(tool.input_schema.properties["sentence"].schema_type, "string");

        assert_eq!(details.transport, Transport::Grpc);
        assert_eq!(details.host, "grpc://localhost:50051");
        assert_eq!(details.service_fqn, "pkg.Svc");
        assert_eq!(details.method_name, "Say");
        assert!(details.descriptor_pool.is_some());
    }

    #[test]
    fn test_field_type_mapping() {
        let proto = r#"
syntax = "proto3";
package types;

service T { rpc Go(In) returns (Out); }

message In {
  double d = 1;
  float f = 2;
  int32 i32 = 3;
  uint64 u64 = 4;
  sint32 s32 = 5;
  fixed64 f64 = 6;
  bool flag = 7;
  string text = 8;
  bytes blob = 9;
  repeated int32 nums = 10;
  map<string, string> labels = 11;
  Nested nested = 12;
  Color color = 13;

  message Nested { string value = 1; }
  enum Color { COLOR_UNSPECIFIED = 0; }
}

message Out { string ok = 1; }
"#;
        let schema = grpc_schema_for_test(proto);
        let pairs = generate("grpc://t", &schema).unwrap();
        let props = &pairs[0].0.input_schema.properties;

        assert_eq!(props["d"].schema_type, "number");
        assert_eq!(props["f"].schema_type, "number");
        assert_eq!(props["i32"].schema_type, "integer");
        assert_eq!(props["u64"].schema_type, "integer");
        assert_eq!(props["s32"].schema_type, "integer");
        assert_eq!(props["f64"].schema_type, "integer");
        assert_eq!(props["flag"].schema_type, "boolean");
        assert_eq!(props["text"].schema_type, "string");
        assert_eq!(props["blob"].schema_type, "string");
        assert_eq!(props["blob"].format, "byte");
        assert_eq!(props["nums"].schema_type, "array");
        assert_eq!(props["nums"].items.as_ref().unwrap().schema_type, "integer");
        assert_eq!(props["labels"].schema_type, "object");
        assert!(props["labels"].properties.is_empty());
        assert_eq!(props["nested"].schema_type, "object");
        assert_eq!(props["nested"].properties["value"].schema_type, "string");
        assert_eq!(props["color"].schema_type, "string");

        // Proto3 fields are optional.
        assert!(pairs[0].0.input_schema.required.is_empty());
    }

    #[test]
    fn test_recursive_message_is_bounded() {
        let proto = r#"
syntax = "proto3";
package rec;

service R { rpc Go(Node) returns (Node); }

message Node {
  string label = 1;
  Node next = 2;
}
"#;
        let schema = grpc_schema_for_test(proto);
        // Must terminate and produce a tool.
        let pairs = generate("grpc://r", &schema).unwrap();
        assert_eq!(pairs.len(), 1);
    }
}
