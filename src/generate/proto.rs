//! Standalone `.proto` schema to tool projection.
//!
//! Identical to the gRPC generator except that the invocation details carry
//! the configured server endpoint and the file's descriptors travel with
//! every tool for dynamic message construction.

use crate::error::BridgeError;
use crate::models::{GrpcSchema, InvocationDetails, ProtoMeta, Tool, Transport};

use super::grpc::rpc_tools;

pub fn generate(
    source: &str,
    schema: &GrpcSchema,
    meta: &ProtoMeta,
) -> Result<Vec<(Tool, InvocationDetails)>, BridgeError> {
    if schema.services.is_empty() {
        return Err(BridgeError::Generate(format!(
            "no services found in .proto schema '{}'",
            source
        )));
    }

    let pairs = rpc_tools(schema, Transport::Grpc, "", &meta.server_endpoint);
    tracing::info!(count = pairs.len(), "Finished generating tools from .proto schema");
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::grpc_schema_for_test;
    use crate::models::ConnectMode;

    #[test]
    fn test_proto_tools_carry_endpoint_and_descriptors() {
        let schema = grpc_schema_for_test(
            r#"
syntax = "proto3";
package helloworld;
service Greeter { rpc SayHello(HelloRequest) returns (HelloReply); }
message HelloRequest { string name = 1; }
message HelloReply { string message = 1; }
"#,
        );
        let meta = ProtoMeta {
            server_endpoint: "localhost:50051".to_string(),
            mode: ConnectMode::Http,
        };
        let pairs = generate("file:///greeter.proto", &schema, &meta).unwrap();

        let (tool, details) = &pairs[0];
        assert_eq!(tool.name, "greeter-sayhello");
        assert_eq!(details.transport, Transport::Grpc);
        assert_eq!(details.server_endpoint, "localhost:50051");
        assert_eq!(details.method, "/helloworld.Greeter/SayHello");
        assert!(details.descriptor_pool.is_some());
    }

    #[test]
    fn test_empty_proto_fails() {
        let schema = grpc_schema_for_test("syntax = \"proto3\";\npackage empty;\n");
        let meta = ProtoMeta {
            server_endpoint: "localhost:50051".to_string(),
            mode: ConnectMode::Http,
        };
        assert!(generate("file:///empty.proto", &schema, &meta).is_err());
    }
}
