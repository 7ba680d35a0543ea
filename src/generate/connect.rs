//! Connect-RPC schema to tool projection.
//!
//! Consumes a proto-parsed schema paired with a Connect endpoint. In HTTP
//! mode the emitted tools use the Connect transport with
//! `/package.Service/Method` paths; in gRPC mode they behave like plain
//! proto tools.

use crate::error::BridgeError;
use crate::models::{
    ConnectMode, InvocationDetails, ParsedSchema, ProtoMeta, Tool, Transport,
};

use super::grpc::rpc_tools;

pub fn generate(
    source: &str,
    parsed: &ParsedSchema,
    meta: Option<&ProtoMeta>,
) -> Result<Vec<(Tool, InvocationDetails)>, BridgeError> {
    let meta = meta.ok_or_else(|| {
        BridgeError::Generate(format!(
            "Connect schema '{}' is missing its server metadata",
            source
        ))
    })?;

    let schema = match parsed {
        ParsedSchema::Proto(schema) => schema,
        _ => {
            return Err(BridgeError::Generate(format!(
                "Connect source '{}' requires a .proto schema body (use a .proto url with type: connect)",
                source
            )));
        }
    };

    let transport = match meta.mode {
        ConnectMode::Http => Transport::Connect,
        ConnectMode::Grpc => Transport::Grpc,
    };
    let pairs = rpc_tools(schema, transport, "", &meta.server_endpoint);
    tracing::info!(
        count = pairs.len(),
        mode = ?meta.mode,
        "Finished generating Connect-RPC tools"
    );
    Ok(pairs)
}
