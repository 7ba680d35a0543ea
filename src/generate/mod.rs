//! Tool generators, one per [`SchemaKind`].
//!
//! Generators are pure functions over the parsed schema form: they never
//! touch the network, so identical raw schemas always produce identical
//! tool lists in identical order.

pub mod connect;
pub mod grpc;
pub mod openapi;
pub mod proto;

use crate::error::BridgeError;
use crate::models::{InvocationDetails, ParsedSchema, RawSchema, SchemaKind, Tool};

/// Project a fetched schema into `(Tool, InvocationDetails)` pairs.
///
/// Dispatch is a closed mapping over the schema kind; `GithubHosted` never
/// reaches this point because the GitHub fetcher re-classifies by file
/// extension.
pub fn generate(raw: &RawSchema) -> Result<Vec<(Tool, InvocationDetails)>, BridgeError> {
    match (raw.kind, &raw.parsed) {
        (SchemaKind::OpenApi, ParsedSchema::OpenApi(doc)) => openapi::generate(&raw.source, doc),
        (SchemaKind::GrpcReflect, ParsedSchema::Grpc(schema)) => {
            grpc::generate(&raw.source, schema)
        }
        (SchemaKind::Proto, ParsedSchema::Proto(schema)) => {
            let meta = raw.meta.as_ref().ok_or_else(|| {
                BridgeError::Generate(format!(
                    "proto schema '{}' is missing its server metadata",
                    raw.source
                ))
            })?;
            proto::generate(&raw.source, schema, meta)
        }
        (SchemaKind::Connect, parsed) => connect::generate(&raw.source, parsed, raw.meta.as_ref()),
        (SchemaKind::GithubHosted, _) => Err(BridgeError::Invariant(format!(
            "GitHub-hosted schema '{}' was not re-classified after fetch",
            raw.source
        ))),
        (kind, parsed) => Err(BridgeError::Invariant(format!(
            "schema kind {} does not match parsed form {:?} for '{}'",
            kind, parsed, raw.source
        ))),
    }
}
