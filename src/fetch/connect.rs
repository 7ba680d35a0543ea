//! Connect-RPC schema fetching.
//!
//! Connect has no discovery protocol of its own. When the configured source
//! is a `.proto` file the schema body is fetched and parsed like any other
//! proto; otherwise only the endpoint and mode are packaged, and the
//! generator reports that a schema body is required.

use async_trait::async_trait;

use crate::config::SchemaSource;
use crate::error::BridgeError;
use crate::models::{ParsedSchema, RawSchema, SchemaKind};

use super::proto::{parse_schema, proto_meta};
use super::{ProtoFetcher, SchemaFetcher};

#[derive(Debug, Clone)]
pub struct ConnectFetcher {
    proto: ProtoFetcher,
}

impl ConnectFetcher {
    pub fn new(proto: ProtoFetcher) -> Self {
        Self { proto }
    }
}

#[async_trait]
impl SchemaFetcher for ConnectFetcher {
    async fn fetch(&self, source: &SchemaSource) -> Result<RawSchema, BridgeError> {
        tracing::info!(source = %source.url, "Fetching Connect-RPC schema");

        let meta = proto_meta(source)?;
        let without_ref = source.url.split('@').next().unwrap_or(&source.url);

        if without_ref.ends_with(".proto") {
            let bytes = self.proto.load_bytes(source).await?;
            let schema = parse_schema(&bytes)?;
            return Ok(RawSchema {
                source: source.url.clone(),
                kind: SchemaKind::Connect,
                bytes,
                parsed: ParsedSchema::Proto(schema),
                meta: Some(meta),
            });
        }

        tracing::warn!(
            source = %source.url,
            "Connect source has no .proto schema body; tools cannot be generated from it"
        );
        Ok(RawSchema {
            source: source.url.clone(),
            kind: SchemaKind::Connect,
            bytes: Vec::new(),
            parsed: ParsedSchema::Endpoint,
            meta: Some(meta),
        })
    }
}
