//! Standalone `.proto` schema fetching.

use async_trait::async_trait;

use crate::config::SchemaSource;
use crate::error::BridgeError;
use crate::models::{GrpcSchema, ParsedSchema, ProtoMeta, RawSchema, SchemaKind, ServiceInfo};
use crate::protoparse;
use crate::utils::{with_retry, HttpClient, RetryConfig};

use super::grpc::build_pool;
use super::SchemaFetcher;

/// Loads a `.proto` file from an HTTPS URL, a `file://` URL or a local
/// path, and parses it into service descriptors. The configured `server`
/// endpoint travels along in the schema metadata.
#[derive(Debug, Clone)]
pub struct ProtoFetcher {
    http: HttpClient,
}

impl ProtoFetcher {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub(crate) async fn load_bytes(&self, source: &SchemaSource) -> Result<Vec<u8>, BridgeError> {
        let url = source.url.as_str();
        if !url.split('@').next().unwrap_or(url).ends_with(".proto") {
            return Err(BridgeError::Fetch(format!(
                "source must be a .proto file, got: {}",
                url
            )));
        }

        if let Some(path) = url.strip_prefix("file://") {
            return Ok(std::fs::read(path)?);
        }

        if url.starts_with("http://") || url.starts_with("https://") {
            return with_retry(RetryConfig::default(), || async {
                let mut request = self.http.get(url);
                for (key, value) in &source.headers {
                    request = request.header(key, value);
                }
                let response = request.send().await?;
                if !response.status().is_success() {
                    return Err(BridgeError::Fetch(format!(
                        "failed to fetch .proto file from {}: status {}",
                        url,
                        response.status()
                    )));
                }
                Ok(response.bytes().await?.to_vec())
            })
            .await;
        }

        // Anything else is treated as a local path.
        Ok(std::fs::read(url)?)
    }
}

/// Parse proto source bytes into services plus a descriptor pool.
pub(crate) fn parse_schema(bytes: &[u8]) -> Result<GrpcSchema, BridgeError> {
    let source_text = std::str::from_utf8(bytes)
        .map_err(|e| BridgeError::Fetch(format!(".proto file is not valid UTF-8: {}", e)))?;
    let file = protoparse::parse_proto(source_text)?;
    let pool = build_pool(vec![file])?;

    let services = pool
        .services()
        .map(|service| ServiceInfo::from_descriptor(&service))
        .collect::<Vec<_>>();
    Ok(GrpcSchema { services, pool })
}

/// Require and assemble the `.proto`/Connect metadata for a source.
pub(crate) fn proto_meta(source: &SchemaSource) -> Result<ProtoMeta, BridgeError> {
    let server_endpoint = source.server.clone().ok_or_else(|| {
        BridgeError::Config(format!(
            "source '{}' requires a 'server' endpoint",
            source.url
        ))
    })?;
    Ok(ProtoMeta {
        server_endpoint,
        mode: source.connect_mode(),
    })
}

#[async_trait]
impl SchemaFetcher for ProtoFetcher {
    async fn fetch(&self, source: &SchemaSource) -> Result<RawSchema, BridgeError> {
        tracing::info!(source = %source.url, "Fetching .proto schema");

        let meta = proto_meta(source)?;
        let bytes = self.load_bytes(source).await?;
        let schema = parse_schema(&bytes)?;
        tracing::info!(
            source = %source.url,
            services = schema.services.len(),
            "Parsed .proto schema"
        );

        Ok(RawSchema {
            source: source.url.clone(),
            kind: SchemaKind::Proto,
            bytes,
            parsed: ParsedSchema::Proto(schema),
            meta: Some(meta),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const GREETER: &str = r#"
syntax = "proto3";
package helloworld;

service Greeter {
  rpc SayHello(HelloRequest) returns (HelloReply);
}

message HelloRequest { string name = 1; }
message HelloReply { string message = 1; }
"#;

    #[test]
    fn test_parse_schema() {
        let schema = parse_schema(GREETER.as_bytes()).unwrap();
        assert_eq!(schema.services.len(), 1);
        assert_eq!(schema.services[0].fqn, "helloworld.Greeter");
        assert_eq!(schema.services[0].methods[0].name, "SayHello");
    }

    #[tokio::test]
    async fn test_fetch_local_proto() {
        let dir = std::env::temp_dir().join("api-bridge-proto-fetch-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("greeter.proto");
        std::fs::write(&path, GREETER).unwrap();

        let fetcher = ProtoFetcher::new(HttpClient::new(Duration::from_secs(5)).unwrap());
        let mut source = SchemaSource::from_url(format!("file://{}", path.display()));
        source.server = Some("localhost:50051".to_string());

        let raw = fetcher.fetch(&source).await.unwrap();
        assert_eq!(raw.kind, SchemaKind::Proto);
        assert_eq!(raw.meta.as_ref().unwrap().server_endpoint, "localhost:50051");
        match &raw.parsed {
            ParsedSchema::Proto(schema) => assert_eq!(schema.services.len(), 1),
            other => panic!("unexpected parsed form: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_requires_server() {
        let fetcher = ProtoFetcher::new(HttpClient::new(Duration::from_secs(5)).unwrap());
        let source = SchemaSource::from_url("file:///tmp/never-read.proto");
        let err = fetcher.fetch(&source).await.unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }
}
