//! gRPC schema fetching via server reflection.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use prost::Message;
use prost_reflect::DescriptorPool;
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::{Channel, Endpoint};
use tonic_reflection::pb::v1alpha::{
    server_reflection_client::ServerReflectionClient, server_reflection_request::MessageRequest,
    server_reflection_response::MessageResponse, ServerReflectionRequest, ServerReflectionResponse,
};

use crate::config::SchemaSource;
use crate::error::BridgeError;
use crate::models::{GrpcSchema, ParsedSchema, RawSchema, SchemaKind, ServiceInfo};

use super::SchemaFetcher;

/// Deadline for dialing the reflection endpoint and for each reflection
/// exchange.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

const REFLECTION_SERVICE_PREFIX: &str = "grpc.reflection.";

/// Discovers services and message descriptors from a live gRPC server.
///
/// Connections are plaintext by default; transport credentials are a
/// deployment concern layered on outside the core.
#[derive(Debug, Clone, Default)]
pub struct GrpcReflectionFetcher;

impl GrpcReflectionFetcher {
    pub fn new() -> Self {
        Self
    }

    async fn connect(&self, target: &str) -> Result<Channel, BridgeError> {
        let endpoint = Endpoint::from_shared(format!("http://{}", target))
            .map_err(|e| BridgeError::Config(format!("invalid gRPC endpoint '{}': {}", target, e)))?
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(CONNECT_TIMEOUT);

        endpoint.connect().await.map_err(|e| {
            BridgeError::Fetch(format!("failed to connect to gRPC target {}: {}", target, e))
        })
    }
}

#[async_trait]
impl SchemaFetcher for GrpcReflectionFetcher {
    async fn fetch(&self, source: &SchemaSource) -> Result<RawSchema, BridgeError> {
        tracing::info!(source = %source.url, "Fetching gRPC schema via reflection");
        if !source.headers.is_empty() {
            tracing::warn!(source = %source.url, "Custom headers are not applied to reflection calls");
        }

        let target = source.url.trim_start_matches("grpc://");
        let channel = self.connect(target).await?;
        let mut client = ServerReflectionClient::new(channel);

        let (tx, rx) = mpsc::channel::<ServerReflectionRequest>(16);
        let mut responses = client
            .server_reflection_info(ReceiverStream::new(rx))
            .await
            .map_err(|status| {
                BridgeError::Fetch(format!(
                    "failed to open reflection stream to {}: {}",
                    target, status
                ))
            })?
            .into_inner();

        // List every service the server exposes.
        send_request(&tx, MessageRequest::ListServices("*".to_string())).await?;
        let response = next_response(&mut responses, target).await?;
        let service_names = match response {
            MessageResponse::ListServicesResponse(list) => list
                .service
                .into_iter()
                .map(|s| s.name)
                .filter(|name| !name.starts_with(REFLECTION_SERVICE_PREFIX))
                .collect::<Vec<_>>(),
            other => {
                return Err(BridgeError::Fetch(format!(
                    "unexpected reflection response to ListServices from {}: {:?}",
                    target, other
                )));
            }
        };
        tracing::debug!(count = service_names.len(), "Listed gRPC services");

        // Fetch the file descriptors declaring each service.
        let mut files: HashMap<String, FileDescriptorProto> = HashMap::new();
        for name in &service_names {
            send_request(&tx, MessageRequest::FileContainingSymbol(name.clone())).await?;
            match next_response(&mut responses, target).await? {
                MessageResponse::FileDescriptorResponse(file_response) => {
                    for bytes in file_response.file_descriptor_proto {
                        let fd = FileDescriptorProto::decode(bytes.as_slice()).map_err(|e| {
                            BridgeError::Fetch(format!(
                                "failed to decode FileDescriptorProto from {}: {}",
                                target, e
                            ))
                        })?;
                        files.entry(fd.name().to_string()).or_insert(fd);
                    }
                }
                MessageResponse::ErrorResponse(err) => {
                    tracing::warn!(
                        service = %name,
                        code = err.error_code,
                        message = %err.error_message,
                        "Reflection error for service, skipping"
                    );
                }
                other => {
                    return Err(BridgeError::Fetch(format!(
                        "unexpected reflection response to FileContainingSymbol from {}: {:?}",
                        target, other
                    )));
                }
            }
        }
        drop(tx);

        let pool = build_pool(files.into_values().collect())?;

        let mut services = Vec::with_capacity(service_names.len());
        for name in &service_names {
            match pool.get_service_by_name(name) {
                Some(descriptor) => services.push(ServiceInfo::from_descriptor(&descriptor)),
                None => {
                    tracing::warn!(service = %name, "Service missing from fetched descriptors, skipping")
                }
            }
        }
        tracing::info!(count = services.len(), "Fetched gRPC service information");

        let descriptor_set = FileDescriptorSet {
            file: pool.file_descriptor_protos().cloned().collect(),
        };

        Ok(RawSchema {
            source: source.url.clone(),
            kind: SchemaKind::GrpcReflect,
            bytes: descriptor_set.encode_to_vec(),
            parsed: ParsedSchema::Grpc(GrpcSchema { services, pool }),
            meta: None,
        })
    }
}

async fn send_request(
    tx: &mpsc::Sender<ServerReflectionRequest>,
    message: MessageRequest,
) -> Result<(), BridgeError> {
    tx.send(ServerReflectionRequest {
        host: String::new(),
        message_request: Some(message),
    })
    .await
    .map_err(|_| BridgeError::Fetch("reflection stream closed while sending".to_string()))
}

async fn next_response(
    responses: &mut tonic::Streaming<ServerReflectionResponse>,
    target: &str,
) -> Result<MessageResponse, BridgeError> {
    let response = responses
        .message()
        .await
        .map_err(|status| {
            BridgeError::Fetch(format!("reflection stream error from {}: {}", target, status))
        })?
        .ok_or_else(|| {
            BridgeError::Fetch(format!("reflection stream from {} ended early", target))
        })?;
    response.message_response.ok_or_else(|| {
        BridgeError::Fetch(format!("empty reflection response from {}", target))
    })
}

/// Load descriptor files into a pool, deferring files until their
/// dependencies are present. Files whose imports never resolve are dropped
/// with a warning rather than failing the whole source.
pub(crate) fn build_pool(mut files: Vec<FileDescriptorProto>) -> Result<DescriptorPool, BridgeError> {
    let mut pool = DescriptorPool::new();
    let mut made_progress = true;

    while made_progress && !files.is_empty() {
        made_progress = false;
        let mut deferred = Vec::new();
        for fd in files {
            let deps_present = fd
                .dependency
                .iter()
                .all(|dep| pool.get_file_by_name(dep).is_some());
            if deps_present {
                let name = fd.name().to_string();
                pool.add_file_descriptor_proto(fd).map_err(|e| {
                    BridgeError::Fetch(format!("invalid descriptor file '{}': {}", name, e))
                })?;
                made_progress = true;
            } else {
                deferred.push(fd);
            }
        }
        files = deferred;
    }

    for fd in &files {
        tracing::warn!(file = %fd.name(), "Dropping descriptor file with unresolved imports");
    }
    Ok(pool)
}
