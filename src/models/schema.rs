//! Schema kinds, source classification and the raw/parsed schema record
//! handed from fetchers to generators.

use prost_reflect::{DescriptorPool, MessageDescriptor};

use crate::config::SchemaSource;
use crate::error::BridgeError;
use crate::models::OpenApiDocument;

/// The kind of an interface description, decided before fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaKind {
    /// OpenAPI / Swagger document over HTTP or on disk.
    OpenApi,
    /// gRPC server reflection endpoint (`grpc://host:port`).
    GrpcReflect,
    /// Standalone `.proto` file paired with a server endpoint.
    Proto,
    /// Connect-RPC endpoint, HTTP/JSON mode.
    Connect,
    /// `github://owner/repo/path[@ref]`; the underlying kind is resolved by
    /// file extension after fetch.
    GithubHosted,
}

impl SchemaKind {
    /// Classify a configured source. Rules are evaluated in order:
    ///
    /// 1. `github://` prefix
    /// 2. `grpc://` prefix
    /// 3. path ends `.proto` (after stripping any `@ref`)
    /// 4. explicit `type: connect` hint
    /// 5. `http`/`https` scheme or bare host
    /// 6. local path ending `.yaml`/`.json`
    ///
    /// A `.proto` or Connect source without a server endpoint is rejected
    /// here rather than surfacing later as a generation failure.
    pub fn classify(source: &SchemaSource) -> Result<SchemaKind, BridgeError> {
        let url = source.url.as_str();

        if url.starts_with("github://") {
            return Ok(SchemaKind::GithubHosted);
        }
        if url.starts_with("grpc://") {
            return Ok(SchemaKind::GrpcReflect);
        }

        // `github://owner/repo/file.proto@v1` strips to `...file.proto`.
        let without_ref = url.split('@').next().unwrap_or(url);
        if without_ref.ends_with(".proto") {
            if source.server.is_none() {
                return Err(BridgeError::Config(format!(
                    "source '{}' is a .proto file but has no 'server' endpoint",
                    url
                )));
            }
            return if source.is_connect() {
                Ok(SchemaKind::Connect)
            } else {
                Ok(SchemaKind::Proto)
            };
        }

        if source.is_connect() {
            if source.server.is_none() {
                return Err(BridgeError::Config(format!(
                    "Connect source '{}' has no 'server' endpoint",
                    url
                )));
            }
            return Ok(SchemaKind::Connect);
        }

        if url.starts_with("http://") || url.starts_with("https://") {
            return Ok(SchemaKind::OpenApi);
        }

        if without_ref.ends_with(".yaml")
            || without_ref.ends_with(".yml")
            || without_ref.ends_with(".json")
        {
            return Ok(SchemaKind::OpenApi);
        }

        // Bare host (`localhost:8000`, `api.example.com`).
        if !url.contains("://") && !url.is_empty() {
            return Ok(SchemaKind::OpenApi);
        }

        Err(BridgeError::Config(format!(
            "could not classify schema source '{}'",
            url
        )))
    }
}

impl std::fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SchemaKind::OpenApi => "openapi",
            SchemaKind::GrpcReflect => "grpc",
            SchemaKind::Proto => "proto",
            SchemaKind::Connect => "connect",
            SchemaKind::GithubHosted => "github",
        };
        write!(f, "{}", name)
    }
}

/// Invocation mode for Connect-RPC sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectMode {
    #[default]
    Http,
    Grpc,
}

/// Extra metadata required for `.proto` and Connect sources.
#[derive(Debug, Clone)]
pub struct ProtoMeta {
    /// The upstream endpoint the generated tools will call.
    pub server_endpoint: String,
    pub mode: ConnectMode,
}

/// A fetched interface description, before tool generation.
///
/// Lives for the duration of one orchestrator pass.
#[derive(Debug)]
pub struct RawSchema {
    /// The original identifier (URL, `grpc://host:port`, `github://owner/repo/path`,
    /// local path).
    pub source: String,
    pub kind: SchemaKind,
    /// Raw payload: YAML/JSON for OpenAPI, serialized file-descriptor protos
    /// for gRPC, proto source text for `.proto`.
    pub bytes: Vec<u8>,
    pub parsed: ParsedSchema,
    /// Required for `.proto` and Connect sources.
    pub meta: Option<ProtoMeta>,
}

/// Kind-specific parsed form of a schema.
///
/// A closed tagged union so the generator dispatch is total; no dynamic
/// downcasts anywhere downstream.
#[derive(Debug)]
pub enum ParsedSchema {
    OpenApi(Box<OpenApiDocument>),
    /// Services discovered via server reflection.
    Grpc(GrpcSchema),
    /// Services parsed out of a standalone `.proto` file.
    Proto(GrpcSchema),
    /// A Connect endpoint with no schema body of its own.
    Endpoint,
}

/// Services and descriptors extracted from reflection data or a parsed
/// `.proto` file. The pool is immutable and shared by reference after
/// registration.
#[derive(Debug, Clone)]
pub struct GrpcSchema {
    pub services: Vec<ServiceInfo>,
    pub pool: DescriptorPool,
}

/// One gRPC service and its methods.
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    /// Fully-qualified service name, e.g. `pkg.Svc`.
    pub fqn: String,
    pub methods: Vec<MethodInfo>,
}

impl ServiceInfo {
    /// Build from a resolved service descriptor, methods in declaration
    /// order.
    pub fn from_descriptor(service: &prost_reflect::ServiceDescriptor) -> Self {
        let methods = service
            .methods()
            .map(|method| MethodInfo {
                name: method.name().to_string(),
                input: method.input(),
                output: method.output(),
                client_streaming: method.is_client_streaming(),
                server_streaming: method.is_server_streaming(),
            })
            .collect();
        Self {
            fqn: service.full_name().to_string(),
            methods,
        }
    }
}

/// One gRPC method with resolved message descriptors.
#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub name: String,
    pub input: MessageDescriptor,
    pub output: MessageDescriptor,
    pub client_streaming: bool,
    pub server_streaming: bool,
}

impl MethodInfo {
    /// Streaming methods are recognized but never projected into tools.
    pub fn is_streaming(&self) -> bool {
        self.client_streaming || self.server_streaming
    }
}
