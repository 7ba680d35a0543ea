//! Bound-at-registration record of where and how to execute an upstream call.

use std::collections::HashMap;

use prost_reflect::DescriptorPool;

/// Which invoker backend executes a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    #[default]
    Http,
    Grpc,
    Connect,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Http => write!(f, "http"),
            Transport::Grpc => write!(f, "grpc"),
            Transport::Connect => write!(f, "connect"),
        }
    }
}

/// Everything an invoker needs to execute one tool's upstream call,
/// independent of MCP. Immutable after registration; shared via `Arc`.
#[derive(Debug, Clone, Default)]
pub struct InvocationDetails {
    pub transport: Transport,

    /// Scheme plus authority for HTTP (`https://api.example.com`), or the
    /// `grpc://` source for reflection-backed tools.
    pub host: String,

    /// Path prefix extracted from the OpenAPI `servers` entry (`/v1`).
    pub base_path: String,

    /// HTTP verb (`GET`), or the full RPC path (`/pkg.Svc/Method`) for
    /// gRPC/Connect transports.
    pub method: String,

    /// HTTP path template with `{name}` placeholders (`/items/{id}`).
    pub path: String,

    /// Argument names substituted into the path template.
    pub path_params: Vec<String>,

    /// Argument names moved into the URL query string.
    pub query_params: Vec<String>,

    /// Static headers added to every request.
    pub header_params: HashMap<String, String>,

    /// Name of the single argument whose value becomes the entire request
    /// body. Empty means the body is composed from all arguments not
    /// consumed by path or query substitution.
    pub body_param: String,

    /// Content type of the request body; empty when no body is expected.
    pub content_type: String,

    /// Fully-qualified gRPC service name (`pkg.Svc`).
    pub service_fqn: String,

    /// gRPC method name (`Say`).
    pub method_name: String,

    /// Upstream endpoint for `.proto` and Connect sources.
    pub server_endpoint: String,

    /// Descriptor pool for dynamic gRPC message construction. Present for
    /// gRPC-transport tools; read-only after registration.
    pub descriptor_pool: Option<DescriptorPool>,
}

impl InvocationDetails {
    /// The endpoint a gRPC call should dial: the explicit `server` for
    /// `.proto` sources, otherwise the reflection source itself.
    pub fn grpc_target(&self) -> &str {
        if self.server_endpoint.is_empty() {
            &self.host
        } else {
            &self.server_endpoint
        }
    }

    /// The full `/pkg.Svc/Method` RPC path.
    pub fn rpc_path(&self) -> String {
        if !self.method.is_empty() && self.method.starts_with('/') {
            self.method.clone()
        } else {
            format!("/{}/{}", self.service_fqn, self.method_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grpc_target_prefers_server_endpoint() {
        let details = InvocationDetails {
            host: "grpc://reflect:50051".to_string(),
            server_endpoint: "upstream:50052".to_string(),
            ..Default::default()
        };
        assert_eq!(details.grpc_target(), "upstream:50052");

        let details = InvocationDetails {
            host: "grpc://reflect:50051".to_string(),
            ..Default::default()
        };
        assert_eq!(details.grpc_target(), "grpc://reflect:50051");
    }

    #[test]
    fn test_rpc_path() {
        let details = InvocationDetails {
            service_fqn: "pkg.Svc".to_string(),
            method_name: "Say".to_string(),
            ..Default::default()
        };
        assert_eq!(details.rpc_path(), "/pkg.Svc/Say");

        let details = InvocationDetails {
            method: "/connectrpc.eliza.v1.ElizaService/Say".to_string(),
            ..Default::default()
        };
        assert_eq!(details.rpc_path(), "/connectrpc.eliza.v1.ElizaService/Say");
    }
}
