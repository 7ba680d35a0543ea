//! Invocation backends and the transport router.

mod connect;
mod grpc;
mod http;

pub use connect::ConnectInvoker;
pub use grpc::GrpcInvoker;
pub use http::HttpInvoker;

use serde_json::{Map, Value};

use crate::error::BridgeError;
use crate::models::{InvocationDetails, Transport};
use crate::utils::HttpClient;

/// Stateless dispatcher over the three invocation backends.
///
/// The transport enum is closed, so an unknown transport cannot reach the
/// router; an absent transport defaults to HTTP at the type level.
pub struct InvokerRouter {
    http: HttpInvoker,
    grpc: GrpcInvoker,
    connect: ConnectInvoker,
}

impl InvokerRouter {
    pub fn new(http: HttpInvoker, grpc: GrpcInvoker, connect: ConnectInvoker) -> Self {
        Self { http, grpc, connect }
    }

    /// Build a router sharing one HTTP client across backends.
    pub fn with_client(client: HttpClient, call_timeout: std::time::Duration) -> Self {
        Self {
            http: HttpInvoker::new(client.clone()),
            grpc: GrpcInvoker::new(call_timeout),
            connect: ConnectInvoker::new(client),
        }
    }

    pub async fn invoke(
        &self,
        details: &InvocationDetails,
        args: &Map<String, Value>,
    ) -> Result<Value, BridgeError> {
        tracing::debug!(transport = %details.transport, "Routing invocation");
        match details.transport {
            Transport::Http => self.http.invoke(details, args).await,
            Transport::Grpc => self.grpc.invoke(details, args).await,
            Transport::Connect => self.connect.invoke(details, args).await,
        }
    }
}
