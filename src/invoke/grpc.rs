//! Native gRPC invocation backend.
//!
//! Requests are built dynamically from the descriptors captured at
//! registration time: no generated client code exists for the upstream
//! services, so encoding and decoding run through `DynamicMessage`.

use std::time::Duration;

use http::uri::PathAndQuery;
use prost::Message;
use prost_reflect::{DeserializeOptions, DynamicMessage, MethodDescriptor};
use serde_json::{Map, Value};
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Status};

use crate::error::BridgeError;
use crate::models::InvocationDetails;

/// Deadline for dialing the upstream server.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Executes unary gRPC calls described by [`InvocationDetails`].
///
/// Connections are short-lived, one per invocation; plaintext by default.
#[derive(Debug, Clone)]
pub struct GrpcInvoker {
    call_timeout: Duration,
}

impl GrpcInvoker {
    pub fn new(call_timeout: Duration) -> Self {
        Self { call_timeout }
    }

    pub async fn invoke(
        &self,
        details: &InvocationDetails,
        args: &Map<String, Value>,
    ) -> Result<Value, BridgeError> {
        let method = resolve_method(details)?;
        if method.is_client_streaming() || method.is_server_streaming() {
            return Err(BridgeError::Invariant(format!(
                "streaming method {} must not reach the unary invoker",
                method.full_name()
            )));
        }

        let request_message = build_request(&method, args)?;

        let target = details.grpc_target().trim_start_matches("grpc://").to_string();
        tracing::debug!(target = %target, method = %details.rpc_path(), "Invoking gRPC method");
        let channel = self.connect(&target).await?;

        let path = PathAndQuery::try_from(details.rpc_path()).map_err(|e| {
            BridgeError::Config(format!("invalid RPC path '{}': {}", details.rpc_path(), e))
        })?;

        let mut grpc = tonic::client::Grpc::new(channel);
        grpc.ready().await.map_err(|e| {
            BridgeError::upstream_grpc("Unavailable", format!("service not ready: {}", e))
        })?;

        let response = grpc
            .unary(
                Request::new(request_message),
                path,
                DynamicCodec::new(method.clone()),
            )
            .await
            .map_err(status_to_error)?;

        // Proto3 JSON rules apply to the response rendering.
        serde_json::to_value(response.into_inner())
            .map_err(|e| BridgeError::Fetch(format!("failed to render gRPC response: {}", e)))
    }

    async fn connect(&self, target: &str) -> Result<Channel, BridgeError> {
        let endpoint = Endpoint::from_shared(format!("http://{}", target))
            .map_err(|e| BridgeError::Config(format!("invalid gRPC target '{}': {}", target, e)))?
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(self.call_timeout);
        endpoint.connect().await.map_err(|e| {
            BridgeError::upstream_grpc("Unavailable", format!("failed to connect to {}: {}", target, e))
        })
    }
}

/// Look up the method descriptor in the pool embedded at registration.
fn resolve_method(details: &InvocationDetails) -> Result<MethodDescriptor, BridgeError> {
    let pool = details.descriptor_pool.as_ref().ok_or_else(|| {
        BridgeError::Invariant(format!(
            "gRPC tool for {} registered without descriptors",
            details.rpc_path()
        ))
    })?;
    let service = pool.get_service_by_name(&details.service_fqn).ok_or_else(|| {
        BridgeError::Invariant(format!(
            "service {} missing from embedded descriptors",
            details.service_fqn
        ))
    })?;
    let method = service
        .methods()
        .find(|m| m.name() == details.method_name)
        .ok_or_else(|| {
            BridgeError::Invariant(format!(
                "method {} missing from service {}",
                details.method_name, details.service_fqn
            ))
        });
    method
}

/// Build the dynamic request message from the JSON argument object.
/// Field lookup follows proto3 JSON rules: both the proto field name and
/// the JSON name are accepted, scalars are coerced, repeated fields come
/// from arrays, and bytes fields take base64 strings.
fn build_request(
    method: &MethodDescriptor,
    args: &Map<String, Value>,
) -> Result<DynamicMessage, BridgeError> {
    let json = Value::Object(args.clone());
    let options = DeserializeOptions::new().deny_unknown_fields(false);
    DynamicMessage::deserialize_with_options(method.input(), json, &options).map_err(|e| {
        BridgeError::Config(format!(
            "arguments do not match {}: {}",
            method.input().full_name(),
            e
        ))
    })
}

fn status_to_error(status: Status) -> BridgeError {
    BridgeError::upstream_grpc(format!("{:?}", status.code()), status.message().to_string())
}

/// Tonic codec over `DynamicMessage`, parameterized by the method
/// descriptor captured at registration.
#[derive(Debug, Clone)]
struct DynamicCodec {
    method: MethodDescriptor,
}

impl DynamicCodec {
    fn new(method: MethodDescriptor) -> Self {
        Self { method }
    }
}

impl Codec for DynamicCodec {
    type Encode = DynamicMessage;
    type Decode = DynamicMessage;
    type Encoder = DynamicEncoder;
    type Decoder = DynamicDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        DynamicEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        DynamicDecoder {
            descriptor: self.method.output(),
        }
    }
}

#[derive(Debug)]
struct DynamicEncoder;

impl Encoder for DynamicEncoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        item.encode(dst)
            .map_err(|e| Status::internal(format!("failed to encode request: {}", e)))
    }
}

#[derive(Debug)]
struct DynamicDecoder {
    descriptor: prost_reflect::MessageDescriptor,
}

impl Decoder for DynamicDecoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        let message = DynamicMessage::decode(self.descriptor.clone(), src)
            .map_err(|e| Status::internal(format!("failed to decode response: {}", e)))?;
        Ok(Some(message))
    }
}
