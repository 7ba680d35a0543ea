//! Connect-RPC invocation backend, HTTP/JSON mode only.

use serde_json::{Map, Value};

use crate::error::BridgeError;
use crate::models::InvocationDetails;
use crate::utils::HttpClient;

/// Executes Connect-RPC calls as plain HTTP POSTs with the Connect
/// protocol headers.
#[derive(Debug, Clone)]
pub struct ConnectInvoker {
    http: HttpClient,
}

impl ConnectInvoker {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn invoke(
        &self,
        details: &InvocationDetails,
        args: &Map<String, Value>,
    ) -> Result<Value, BridgeError> {
        let url = build_url(details.grpc_target(), &details.rpc_path());
        tracing::debug!(url = %url, "Invoking Connect-RPC method");

        let response = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .header("Connect-Protocol-Version", "1")
            .json(&Value::Object(args.clone()))
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        interpret_response(status, &body)
    }
}

/// Endpoints default to `https` and lose any trailing slash before the
/// `/package.Service/Method` path is appended.
pub(crate) fn build_url(server: &str, rpc_path: &str) -> String {
    let server = if server.starts_with("http://") || server.starts_with("https://") {
        server.to_string()
    } else {
        format!("https://{}", server)
    };
    format!("{}{}", server.trim_end_matches('/'), rpc_path)
}

/// Interpret a Connect unary response: an error object (top-level
/// `code`/`message` on a failure status, or one nested under `error`)
/// signals an RPC error; otherwise the body is the result.
pub(crate) fn interpret_response(status: u16, body: &[u8]) -> Result<Value, BridgeError> {
    let parsed: Option<Value> = serde_json::from_slice(body).ok();

    if !(200..300).contains(&status) {
        if let Some(error) = parsed.as_ref().and_then(extract_error) {
            return Err(error);
        }
        return Err(BridgeError::upstream_connect(
            status.to_string(),
            String::from_utf8_lossy(body).to_string(),
        ));
    }

    let result = parsed.ok_or_else(|| {
        BridgeError::Fetch(format!(
            "failed to decode Connect response: {}",
            String::from_utf8_lossy(body)
        ))
    })?;

    if let Some(error) = extract_error(&result) {
        return Err(error);
    }
    Ok(result)
}

fn extract_error(value: &Value) -> Option<BridgeError> {
    // Nested form: {"error": {"code": ..., "message": ...}}
    if let Some(error) = value.get("error").and_then(Value::as_object) {
        return Some(BridgeError::upstream_connect(
            error.get("code").and_then(Value::as_str).unwrap_or("unknown"),
            error.get("message").and_then(Value::as_str).unwrap_or(""),
        ));
    }
    // Top-level form used by unary error responses: {"code": ..., "message": ...}
    if let (Some(code), message) = (
        value.get("code").and_then(Value::as_str),
        value.get("message").and_then(Value::as_str),
    ) {
        return Some(BridgeError::upstream_connect(code, message.unwrap_or("")));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpstreamKind;
    use serde_json::json;

    #[test]
    fn test_build_url_defaults_scheme_and_trims_slash() {
        assert_eq!(
            build_url("demo.connectrpc.com", "/eliza.v1.ElizaService/Say"),
            "https://demo.connectrpc.com/eliza.v1.ElizaService/Say"
        );
        assert_eq!(
            build_url("https://demo.connectrpc.com/", "/eliza.v1.ElizaService/Say"),
            "https://demo.connectrpc.com/eliza.v1.ElizaService/Say"
        );
        assert_eq!(
            build_url("http://localhost:8080", "/a.B/C"),
            "http://localhost:8080/a.B/C"
        );
    }

    #[test]
    fn test_success_body_is_result() {
        let value = interpret_response(200, br#"{"sentence":"hello there"}"#).unwrap();
        assert_eq!(value, json!({"sentence": "hello there"}));
    }

    #[test]
    fn test_connect_error_fields_are_surfaced() {
        let err =
            interpret_response(400, br#"{"code":"invalid_argument","message":"sentence cannot be empty"}"#)
                .unwrap_err();
        match err {
            BridgeError::Upstream { kind, code, message } => {
                assert_eq!(kind, UpstreamKind::Connect);
                assert_eq!(code, "invalid_argument");
                assert_eq!(message, "sentence cannot be empty");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_nested_error_object_in_success_body() {
        let err = interpret_response(200, br#"{"error":{"code":"not_found","message":"gone"}}"#)
            .unwrap_err();
        match err {
            BridgeError::Upstream { code, message, .. } => {
                assert_eq!(code, "not_found");
                assert_eq!(message, "gone");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_non_json_error_body() {
        let err = interpret_response(502, b"bad gateway").unwrap_err();
        match err {
            BridgeError::Upstream { code, message, .. } => {
                assert_eq!(code, "502");
                assert_eq!(message, "bad gateway");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
