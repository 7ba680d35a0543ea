//! HTTP/REST invocation backend.

use std::collections::HashSet;

use reqwest::Method;
use serde_json::{Map, Value};
use url::Url;

use crate::error::BridgeError;
use crate::models::InvocationDetails;
use crate::utils::HttpClient;

/// Executes upstream HTTP calls described by [`InvocationDetails`].
#[derive(Debug, Clone)]
pub struct HttpInvoker {
    http: HttpClient,
}

impl HttpInvoker {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn invoke(
        &self,
        details: &InvocationDetails,
        args: &Map<String, Value>,
    ) -> Result<Value, BridgeError> {
        let prepared = prepare_request(details, args)?;
        tracing::debug!(method = %prepared.method, url = %prepared.url, "Executing HTTP request");

        let mut request = self.http.request(prepared.method.clone(), &prepared.url);
        if let Some(body) = prepared.body {
            if !prepared.content_type.is_empty() {
                request = request.header("Content-Type", &prepared.content_type);
            }
            request = request.body(body);
        }
        for (key, value) in &details.header_params {
            request = request.header(key, value);
        }

        let response = request.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response.bytes().await?.to_vec();

        decode_response(status.as_u16(), &content_type, &body)
    }
}

/// A fully composed request, ready to send. Split out so URL and body
/// composition stay testable without a live upstream.
#[derive(Debug)]
pub(crate) struct PreparedRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Vec<u8>>,
    pub content_type: String,
}

pub(crate) fn prepare_request(
    details: &InvocationDetails,
    args: &Map<String, Value>,
) -> Result<PreparedRequest, BridgeError> {
    // Host must be a valid absolute URL; the final URL is assembled as a
    // string so that unresolved `{name}` placeholders pass through as
    // literal text.
    Url::parse(&details.host)
        .map_err(|e| BridgeError::Config(format!("invalid host URL '{}': {}", details.host, e)))?;

    let method = Method::from_bytes(details.method.as_bytes())
        .map_err(|e| BridgeError::Config(format!("invalid HTTP method '{}': {}", details.method, e)))?;

    // 1. Substitute path placeholders; arguments consumed here leave the
    //    pool entirely.
    let mut path = join_paths(&details.base_path, &details.path);
    let mut remaining: Map<String, Value> = Map::new();
    for (key, value) in args {
        let placeholder = format!("{{{}}}", key);
        if path.contains(&placeholder) {
            path = path.replace(&placeholder, &plain_string(value));
        } else {
            remaining.insert(key.clone(), value.clone());
        }
    }

    // 2. Move declared query parameters into the query string.
    let query_names: HashSet<&str> = details.query_params.iter().map(String::as_str).collect();
    let mut query_pairs = Vec::new();
    let mut body_pool: Map<String, Value> = Map::new();
    for (key, value) in remaining {
        if query_names.contains(key.as_str()) {
            query_pairs.push(format!(
                "{}={}",
                urlencoding::encode(&key),
                urlencoding::encode(&plain_string(&value))
            ));
        } else {
            body_pool.insert(key, value);
        }
    }

    let mut url = format!("{}{}", details.host.trim_end_matches('/'), path);
    if !query_pairs.is_empty() {
        url.push('?');
        url.push_str(&query_pairs.join("&"));
    }

    // 3. Compose the body, only for methods that carry one.
    let body_allowed = method == Method::POST || method == Method::PUT || method == Method::PATCH;
    let mut body = None;
    if body_allowed {
        if details.body_param.is_empty() {
            if !body_pool.is_empty() {
                if details.content_type != "application/json" && !details.content_type.is_empty() {
                    return Err(BridgeError::Config(format!(
                        "cannot compose a multi-field body for Content-Type: {}",
                        details.content_type
                    )));
                }
                body = Some(serde_json::to_vec(&Value::Object(body_pool))?);
            }
        } else if let Some(value) = body_pool.remove(&details.body_param) {
            if details.content_type == "application/json" || details.content_type.is_empty() {
                body = Some(serde_json::to_vec(&value)?);
            } else {
                body = Some(plain_string(&value).into_bytes());
            }
        } else {
            tracing::warn!(
                body_param = %details.body_param,
                "Declared body parameter missing from arguments, sending no body"
            );
        }
    } else if !body_pool.is_empty() {
        tracing::warn!(
            method = %method,
            leftover = body_pool.len(),
            "Arguments remain but the HTTP method does not carry a body"
        );
    }

    let content_type = if body.is_some() {
        if details.content_type.is_empty() {
            "application/json".to_string()
        } else {
            details.content_type.clone()
        }
    } else {
        String::new()
    };

    Ok(PreparedRequest {
        method,
        url,
        body,
        content_type,
    })
}

/// Decode an upstream response: JSON when declared, opaque string
/// otherwise, `UpstreamError` on non-2xx.
pub(crate) fn decode_response(
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<Value, BridgeError> {
    if !(200..300).contains(&status) {
        return Err(BridgeError::upstream_http(
            status,
            String::from_utf8_lossy(body).to_string(),
        ));
    }

    if content_type.contains("application/json") && !body.is_empty() {
        match serde_json::from_slice(body) {
            Ok(value) => Ok(value),
            Err(err) => {
                tracing::warn!(error = %err, "Failed to decode JSON response, returning raw body");
                Ok(Value::String(String::from_utf8_lossy(body).to_string()))
            }
        }
    } else {
        Ok(Value::String(String::from_utf8_lossy(body).to_string()))
    }
}

/// Render a JSON value the way it should appear in a URL: strings bare,
/// everything else in JSON notation.
fn plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn join_paths(base: &str, path: &str) -> String {
    if base.is_empty() {
        return path.to_string();
    }
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Transport;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    fn get_items_details() -> InvocationDetails {
        InvocationDetails {
            transport: Transport::Http,
            host: "https://api.example.com".to_string(),
            base_path: "/v1".to_string(),
            method: "GET".to_string(),
            path: "/items/{id}".to_string(),
            path_params: vec!["id".to_string()],
            query_params: vec!["verbose".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_path_and_query_composition() {
        let prepared =
            prepare_request(&get_items_details(), &args(json!({"id": 7, "verbose": true}))).unwrap();
        assert_eq!(prepared.method, Method::GET);
        assert_eq!(prepared.url, "https://api.example.com/v1/items/7?verbose=true");
        assert!(prepared.body.is_none());
    }

    #[test]
    fn test_unresolved_placeholder_passes_through() {
        let prepared = prepare_request(&get_items_details(), &args(json!({"verbose": false}))).unwrap();
        assert_eq!(
            prepared.url,
            "https://api.example.com/v1/items/{id}?verbose=false"
        );
    }

    #[test]
    fn test_body_composed_from_leftover_args() {
        let details = InvocationDetails {
            host: "https://api.example.com".to_string(),
            method: "POST".to_string(),
            path: "/users".to_string(),
            query_params: vec!["dry_run".to_string()],
            content_type: "application/json".to_string(),
            ..Default::default()
        };
        let prepared = prepare_request(
            &details,
            &args(json!({"email": "a@b", "name": "A", "dry_run": false})),
        )
        .unwrap();

        assert_eq!(prepared.url, "https://api.example.com/users?dry_run=false");
        let body: Value = serde_json::from_slice(prepared.body.as_ref().unwrap()).unwrap();
        assert_eq!(body, json!({"email": "a@b", "name": "A"}));
        assert_eq!(prepared.content_type, "application/json");
    }

    #[test]
    fn test_single_body_param_becomes_entire_body() {
        let details = InvocationDetails {
            host: "https://api.example.com".to_string(),
            method: "POST".to_string(),
            path: "/notes".to_string(),
            body_param: "requestBody".to_string(),
            content_type: "application/json".to_string(),
            ..Default::default()
        };
        let prepared =
            prepare_request(&details, &args(json!({"requestBody": ["a", "b"]}))).unwrap();
        let body: Value = serde_json::from_slice(prepared.body.as_ref().unwrap()).unwrap();
        assert_eq!(body, json!(["a", "b"]));
    }

    #[test]
    fn test_get_never_carries_a_body() {
        let details = InvocationDetails {
            host: "https://api.example.com".to_string(),
            method: "GET".to_string(),
            path: "/items".to_string(),
            ..Default::default()
        };
        let prepared = prepare_request(&details, &args(json!({"stray": 1}))).unwrap();
        assert!(prepared.body.is_none());
        assert_eq!(prepared.url, "https://api.example.com/items");
    }

    #[test]
    fn test_path_args_leave_the_body_pool() {
        let details = InvocationDetails {
            host: "https://api.example.com".to_string(),
            method: "PUT".to_string(),
            path: "/items/{id}".to_string(),
            path_params: vec!["id".to_string()],
            content_type: "application/json".to_string(),
            ..Default::default()
        };
        let prepared =
            prepare_request(&details, &args(json!({"id": 3, "name": "x"}))).unwrap();
        assert_eq!(prepared.url, "https://api.example.com/items/3");
        let body: Value = serde_json::from_slice(prepared.body.as_ref().unwrap()).unwrap();
        assert_eq!(body, json!({"name": "x"}));
    }

    #[test]
    fn test_query_values_are_encoded() {
        let details = InvocationDetails {
            host: "https://api.example.com".to_string(),
            method: "GET".to_string(),
            path: "/search".to_string(),
            query_params: vec!["q".to_string()],
            ..Default::default()
        };
        let prepared = prepare_request(&details, &args(json!({"q": "a b&c"}))).unwrap();
        assert_eq!(prepared.url, "https://api.example.com/search?q=a%20b%26c");
    }

    #[test]
    fn test_invalid_host_is_config_error() {
        let details = InvocationDetails {
            host: "not a url".to_string(),
            method: "GET".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            prepare_request(&details, &Map::new()),
            Err(BridgeError::Config(_))
        ));
    }

    #[test]
    fn test_decode_json_response() {
        let value = decode_response(200, "application/json", br#"{"ok":true}"#).unwrap();
        assert_eq!(value, json!({"ok": true}));
    }

    #[test]
    fn test_empty_success_body_yields_empty_string() {
        let value = decode_response(204, "", b"").unwrap();
        assert_eq!(value, Value::String(String::new()));
    }

    #[test]
    fn test_non_json_body_returned_as_string() {
        let value = decode_response(200, "text/plain", b"pong").unwrap();
        assert_eq!(value, Value::String("pong".to_string()));
    }

    #[test]
    fn test_error_status_maps_to_upstream_error() {
        let err = decode_response(404, "application/json", br#"{"detail":"nope"}"#).unwrap_err();
        match err {
            BridgeError::Upstream { code, message, .. } => {
                assert_eq!(code, "404");
                assert!(message.contains("nope"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
