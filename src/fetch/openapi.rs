//! OpenAPI schema fetching with auto-discovery of conventional paths.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::SchemaSource;
use crate::error::BridgeError;
use crate::models::{OpenApiDocument, ParsedSchema, RawSchema, SchemaKind};
use crate::utils::{with_retry, HttpClient, RetryConfig};

use super::SchemaFetcher;

/// Conventional OpenAPI schema paths used by common frameworks, probed in
/// order during auto-discovery.
pub const COMMON_OPENAPI_PATHS: [&str; 12] = [
    "/openapi.json",
    "/docs/openapi.json",
    "/swagger.json",
    "/v3/api-docs",
    "/api-docs",
    "/api/openapi.json",
    "/api/v1/openapi.json",
    "/api/swagger.json",
    "/swagger/v1/swagger.json",
    "/_spec",
    "/spec",
    "/api-spec.json",
];

/// Timeout applied to each individual discovery probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

const ACCEPTED_CONTENT_TYPES: [&str; 2] = ["application/json", "application/vnd.oai.openapi+json"];

/// Fetches and parses OpenAPI documents from URLs or local files.
#[derive(Debug, Clone)]
pub struct OpenApiFetcher {
    http: HttpClient,
}

impl OpenApiFetcher {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Resolve a source to a concrete schema URL.
    ///
    /// Sources that already look like a schema URL are used verbatim;
    /// otherwise the conventional paths are probed and the first hit wins.
    /// Discovery failure falls back to the original source so manually
    /// configured URLs keep working.
    async fn resolve_schema_source(&self, source: &SchemaSource) -> String {
        if looks_like_schema_url(&source.url) {
            return source.url.clone();
        }
        if !source.url.starts_with("http://") && !source.url.starts_with("https://") {
            // Bare hosts get a scheme before probing.
            let with_scheme = format!("http://{}", source.url);
            return self
                .discover(&with_scheme, source)
                .await
                .unwrap_or(with_scheme);
        }
        match self.discover(&source.url, source).await {
            Some(url) => url,
            None => {
                tracing::warn!(source = %source.url, "Auto-discovery found no schema, using source verbatim");
                source.url.clone()
            }
        }
    }

    /// Probe the candidate paths under a base URL. Returns the first URL
    /// answering 200 with an acceptable JSON content type.
    async fn discover(&self, base_url: &str, source: &SchemaSource) -> Option<String> {
        let base = base_url.trim_end_matches('/');
        for path in COMMON_OPENAPI_PATHS {
            let candidate = format!("{}{}", base, path);
            tracing::debug!(url = %candidate, "Probing OpenAPI path");
            match self.probe(&candidate, source).await {
                Ok(true) => {
                    tracing::info!(url = %candidate, "Auto-discovered OpenAPI schema");
                    return Some(candidate);
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::debug!(url = %candidate, error = %err, "Probe failed");
                }
            }
        }
        None
    }

    async fn probe(&self, url: &str, source: &SchemaSource) -> Result<bool, BridgeError> {
        let mut request = self
            .http
            .get(url)
            .timeout(PROBE_TIMEOUT)
            .header("Accept", ACCEPTED_CONTENT_TYPES.join(", "));
        for (key, value) in &source.headers {
            request = request.header(key, value);
        }

        let response = request.send().await?;
        if response.status() != reqwest::StatusCode::OK {
            return Ok(false);
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        Ok(ACCEPTED_CONTENT_TYPES.iter().any(|ct| content_type.contains(ct)))
    }

    async fn load_bytes(&self, url: &str, source: &SchemaSource) -> Result<Vec<u8>, BridgeError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            with_retry(RetryConfig::default(), || async {
                let mut request = self.http.get(url);
                for (key, value) in &source.headers {
                    request = request.header(key, value);
                }
                let response = request.send().await?;
                if !response.status().is_success() {
                    return Err(BridgeError::Fetch(format!(
                        "failed to fetch schema from {}: status {}",
                        url,
                        response.status()
                    )));
                }
                Ok(response.bytes().await?.to_vec())
            })
            .await
        } else {
            // Local file path; headers do not apply.
            Ok(std::fs::read(url)?)
        }
    }
}

#[async_trait]
impl SchemaFetcher for OpenApiFetcher {
    async fn fetch(&self, source: &SchemaSource) -> Result<RawSchema, BridgeError> {
        tracing::info!(source = %source.url, "Fetching OpenAPI schema");

        let resolved = self.resolve_schema_source(source).await;
        if resolved != source.url {
            tracing::info!(resolved = %resolved, "Resolved schema source");
        }

        let bytes = self.load_bytes(&resolved, source).await?;
        let document = parse_document(&bytes)
            .map_err(|e| BridgeError::Fetch(format!("failed to parse OpenAPI schema from {}: {}", resolved, e)))?;

        // Structural oddities are warnings, not failures; the generator
        // decides what it can work with.
        if document.title().is_empty() {
            tracing::warn!(source = %source.url, "OpenAPI document has no title");
        }
        if document.paths.is_empty() {
            tracing::warn!(source = %source.url, "OpenAPI document declares no paths");
        }

        Ok(RawSchema {
            source: source.url.clone(),
            kind: SchemaKind::OpenApi,
            bytes,
            parsed: ParsedSchema::OpenApi(Box::new(document)),
            meta: None,
        })
    }
}

/// Parse a document from YAML or JSON bytes (YAML is a JSON superset, so one
/// path covers both).
pub fn parse_document(bytes: &[u8]) -> Result<OpenApiDocument, serde_yaml::Error> {
    serde_yaml::from_slice(bytes)
}

/// Whether a source already points directly at a schema document rather
/// than a service base URL.
pub fn looks_like_schema_url(source: &str) -> bool {
    let lower = source.to_lowercase();
    lower.ends_with(".json")
        || lower.ends_with(".yaml")
        || lower.ends_with(".yml")
        || lower.contains("openapi")
        || lower.contains("swagger")
        || lower.contains("api-docs")
}
