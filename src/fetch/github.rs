//! Schema fetching from GitHub-hosted files.
//!
//! Sources use the form `github://owner/repo/path/to/file[@ref]`. File
//! bytes come from a credential-helper capability so the core never holds
//! tokens itself; the default helper shells out to the `gh` CLI. After the
//! fetch, the file extension decides whether the bytes are parsed as an
//! OpenAPI document or a `.proto` file.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;

use crate::config::SchemaSource;
use crate::error::BridgeError;
use crate::models::{ParsedSchema, RawSchema, SchemaKind};

use super::openapi::parse_document;
use super::proto::{parse_schema, proto_meta};
use super::SchemaFetcher;

/// Capability for fetching raw file bytes from a GitHub repository.
/// Implementations handle authentication transparently.
#[async_trait]
pub trait GithubFileFetcher: Send + Sync {
    async fn fetch_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<Vec<u8>, BridgeError>;
}

/// Credential helper backed by the `gh` CLI.
#[derive(Debug, Clone, Default)]
pub struct GhCliClient;

impl GhCliClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GithubFileFetcher for GhCliClient {
    async fn fetch_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<Vec<u8>, BridgeError> {
        let mut api_path = format!("repos/{}/{}/contents/{}", owner, repo, path);
        if let Some(r) = git_ref {
            api_path.push_str("?ref=");
            api_path.push_str(r);
        }

        let output = tokio::process::Command::new("gh")
            .args(["api", &api_path, "--jq", ".content"])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                BridgeError::Fetch(format!(
                    "failed to run 'gh' CLI (is it installed and authenticated?): {}",
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BridgeError::Fetch(format!(
                "gh api call for {}/{}/{} failed: {}",
                owner,
                repo,
                path,
                stderr.trim()
            )));
        }

        // The contents API returns base64 with embedded newlines.
        let encoded: String = String::from_utf8_lossy(&output.stdout)
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if encoded.is_empty() {
            return Err(BridgeError::Fetch(format!(
                "empty response from GitHub for {}/{}/{}",
                owner, repo, path
            )));
        }
        base64::engine::general_purpose::STANDARD
            .decode(&encoded)
            .map_err(|e| BridgeError::Fetch(format!("failed to decode GitHub content: {}", e)))
    }
}

/// Fetches GitHub-hosted schemas and re-classifies them by extension.
pub struct GithubFetcher {
    client: Arc<dyn GithubFileFetcher>,
}

impl GithubFetcher {
    pub fn new(client: Arc<dyn GithubFileFetcher>) -> Self {
        Self { client }
    }
}

/// Split `github://owner/repo/path[@ref]` into its components.
pub(crate) fn parse_github_url(
    url: &str,
) -> Result<(String, String, String, Option<String>), BridgeError> {
    let rest = url.strip_prefix("github://").ok_or_else(|| {
        BridgeError::Config(format!("not a GitHub URL: {}", url))
    })?;

    let (path_part, git_ref) = match rest.split_once('@') {
        Some((p, r)) => (p, Some(r.to_string())),
        None => (rest, None),
    };

    let mut segments = path_part.splitn(3, '/');
    let owner = segments.next().unwrap_or_default();
    let repo = segments.next().unwrap_or_default();
    let path = segments.next().unwrap_or_default();
    if owner.is_empty() || repo.is_empty() || path.is_empty() {
        return Err(BridgeError::Config(format!(
            "invalid GitHub URL '{}': expected github://owner/repo/path/to/file[@ref]",
            url
        )));
    }
    Ok((owner.to_string(), repo.to_string(), path.to_string(), git_ref))
}

#[async_trait]
impl SchemaFetcher for GithubFetcher {
    async fn fetch(&self, source: &SchemaSource) -> Result<RawSchema, BridgeError> {
        tracing::info!(source = %source.url, "Fetching schema from GitHub");

        let (owner, repo, path, git_ref) = parse_github_url(&source.url)?;
        let bytes = self
            .client
            .fetch_file(&owner, &repo, &path, git_ref.as_deref())
            .await?;

        // Secondary classification: the file extension decides the real kind.
        if path.ends_with(".proto") {
            let meta = proto_meta(source)?;
            let schema = parse_schema(&bytes)?;
            return Ok(RawSchema {
                source: source.url.clone(),
                kind: if source.is_connect() {
                    SchemaKind::Connect
                } else {
                    SchemaKind::Proto
                },
                bytes,
                parsed: ParsedSchema::Proto(schema),
                meta: Some(meta),
            });
        }

        let document = parse_document(&bytes).map_err(|e| {
            BridgeError::Fetch(format!(
                "failed to parse OpenAPI schema from {}: {}",
                source.url, e
            ))
        })?;
        Ok(RawSchema {
            source: source.url.clone(),
            kind: SchemaKind::OpenApi,
            bytes,
            parsed: ParsedSchema::OpenApi(Box::new(document)),
            meta: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_github_url() {
        let (owner, repo, path, git_ref) =
            parse_github_url("github://acme/specs/apis/petstore.yaml").unwrap();
        assert_eq!(owner, "acme");
        assert_eq!(repo, "specs");
        assert_eq!(path, "apis/petstore.yaml");
        assert!(git_ref.is_none());
    }

    #[test]
    fn test_parse_github_url_with_ref() {
        let (_, _, path, git_ref) =
            parse_github_url("github://acme/specs/svc.proto@v1.2").unwrap();
        assert_eq!(path, "svc.proto");
        assert_eq!(git_ref.as_deref(), Some("v1.2"));
    }

    #[test]
    fn test_parse_github_url_rejects_short_paths() {
        assert!(parse_github_url("github://acme/specs").is_err());
        assert!(parse_github_url("https://github.com/acme/specs").is_err());
    }

    struct StaticFetcher(Vec<u8>);

    #[async_trait]
    impl GithubFileFetcher for StaticFetcher {
        async fn fetch_file(
            &self,
            _owner: &str,
            _repo: &str,
            _path: &str,
            _git_ref: Option<&str>,
        ) -> Result<Vec<u8>, BridgeError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_fetch_reclassifies_openapi() {
        let yaml = b"openapi: 3.0.0\ninfo:\n  title: FromGithub\npaths: {}\n".to_vec();
        let fetcher = GithubFetcher::new(Arc::new(StaticFetcher(yaml)));
        let source = SchemaSource::from_url("github://acme/specs/openapi.yaml");

        let raw = fetcher.fetch(&source).await.unwrap();
        assert_eq!(raw.kind, SchemaKind::OpenApi);
    }

    #[tokio::test]
    async fn test_fetch_reclassifies_proto() {
        let proto = b"syntax = \"proto3\";\npackage a;\nservice S { rpc M(R) returns (R); }\nmessage R { string x = 1; }\n".to_vec();
        let fetcher = GithubFetcher::new(Arc::new(StaticFetcher(proto)));
        let mut source = SchemaSource::from_url("github://acme/protos/svc.proto");
        source.server = Some("localhost:50051".to_string());

        let raw = fetcher.fetch(&source).await.unwrap();
        assert_eq!(raw.kind, SchemaKind::Proto);
        assert!(matches!(raw.parsed, ParsedSchema::Proto(_)));
    }
}
