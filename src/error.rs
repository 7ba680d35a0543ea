//! Error types shared across the bridge.

use std::fmt;

/// Errors produced while classifying, fetching, generating or invoking.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Malformed source string, unresolvable classification, missing
    /// required `server`, unknown transport.
    #[error("Config error: {0}")]
    Config(String),

    /// Network failure, non-2xx during fetch, schema parse failure,
    /// unsupported proto imports.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Schema missing required structure, JSON-Schema conversion failure,
    /// reserved-name collision.
    #[error("Generate error: {0}")]
    Generate(String),

    /// Non-2xx HTTP or non-OK gRPC/Connect response from the upstream.
    /// Carries the protocol-native code and a human message.
    #[error("Upstream error ({kind} {code}): {message}")]
    Upstream {
        kind: UpstreamKind,
        code: String,
        message: String,
    },

    /// Fatal programmer error.
    #[error("Invariant violation: {0}")]
    Invariant(String),

    /// Deadline exhaustion.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Context cancellation.
    #[error("Canceled")]
    Canceled,
}

/// Which protocol produced an upstream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamKind {
    Http,
    Grpc,
    Connect,
}

impl fmt::Display for UpstreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamKind::Http => write!(f, "http"),
            UpstreamKind::Grpc => write!(f, "grpc"),
            UpstreamKind::Connect => write!(f, "connect"),
        }
    }
}

impl BridgeError {
    /// Shorthand for an HTTP upstream failure.
    pub fn upstream_http(status: u16, body: impl Into<String>) -> Self {
        BridgeError::Upstream {
            kind: UpstreamKind::Http,
            code: status.to_string(),
            message: body.into(),
        }
    }

    /// Shorthand for a gRPC upstream failure.
    pub fn upstream_grpc(code: impl Into<String>, message: impl Into<String>) -> Self {
        BridgeError::Upstream {
            kind: UpstreamKind::Grpc,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a Connect-RPC upstream failure.
    pub fn upstream_connect(code: impl Into<String>, message: impl Into<String>) -> Self {
        BridgeError::Upstream {
            kind: UpstreamKind::Connect,
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BridgeError::Timeout(err.to_string())
        } else {
            BridgeError::Fetch(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Fetch(format!("JSON: {}", err))
    }
}

impl From<serde_yaml::Error> for BridgeError {
    fn from(err: serde_yaml::Error) -> Self {
        BridgeError::Fetch(format!("YAML: {}", err))
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::Fetch(format!("IO: {}", err))
    }
}

/// Aggregate of per-source sync failures.
///
/// `sync_all` never short-circuits: every configured source is attempted and
/// the failures are joined into one of these.
#[derive(Debug)]
pub struct SyncError {
    pub failures: Vec<(String, BridgeError)>,
}

impl SyncError {
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} source(s) failed to sync:", self.failures.len())?;
        for (source, err) in &self.failures {
            write!(f, "\n  {}: {}", source, err)?;
        }
        Ok(())
    }
}

impl std::error::Error for SyncError {}
