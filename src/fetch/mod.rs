//! Schema fetchers, one per [`SchemaKind`].
//!
//! Fetchers are idempotent and side-effect-free apart from network I/O.

mod connect;
mod github;
mod grpc;
mod openapi;
mod proto;

pub use connect::ConnectFetcher;
pub use github::{GhCliClient, GithubFetcher, GithubFileFetcher};
pub use grpc::GrpcReflectionFetcher;
pub use openapi::{parse_document, OpenApiFetcher, COMMON_OPENAPI_PATHS};
pub use proto::ProtoFetcher;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::SchemaSource;
use crate::error::BridgeError;
use crate::models::{RawSchema, SchemaKind};
use crate::utils::HttpClient;

/// Parse proto source into a schema, for tests that need descriptors
/// without a live reflection endpoint.
#[cfg(test)]
pub(crate) fn grpc_schema_for_test(source: &str) -> crate::models::GrpcSchema {
    proto::parse_schema(source.as_bytes()).expect("test proto must parse")
}

/// Fetches an interface description for one schema kind.
#[async_trait]
pub trait SchemaFetcher: Send + Sync {
    async fn fetch(&self, source: &SchemaSource) -> Result<RawSchema, BridgeError>;
}

/// The closed set of fetchers, one per schema kind.
pub struct FetcherSet {
    openapi: OpenApiFetcher,
    grpc: GrpcReflectionFetcher,
    proto: ProtoFetcher,
    github: GithubFetcher,
    connect: ConnectFetcher,
}

impl FetcherSet {
    pub fn new(http: HttpClient) -> Self {
        let proto = ProtoFetcher::new(http.clone());
        Self {
            openapi: OpenApiFetcher::new(http.clone()),
            grpc: GrpcReflectionFetcher::new(),
            github: GithubFetcher::new(Arc::new(GhCliClient::new())),
            connect: ConnectFetcher::new(proto.clone()),
            proto,
        }
    }

    /// Swap in a different GitHub credential helper (used by tests and by
    /// deployments that talk to the API directly).
    pub fn with_github_client(mut self, client: Arc<dyn GithubFileFetcher>) -> Self {
        self.github = GithubFetcher::new(client);
        self
    }

    pub fn for_kind(&self, kind: SchemaKind) -> &dyn SchemaFetcher {
        match kind {
            SchemaKind::OpenApi => &self.openapi,
            SchemaKind::GrpcReflect => &self.grpc,
            SchemaKind::Proto => &self.proto,
            SchemaKind::Connect => &self.connect,
            SchemaKind::GithubHosted => &self.github,
        }
    }
}
