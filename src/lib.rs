//! # api-bridge-mcp
//!
//! A protocol-bridging gateway that exposes REST and RPC services as
//! uniformly invocable tools over the Model Context Protocol. For each
//! configured upstream it discovers an interface description (OpenAPI,
//! gRPC reflection, standalone `.proto`, Connect-RPC), projects every
//! operation into a JSON-Schema-described tool, and executes calls against
//! the upstream on demand.
//!
//! ## Architecture
//!
//! - [`models`]: schema kinds, raw/parsed schemas, tools and invocation
//!   details
//! - [`fetch`]: one schema fetcher per kind, including OpenAPI
//!   auto-discovery
//! - [`generate`]: projection of parsed schemas into tools
//! - [`invoke`]: HTTP, gRPC and Connect backends behind a transport router
//! - [`sync`]: the orchestrator tying the pipeline together
//! - [`mcp`]: the adapter capability, tool registry and stdio host
//! - [`config`]: YAML + environment configuration

pub mod admin;
pub mod config;
pub mod error;
pub mod fetch;
pub mod generate;
pub mod invoke;
pub mod mcp;
pub mod models;
pub mod protoparse;
pub mod sync;
pub mod utils;

pub use error::{BridgeError, SyncError};
pub use models::{InvocationDetails, JsonSchema, SchemaKind, Tool, Transport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
