//! MCP-facing surface: the adapter capability the core registers tools
//! through, the tool registry, and a minimal stdio host.

pub mod registry;
pub mod rpc;
pub mod server;

pub use registry::ToolRegistry;
pub use server::McpServer;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::BridgeError;
use crate::models::Tool;

/// Executes one tool call on behalf of the MCP layer.
///
/// Handlers are thread-safe by construction: they capture immutable
/// invocation details and concurrency-safe clients only.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run the tool with the caller-supplied argument object and return
    /// the MCP text-content representation of the result.
    async fn call(&self, args: Map<String, Value>) -> Result<String, BridgeError>;
}

/// The one capability the sync orchestrator needs from an MCP server
/// implementation. Registration is assumed not to fail.
pub trait McpServerAdapter: Send + Sync {
    fn add_tool(&self, tool: Tool, handler: Arc<dyn ToolHandler>);
}
