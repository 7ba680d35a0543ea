//! The sync orchestrator: classify, fetch, generate, register.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::config::SchemaSource;
use crate::error::{BridgeError, SyncError};
use crate::fetch::FetcherSet;
use crate::generate;
use crate::invoke::InvokerRouter;
use crate::mcp::{McpServerAdapter, ToolHandler, ToolRegistry};
use crate::models::{InvocationDetails, SchemaKind, TOOL_NAME_MAX_LEN};

/// Drives the full pipeline for the configured schema sources and binds
/// one handler per generated tool.
pub struct SyncOrchestrator {
    sources: Vec<SchemaSource>,
    fetchers: FetcherSet,
    adapter: Arc<dyn McpServerAdapter>,
    router: Arc<InvokerRouter>,
    registry: Arc<ToolRegistry>,
}

impl SyncOrchestrator {
    pub fn new(
        sources: Vec<SchemaSource>,
        fetchers: FetcherSet,
        adapter: Arc<dyn McpServerAdapter>,
        router: Arc<InvokerRouter>,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            sources,
            fetchers,
            adapter,
            router,
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Sync every configured source in order. Failures never short-circuit:
    /// each failed source is recorded and the rest proceed.
    pub async fn sync_all(&self) -> Result<(), SyncError> {
        tracing::info!(count = self.sources.len(), "Starting sync for all schema sources");

        let mut failures = Vec::new();
        for source in &self.sources {
            if let Err(err) = self.sync_one(source).await {
                tracing::error!(source = %source.url, error = %err, "Failed to sync schema source");
                failures.push((source.url.clone(), err));
            }
        }

        if failures.is_empty() {
            tracing::info!("All schema sources synced");
            Ok(())
        } else {
            Err(SyncError { failures })
        }
    }

    /// Sync a single source: classify, fetch, generate, then register each
    /// tool with a handler capturing its invocation details.
    pub async fn sync_one(&self, source: &SchemaSource) -> Result<(), BridgeError> {
        let kind = SchemaKind::classify(source)?;
        tracing::info!(source = %source.url, kind = %kind, "Processing schema source");

        let raw = self.fetchers.for_kind(kind).fetch(source).await?;
        let pairs = generate::generate(&raw)?;
        tracing::info!(source = %source.url, count = pairs.len(), "Generated tools");

        let mut registered = 0usize;
        for (tool, details) in pairs {
            // Registration is best-effort per tool: a tool that cannot be
            // represented is dropped without failing the source.
            if let Err(reason) = validate_tool_name(&tool.name) {
                tracing::warn!(tool = %tool.name, reason = %reason, "Skipping tool");
                continue;
            }

            let details = Arc::new(details);
            self.registry.insert(tool.clone(), Arc::clone(&details));
            let handler = Arc::new(BoundTool {
                details,
                router: Arc::clone(&self.router),
            });
            self.adapter.add_tool(tool, handler);
            registered += 1;
        }

        tracing::info!(source = %source.url, registered, "Finished processing source");
        Ok(())
    }

    /// Sync one source by its identifier, reusing the configured entry when
    /// one matches so headers and server endpoints apply. Used by the admin
    /// trigger.
    pub async fn sync_one_by_url(&self, url: &str) -> Result<(), BridgeError> {
        let source = self
            .sources
            .iter()
            .find(|s| s.url == url)
            .cloned()
            .unwrap_or_else(|| SchemaSource::from_url(url));
        self.sync_one(&source).await
    }
}

fn validate_tool_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("empty tool name".to_string());
    }
    if name.len() > TOOL_NAME_MAX_LEN {
        return Err(format!("name exceeds {} characters", TOOL_NAME_MAX_LEN));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err("name contains characters outside [a-zA-Z0-9_-]".to_string());
    }
    Ok(())
}

/// Handler bound to one tool: immutable invocation details plus the shared
/// router.
struct BoundTool {
    details: Arc<InvocationDetails>,
    router: Arc<InvokerRouter>,
}

#[async_trait]
impl ToolHandler for BoundTool {
    async fn call(&self, args: Map<String, Value>) -> Result<String, BridgeError> {
        let result = self.router.invoke(&self.details, &args).await?;
        // MCP text content: strings pass through, structures are
        // stringified JSON.
        Ok(match result {
            Value::String(text) => text,
            other => serde_json::to_string(&other)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_tool_name() {
        assert!(validate_tool_name("store_getitem").is_ok());
        assert!(validate_tool_name("svc-say").is_ok());
        assert!(validate_tool_name("").is_err());
        assert!(validate_tool_name("has space").is_err());
        assert!(validate_tool_name(&"x".repeat(65)).is_err());
        assert!(validate_tool_name(&"x".repeat(64)).is_ok());
    }
}
