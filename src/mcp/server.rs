//! Minimal MCP host over stdio.
//!
//! Implements just enough JSON-RPC (initialize, tools/list, tools/call) to
//! serve the registered tools to an MCP client. Transport framing beyond
//! this shim is a job for a full MCP server library; the core only ever
//! talks to the [`McpServerAdapter`] trait.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::models::Tool;

use super::rpc::{self, RpcRequest, RpcResponse};
use super::{McpServerAdapter, ToolHandler};

const PROTOCOL_VERSION: &str = "2024-11-05";

struct BoundEntry {
    tool: Tool,
    handler: Arc<dyn ToolHandler>,
}

/// The in-process MCP server: tools registered through the adapter trait,
/// served over a line-delimited JSON-RPC stdio loop.
///
/// The tool map is only ever wholly inserted into, so a poisoned lock is
/// recovered rather than propagated.
#[derive(Default)]
pub struct McpServer {
    tools: RwLock<HashMap<String, BoundEntry>>,
}

impl McpServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tool_count(&self) -> usize {
        self.tools.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// The `tools/list` payload, sorted by name for stable output.
    pub fn tools_value(&self) -> Value {
        let tools = self.tools.read().unwrap_or_else(|e| e.into_inner());
        let mut list: Vec<&BoundEntry> = tools.values().collect();
        list.sort_by(|a, b| a.tool.name.cmp(&b.tool.name));
        let rendered: Vec<Value> = list
            .iter()
            .map(|entry| serde_json::to_value(&entry.tool).unwrap_or(Value::Null))
            .collect();
        json!({ "tools": rendered })
    }

    pub async fn handle_request(&self, request: RpcRequest) -> Option<RpcResponse> {
        if request.is_notification() {
            tracing::debug!(method = %request.method, "Ignoring notification");
            return None;
        }

        let response = match request.method.as_str() {
            "initialize" => rpc::ok(
                request.id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            ),
            "ping" => rpc::ok(request.id, json!({})),
            "tools/list" => rpc::ok(request.id, self.tools_value()),
            "tools/call" => self.handle_tool_call(request.id, &request.params).await,
            other => rpc::err(
                request.id,
                rpc::METHOD_NOT_FOUND,
                format!("method '{}' not supported", other),
            ),
        };
        Some(response)
    }

    async fn handle_tool_call(&self, id: Value, params: &Value) -> RpcResponse {
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return rpc::err(id, rpc::INVALID_PARAMS, "missing tool name");
        };
        let arguments: Map<String, Value> = params
            .get("arguments")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let handler = {
            let tools = self.tools.read().unwrap_or_else(|e| e.into_inner());
            match tools.get(name) {
                Some(entry) => Arc::clone(&entry.handler),
                None => {
                    return rpc::err(
                        id,
                        rpc::INVALID_PARAMS,
                        format!("tool '{}' not found", name),
                    );
                }
            }
        };

        tracing::info!(tool = %name, "Executing tool call");
        match handler.call(arguments).await {
            Ok(text) => rpc::ok(
                id,
                json!({
                    "content": [{ "type": "text", "text": text }],
                    "isError": false,
                }),
            ),
            Err(err) => {
                tracing::warn!(tool = %name, error = %err, "Tool call failed");
                rpc::err(id, rpc::INTERNAL_ERROR, err.to_string())
            }
        }
    }

    /// Serve JSON-RPC over stdin/stdout until EOF.
    pub async fn run_stdio(&self) -> std::io::Result<()> {
        tracing::info!(tools = self.tool_count(), "MCP server running on stdio");

        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut lines = BufReader::new(stdin).lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let response = match serde_json::from_str::<RpcRequest>(&line) {
                Ok(request) => self.handle_request(request).await,
                Err(err) => Some(rpc::err(
                    Value::Null,
                    rpc::PARSE_ERROR,
                    format!("invalid JSON-RPC request: {}", err),
                )),
            };
            if let Some(response) = response {
                let mut payload = serde_json::to_vec(&response)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
                payload.push(b'\n');
                stdout.write_all(&payload).await?;
                stdout.flush().await?;
            }
        }

        tracing::info!("stdin closed, shutting down");
        Ok(())
    }
}

impl McpServerAdapter for McpServer {
    fn add_tool(&self, tool: Tool, handler: Arc<dyn ToolHandler>) {
        let mut tools = self.tools.write().unwrap_or_else(|e| e.into_inner());
        tracing::debug!(tool = %tool.name, "Registered tool");
        tools.insert(tool.name.clone(), BoundEntry { tool, handler });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use crate::models::JsonSchema;
    use async_trait::async_trait;

    struct EchoHandler;

    #[async_trait]
    impl ToolHandler for EchoHandler {
        async fn call(&self, args: Map<String, Value>) -> Result<String, BridgeError> {
            Ok(Value::Object(args).to_string())
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl ToolHandler for FailingHandler {
        async fn call(&self, _args: Map<String, Value>) -> Result<String, BridgeError> {
            Err(BridgeError::upstream_http(500, "boom"))
        }
    }

    fn tool(name: &str) -> Tool {
        Tool {
            name: name.to_string(),
            description: "test tool".to_string(),
            input_schema: JsonSchema::empty_object(),
            output_schema: None,
        }
    }

    fn request(method: &str, params: Value) -> RpcRequest {
        serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_initialize_and_list() {
        let server = McpServer::new();
        server.add_tool(tool("echo"), Arc::new(EchoHandler));

        let resp = server
            .handle_request(request("initialize", json!({})))
            .await
            .unwrap();
        assert!(resp.result.unwrap()["serverInfo"]["name"]
            .as_str()
            .unwrap()
            .contains("api-bridge"));

        let resp = server
            .handle_request(request("tools/list", json!({})))
            .await
            .unwrap();
        let tools = resp.result.unwrap();
        assert_eq!(tools["tools"][0]["name"], "echo");
        assert!(tools["tools"][0].get("inputSchema").is_some());
    }

    #[tokio::test]
    async fn test_tool_call_round_trip() {
        let server = McpServer::new();
        server.add_tool(tool("echo"), Arc::new(EchoHandler));

        let resp = server
            .handle_request(request(
                "tools/call",
                json!({"name": "echo", "arguments": {"x": 1}}),
            ))
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["content"][0]["type"], "text");
        assert!(result["content"][0]["text"].as_str().unwrap().contains("\"x\":1"));
    }

    #[tokio::test]
    async fn test_tool_call_failure_propagates() {
        let server = McpServer::new();
        server.add_tool(tool("broken"), Arc::new(FailingHandler));

        let resp = server
            .handle_request(request("tools/call", json!({"name": "broken", "arguments": {}})))
            .await
            .unwrap();
        let error = resp.error.unwrap();
        assert!(error.message.contains("500"));
    }

    #[tokio::test]
    async fn test_unknown_tool_and_method() {
        let server = McpServer::new();

        let resp = server
            .handle_request(request("tools/call", json!({"name": "ghost"})))
            .await
            .unwrap();
        assert!(resp.error.unwrap().message.contains("not found"));

        let resp = server
            .handle_request(request("resources/list", json!({})))
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, rpc::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let server = McpServer::new();
        let note: RpcRequest =
            serde_json::from_value(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
                .unwrap();
        assert!(server.handle_request(note).await.is_none());
    }
}
