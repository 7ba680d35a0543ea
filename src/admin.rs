//! Admin HTTP endpoint: out-of-band sync trigger for a single source.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::BridgeError;
use crate::sync::SyncOrchestrator;

#[derive(Debug, Deserialize)]
struct SyncRequest {
    source: String,
}

pub fn router(orchestrator: Arc<SyncOrchestrator>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/tools", get(list_tools))
        .route("/sync", post(sync_one))
        .with_state(orchestrator)
}

/// Bind and serve the admin router until the process exits.
pub async fn serve(addr: &str, orchestrator: Arc<SyncOrchestrator>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Admin HTTP server listening");
    axum::serve(listener, router(orchestrator)).await
}

async fn healthz() -> &'static str {
    "ok"
}

async fn list_tools(State(orchestrator): State<Arc<SyncOrchestrator>>) -> impl IntoResponse {
    let tools = orchestrator.registry().list();
    tracing::debug!(count = tools.len(), "Listing tools");
    Json(tools)
}

async fn sync_one(
    State(orchestrator): State<Arc<SyncOrchestrator>>,
    Json(request): Json<SyncRequest>,
) -> impl IntoResponse {
    tracing::info!(source = %request.source, "Admin sync requested");
    match orchestrator.sync_one_by_url(&request.source).await {
        Ok(()) => (StatusCode::ACCEPTED, "accepted".to_string()),
        Err(err @ BridgeError::Config(_)) => (StatusCode::BAD_REQUEST, err.to_string()),
        Err(err) => (StatusCode::BAD_GATEWAY, err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::SocketAddr;
    use std::time::Duration;

    use serde_json::json;

    use crate::config::SchemaSource;
    use crate::fetch::FetcherSet;
    use crate::invoke::InvokerRouter;
    use crate::mcp::{McpServer, ToolRegistry};
    use crate::utils::HttpClient;

    const STORE_OPENAPI: &str = r#"
openapi: "3.0.0"
info:
  title: Store
servers:
  - url: https://api.example.com/v1
paths:
  /items/{id}:
    get:
      operationId: getItem
      responses: {}
"#;

    fn orchestrator_for(sources: Vec<SchemaSource>) -> Arc<SyncOrchestrator> {
        let http = HttpClient::new(Duration::from_secs(5)).unwrap();
        let server = Arc::new(McpServer::new());
        let registry = Arc::new(ToolRegistry::new());
        let router = Arc::new(InvokerRouter::with_client(http.clone(), Duration::from_secs(5)));
        Arc::new(SyncOrchestrator::new(
            sources,
            FetcherSet::new(http),
            server,
            router,
            registry,
        ))
    }

    async fn serve_admin(orchestrator: Arc<SyncOrchestrator>) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(orchestrator);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    async fn post_sync(addr: SocketAddr, source: &str) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("http://{}/sync", addr))
            .json(&json!({ "source": source }))
            .send()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_healthz() {
        let addr = serve_admin(orchestrator_for(Vec::new())).await;

        let response = reqwest::get(format!("http://{}/healthz", addr)).await.unwrap();
        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(response.text().await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_sync_accepted_and_tools_listed() {
        let dir = std::env::temp_dir().join("api-bridge-admin-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("store.yaml");
        std::fs::write(&path, STORE_OPENAPI).unwrap();
        let source_url = path.to_string_lossy().to_string();

        let orchestrator = orchestrator_for(vec![SchemaSource::from_url(source_url.clone())]);
        let addr = serve_admin(orchestrator).await;

        let response = post_sync(addr, &source_url).await;
        assert_eq!(response.status().as_u16(), 202);

        let response = reqwest::get(format!("http://{}/tools", addr)).await.unwrap();
        assert_eq!(response.status().as_u16(), 200);
        let tools: serde_json::Value = response.json().await.unwrap();
        let names: Vec<&str> = tools
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["store_getitem"]);
    }

    #[tokio::test]
    async fn test_tools_empty_before_any_sync() {
        let addr = serve_admin(orchestrator_for(Vec::new())).await;

        let response = reqwest::get(format!("http://{}/tools", addr)).await.unwrap();
        assert_eq!(response.status().as_u16(), 200);
        let tools: serde_json::Value = response.json().await.unwrap();
        assert!(tools.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sync_config_error_is_bad_request() {
        let addr = serve_admin(orchestrator_for(Vec::new())).await;

        // A .proto source with no configured server fails classification.
        let response = post_sync(addr, "https://example.com/svc.proto").await;
        assert_eq!(response.status().as_u16(), 400);
        assert!(response.text().await.unwrap().contains("server"));
    }

    #[tokio::test]
    async fn test_sync_fetch_error_is_bad_gateway() {
        let addr = serve_admin(orchestrator_for(Vec::new())).await;

        let response = post_sync(addr, "/nonexistent/admin-missing.json").await;
        assert_eq!(response.status().as_u16(), 502);
    }
}
