//! HTTP server: API routes plus the tool endpoint on one listener.

use std::sync::Arc;

use anyhow::{Result, bail};
use axum::Router;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::adapters::{ApiAdapter, ToolAdapter, ToolServer, route_path};
use crate::registry::{InterfaceTag, Registry};

/// Build the application router.
///
/// When `tool_path` is set, the tool-protocol service (MCP streamable HTTP)
/// is nested there and stops when `shutdown` is cancelled.
///
/// # Errors
///
/// Fails when `tool_path` is not an absolute sub-path or collides with a
/// function route.
pub fn app(
    registry: Arc<Registry>,
    tool_path: Option<&str>,
    shutdown: &CancellationToken,
) -> Result<Router> {
    let router = ApiAdapter::new(Arc::clone(&registry)).router();
    let Some(path) = tool_path else {
        return Ok(router);
    };

    if !path.starts_with('/') || path == "/" {
        bail!("tool endpoint path must start with '/' and name a sub-path, got {path:?}");
    }
    if let Some(entry) = registry
        .for_interface(InterfaceTag::Api)
        .find(|entry| route_path(&entry.name) == path)
    {
        bail!(
            "tool endpoint path {path} collides with the route of function `{}`",
            entry.name
        );
    }

    let server = ToolServer::new(ToolAdapter::new(registry));
    let service: StreamableHttpService<ToolServer, LocalSessionManager> =
        StreamableHttpService::new(
            move || Ok(server.clone()),
            Arc::new(LocalSessionManager::default()),
            StreamableHttpServerConfig {
                stateful_mode: true,
                sse_keep_alive: None,
                cancellation_token: shutdown.child_token(),
                ..Default::default()
            },
        );
    Ok(router.nest_service(path, service))
}

/// Run the HTTP server; binds to `bind_addr` (e.g. `127.0.0.1:8080`).
/// Graceful shutdown on Ctrl+C (SIGINT) and SIGTERM (Unix); in-flight
/// requests complete before exit.
///
/// # Errors
///
/// Fails when the router cannot be built or the address cannot be bound.
pub async fn run_http(
    registry: Arc<Registry>,
    bind_addr: &str,
    tool_path: Option<&str>,
) -> Result<()> {
    let shutdown = CancellationToken::new();
    let functions = registry.for_interface(InterfaceTag::Api).count();
    let tools = registry.for_interface(InterfaceTag::Tool).count();
    let app = app(registry, tool_path, &shutdown)?;
    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!(
        "omni-expose listening on {} ({} api routes, tools: {}, Ctrl+C/SIGTERM to stop)",
        bind_addr,
        functions,
        tool_path.map_or_else(|| "disabled".to_string(), |p| format!("{tools} at {p}"))
    );

    let token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            token.cancel();
        })
        .await?;
    tracing::info!("omni-expose stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(error) => {
                tracing::warn!(error = %error, "failed to listen for SIGTERM; Ctrl+C only");
                wait_for_ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        wait_for_ctrl_c().await;
    }
}

async fn wait_for_ctrl_c() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %error, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
