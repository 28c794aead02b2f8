//! Application router: API routes plus the nested tool endpoint.

#![allow(missing_docs)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use omni_expose::server::app;
use omni_expose::{Output, Registry, declared_functions, expose};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

/// Health probe.
#[expose(methods(GET), interfaces(api, tool))]
fn health() -> Output {
    Output::ok("ok")
}

/// Collides with the tool path when it is `/mcp`.
#[expose(methods(GET), interfaces(api))]
fn mcp() -> Output {
    Output::ok("shadowed")
}

fn registry(with_mcp: bool) -> Arc<Registry> {
    let mut registry = Registry::new();
    for record in declared_functions().filter(|r| r.source_file == file!()) {
        if record.name == "mcp" && !with_mcp {
            continue;
        }
        registry.register(record.definition()).unwrap();
    }
    registry.into_shared()
}

#[tokio::test]
async fn api_routes_are_served_next_to_the_tool_endpoint() {
    let shutdown = CancellationToken::new();
    let router = app(registry(false), Some("/mcp"), &shutdown).unwrap();
    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    shutdown.cancel();
}

#[tokio::test]
async fn tool_endpoint_can_be_left_out() {
    let shutdown = CancellationToken::new();
    let router = app(registry(false), None, &shutdown).unwrap();
    let response = router
        .oneshot(Request::builder().uri("/mcp").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[test]
fn tool_path_must_not_shadow_a_route() {
    let shutdown = CancellationToken::new();
    let err = app(registry(true), Some("/mcp"), &shutdown).unwrap_err();
    assert!(err.to_string().contains("`mcp`"), "{err}");
}

#[test]
fn tool_path_must_be_a_sub_path() {
    let shutdown = CancellationToken::new();
    for path in ["mcp", "/"] {
        assert!(app(registry(false), Some(path), &shutdown).is_err(), "{path}");
    }
}
