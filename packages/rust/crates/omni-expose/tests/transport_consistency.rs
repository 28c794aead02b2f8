//! One function reached over HTTP, the command line and the tool endpoint.

#![allow(missing_docs)]

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use omni_expose::serde_json::{Value, json};
use omni_expose::{
    ApiAdapter, CliAdapter, Output, Registry, ToolAdapter, ToolCallOutcome, declared_functions,
    expose,
};
use tower::ServiceExt;

/// Crop an image to a box.
///
/// # Arguments
///
/// * `width` - Box width in pixels.
/// * `height` - Box height in pixels.
#[expose(methods(GET, POST), interfaces(api, cli, tool))]
fn crop(width: u32, height: u32) -> Output {
    Output::ok(json!({"area": u64::from(width) * u64::from(height)}))
}

/// Panics on every call.
#[expose(methods(GET), interfaces(api))]
fn crash() -> Output {
    panic!("decoder state corrupted")
}

fn registry() -> Arc<Registry> {
    let mut registry = Registry::new();
    for record in declared_functions().filter(|r| r.source_file == file!()) {
        registry.register(record.definition()).unwrap();
    }
    registry.into_shared()
}

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            request = request.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = router
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, omni_expose::serde_json::from_slice(&bytes).unwrap())
}

fn field_kinds(envelope: &Value) -> Vec<(String, String)> {
    envelope["result"]["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| {
            (
                e["field"].as_str().unwrap().to_string(),
                e["kind"].as_str().unwrap().to_string(),
            )
        })
        .collect()
}

#[tokio::test]
async fn malformed_input_is_rejected_alike_on_every_transport() {
    let registry = registry();
    let router = ApiAdapter::new(Arc::clone(&registry)).router();
    let expected = vec![
        ("width".to_string(), "wrong_type".to_string()),
        ("height".to_string(), "wrong_type".to_string()),
    ];

    let (status, query) = send(&router, Method::GET, "/crop?width=wide&height=tall", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(field_kinds(&query), expected);

    let arguments = json!({"width": "wide", "height": "tall"});
    let (status, body) = send(&router, Method::POST, "/crop", Some(arguments.clone())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(field_kinds(&body), expected);

    let outcome =
        ToolAdapter::new(Arc::clone(&registry)).call("crop", arguments.as_object().cloned());
    assert!(matches!(outcome, ToolCallOutcome::Rejected(_)));
    let tool = omni_expose::serde_json::to_value(outcome.envelope().unwrap()).unwrap();
    assert_eq!(field_kinds(&tool), expected);
    assert_eq!(tool, body);

    let mut out = Vec::new();
    let mut err = Vec::new();
    let code = CliAdapter::new(registry).run(
        ["omni-expose", "crop", "--width", "wide", "--height", "tall"],
        &mut out,
        &mut err,
    );
    assert_eq!(code, 1);
    assert!(out.is_empty());
    let err = String::from_utf8(err).unwrap();
    let first_line = err.lines().next().unwrap();
    assert_eq!(first_line, format!("error: {}", query["message"].as_str().unwrap()));
}

#[tokio::test]
async fn a_panicking_route_does_not_take_the_server_down() {
    let router = ApiAdapter::new(registry()).router();

    let (status, body) = send(&router, Method::GET, "/crash", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"result": null, "success": false, "message": "decoder state corrupted"})
    );

    let (status, body) = send(&router, Method::GET, "/crop?width=3&height=4", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], json!({"area": 12}));

    let (status, _) = send(&router, Method::GET, "/crash", None).await;
    assert_eq!(status, StatusCode::OK);
}
