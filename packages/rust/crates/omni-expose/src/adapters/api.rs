//! HTTP API adapter: one route `/<name>` per api-tagged function.
//!
//! `GET`/`DELETE` read the query string, `POST`/`PUT` a JSON body. Status
//! policy: 200 for every envelope the function produced (recovered failures
//! included), 422 for rejected input, 405 for undeclared methods, 500 only
//! when the blocking task cannot be joined.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, MethodRouter, get};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Value, json};

use crate::contract::OutputEnvelope;
use crate::errors::ValidationError;
use crate::invoke::invoke;
use crate::registry::{InterfaceTag, Registry, TransportMethod};
use crate::schema::{RawInput, SchemaShape};

/// One bound route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteBinding {
    /// URL path, `/<name>`.
    pub path: String,
    /// Function name.
    pub function: String,
    /// Accepted methods.
    pub methods: Vec<TransportMethod>,
}

/// Builds the axum router for api-tagged entries.
#[derive(Debug, Clone)]
pub struct ApiAdapter {
    registry: Arc<Registry>,
}

#[derive(Clone)]
struct Endpoint {
    registry: Arc<Registry>,
    function: Arc<str>,
}

impl ApiAdapter {
    /// Adapter over a frozen registry.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Route table.
    #[must_use]
    pub fn routes(&self) -> Vec<RouteBinding> {
        self.registry
            .for_interface(InterfaceTag::Api)
            .map(|entry| RouteBinding {
                path: route_path(&entry.name),
                function: entry.name.clone(),
                methods: entry.methods.iter().copied().collect(),
            })
            .collect()
    }

    /// Router with one route per function plus the `GET /` index.
    pub fn router(&self) -> Router {
        let mut router =
            Router::new().route("/", get(handle_index).with_state(Arc::clone(&self.registry)));

        for entry in self.registry.for_interface(InterfaceTag::Api) {
            let endpoint = Endpoint {
                registry: Arc::clone(&self.registry),
                function: Arc::from(entry.name.as_str()),
            };
            let mut methods: MethodRouter<Endpoint> = MethodRouter::new();
            for method in &entry.methods {
                let filter = method_filter(*method);
                methods = match method.shape() {
                    SchemaShape::Query => methods.on(filter, handle_query),
                    SchemaShape::Body => methods.on(filter, handle_body),
                };
            }
            tracing::debug!(function = %entry.name, methods = ?entry.methods, "bound api route");
            router = router.route(&route_path(&entry.name), methods.with_state(endpoint));
        }
        router
    }
}

/// Path of a function's route.
#[must_use]
pub fn route_path(name: &str) -> String {
    format!("/{name}")
}

fn method_filter(method: TransportMethod) -> MethodFilter {
    match method {
        TransportMethod::Get => MethodFilter::GET,
        TransportMethod::Post => MethodFilter::POST,
        TransportMethod::Put => MethodFilter::PUT,
        TransportMethod::Delete => MethodFilter::DELETE,
    }
}

async fn handle_query(
    State(endpoint): State<Endpoint>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Response {
    match query {
        Ok(Query(pairs)) => dispatch(endpoint, RawInput::Query(pairs)).await,
        Err(rejection) => validation_response(&ValidationError::malformed(
            &*endpoint.function,
            rejection.body_text(),
        )),
    }
}

async fn handle_body(State(endpoint): State<Endpoint>, body: Bytes) -> Response {
    if body.iter().all(u8::is_ascii_whitespace) {
        return dispatch(endpoint, RawInput::Body(Value::Null)).await;
    }
    match serde_json::from_slice::<Value>(&body) {
        Ok(value) => dispatch(endpoint, RawInput::Body(value)).await,
        Err(error) => validation_response(&ValidationError::malformed(
            &*endpoint.function,
            format!("body is not valid JSON: {error}"),
        )),
    }
}

async fn dispatch(endpoint: Endpoint, input: RawInput) -> Response {
    let Endpoint { registry, function } = endpoint;
    let task_function = Arc::clone(&function);
    let joined = tokio::task::spawn_blocking(move || {
        registry
            .get(&task_function)
            .map(|entry| invoke(entry, &input))
    })
    .await;

    match joined {
        Ok(Some(Ok(envelope))) => (StatusCode::OK, Json(envelope)).into_response(),
        Ok(Some(Err(validation))) => validation_response(&validation),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(OutputEnvelope::failure(format!("unknown function: {function}"))),
        )
            .into_response(),
        Err(error) => {
            tracing::error!(function = %function, error = %error, "api task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(OutputEnvelope::failure("internal error")),
            )
                .into_response()
        }
    }
}

fn validation_response(error: &ValidationError) -> Response {
    tracing::debug!(function = %error.function, "api input rejected");
    (StatusCode::UNPROCESSABLE_ENTITY, Json(error.to_envelope())).into_response()
}

async fn handle_index(State(registry): State<Arc<Registry>>) -> Json<Value> {
    let functions: Vec<Value> = registry
        .for_interface(InterfaceTag::Api)
        .map(|entry| {
            let mut record = json!({
                "name": entry.name,
                "path": route_path(&entry.name),
                "methods": entry.methods,
                "description": entry.description,
                "params": entry.params,
            });
            let shapes: Vec<SchemaShape> = entry.methods.iter().map(|m| m.shape()).collect();
            if shapes.contains(&SchemaShape::Query) {
                record["query_schema"] = entry.schema(SchemaShape::Query).to_json_schema();
            }
            if shapes.contains(&SchemaShape::Body) {
                record["body_schema"] = entry.schema(SchemaShape::Body).to_json_schema();
            }
            record
        })
        .collect();
    Json(json!({
        "functions": functions,
        "output_schema": schemars::schema_for!(OutputEnvelope),
    }))
}
