use omni_expose::serde_json::{Value, json};
use omni_expose::{Output, expose};

/// Greet someone by name.
///
/// # Arguments
///
/// * `name` - Who to greet.
#[expose(methods(GET), interfaces(api, cli, tool), defaults(name = "World"))]
fn greet(name: String) -> Output {
    Output::ok(format!("Hello, {name}"))
}

/// Echo a JSON payload back, with optional tags.
///
/// # Arguments
///
/// * `payload` - Any JSON value.
/// * `tags` - Labels attached to the echo.
#[expose(
    methods(POST, PUT),
    interfaces(api, cli, tool),
    defaults(tags = [])
)]
fn echo_json(payload: Value, tags: Vec<String>) -> Output {
    let count = tags.len();
    Output::ok(json!({ "payload": payload, "tags": tags })).with_extra("tag_count", count)
}
