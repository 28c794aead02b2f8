//! Tool descriptors and calls for tool-tagged functions.

#![allow(missing_docs)]

use omni_expose::serde_json::{Map, Value, json};
use omni_expose::{
    Output, Registry, SchemaShape, ToolAdapter, ToolCallOutcome, ToolServer, declared_functions,
    expose,
};

/// Count words in a text.
///
/// # Arguments
///
/// * `text` - Text to count.
/// * `unique` - Count distinct words only.
#[expose(interfaces(tool, api), methods(POST), defaults(unique = false))]
fn word_count(text: String, unique: bool) -> Output {
    let mut words: Vec<&str> = text.split_whitespace().collect();
    if unique {
        words.sort_unstable();
        words.dedup();
    }
    Output::ok(words.len())
}

/// Read a file that never exists.
#[expose(interfaces(tool))]
fn read_missing(path: String) -> Result<Output, String> {
    Err(format!("{path}: not found"))
}

/// Command-line only.
#[expose(interfaces(cli))]
fn local() -> Output {
    Output::ok(1)
}

fn registry() -> std::sync::Arc<Registry> {
    let mut registry = Registry::new();
    for record in declared_functions().filter(|r| r.source_file == file!()) {
        registry.register(record.definition()).unwrap();
    }
    registry.into_shared()
}

fn arguments(value: Value) -> Option<Map<String, Value>> {
    value.as_object().cloned()
}

#[test]
fn descriptors_reuse_the_body_schema() {
    let registry = registry();
    let adapter = ToolAdapter::new(registry.clone());

    let names: Vec<String> = adapter.descriptors().into_iter().map(|d| d.name).collect();
    assert_eq!(names, vec!["read_missing", "word_count"]);

    let descriptor = adapter.descriptor("word_count").unwrap();
    assert_eq!(descriptor.description, "Count words in a text.");
    assert_eq!(
        descriptor.input_schema,
        registry
            .get("word_count")
            .unwrap()
            .schema(SchemaShape::Body)
            .to_json_schema()
    );
    assert!(adapter.descriptor("local").is_none());
}

#[test]
fn calls_complete_with_the_envelope() {
    let adapter = ToolAdapter::new(registry());
    let outcome = adapter.call(
        "word_count",
        arguments(json!({"text": "a b a", "unique": true})),
    );
    assert_eq!(outcome, ToolCallOutcome::Completed(Output::ok(2)));
    assert!(!outcome.is_error());

    let outcome = adapter.call("word_count", arguments(json!({"text": "a b a"})));
    assert_eq!(outcome.envelope(), Some(Output::ok(3)));
}

#[test]
fn recovered_failures_are_flagged() {
    let adapter = ToolAdapter::new(registry());
    let outcome = adapter.call("read_missing", arguments(json!({"path": "/nope"})));
    assert_eq!(
        outcome,
        ToolCallOutcome::Completed(Output::failure("/nope: not found"))
    );
    assert!(outcome.is_error());

    let result = outcome.into_call_result().unwrap();
    assert_eq!(result.is_error, Some(true));
    assert_eq!(
        result.structured_content,
        Some(json!({"result": null, "success": false, "message": "/nope: not found"}))
    );
}

#[test]
fn rejected_arguments_do_not_run() {
    let adapter = ToolAdapter::new(registry());
    let outcome = adapter.call("word_count", None);
    let ToolCallOutcome::Rejected(error) = &outcome else {
        panic!("expected rejection, got {outcome:?}");
    };
    assert_eq!(error.fields().collect::<Vec<_>>(), vec!["text"]);

    let envelope = outcome.envelope().unwrap();
    assert!(!envelope.success);
    assert_eq!(envelope.result["errors"][0]["kind"], json!("missing"));

    let outcome = adapter.call("word_count", arguments(json!({"text": 42})));
    assert!(matches!(outcome, ToolCallOutcome::Rejected(_)));
}

#[test]
fn unknown_tools_are_protocol_errors() {
    let adapter = ToolAdapter::new(registry());
    for name in ["nope", "local"] {
        let outcome = adapter.call(name, None);
        assert_eq!(outcome, ToolCallOutcome::UnknownTool(name.to_string()));
        assert!(outcome.envelope().is_none());
        let error = outcome.into_call_result().unwrap_err();
        assert!(error.message.contains(name));
    }
}

#[test]
fn successful_calls_carry_structured_content() {
    let adapter = ToolAdapter::new(registry());
    let result = adapter
        .call("word_count", arguments(json!({"text": "one"})))
        .into_call_result()
        .unwrap();
    assert_eq!(result.is_error, Some(false));
    assert_eq!(
        result.structured_content,
        Some(json!({"result": 1, "success": true, "message": null}))
    );
}

#[test]
fn server_publishes_one_tool_per_function() {
    let server = ToolServer::new(ToolAdapter::new(registry()));
    let tools = server.tools();
    assert_eq!(tools.len(), 2);
    let word_count = tools.iter().find(|t| t.name == "word_count").unwrap();
    assert_eq!(
        word_count.input_schema.get("additionalProperties"),
        Some(&json!(false))
    );
    assert_eq!(
        word_count.description.as_deref(),
        Some("Count words in a text.")
    );
    assert!(word_count.output_schema.is_some());
}
