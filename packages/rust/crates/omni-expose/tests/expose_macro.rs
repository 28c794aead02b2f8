//! `#[expose]` declarations, introspected through the registry.

#![allow(missing_docs)]

use std::collections::BTreeMap;

use omni_expose::serde_json::{Value, json};
use omni_expose::{
    ExecutionError, FunctionDef, InterfaceTag, Kwargs, Output, OutputContract, OutputEnvelope,
    OutputShape, ParamKind, Registry, TransportMethod, declared_functions, expose,
};
use serde::Serialize;

/// Count tokens in a piece of text.
///
/// Longer description that is not part of the summary.
///
/// # Arguments
///
/// * `text` - Text to count.
/// * `model` - Tokenizer model.
///   Only the listed models are supported.
/// * `limit` - Stop counting after this many tokens.
#[expose(
    name = "count_tokens",
    methods(GET, POST),
    interfaces(api, cli, tool),
    defaults(model = "cl100k"),
    choices(model = ["cl100k", "o200k"])
)]
fn tokens(text: String, model: String, limit: Option<u32>) -> Output {
    let count = text.split_whitespace().count();
    let count = limit.map_or(count, |l| count.min(l as usize));
    Output::ok_with_message(count, format!("model {model}"))
}

/// Summarise a batch of records.
#[expose(methods(POST), interfaces(api, tool))]
fn summarise(
    records: Vec<BTreeMap<String, Value>>,
    options: Value,
    ratio: f64,
    strict: bool,
) -> Result<Output, String> {
    if strict && records.is_empty() {
        return Err("no records".to_string());
    }
    Ok(Output::ok(json!({ "count": records.len(), "ratio": ratio, "options": options })))
}

#[derive(Serialize)]
struct DocCheck {
    result: Vec<String>,
    success: bool,
    message: Option<String>,
    files_checked: usize,
}

impl OutputContract for DocCheck {
    fn shape() -> OutputShape {
        OutputShape::extending("DocCheck", ["files_checked"])
    }

    fn into_outcome(self) -> Result<OutputEnvelope, ExecutionError> {
        OutputEnvelope::from_serializable(&self)
    }
}

/// Check documentation freshness.
#[expose(interfaces(cli))]
fn check_docs(max_age_days: u16) -> DocCheck {
    DocCheck {
        result: vec![],
        success: true,
        message: Some(format!("nothing older than {max_age_days} days")),
        files_checked: 3,
    }
}

fn definition(name: &str) -> FunctionDef {
    declared_functions()
        .find(|record| record.name == name)
        .unwrap_or_else(|| panic!("{name} is not declared"))
        .definition()
}

fn registry() -> Registry {
    let mut registry = Registry::new();
    for name in ["count_tokens", "summarise", "check_docs"] {
        registry.register(definition(name)).unwrap();
    }
    registry
}

#[test]
fn records_carry_source_location() {
    let record = declared_functions()
        .find(|record| record.name == "count_tokens")
        .unwrap();
    assert_eq!(record.ident, "tokens");
    assert!(record.source_file.ends_with("expose_macro.rs"));
    assert!(record.module_path.ends_with("expose_macro"));
}

#[test]
fn parameters_are_introspected() {
    let registry = registry();
    let entry = registry.get("count_tokens").unwrap();

    assert_eq!(entry.description, "Count tokens in a piece of text.");
    assert_eq!(
        entry.methods.iter().copied().collect::<Vec<_>>(),
        vec![TransportMethod::Get, TransportMethod::Post]
    );
    assert!(InterfaceTag::ALL.iter().all(|tag| entry.exposes(*tag)));

    let text = entry.param("text").unwrap();
    assert_eq!(text.kind, ParamKind::String);
    assert!(text.required);
    assert_eq!(text.description, "Text to count.");

    let model = entry.param("model").unwrap();
    assert_eq!(model.kind, ParamKind::Choice(vec![json!("cl100k"), json!("o200k")]));
    assert!(!model.required);
    assert_eq!(model.default, Some(json!("cl100k")));
    assert_eq!(
        model.description,
        "Tokenizer model. Only the listed models are supported."
    );

    let limit = entry.param("limit").unwrap();
    assert_eq!(limit.kind, ParamKind::Int);
    assert!(!limit.required);
    assert_eq!(limit.default, Some(Value::Null));
}

#[test]
fn structured_parameters_are_complex() {
    let registry = registry();
    let entry = registry.get("summarise").unwrap();
    assert_eq!(
        entry.param("records").unwrap().kind,
        ParamKind::Complex(json!({"type": "array", "items": {"type": "object"}}))
    );
    assert_eq!(entry.param("options").unwrap().kind, ParamKind::Complex(json!({})));
    assert_eq!(entry.param("ratio").unwrap().kind, ParamKind::Float);
    assert_eq!(entry.param("strict").unwrap().kind, ParamKind::Bool);
    assert_eq!(
        entry.param("strict").unwrap().description,
        "Parameter: strict"
    );
}

#[test]
fn handlers_call_the_function_unchanged() {
    let registry = registry();
    let entry = registry.get("count_tokens").unwrap();
    let mut kwargs = Kwargs::new();
    kwargs.insert("text", json!("one two three"));
    kwargs.insert("model", json!("o200k"));
    kwargs.insert("limit", json!(2));
    let envelope = entry.call(kwargs).unwrap();
    assert_eq!(envelope, Output::ok_with_message(2, "model o200k"));
    assert_eq!(tokens("a b".into(), "x".into(), None).result, json!(2));
}

#[test]
fn custom_output_types_extend_the_envelope() {
    let registry = registry();
    let entry = registry.get("check_docs").unwrap();
    assert_eq!(entry.output.type_name, "DocCheck");

    let mut kwargs = Kwargs::new();
    kwargs.insert("max_age_days", json!(30));
    let envelope = entry.call(kwargs).unwrap();
    assert_eq!(
        omni_expose::serde_json::to_value(&envelope).unwrap(),
        json!({
            "result": [],
            "success": true,
            "message": "nothing older than 30 days",
            "files_checked": 3,
        })
    );
}

#[test]
fn result_returns_report_the_error_text() {
    let registry = registry();
    let entry = registry.get("summarise").unwrap();
    assert!(entry.output.satisfies_contract());

    let mut kwargs = Kwargs::new();
    kwargs.insert("records", json!([]));
    kwargs.insert("options", json!(null));
    kwargs.insert("ratio", json!(0.5));
    kwargs.insert("strict", json!(true));
    let err = entry.call(kwargs).unwrap_err();
    assert_eq!(err.to_string(), "no records");
}
