//! Registry lifecycle and registration-time rejection.

#![allow(missing_docs)]

use omni_expose::serde_json::json;
use omni_expose::{
    DeclaredParam, FunctionDef, InterfaceTag, Kwargs, Output, OutputShape, RegistrationError,
    Registry, RegistryState, TransportMethod,
};

fn echo(name: &str) -> FunctionDef {
    FunctionDef::new(name, |mut kwargs: Kwargs| {
        let text: String = kwargs.take("text")?;
        Ok(Output::ok(text))
    })
    .doc("Echo the text back.\n\n# Arguments\n\n* `text` - What to echo.")
    .params([DeclaredParam::new("text", "String")])
    .returns::<Output>()
    .methods([TransportMethod::Get])
    .interfaces([InterfaceTag::Api, InterfaceTag::Cli])
}

#[test]
fn lifecycle_moves_from_empty_to_frozen() {
    let mut registry = Registry::new();
    assert_eq!(registry.state(), RegistryState::Empty);

    registry.register(echo("echo")).unwrap();
    assert_eq!(registry.state(), RegistryState::Populating);

    registry.freeze();
    assert_eq!(registry.state(), RegistryState::Frozen);
    let err = registry.register(echo("late")).unwrap_err();
    assert_eq!(err, RegistrationError::Frozen("late".into()));
    assert_eq!(registry.len(), 1);
}

#[test]
fn into_shared_freezes() {
    let mut registry = Registry::new();
    registry.register(echo("echo")).unwrap();
    let shared = registry.into_shared();
    assert!(shared.is_frozen());
    assert!(shared.contains("echo"));
}

#[test]
fn duplicate_name_keeps_the_first_entry() {
    let mut registry = Registry::new();
    registry.register(echo("echo")).unwrap();

    let second = FunctionDef::new("echo", |_kwargs: Kwargs| Ok(Output::ok("second")))
        .returns::<Output>()
        .interfaces([InterfaceTag::Cli]);
    let err = registry.register(second).unwrap_err();

    assert_eq!(err, RegistrationError::Duplicate("echo".into()));
    assert_eq!(registry.len(), 1);
    let entry = registry.get("echo").unwrap();
    assert_eq!(entry.description, "Echo the text back.");
    assert!(entry.exposes(InterfaceTag::Api));
}

#[test]
fn missing_output_type_is_rejected() {
    let def = FunctionDef::new("noop", |_kwargs: Kwargs| Ok(Output::ok(0)))
        .interfaces([InterfaceTag::Cli]);
    let err = Registry::new().register(def).unwrap_err();
    assert_eq!(err, RegistrationError::MissingOutputType("noop".into()));
}

#[test]
fn non_conforming_output_type_is_rejected() {
    let def = FunctionDef::new("plain", |_kwargs: Kwargs| Ok(Output::ok(0)))
        .output(Some(OutputShape::new("Plain", ["result", "ok"])))
        .interfaces([InterfaceTag::Cli]);
    let err = Registry::new().register(def).unwrap_err();
    assert_eq!(
        err,
        RegistrationError::InvalidOutputType {
            name: "plain".into(),
            type_name: "Plain".into(),
            missing: vec!["success".into(), "message".into()],
        }
    );
}

#[test]
fn structural_extensions_are_accepted() {
    let def = FunctionDef::new("report", |_kwargs: Kwargs| Ok(Output::ok(0)))
        .output(Some(OutputShape::extending("Report", ["files_checked"])))
        .interfaces([InterfaceTag::Tool]);
    let mut registry = Registry::new();
    let entry = registry.register(def).unwrap();
    assert_eq!(
        entry.output.extension_fields().collect::<Vec<_>>(),
        vec!["files_checked"]
    );
}

#[test]
fn invalid_names_are_rejected() {
    let err = Registry::new().register(echo("check-docs")).unwrap_err();
    assert_eq!(err, RegistrationError::InvalidName("check-docs".into()));
}

#[test]
fn api_tag_requires_methods() {
    let def = FunctionDef::new("status", |_kwargs: Kwargs| Ok(Output::ok("up")))
        .returns::<Output>()
        .interfaces([InterfaceTag::Api]);
    let err = Registry::new().register(def).unwrap_err();
    assert!(matches!(err, RegistrationError::InvalidDeclaration { .. }));
}

#[test]
fn interface_tags_are_required() {
    let def = FunctionDef::new("hidden", |_kwargs: Kwargs| Ok(Output::ok(1))).returns::<Output>();
    let err = Registry::new().register(def).unwrap_err();
    assert!(matches!(err, RegistrationError::InvalidDeclaration { .. }));
}

#[test]
fn inconsistent_parameters_are_rejected() {
    let cases = [
        echo("dup").params([DeclaredParam::new("text", "String")]),
        echo("bad_default").params([DeclaredParam::new("count", "i64").default(json!("three"))]),
        echo("bad_choice_default").params([DeclaredParam::new("mode", "String")
            .choices([json!("fast"), json!("slow")])
            .default(json!("medium"))]),
        echo("empty_choices")
            .params([DeclaredParam::new("mode", "String").choices(Vec::new())]),
        echo("null_default").params([DeclaredParam::new("count", "i64").default(json!(null))]),
    ];
    for def in cases {
        let name = def.name().to_string();
        let err = Registry::new().register(def).unwrap_err();
        assert!(
            matches!(
                err,
                RegistrationError::InvalidParameter { ref function, .. } if *function == name
            ),
            "{name}: {err}"
        );
    }
}

#[test]
fn parameters_that_cannot_become_flags_are_rejected() {
    let reserved = echo("topic").params([DeclaredParam::new("help", "String")]);
    let err = Registry::new().register(reserved).unwrap_err();
    assert!(err.to_string().contains("`--help` is reserved"), "{err}");

    let clashing = echo("walk").params([
        DeclaredParam::new("maxDepth", "u32"),
        DeclaredParam::new("maxdepth", "u32"),
    ]);
    let err = Registry::new().register(clashing).unwrap_err();
    assert_eq!(
        err,
        RegistrationError::InvalidParameter {
            function: "walk".into(),
            param: "maxdepth".into(),
            reason: "flag `--maxdepth` is already used by `maxDepth`".into(),
        }
    );
}

#[test]
fn flag_rules_only_apply_to_cli_functions() {
    let def = FunctionDef::new("topic", |mut kwargs: Kwargs| {
        let help: String = kwargs.take("help")?;
        Ok(Output::ok(help))
    })
    .params([DeclaredParam::new("help", "String")])
    .returns::<Output>()
    .methods([TransportMethod::Get])
    .interfaces([InterfaceTag::Api, InterfaceTag::Tool]);
    assert!(Registry::new().register(def).is_ok());
}

#[test]
fn queries_filter_by_interface_in_name_order() {
    let mut registry = Registry::new();
    registry.register(echo("zeta")).unwrap();
    registry.register(echo("alpha")).unwrap();
    let tool_only = FunctionDef::new("beta", |_kwargs: Kwargs| Ok(Output::ok(1)))
        .returns::<Output>()
        .interfaces([InterfaceTag::Tool]);
    registry.register(tool_only).unwrap();

    assert_eq!(registry.names().collect::<Vec<_>>(), vec!["alpha", "beta", "zeta"]);
    let api: Vec<_> = registry
        .for_interface(InterfaceTag::Api)
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(api, vec!["alpha", "zeta"]);
    assert_eq!(registry.for_interface(InterfaceTag::Tool).count(), 1);
}
