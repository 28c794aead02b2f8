//! Signature introspection: declared parameters and rustdoc to [`ParameterSpec`]s.
//!
//! Runs once per function, at registration. Adapters never look at Rust
//! types; they branch on the [`ParamKind`] assigned here.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::{Value, json};

use crate::adapters::cli::flag_name;
use crate::contract::OutputShape;
use crate::errors::RegistrationError;
use crate::registry::{DeclaredParam, FunctionDef, InterfaceTag};

/// How a parameter is validated and advertised.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ParamKind {
    /// Text.
    String,
    /// Integer.
    Int,
    /// Floating point number.
    Float,
    /// Boolean.
    Bool,
    /// One of a fixed set of JSON values.
    Choice(Vec<Value>),
    /// Structured value passed through as JSON; carries a JSON Schema hint.
    Complex(Value),
}

impl ParamKind {
    /// Kind for a Rust type as written in the signature. The flag is `true`
    /// when the type is `Option<T>`.
    #[must_use]
    pub fn from_type_text(type_text: &str) -> (Self, bool) {
        let compact: String = type_text.chars().filter(|c| !c.is_whitespace()).collect();
        match split_generic(&compact) {
            ("Option", Some(inner)) => (classify(inner), true),
            _ => (classify(&compact), false),
        }
    }

    /// Label used in error messages and CLI value names.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "integer",
            Self::Float => "number",
            Self::Bool => "boolean",
            Self::Choice(_) => "choice",
            Self::Complex(_) => "json",
        }
    }

    /// JSON Schema of a value of this kind in a JSON body.
    #[must_use]
    pub fn json_schema(&self) -> Value {
        match self {
            Self::String => json!({"type": "string"}),
            Self::Int => json!({"type": "integer"}),
            Self::Float => json!({"type": "number"}),
            Self::Bool => json!({"type": "boolean"}),
            Self::Choice(values) => json!({"enum": values}),
            Self::Complex(hint) => hint.clone(),
        }
    }

    /// Whether a JSON value already has this kind's type.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Int => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::Bool => value.is_boolean(),
            Self::Choice(values) => values.contains(value),
            Self::Complex(hint) => match hint.get("type").and_then(Value::as_str) {
                Some("array") => value.is_array(),
                Some("object") => value.is_object(),
                _ => true,
            },
        }
    }
}

/// Split `Path<Args>` into the last path segment and the generic arguments.
fn split_generic(ty: &str) -> (&str, Option<&str>) {
    let (path, args) = match ty.find('<') {
        Some(open) if ty.ends_with('>') => (&ty[..open], Some(&ty[open + 1..ty.len() - 1])),
        _ => (ty, None),
    };
    let segment = path.rsplit("::").next().unwrap_or(path);
    (segment, args)
}

fn classify(ty: &str) -> ParamKind {
    if let Some(inner) = ty.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        let item = inner.split(';').next().unwrap_or(inner);
        return array_of(item);
    }
    if ty.starts_with('(') {
        return ParamKind::Complex(json!({"type": "array"}));
    }
    match split_generic(ty) {
        ("String" | "char" | "PathBuf", None) => ParamKind::String,
        (
            "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
            | "u128" | "usize",
            None,
        ) => ParamKind::Int,
        ("f32" | "f64", None) => ParamKind::Float,
        ("bool", None) => ParamKind::Bool,
        ("Box", Some(inner)) => classify(inner),
        ("Vec" | "VecDeque" | "HashSet" | "BTreeSet", Some(inner)) => array_of(inner),
        ("HashMap" | "BTreeMap" | "Map", _) => ParamKind::Complex(json!({"type": "object"})),
        _ => ParamKind::Complex(json!({})),
    }
}

fn array_of(item: &str) -> ParamKind {
    let items = classify(item).json_schema();
    ParamKind::Complex(json!({"type": "array", "items": items}))
}

/// Metadata for one parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSpec {
    /// Parameter name.
    pub name: String,
    /// Kind assigned at registration.
    #[serde(rename = "type")]
    pub kind: ParamKind,
    /// Default used when the caller omits the parameter.
    pub default: Option<Value>,
    /// `true` iff no default exists.
    pub required: bool,
    /// Text from the `# Arguments` section of the rustdoc.
    pub description: String,
    /// Declared allowed values.
    pub choices: Option<Vec<Value>>,
    /// Rust type as written.
    #[serde(skip)]
    pub type_text: String,
}

/// Summary and per-parameter descriptions from rustdoc text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RustDoc {
    /// First paragraph, joined into one line.
    pub summary: String,
    /// Descriptions from the `# Arguments` section.
    pub params: HashMap<String, String>,
}

/// Parse rustdoc text.
///
/// Parameter descriptions are read from a section like:
///
/// ```text
/// # Arguments
///
/// * `name` - Who to greet.
///   Continuation lines are joined.
/// ```
#[must_use]
pub fn parse_rustdoc(doc: &str) -> RustDoc {
    let summary = doc
        .lines()
        .map(str::trim)
        .skip_while(|line| line.is_empty())
        .take_while(|line| !line.is_empty() && !line.starts_with('#'))
        .collect::<Vec<_>>()
        .join(" ");

    let mut params = HashMap::new();
    let mut in_arguments = false;
    let mut current: Option<(String, String)> = None;
    for line in doc.lines().map(str::trim) {
        if let Some(heading) = line.strip_prefix('#') {
            flush(&mut params, current.take());
            let heading = heading.trim_start_matches('#').trim().to_ascii_lowercase();
            in_arguments = matches!(heading.as_str(), "arguments" | "parameters" | "args");
            continue;
        }
        if !in_arguments {
            continue;
        }
        if let Some(item) = line.strip_prefix("* ").or_else(|| line.strip_prefix("- ")) {
            flush(&mut params, current.take());
            current = parse_argument_item(item);
        } else if line.is_empty() {
            flush(&mut params, current.take());
        } else if let Some((_, text)) = current.as_mut() {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(line);
        }
    }
    flush(&mut params, current);

    RustDoc { summary, params }
}

fn parse_argument_item(item: &str) -> Option<(String, String)> {
    let rest = item.trim().strip_prefix('`')?;
    let (name, rest) = rest.split_once('`')?;
    let text = rest
        .trim_start()
        .trim_start_matches(['-', ':', '\u{2013}'])
        .trim();
    Some((name.trim().to_string(), text.to_string()))
}

fn flush(params: &mut HashMap<String, String>, entry: Option<(String, String)>) {
    if let Some((name, text)) = entry
        && !name.is_empty()
        && !text.is_empty()
    {
        params.insert(name, text);
    }
}

/// Output of [`introspect`].
#[derive(Debug, Clone, PartialEq)]
pub struct Introspection {
    /// Function summary.
    pub description: String,
    /// One spec per declared parameter, in declaration order.
    pub params: Vec<ParameterSpec>,
    /// Checked output shape.
    pub output: OutputShape,
}

/// Whether `name` matches `[A-Za-z_][A-Za-z0-9_]*`.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Introspect a declaration.
///
/// # Errors
///
/// Returns [`RegistrationError`] for an invalid name, a missing or
/// non-conforming output type, inconsistent parameters, or inconsistent
/// methods and interface tags.
pub fn introspect(def: &FunctionDef) -> Result<Introspection, RegistrationError> {
    let function = def.name.as_str();
    if !is_valid_name(function) {
        return Err(RegistrationError::InvalidName(function.to_string()));
    }

    let output = def
        .output
        .clone()
        .ok_or_else(|| RegistrationError::MissingOutputType(function.to_string()))?;
    if !output.satisfies_contract() {
        return Err(RegistrationError::InvalidOutputType {
            name: function.to_string(),
            type_name: output.type_name.clone(),
            missing: output.missing_fields(),
        });
    }

    if def.interfaces.is_empty() {
        return Err(declaration_error(function, "no interface tags declared"));
    }
    if def.interfaces.contains(&InterfaceTag::Api) && def.methods.is_empty() {
        return Err(declaration_error(
            function,
            "tagged for the api interface but declares no transport methods",
        ));
    }

    let doc = parse_rustdoc(&def.doc);
    let mut seen = HashSet::new();
    let mut params = Vec::with_capacity(def.params.len());
    for declared in &def.params {
        if !seen.insert(declared.name.as_str()) {
            return Err(param_error(function, &declared.name, "declared more than once"));
        }
        params.push(parameter_spec(function, declared, &doc)?);
    }
    if def.interfaces.contains(&InterfaceTag::Cli) {
        check_flags(function, &params)?;
    }

    Ok(Introspection {
        description: doc.summary,
        params,
        output,
    })
}

fn parameter_spec(
    function: &str,
    declared: &DeclaredParam,
    doc: &RustDoc,
) -> Result<ParameterSpec, RegistrationError> {
    let name = declared.name.as_str();
    if !is_valid_name(name) {
        return Err(param_error(function, name, "invalid parameter name"));
    }

    let (base, optional) = ParamKind::from_type_text(&declared.type_text);
    let kind = match &declared.choices {
        None => base,
        Some(values) if values.is_empty() => {
            return Err(param_error(function, name, "choice list is empty"));
        }
        Some(values) => {
            if let Some(bad) = values.iter().find(|v| !base.accepts(v)) {
                return Err(param_error(
                    function,
                    name,
                    &format!("choice {bad} is not a valid {}", base.label()),
                ));
            }
            ParamKind::Choice(values.clone())
        }
    };

    let default = match (&declared.default, optional) {
        (Some(Value::Null), false) => {
            return Err(param_error(function, name, "null default for a non-optional type"));
        }
        (Some(value), _) if !value.is_null() && !kind.accepts(value) => {
            let reason = match &kind {
                ParamKind::Choice(_) => format!("default {value} is not among the choices"),
                other => format!("default {value} is not a valid {}", other.label()),
            };
            return Err(param_error(function, name, &reason));
        }
        (Some(value), _) => Some(value.clone()),
        (None, true) => Some(Value::Null),
        (None, false) => None,
    };

    Ok(ParameterSpec {
        name: name.to_string(),
        required: default.is_none(),
        description: doc
            .params
            .get(name)
            .cloned()
            .unwrap_or_else(|| format!("Parameter: {name}")),
        choices: declared.choices.clone(),
        type_text: declared.type_text.clone(),
        kind,
        default,
    })
}

/// Flags clap adds to every subcommand.
const RESERVED_FLAGS: &[&str] = &["help"];

fn check_flags(function: &str, params: &[ParameterSpec]) -> Result<(), RegistrationError> {
    let mut flags: HashMap<String, &str> = HashMap::new();
    for param in params {
        let flag = flag_name(&param.name);
        if flag.is_empty() {
            return Err(param_error(function, &param.name, "has no usable command-line flag"));
        }
        if RESERVED_FLAGS.contains(&flag.as_str()) {
            return Err(param_error(
                function,
                &param.name,
                &format!("flag `--{flag}` is reserved on the command line"),
            ));
        }
        if let Some(other) = flags.insert(flag.clone(), &param.name) {
            return Err(param_error(
                function,
                &param.name,
                &format!("flag `--{flag}` is already used by `{other}`"),
            ));
        }
    }
    Ok(())
}

fn param_error(function: &str, param: &str, reason: &str) -> RegistrationError {
    RegistrationError::InvalidParameter {
        function: function.to_string(),
        param: param.to_string(),
        reason: reason.to_string(),
    }
}

fn declaration_error(function: &str, reason: &str) -> RegistrationError {
    RegistrationError::InvalidDeclaration {
        function: function.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_types_map_to_kinds() {
        assert_eq!(ParamKind::from_type_text("String"), (ParamKind::String, false));
        assert_eq!(ParamKind::from_type_text("std::path::PathBuf"), (ParamKind::String, false));
        assert_eq!(ParamKind::from_type_text("u16"), (ParamKind::Int, false));
        assert_eq!(ParamKind::from_type_text("f32"), (ParamKind::Float, false));
        assert_eq!(ParamKind::from_type_text("Option < bool >"), (ParamKind::Bool, true));
    }

    #[test]
    fn structured_types_are_complex() {
        let (kind, _) = ParamKind::from_type_text("Vec<String>");
        assert_eq!(
            kind,
            ParamKind::Complex(json!({"type": "array", "items": {"type": "string"}}))
        );
        let (kind, _) = ParamKind::from_type_text("HashMap<String, i64>");
        assert_eq!(kind, ParamKind::Complex(json!({"type": "object"})));
        let (kind, _) = ParamKind::from_type_text("serde_json::Value");
        assert_eq!(kind, ParamKind::Complex(json!({})));
        let (kind, _) = ParamKind::from_type_text("[u8; 4]");
        assert_eq!(
            kind,
            ParamKind::Complex(json!({"type": "array", "items": {"type": "integer"}}))
        );
    }

    #[test]
    fn rustdoc_summary_and_arguments() {
        let doc = "Greet someone\nby name.\n\nLonger text.\n\n# Arguments\n\n* `name` - Who to greet.\n  Defaults to the world.\n* `loud`: Shout it.\n\n# Errors\n\n* `never` - not a parameter section";
        let parsed = parse_rustdoc(doc);
        assert_eq!(parsed.summary, "Greet someone by name.");
        assert_eq!(
            parsed.params.get("name").map(String::as_str),
            Some("Who to greet. Defaults to the world.")
        );
        assert_eq!(parsed.params.get("loud").map(String::as_str), Some("Shout it."));
        assert!(!parsed.params.contains_key("never"));
    }

    #[test]
    fn names_follow_identifier_rules() {
        assert!(is_valid_name("check_docs"));
        assert!(is_valid_name("_private"));
        assert!(!is_valid_name("9lives"));
        assert!(!is_valid_name("with-dash"));
        assert!(!is_valid_name(""));
    }
}
