//! Function registry.
//!
//! Lifecycle: `Empty -> Populating -> Frozen`. The registry is written during
//! startup (autodiscovery or explicit [`Registry::register`] calls), then
//! frozen and shared read-only with every adapter through `Arc<Registry>`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::contract::{OutputContract, OutputEnvelope, OutputShape};
use crate::errors::{HandlerError, RegistrationError};
use crate::introspect::{ParameterSpec, introspect};
use crate::schema::{Kwargs, Schema, SchemaShape, build_schema};

/// Type-erased callable: validated kwargs in, envelope out.
pub type Handler = Arc<dyn Fn(Kwargs) -> Result<OutputEnvelope, HandlerError> + Send + Sync>;

/// HTTP method a function accepts on its API route.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransportMethod {
    /// `GET`, query-string input.
    Get,
    /// `POST`, JSON body input.
    Post,
    /// `PUT`, JSON body input.
    Put,
    /// `DELETE`, query-string input.
    Delete,
}

impl TransportMethod {
    /// Every method.
    pub const ALL: [Self; 4] = [Self::Get, Self::Post, Self::Put, Self::Delete];

    /// Upper-case method name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Input shape bound to this method.
    #[must_use]
    pub fn shape(self) -> SchemaShape {
        match self {
            Self::Get | Self::Delete => SchemaShape::Query,
            Self::Post | Self::Put => SchemaShape::Body,
        }
    }
}

impl fmt::Display for TransportMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown transport method: {s}"))
    }
}

/// Transport that exposes a function.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceTag {
    /// HTTP API route.
    Api,
    /// Command-line subcommand.
    Cli,
    /// Tool-protocol tool.
    Tool,
}

impl InterfaceTag {
    /// Every tag.
    pub const ALL: [Self; 3] = [Self::Api, Self::Cli, Self::Tool];

    /// Lower-case tag name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Cli => "cli",
            Self::Tool => "tool",
        }
    }
}

impl fmt::Display for InterfaceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterfaceTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown interface tag: {s}"))
    }
}

/// A parameter as declared, before introspection.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredParam {
    /// Parameter name.
    pub name: String,
    /// Rust type as written.
    pub type_text: String,
    /// Declared default.
    pub default: Option<Value>,
    /// Declared allowed values.
    pub choices: Option<Vec<Value>>,
}

impl DeclaredParam {
    /// Parameter with no default and no choices.
    pub fn new(name: impl Into<String>, type_text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_text: type_text.into(),
            default: None,
            choices: None,
        }
    }

    /// Set the default value.
    #[must_use]
    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Restrict the parameter to a fixed set of values.
    #[must_use]
    pub fn choices(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.choices = Some(values.into_iter().collect());
        self
    }
}

/// Registration input: a callable plus everything known about it.
///
/// Built by `#[expose]`, or by hand:
///
/// ```rust,ignore
/// let def = FunctionDef::new("add", |mut kwargs: Kwargs| {
///     let a: i64 = kwargs.take("a")?;
///     let b: i64 = kwargs.take("b")?;
///     Ok(Output::ok(a + b))
/// })
/// .params([DeclaredParam::new("a", "i64"), DeclaredParam::new("b", "i64")])
/// .returns::<Output>()
/// .methods([TransportMethod::Get])
/// .interfaces([InterfaceTag::Api, InterfaceTag::Cli]);
/// registry.register(def)?;
/// ```
#[derive(Clone)]
pub struct FunctionDef {
    pub(crate) name: String,
    pub(crate) handler: Handler,
    pub(crate) doc: String,
    pub(crate) params: Vec<DeclaredParam>,
    pub(crate) output: Option<OutputShape>,
    pub(crate) methods: BTreeSet<TransportMethod>,
    pub(crate) interfaces: BTreeSet<InterfaceTag>,
    pub(crate) source_file: Option<String>,
    pub(crate) module_path: Option<String>,
}

impl FunctionDef {
    /// Declaration with a name and a handler and nothing else.
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Kwargs) -> Result<OutputEnvelope, HandlerError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            handler: Arc::new(handler),
            doc: String::new(),
            params: Vec::new(),
            output: None,
            methods: BTreeSet::new(),
            interfaces: BTreeSet::new(),
            source_file: None,
            module_path: None,
        }
    }

    /// Rustdoc text.
    #[must_use]
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    /// Append declared parameters.
    #[must_use]
    pub fn params(mut self, params: impl IntoIterator<Item = DeclaredParam>) -> Self {
        self.params.extend(params);
        self
    }

    /// Output shape; `None` means no return type.
    #[must_use]
    pub fn output(mut self, shape: Option<OutputShape>) -> Self {
        self.output = shape;
        self
    }

    /// Output shape of `T`.
    #[must_use]
    pub fn returns<T: OutputContract>(self) -> Self {
        self.output(Some(T::shape()))
    }

    /// Add transport methods.
    #[must_use]
    pub fn methods(mut self, methods: impl IntoIterator<Item = TransportMethod>) -> Self {
        self.methods.extend(methods);
        self
    }

    /// Add interface tags.
    #[must_use]
    pub fn interfaces(mut self, interfaces: impl IntoIterator<Item = InterfaceTag>) -> Self {
        self.interfaces.extend(interfaces);
        self
    }

    /// Where the declaration lives.
    #[must_use]
    pub fn source(mut self, file: &str, module_path: &str) -> Self {
        self.source_file = Some(file.to_string());
        self.module_path = Some(module_path.to_string());
        self
    }

    /// Declared name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("output", &self.output)
            .field("methods", &self.methods)
            .field("interfaces", &self.interfaces)
            .field("source_file", &self.source_file)
            .finish_non_exhaustive()
    }
}

/// Compile-time record emitted by `#[expose]`, collected with `inventory`.
#[derive(Debug)]
pub struct ExposedFunction {
    /// Exposed name.
    pub name: &'static str,
    /// Rust identifier of the function.
    pub ident: &'static str,
    /// `file!()` of the declaration.
    pub source_file: &'static str,
    /// `module_path!()` of the declaration.
    pub module_path: &'static str,
    /// Builds the declaration.
    pub build: fn() -> FunctionDef,
}

inventory::collect!(ExposedFunction);

impl ExposedFunction {
    /// Build the declaration.
    #[must_use]
    pub fn definition(&self) -> FunctionDef {
        (self.build)()
    }
}

/// Every `#[expose]` declaration linked into this binary.
pub fn declared_functions() -> impl Iterator<Item = &'static ExposedFunction> {
    inventory::iter::<ExposedFunction>.into_iter()
}

/// Registered, introspected function.
#[derive(Clone)]
pub struct FunctionEntry {
    /// Unique name.
    pub name: String,
    /// Summary from the rustdoc.
    pub description: String,
    /// Parameter metadata, in declaration order.
    pub params: Vec<ParameterSpec>,
    /// Accepted HTTP methods.
    pub methods: BTreeSet<TransportMethod>,
    /// Transports exposing the function.
    pub interfaces: BTreeSet<InterfaceTag>,
    /// Output shape, checked against the contract.
    pub output: OutputShape,
    /// `file!()` of the declaration, when known.
    pub source_file: Option<String>,
    /// `module_path!()` of the declaration, when known.
    pub module_path: Option<String>,
    handler: Handler,
    query_schema: Schema,
    body_schema: Schema,
}

impl FunctionEntry {
    /// Whether the entry is tagged for `tag`.
    #[must_use]
    pub fn exposes(&self, tag: InterfaceTag) -> bool {
        self.interfaces.contains(&tag)
    }

    /// Validation schema for an input shape.
    #[must_use]
    pub fn schema(&self, shape: SchemaShape) -> &Schema {
        match shape {
            SchemaShape::Query => &self.query_schema,
            SchemaShape::Body => &self.body_schema,
        }
    }

    /// Parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&ParameterSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Run the handler on already-validated kwargs.
    ///
    /// # Errors
    ///
    /// Propagates the handler's [`HandlerError`].
    pub fn call(&self, kwargs: Kwargs) -> Result<OutputEnvelope, HandlerError> {
        (self.handler)(kwargs)
    }
}

impl fmt::Debug for FunctionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionEntry")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("params", &self.params)
            .field("methods", &self.methods)
            .field("interfaces", &self.interfaces)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

/// Registry lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    /// Nothing registered yet.
    Empty,
    /// Accepting registrations.
    Populating,
    /// Read-only.
    Frozen,
}

/// Function registry keyed by name.
#[derive(Debug, Default)]
pub struct Registry {
    entries: BTreeMap<String, FunctionEntry>,
    frozen: bool,
}

impl Registry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RegistryState {
        if self.frozen {
            RegistryState::Frozen
        } else if self.entries.is_empty() {
            RegistryState::Empty
        } else {
            RegistryState::Populating
        }
    }

    /// Introspect and insert a declaration.
    ///
    /// # Errors
    ///
    /// Fails when the registry is frozen, the declaration is invalid, or the
    /// name is taken. A failed registration leaves the registry unchanged.
    pub fn register(&mut self, def: FunctionDef) -> Result<&FunctionEntry, RegistrationError> {
        if self.frozen {
            return Err(RegistrationError::Frozen(def.name));
        }
        let introspection = introspect(&def)?;
        if self.entries.contains_key(&def.name) {
            return Err(RegistrationError::Duplicate(def.name));
        }

        let FunctionDef {
            name,
            handler,
            methods,
            interfaces,
            source_file,
            module_path,
            ..
        } = def;
        let entry = FunctionEntry {
            query_schema: build_schema(&introspection.params, SchemaShape::Query),
            body_schema: build_schema(&introspection.params, SchemaShape::Body),
            name: name.clone(),
            description: introspection.description,
            params: introspection.params,
            output: introspection.output,
            methods,
            interfaces,
            source_file,
            module_path,
            handler,
        };
        tracing::debug!(
            function = %entry.name,
            params = entry.params.len(),
            interfaces = ?entry.interfaces,
            "registered function"
        );
        Ok(self.entries.entry(name).or_insert(entry))
    }

    /// Stop accepting registrations.
    pub fn freeze(&mut self) {
        if !self.frozen {
            tracing::info!(functions = self.entries.len(), "registry frozen");
        }
        self.frozen = true;
    }

    /// Whether [`Registry::freeze`] has been called.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Freeze and share.
    #[must_use]
    pub fn into_shared(mut self) -> Arc<Self> {
        self.freeze();
        Arc::new(self)
    }

    /// Entry by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FunctionEntry> {
        self.entries.get(name)
    }

    /// Whether a name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// All entries in name order.
    pub fn entries(&self) -> impl Iterator<Item = &FunctionEntry> {
        self.entries.values()
    }

    /// Entries tagged for one interface, in name order.
    pub fn for_interface(&self, tag: InterfaceTag) -> impl Iterator<Item = &FunctionEntry> {
        self.entries().filter(move |e| e.exposes(tag))
    }

    /// Registered names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
