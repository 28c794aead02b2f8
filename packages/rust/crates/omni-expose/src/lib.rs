//! omni-expose - declare a function once, reach it over HTTP, CLI and MCP tools.
//!
//! A function marked with [`expose`] is introspected once into a
//! [`FunctionEntry`]; each adapter reads the frozen [`Registry`] and builds
//! its own bindings, all of them sharing one validation path ([`Schema`]),
//! one invocation pipeline ([`invoke()`]) and one output contract
//! ([`OutputEnvelope`]).
//!
//! ```rust,ignore
//! use omni_expose::{Output, expose};
//!
//! /// Greet someone by name.
//! ///
//! /// # Arguments
//! ///
//! /// * `name` - Who to greet.
//! #[expose(methods(GET), interfaces(api, cli), defaults(name = "World"))]
//! fn greet(name: String) -> Output {
//!     Output::ok(format!("Hello, {name}"))
//! }
//!
//! let mut registry = Registry::new();
//! autodiscover(Path::new("src"), &mut registry)?;
//! let registry = registry.into_shared();
//! let app = ApiAdapter::new(registry.clone()).router();
//! ```
//!
//! # Modules
//!
//! | Module | Role |
//! |--------|------|
//! | [`contract`] | `{result, success, message}` envelope and [`OutputContract`] |
//! | [`introspect`] | Declared parameters and rustdoc to [`ParameterSpec`] |
//! | [`registry`] | [`FunctionDef`], [`FunctionEntry`], [`Registry`] lifecycle |
//! | [`discovery`] | Scan-then-load autodiscovery |
//! | [`schema`] | Query/body schemas and shared validation |
//! | [`invoke`] | Validate -> call -> wrap |
//! | [`adapters`] | API (axum), CLI (clap), tool protocol (rmcp) |
//! | [`config`] | YAML settings |
//! | [`server`] | HTTP server hosting the API and the tool endpoint |

extern crate self as omni_expose;

pub mod adapters;
pub mod config;
pub mod contract;
pub mod discovery;
pub mod errors;
pub mod introspect;
pub mod invoke;
pub mod registry;
pub mod schema;
pub mod server;

pub use omni_expose_macros::expose;

#[doc(hidden)]
pub use inventory;
pub use serde_json;

pub use adapters::{
    ApiAdapter, CliAdapter, RouteBinding, ToolAdapter, ToolCallOutcome, ToolDescriptor,
    ToolServer,
};
pub use config::{ExposeSettings, load_settings, project_root, set_config_home_override};
pub use contract::{ENVELOPE_FIELDS, Output, OutputContract, OutputEnvelope, OutputShape};
pub use discovery::{DiscoveryReport, autodiscover};
pub use errors::{
    ArgumentError, DiscoveryError, ExecutionError, FieldError, FieldProblem, HandlerError,
    RegistrationError, ValidationError,
};
pub use introspect::{ParamKind, ParameterSpec, introspect};
pub use invoke::invoke;
pub use registry::{
    DeclaredParam, ExposedFunction, FunctionDef, FunctionEntry, Handler, InterfaceTag, Registry,
    RegistryState, TransportMethod, declared_functions,
};
pub use schema::{Kwargs, RawInput, Schema, SchemaShape, build_schema};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
