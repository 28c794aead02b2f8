//! Transport adapters.
//!
//! Each adapter takes the frozen registry, filters it by interface tag, and
//! builds one binding per function. All of them call [`crate::invoke`].

pub mod api;
pub mod cli;
pub mod tool;

pub use api::{ApiAdapter, RouteBinding, route_path};
pub use cli::{CliAdapter, command_name, flag_name};
pub use tool::{ToolAdapter, ToolCallOutcome, ToolDescriptor, ToolServer};
