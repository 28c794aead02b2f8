//! Tool-protocol adapter: one MCP tool per tool-tagged function.
//!
//! The input schema of a tool is the body schema of the API route for the
//! same function. Calls run the shared pipeline; [`ToolServer`] frames the
//! outcome for `rmcp`.

use std::sync::Arc;

use rmcp::ServerHandler;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, ErrorData, JsonObject, ListToolsResult,
    PaginatedRequestParams, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::{RequestContext, RoleServer};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::contract::OutputEnvelope;
use crate::errors::ValidationError;
use crate::invoke::invoke;
use crate::registry::{FunctionEntry, InterfaceTag, Registry};
use crate::schema::{RawInput, SchemaShape};

/// Published description of a tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    /// Tool name, equal to the function name.
    pub name: String,
    /// Function summary.
    pub description: String,
    /// JSON Schema of the arguments object.
    pub input_schema: Value,
}

/// Result of a tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCallOutcome {
    /// The function ran; the envelope may still report a recovered failure.
    Completed(OutputEnvelope),
    /// Arguments were rejected; the function did not run.
    Rejected(ValidationError),
    /// No tool-tagged function has this name.
    UnknownTool(String),
}

impl ToolCallOutcome {
    /// Envelope reported to the caller, if the tool exists.
    #[must_use]
    pub fn envelope(&self) -> Option<OutputEnvelope> {
        match self {
            Self::Completed(envelope) => Some(envelope.clone()),
            Self::Rejected(error) => Some(error.to_envelope()),
            Self::UnknownTool(_) => None,
        }
    }

    /// Whether the call should be flagged as an error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        match self {
            Self::Completed(envelope) => !envelope.success,
            Self::Rejected(_) | Self::UnknownTool(_) => true,
        }
    }

    /// Frame for the tool protocol. The envelope travels both as a JSON text
    /// block and as structured content.
    ///
    /// # Errors
    ///
    /// An unknown tool is an `invalid_params` protocol error.
    pub fn into_call_result(self) -> Result<CallToolResult, ErrorData> {
        match self {
            Self::Completed(envelope) if envelope.success => {
                Ok(CallToolResult::structured(envelope.to_value()))
            }
            Self::Completed(envelope) => Ok(CallToolResult::structured_error(envelope.to_value())),
            Self::Rejected(error) => Ok(CallToolResult::structured_error(
                error.to_envelope().to_value(),
            )),
            Self::UnknownTool(name) => Err(ErrorData::invalid_params(
                format!("unknown tool: {name}"),
                None,
            )),
        }
    }
}

/// Descriptors and calls for tool-tagged entries.
#[derive(Debug, Clone)]
pub struct ToolAdapter {
    registry: Arc<Registry>,
}

impl ToolAdapter {
    /// Adapter over a frozen registry.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Every tool descriptor, in name order.
    #[must_use]
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.registry
            .for_interface(InterfaceTag::Tool)
            .map(descriptor)
            .collect()
    }

    /// Descriptor of one tool.
    #[must_use]
    pub fn descriptor(&self, name: &str) -> Option<ToolDescriptor> {
        self.entry(name).map(descriptor)
    }

    /// Run a tool with JSON arguments; `None` counts as `{}`.
    #[must_use]
    pub fn call(&self, name: &str, arguments: Option<Map<String, Value>>) -> ToolCallOutcome {
        let Some(entry) = self.entry(name) else {
            tracing::debug!(tool = name, "unknown tool requested");
            return ToolCallOutcome::UnknownTool(name.to_string());
        };
        let input = RawInput::Body(arguments.map_or(Value::Null, Value::Object));
        match invoke(entry, &input) {
            Ok(envelope) => ToolCallOutcome::Completed(envelope),
            Err(error) => ToolCallOutcome::Rejected(error),
        }
    }

    fn entry(&self, name: &str) -> Option<&FunctionEntry> {
        self.registry
            .get(name)
            .filter(|entry| entry.exposes(InterfaceTag::Tool))
    }
}

fn descriptor(entry: &FunctionEntry) -> ToolDescriptor {
    ToolDescriptor {
        name: entry.name.clone(),
        description: entry.description.clone(),
        input_schema: entry.schema(SchemaShape::Body).to_json_schema(),
    }
}

/// `rmcp` server exposing a [`ToolAdapter`].
#[derive(Debug, Clone)]
pub struct ToolServer {
    adapter: ToolAdapter,
    tools: Arc<Vec<Tool>>,
}

impl ToolServer {
    /// Server with the adapter's tool list computed once.
    #[must_use]
    pub fn new(adapter: ToolAdapter) -> Self {
        let output_schema = Arc::new(envelope_schema());
        let tools = adapter
            .descriptors()
            .into_iter()
            .map(|d| Tool {
                name: d.name.into(),
                title: None,
                description: Some(d.description.into()),
                input_schema: Arc::new(d.input_schema.as_object().cloned().unwrap_or_default()),
                output_schema: Some(Arc::clone(&output_schema)),
                annotations: None,
                execution: None,
                icons: None,
                meta: None,
            })
            .collect();
        Self {
            adapter,
            tools: Arc::new(tools),
        }
    }

    /// Published tools.
    #[must_use]
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }
}

fn envelope_schema() -> JsonObject {
    serde_json::to_value(schemars::schema_for!(OutputEnvelope))
        .ok()
        .and_then(|value| value.as_object().cloned())
        .unwrap_or_default()
}

impl ServerHandler for ToolServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, ErrorData>> + Send + '_ {
        std::future::ready(Ok(ListToolsResult::with_all_items(
            self.tools.as_ref().clone(),
        )))
    }

    fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, ErrorData>> + Send + '_ {
        let adapter = self.adapter.clone();
        async move {
            let name = request.name.to_string();
            let arguments = request.arguments;
            let outcome = tokio::task::spawn_blocking(move || adapter.call(&name, arguments))
                .await
                .map_err(|e| ErrorData::internal_error(format!("tool task failed: {e}"), None))?;
            outcome.into_call_result()
        }
    }
}
