//! Tool capability definitions and registry.
//!
//! A `Tool` is a named, schema-described capability the model may request
//! mid-turn. The registry keeps registration separate from visibility so a
//! deployment can toggle capabilities without code changes.

pub mod builtin;
pub mod registry;

pub use registry::ToolRegistry;

use std::future::Future;
use std::pin::Pin;

use parley_types::error::ToolError;
use parley_types::llm::ToolDescriptor;
use serde_json::Value;

/// A named, invocable capability offered to the reasoning backend.
///
/// `invoke` returns a boxed future because tools need to be object-safe
/// for storage in the registry.
pub trait Tool: Send + Sync {
    /// Unique tool name as presented to the model.
    fn name(&self) -> &str;

    /// What the tool does, phrased for the model.
    fn description(&self) -> &str;

    /// JSON schema of the tool's arguments.
    fn input_schema(&self) -> Value;

    /// Execute the tool with the given arguments.
    fn invoke(
        &self,
        args: Value,
    ) -> Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + '_>>;

    /// Descriptor handed to the model when this tool is offered.
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}
