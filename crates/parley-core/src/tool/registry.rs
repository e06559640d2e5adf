//! Central registry for conversation tools.
//!
//! Backed by `DashMap` so reads from concurrent turns never block each
//! other; registration and enable/disable are administrative operations
//! expected to be infrequent.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use parley_types::llm::ToolDescriptor;

use super::Tool;

struct Registered {
    tool: Arc<dyn Tool>,
    enabled: bool,
}

/// Registry mapping tool names to invocable capabilities.
///
/// Disabling removes a tool from the set offered to the model without
/// discarding its registration.
#[derive(Default)]
pub struct ToolRegistry {
    tools: DashMap<String, Registered>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its own name. Tools start enabled; a
    /// re-registration replaces the previous entry.
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(
            name.clone(),
            Registered {
                tool,
                enabled: true,
            },
        );
        info!(tool = %name, "tool registered");
    }

    /// Remove a tool entirely. Returns false when it was never registered.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.tools.remove(name).is_some();
        if removed {
            info!(tool = %name, "tool unregistered");
        }
        removed
    }

    /// Make a registered tool visible to the model again.
    pub fn enable(&self, name: &str) -> bool {
        match self.tools.get_mut(name) {
            Some(mut entry) => {
                entry.enabled = true;
                info!(tool = %name, "tool enabled");
                true
            }
            None => false,
        }
    }

    /// Hide a registered tool from the model without unregistering it.
    pub fn disable(&self, name: &str) -> bool {
        match self.tools.get_mut(name) {
            Some(mut entry) => {
                entry.enabled = false;
                info!(tool = %name, "tool disabled");
                true
            }
            None => false,
        }
    }

    /// Fetch a tool for dispatch, enabled or not.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|entry| entry.tool.clone())
    }

    /// All tools, optionally including disabled ones.
    pub fn tools(&self, include_disabled: bool) -> Vec<Arc<dyn Tool>> {
        self.tools
            .iter()
            .filter(|entry| include_disabled || entry.enabled)
            .map(|entry| entry.tool.clone())
            .collect()
    }

    /// Descriptors of the enabled tools, as offered to the model.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut out: Vec<ToolDescriptor> = self
            .tools
            .iter()
            .filter(|entry| entry.enabled)
            .map(|entry| entry.tool.descriptor())
            .collect();
        // DashMap iteration order is arbitrary; keep the offer stable.
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Drop every registration.
    pub fn clear(&self) {
        self.tools.clear();
        info!("all tools unregistered");
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("len", &self.tools.len())
            .finish()
    }
}
