use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::stream::ErrorKind;
use crate::tool::{Tool, ToolCall, ToolDefinition, ToolResult};

/// Manages available tools, their schemas, and lookup.
/// Definitions are listed in registration order.
pub struct ToolRegistry {
    tools: IndexMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: IndexMap::new(),
        }
    }

    /// Register a tool. Returns error if name already registered.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), RegistryError> {
        let def = tool.definition();
        if self.tools.contains_key(&def.name) {
            return Err(RegistryError::DuplicateName(def.name));
        }
        self.tools.insert(def.name, Arc::new(tool));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>, RegistryError> {
        self.get(name)
            .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))
    }

    /// All registered tool definitions, for sending to the model.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run one call. Unknown tools and tool errors come back as failed
    /// results so the rest of the batch still runs.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let tool = match self.resolve(&call.name) {
            Ok(tool) => tool,
            Err(e) => {
                warn!(tool = %call.name, id = %call.id, "Tool resolution failed");
                return ToolResult::failure(call, e.to_string());
            }
        };

        debug!(tool = %call.name, id = %call.id, "Executing tool");
        match tool.call(call.arguments.clone()).await {
            Ok(output) => ToolResult::success(call, output),
            Err(e) => {
                warn!(tool = %call.name, id = %call.id, error = %e, "Tool failed");
                ToolResult::failure(call, e.to_string())
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Tool with name '{0}' is already registered")]
    DuplicateName(String),
    #[error("Tool '{0}' is not registered")]
    UnknownTool(String),
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateName(_) => ErrorKind::InvalidRequest,
            Self::UnknownTool(_) => ErrorKind::ToolResolution,
        }
    }
}
