//! Ordered, name-indexed collection of tools handed to the agent.

use super::traits::{Tool, ToolResponse, ToolSpec};
use crate::error::{ConfigurationError, ToolError};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct Toolkit {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for Toolkit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolkit")
            .field("tools", &self.names())
            .finish()
    }
}

impl Toolkit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool. Names must be unique within the toolkit.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ConfigurationError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(ConfigurationError::DuplicateTool { name });
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|tool| tool.spec()).collect()
    }

    /// Run a tool by name. Unknown names and tool errors become failed responses.
    pub async fn execute(&self, name: &str, args: serde_json::Value) -> ToolResponse {
        let Some(tool) = self.get(name) else {
            return ToolResponse::failure(
                ToolError::UnknownTool {
                    name: name.to_string(),
                }
                .to_string(),
            );
        };
        match tool.execute(args).await {
            Ok(response) => response,
            Err(e) => ToolResponse::failure(format!("{e:#}")),
        }
    }
}
