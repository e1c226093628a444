use crate::sandbox::ToolResult as SandboxResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What a tool hands back to the agent.
///
/// `output` is the human-readable rendering the LLM reads; `result` carries the
/// structured sandbox result when the tool is sandbox-backed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub success: bool,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<SandboxResult>,
}

impl ToolResponse {
    pub fn failure(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            output: format!("Operation failed: {error}"),
            error: Some(error),
            result: None,
        }
    }

    /// Render a sandbox result into agent-readable text.
    pub fn from_result(result: SandboxResult) -> Self {
        if !result.success {
            let error = result.error_message().to_string();
            let mut output = format!("Operation failed: {error}");
            if let Some(out) = result.output.as_deref().filter(|o| !o.is_empty()) {
                output.push_str(&format!("\nOutput:\n{out}"));
            }
            return Self {
                success: false,
                output,
                error: Some(error),
                result: Some(result),
            };
        }

        let mut sections = Vec::new();
        if let Some(out) = result.output.as_deref() {
            sections.push(format!("Output:\n{out}"));
        }
        if let Some(content) = result.content.as_deref() {
            sections.push(format!("Content:\n{content}"));
        }
        if let Some(message) = result.message.as_deref().filter(|m| !m.is_empty()) {
            sections.push(message.to_string());
        }
        if let Some(data) = &result.data {
            sections.push(format!("Data: {data}"));
        }
        if result.screenshot.is_some() || result.screenshot_url.is_some() {
            let mut line = "Screenshot captured".to_string();
            if let Some(url) = result.screenshot_url.as_deref() {
                line.push_str(&format!(": {url}"));
            }
            sections.push(line);
        }
        let output = if sections.is_empty() {
            "Operation completed successfully".to_string()
        } else {
            sections.join("\n")
        };

        Self {
            success: true,
            output,
            error: None,
            result: Some(result),
        }
    }
}

/// Description of a tool as sent to the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Core tool trait: implement for any capability exposed to the agent.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (used in LLM function calling)
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str;

    /// JSON schema for parameters
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with given arguments
    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResponse>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}
