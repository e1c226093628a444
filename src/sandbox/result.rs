//! The uniform result every sandbox tool call returns.

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Normalized outcome of one tool call. Absent fields are omitted on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Base64-encoded image bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_exit_code(mut self, exit_code: i64) -> Self {
        self.exit_code = Some(exit_code);
        self
    }

    pub fn with_screenshot_url(mut self, url: impl Into<String>) -> Self {
        self.screenshot_url = Some(url.into());
        self
    }

    /// Attach raw image bytes, base64-encoded.
    pub fn with_screenshot_bytes(mut self, bytes: &[u8]) -> Self {
        self.screenshot = Some(base64::engine::general_purpose::STANDARD.encode(bytes));
        self
    }

    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("Unknown error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_fields_are_omitted() {
        let value = serde_json::to_value(ToolResult::ok().with_output("hi\n").with_exit_code(0))
            .unwrap();
        assert_eq!(value, json!({"success": true, "output": "hi\n", "exit_code": 0}));
    }

    #[test]
    fn failure_carries_error() {
        let result = ToolResult::failure("boom");
        assert!(!result.success);
        assert_eq!(result.error_message(), "boom");
        assert_eq!(ToolResult::default().error_message(), "Unknown error");
    }

    #[test]
    fn screenshot_bytes_are_base64() {
        let result = ToolResult::ok().with_screenshot_bytes(b"png");
        assert_eq!(result.screenshot.as_deref(), Some("cG5n"));
    }
}
