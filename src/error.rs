//! Error taxonomy for sandbox provisioning, tool invocation and configuration.
//!
//! Provisioning and invocation failures are never fatal to a session: the tool
//! layer turns them into failed tool responses the agent can read. Only
//! [`ConfigurationError`] aborts, and only at startup or toolkit build time.

use crate::sandbox::SandboxKind;
use thiserror::Error;

/// A vendor session could not be created for a sandbox kind.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("sandbox kind '{kind}' is not enabled for this session")]
    KindDisabled { kind: SandboxKind },

    #[error("failed to create {kind} sandbox: {message}")]
    Vendor { kind: SandboxKind, message: String },

    #[error("failed to create {kind} sandbox: vendor returned no sandbox_id")]
    EmptySessionId { kind: SandboxKind },
}

/// A single tool call failed. Rendered into `ToolResult::failure`.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool '{name}'")]
    UnknownTool { name: String },

    #[error("tool '{tool}' is not available on the {kind} sandbox")]
    Unsupported { kind: SandboxKind, tool: String },

    #[error("sandbox {sandbox_id} has been cleaned up")]
    NotActive { sandbox_id: String },

    #[error("invalid argument '{parameter}' for {tool}: {reason}")]
    InvalidArgument {
        tool: &'static str,
        parameter: &'static str,
        reason: String,
    },

    #[error("Failed to initialize browser")]
    BrowserInit,

    #[error("{tool} failed: {message}")]
    Vendor { tool: &'static str, message: String },
}

/// Wiring mistakes caught before any tool runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("duplicate tool name '{name}'")]
    DuplicateTool { name: String },

    #[error("unknown sandbox kind '{name}' (expected one of linux, windows, browser, mobile, code)")]
    UnknownKind { name: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provisioning_error_names_the_kind() {
        let err = ProvisioningError::Vendor {
            kind: SandboxKind::Browser,
            message: "quota exceeded".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to create browser sandbox: quota exceeded"
        );
    }

    #[test]
    fn invalid_argument_mentions_parameter() {
        let err = ToolError::InvalidArgument {
            tool: "write_file",
            parameter: "content",
            reason: "missing required parameter".into(),
        };
        let text = err.to_string();
        assert!(text.contains("content"));
        assert!(text.contains("write_file"));
    }
}
