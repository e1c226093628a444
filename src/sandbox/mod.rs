//! Sandbox abstraction layer.
//!
//! Defines the [`SandboxProvider`] trait every vendor backend implements, plus
//! the value types its operations return. One provider exists today:
//!
//! - [`agentbay::AgentBayClient`]: AgentBay cloud sessions over HTTPS
//!   (requires `AGENTBAY_API_KEY`)
//!
//! Providers are stateless with respect to sessions: every call names the
//! vendor session it targets. Session ownership lives in
//! [`handle::SandboxHandle`]; session bookkeeping in
//! [`crate::manager::SandboxManager`].

pub mod agentbay;
pub mod capability;
pub mod handle;
pub mod kind;
pub mod request;
pub mod result;
#[cfg(test)]
pub(crate) mod testing;

pub use capability::{ToolCategory, ToolDescriptor, SandboxTool};
pub use handle::{HandleState, SandboxHandle};
pub use kind::SandboxKind;
pub use request::{KeyCode, Swipe};
pub use result::ToolResult;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Output from a shell command executed inside a sandbox.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Whether the vendor reported the command as successful.
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
    pub exit_code: i64,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    #[serde(default)]
    pub is_directory: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// A captured screen: either hosted by the vendor or returned inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screenshot {
    Url(String),
    Image(Vec<u8>),
}

/// The screen an input or capture operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Desktop,
    Mobile,
    Browser,
}

impl Surface {
    pub fn as_str(self) -> &'static str {
        match self {
            Surface::Desktop => "computer",
            Surface::Mobile => "mobile",
            Surface::Browser => "browser",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeLanguage {
    Python,
    Javascript,
}

impl CodeLanguage {
    pub fn as_str(self) -> &'static str {
        match self {
            CodeLanguage::Python => "python",
            CodeLanguage::Javascript => "javascript",
        }
    }
}

/// Result of a natural-language browser agent action.
#[derive(Debug, Clone, Default)]
pub struct ActOutcome {
    pub success: bool,
    pub message: String,
    pub error: Option<String>,
}

/// Vendor-side description of a live session, used for live-view links.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInfo {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub resource_url: String,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub resource_type: Option<String>,
}

/// Provider-agnostic vendor interface.
///
/// Every method performs exactly one vendor request. Errors are returned as
/// `anyhow::Error`; [`SandboxHandle`] turns them into failed [`ToolResult`]s.
#[async_trait]
pub trait SandboxProvider: Send + Sync {
    /// Human-readable provider name for logs.
    fn name(&self) -> &str;

    /// Create a vendor session from an image. Returns the session id.
    async fn create_session(
        &self,
        image_id: &str,
        labels: &BTreeMap<String, String>,
    ) -> anyhow::Result<String>;

    /// Delete a vendor session. Deleting an already-gone session succeeds.
    async fn delete_session(&self, session_id: &str) -> anyhow::Result<()>;

    async fn session_info(&self, session_id: &str) -> anyhow::Result<ResourceInfo>;

    async fn execute_command(&self, session_id: &str, command: &str)
        -> anyhow::Result<CommandOutput>;

    /// Run a snippet and return its textual result.
    async fn run_code(
        &self,
        session_id: &str,
        code: &str,
        language: CodeLanguage,
    ) -> anyhow::Result<String>;

    async fn read_file(&self, session_id: &str, path: &str) -> anyhow::Result<String>;

    async fn write_file(&self, session_id: &str, path: &str, content: &str)
        -> anyhow::Result<()>;

    async fn list_directory(&self, session_id: &str, path: &str)
        -> anyhow::Result<Vec<FileEntry>>;

    async fn create_directory(&self, session_id: &str, path: &str) -> anyhow::Result<()>;

    async fn move_file(
        &self,
        session_id: &str,
        source: &str,
        destination: &str,
    ) -> anyhow::Result<()>;

    async fn delete_file(&self, session_id: &str, path: &str) -> anyhow::Result<()>;

    async fn screenshot(&self, session_id: &str, surface: Surface) -> anyhow::Result<Screenshot>;

    async fn start_app(&self, session_id: &str, surface: Surface, app_name: &str)
        -> anyhow::Result<()>;

    async fn stop_app(&self, session_id: &str, surface: Surface, app_name: &str)
        -> anyhow::Result<()>;

    async fn input_text(&self, session_id: &str, surface: Surface, text: &str)
        -> anyhow::Result<()>;

    async fn window_maximize(&self, session_id: &str) -> anyhow::Result<()>;

    async fn window_minimize(&self, session_id: &str) -> anyhow::Result<()>;

    async fn mobile_click(&self, session_id: &str, x: i64, y: i64) -> anyhow::Result<()>;

    async fn mobile_swipe(&self, session_id: &str, swipe: Swipe) -> anyhow::Result<()>;

    async fn mobile_send_key(&self, session_id: &str, key: KeyCode) -> anyhow::Result<()>;

    /// Whether the session's browser is ready for navigation.
    async fn browser_initialized(&self, session_id: &str) -> anyhow::Result<bool>;

    /// Start the session's browser. Returns whether it came up.
    async fn browser_initialize(&self, session_id: &str) -> anyhow::Result<bool>;

    /// Direct navigation. Returns the vendor's status message.
    async fn browser_navigate(&self, session_id: &str, url: &str) -> anyhow::Result<String>;

    /// Navigation through the vendor's browser agent.
    async fn browser_agent_navigate(&self, session_id: &str, url: &str)
        -> anyhow::Result<String>;

    async fn browser_act(&self, session_id: &str, action: &str) -> anyhow::Result<ActOutcome>;

    async fn browser_extract(&self, session_id: &str, instruction: &str)
        -> anyhow::Result<serde_json::Value>;

    async fn browser_observe(&self, session_id: &str, instruction: &str)
        -> anyhow::Result<serde_json::Value>;
}
