//! One live vendor session for one sandbox kind.

use super::capability::{SandboxTool, ToolCategory};
use super::request::ToolRequest;
use super::{ResourceInfo, SandboxKind, SandboxProvider, Screenshot, ToolResult};
use crate::error::ToolError;
use anyhow::Context as _;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Active,
    Cleaned,
}

/// Typed wrapper around a vendor session.
///
/// Tool calls on one handle are serialized by an async gate; calls on
/// different handles run concurrently. `call_tool` never returns an error:
/// every failure is folded into a failed [`ToolResult`].
pub struct SandboxHandle {
    kind: SandboxKind,
    sandbox_id: String,
    image_id: String,
    created_at: DateTime<Utc>,
    provider: Arc<dyn SandboxProvider>,
    state: Mutex<HandleState>,
    gate: tokio::sync::Mutex<()>,
    browser_ready: AtomicBool,
}

impl std::fmt::Debug for SandboxHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxHandle")
            .field("kind", &self.kind)
            .field("sandbox_id", &self.sandbox_id)
            .field("image_id", &self.image_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl SandboxHandle {
    pub fn new(
        kind: SandboxKind,
        sandbox_id: impl Into<String>,
        image_id: impl Into<String>,
        provider: Arc<dyn SandboxProvider>,
    ) -> Self {
        Self {
            kind,
            sandbox_id: sandbox_id.into(),
            image_id: image_id.into(),
            created_at: Utc::now(),
            provider,
            state: Mutex::new(HandleState::Active),
            gate: tokio::sync::Mutex::new(()),
            browser_ready: AtomicBool::new(false),
        }
    }

    pub fn kind(&self) -> SandboxKind {
        self.kind
    }

    pub fn sandbox_id(&self) -> &str {
        &self.sandbox_id
    }

    pub fn image_id(&self) -> &str {
        &self.image_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> HandleState {
        *self.state.lock()
    }

    pub fn is_active(&self) -> bool {
        self.state() == HandleState::Active
    }

    /// Tools this handle accepts. Same as the kind's static table.
    pub fn list_tools(&self) -> &'static [SandboxTool] {
        self.kind.tools()
    }

    pub fn list_tools_in(&self, category: ToolCategory) -> Vec<SandboxTool> {
        self.kind.tools_in(category)
    }

    /// Invoke a tool by wire name.
    pub async fn call_tool(&self, name: &str, args: &Value) -> ToolResult {
        match SandboxTool::from_name(name) {
            Some(tool) => self.call(tool, args).await,
            None => ToolResult::failure(
                ToolError::UnknownTool {
                    name: name.to_string(),
                }
                .to_string(),
            ),
        }
    }

    pub async fn call(&self, tool: SandboxTool, args: &Value) -> ToolResult {
        let started = Instant::now();
        let result = match self.try_call(tool, args).await {
            Ok(result) => result,
            Err(e) => ToolResult::failure(e.to_string()),
        };
        tracing::debug!(
            kind = %self.kind,
            sandbox_id = %self.sandbox_id,
            tool = tool.name(),
            success = result.success,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "sandbox tool call finished"
        );
        result
    }

    async fn try_call(&self, tool: SandboxTool, args: &Value) -> Result<ToolResult, ToolError> {
        if !self.kind.supports(tool) {
            return Err(ToolError::Unsupported {
                kind: self.kind,
                tool: tool.name().to_string(),
            });
        }
        self.ensure_active()?;
        let request = ToolRequest::parse(tool, args)?;

        let _gate = self.gate.lock().await;
        // cleanup may have won the gate while we waited
        self.ensure_active()?;

        if needs_browser(tool) {
            self.ensure_browser().await?;
        }
        self.dispatch(tool, request).await
    }

    fn ensure_active(&self) -> Result<(), ToolError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(ToolError::NotActive {
                sandbox_id: self.sandbox_id.clone(),
            })
        }
    }

    /// Bring up the vendor browser on first use. Caller holds the gate.
    async fn ensure_browser(&self) -> Result<(), ToolError> {
        if self.browser_ready.load(Ordering::Acquire) {
            return Ok(());
        }
        let id = self.sandbox_id.as_str();
        let ready = match self.provider.browser_initialized(id).await {
            Ok(true) => true,
            Ok(false) | Err(_) => match self.provider.browser_initialize(id).await {
                Ok(ready) => ready,
                Err(e) => {
                    tracing::warn!(sandbox_id = %id, "browser initialization failed: {e:#}");
                    false
                }
            },
        };
        if !ready {
            return Err(ToolError::BrowserInit);
        }
        self.browser_ready.store(true, Ordering::Release);
        tracing::info!(sandbox_id = %id, "browser initialized");
        Ok(())
    }

    async fn dispatch(&self, tool: SandboxTool, request: ToolRequest) -> Result<ToolResult, ToolError> {
        let id = self.sandbox_id.as_str();
        let p = &self.provider;
        let vendor = |e: anyhow::Error| ToolError::Vendor {
            tool: tool.name(),
            message: format!("{e:#}"),
        };

        let result = match request {
            ToolRequest::ShellCommand { command } => {
                let out = p.execute_command(id, &command).await.map_err(vendor)?;
                if out.success && out.exit_code == 0 {
                    ToolResult::ok()
                        .with_output(out.output)
                        .with_exit_code(out.exit_code)
                } else {
                    let error = out
                        .error
                        .filter(|e| !e.is_empty())
                        .unwrap_or_else(|| format!("Command exited with code {}", out.exit_code));
                    let mut result = ToolResult::failure(error).with_exit_code(out.exit_code);
                    if !out.output.is_empty() {
                        result = result.with_output(out.output);
                    }
                    result
                }
            }
            ToolRequest::Code { code, language } => {
                let output = p.run_code(id, &code, language).await.map_err(vendor)?;
                ToolResult::ok().with_output(output)
            }
            ToolRequest::ReadFile { path } => {
                let content = p.read_file(id, &path).await.map_err(vendor)?;
                ToolResult::ok().with_content(content)
            }
            ToolRequest::WriteFile { path, content } => {
                p.write_file(id, &path, &content).await.map_err(vendor)?;
                ToolResult::ok()
            }
            ToolRequest::ListDirectory { path } => {
                let entries = p.list_directory(id, &path).await.map_err(vendor)?;
                let data = serde_json::to_value(entries).map_err(|e| vendor(e.into()))?;
                ToolResult::ok().with_data(data)
            }
            ToolRequest::CreateDirectory { path } => {
                p.create_directory(id, &path).await.map_err(vendor)?;
                ToolResult::ok()
            }
            ToolRequest::MoveFile {
                source,
                destination,
            } => {
                p.move_file(id, &source, &destination)
                    .await
                    .map_err(vendor)?;
                ToolResult::ok()
            }
            ToolRequest::DeleteFile { path } => {
                p.delete_file(id, &path).await.map_err(vendor)?;
                ToolResult::ok()
            }
            ToolRequest::Screenshot(surface) => match p.screenshot(id, surface).await.map_err(vendor)? {
                Screenshot::Url(url) => ToolResult::ok().with_screenshot_url(url),
                Screenshot::Image(bytes) => ToolResult::ok().with_screenshot_bytes(&bytes),
            },
            ToolRequest::StartApp { surface, app_name } => {
                p.start_app(id, surface, &app_name).await.map_err(vendor)?;
                ToolResult::ok()
            }
            ToolRequest::StopApp { surface, app_name } => {
                p.stop_app(id, surface, &app_name).await.map_err(vendor)?;
                ToolResult::ok()
            }
            ToolRequest::InputText { surface, text } => {
                p.input_text(id, surface, &text).await.map_err(vendor)?;
                ToolResult::ok()
            }
            ToolRequest::WindowMaximize => {
                p.window_maximize(id).await.map_err(vendor)?;
                ToolResult::ok()
            }
            ToolRequest::WindowMinimize => {
                p.window_minimize(id).await.map_err(vendor)?;
                ToolResult::ok()
            }
            ToolRequest::Navigate { url } => {
                let message = p.browser_navigate(id, &url).await.map_err(vendor)?;
                ToolResult::ok().with_message(message)
            }
            ToolRequest::AgentNavigate { url } => {
                let message = p.browser_agent_navigate(id, &url).await.map_err(vendor)?;
                ToolResult::ok().with_message(message)
            }
            ToolRequest::Act { action } => {
                let outcome = p.browser_act(id, &action).await.map_err(vendor)?;
                if outcome.success {
                    ToolResult::ok().with_message(outcome.message)
                } else {
                    let error = outcome
                        .error
                        .filter(|e| !e.is_empty())
                        .unwrap_or_else(|| format!("Action failed: {action}"));
                    ToolResult::failure(error)
                }
            }
            ToolRequest::Extract { instruction } => {
                let data = p.browser_extract(id, &instruction).await.map_err(vendor)?;
                ToolResult::ok().with_data(data)
            }
            ToolRequest::Observe { instruction } => {
                let data = p.browser_observe(id, &instruction).await.map_err(vendor)?;
                ToolResult::ok().with_data(data)
            }
            ToolRequest::Tap { x, y } => {
                p.mobile_click(id, x, y).await.map_err(vendor)?;
                ToolResult::ok()
            }
            ToolRequest::Swipe(swipe) => {
                p.mobile_swipe(id, swipe).await.map_err(vendor)?;
                ToolResult::ok()
            }
            ToolRequest::SendKey(key) => {
                p.mobile_send_key(id, key).await.map_err(vendor)?;
                ToolResult::ok()
            }
        };
        Ok(result)
    }

    /// Vendor session info, including the live-view resource URL.
    pub async fn resource_info(&self) -> anyhow::Result<ResourceInfo> {
        self.provider.session_info(&self.sandbox_id).await
    }

    /// Delete the vendor session. Idempotent; the handle is marked cleaned
    /// even when the vendor call fails.
    pub async fn cleanup(&self) -> anyhow::Result<()> {
        let _gate = self.gate.lock().await;
        {
            let mut state = self.state.lock();
            if *state == HandleState::Cleaned {
                return Ok(());
            }
            *state = HandleState::Cleaned;
        }

        self.provider
            .delete_session(&self.sandbox_id)
            .await
            .with_context(|| {
                format!(
                    "failed to delete {} sandbox {}",
                    self.kind, self.sandbox_id
                )
            })?;
        tracing::info!(kind = %self.kind, sandbox_id = %self.sandbox_id, "sandbox cleaned up");
        Ok(())
    }
}

fn needs_browser(tool: SandboxTool) -> bool {
    tool == SandboxTool::BrowserScreenshot
        || matches!(tool.category(), ToolCategory::Browser | ToolCategory::Agent)
}
