//! Typed tool arguments.
//!
//! The agent hands over loose JSON; each [`SandboxTool`] is parsed into a
//! [`ToolRequest`] before the vendor is touched, so argument mistakes surface
//! as [`ToolError::InvalidArgument`] naming the offending parameter.

use super::capability::SandboxTool;
use super::{CodeLanguage, Surface};
use crate::error::ToolError;
use serde_json::{Map, Value};

/// Default swipe duration when the agent does not pass one.
const DEFAULT_SWIPE_MS: u64 = 300;

/// Android hardware keys the mobile sandbox accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    Home,
    Back,
    Menu,
    VolumeUp,
    VolumeDown,
    Enter,
    Power,
}

impl KeyCode {
    /// Parse a key name case-insensitively; unknown names fall back to HOME.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "BACK" => KeyCode::Back,
            "MENU" => KeyCode::Menu,
            "VOLUME_UP" => KeyCode::VolumeUp,
            "VOLUME_DOWN" => KeyCode::VolumeDown,
            "ENTER" => KeyCode::Enter,
            "POWER" => KeyCode::Power,
            _ => KeyCode::Home,
        }
    }

    /// Android `KeyEvent` code.
    pub fn code(self) -> u32 {
        match self {
            KeyCode::Home => 3,
            KeyCode::Back => 4,
            KeyCode::VolumeUp => 24,
            KeyCode::VolumeDown => 25,
            KeyCode::Power => 26,
            KeyCode::Enter => 66,
            KeyCode::Menu => 82,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Swipe {
    pub start_x: i64,
    pub start_y: i64,
    pub end_x: i64,
    pub end_y: i64,
    pub duration_ms: u64,
}

/// Parsed arguments for one tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolRequest {
    ShellCommand { command: String },
    Code { code: String, language: CodeLanguage },
    ReadFile { path: String },
    WriteFile { path: String, content: String },
    ListDirectory { path: String },
    CreateDirectory { path: String },
    MoveFile { source: String, destination: String },
    DeleteFile { path: String },
    Screenshot(Surface),
    StartApp { surface: Surface, app_name: String },
    StopApp { surface: Surface, app_name: String },
    InputText { surface: Surface, text: String },
    WindowMaximize,
    WindowMinimize,
    Navigate { url: String },
    AgentNavigate { url: String },
    Act { action: String },
    Extract { instruction: String },
    Observe { instruction: String },
    Tap { x: i64, y: i64 },
    Swipe(Swipe),
    SendKey(KeyCode),
}

impl ToolRequest {
    pub fn parse(tool: SandboxTool, args: &Value) -> Result<Self, ToolError> {
        let empty = Map::new();
        let map = match args {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(ToolError::InvalidArgument {
                    tool: tool.name(),
                    parameter: "arguments",
                    reason: format!("expected a JSON object, got {}", json_type(other)),
                })
            }
        };
        let args = Args { tool, map };

        use SandboxTool::*;
        Ok(match tool {
            RunShellCommand => ToolRequest::ShellCommand {
                command: args.non_empty_str("command")?,
            },
            RunIpythonCell | RunPythonCode => ToolRequest::Code {
                code: args.required_str("code")?,
                language: CodeLanguage::Python,
            },
            RunJavascriptCode => ToolRequest::Code {
                code: args.required_str("code")?,
                language: CodeLanguage::Javascript,
            },
            ReadFile => ToolRequest::ReadFile {
                path: args.non_empty_str("path")?,
            },
            WriteFile => ToolRequest::WriteFile {
                path: args.non_empty_str("path")?,
                content: args.required_str("content")?,
            },
            ListDirectory => ToolRequest::ListDirectory {
                path: args.optional_str("path")?.unwrap_or_else(|| ".".to_string()),
            },
            CreateDirectory => ToolRequest::CreateDirectory {
                path: args.non_empty_str("path")?,
            },
            MoveFile => ToolRequest::MoveFile {
                source: args.non_empty_str("source")?,
                destination: args.non_empty_str("destination")?,
            },
            DeleteFile => ToolRequest::DeleteFile {
                path: args.non_empty_str("path")?,
            },
            Screenshot => ToolRequest::Screenshot(Surface::Desktop),
            MobileScreenshot => ToolRequest::Screenshot(Surface::Mobile),
            BrowserScreenshot => ToolRequest::Screenshot(Surface::Browser),
            StartApp => ToolRequest::StartApp {
                surface: Surface::Desktop,
                app_name: args.non_empty_str("app_name")?,
            },
            MobileStartApp => ToolRequest::StartApp {
                surface: Surface::Mobile,
                app_name: args.non_empty_str("app_name")?,
            },
            StopApp => ToolRequest::StopApp {
                surface: Surface::Desktop,
                app_name: args.non_empty_str("app_name")?,
            },
            MobileStopApp => ToolRequest::StopApp {
                surface: Surface::Mobile,
                app_name: args.non_empty_str("app_name")?,
            },
            InputText => ToolRequest::InputText {
                surface: Surface::Desktop,
                text: args.required_str("text")?,
            },
            MobileInputText => ToolRequest::InputText {
                surface: Surface::Mobile,
                text: args.required_str("text")?,
            },
            WindowMaximize => ToolRequest::WindowMaximize,
            WindowMinimize => ToolRequest::WindowMinimize,
            BrowserNavigate => ToolRequest::Navigate {
                url: args.non_empty_str("url")?,
            },
            BrowserAgentNavigate => ToolRequest::AgentNavigate {
                url: args.non_empty_str("url")?,
            },
            BrowserClick => ToolRequest::Act {
                action: format!(
                    "Click on the element with selector: {}",
                    args.non_empty_str("selector")?
                ),
            },
            BrowserInput => {
                let selector = args.non_empty_str("selector")?;
                let text = args.required_str("text")?;
                ToolRequest::Act {
                    action: format!("Type '{text}' into the element with selector: {selector}"),
                }
            }
            BrowserAgentAct => ToolRequest::Act {
                action: args.non_empty_str("action")?,
            },
            BrowserAgentExtract => ToolRequest::Extract {
                instruction: args.non_empty_str("instruction")?,
            },
            BrowserAgentObserve => ToolRequest::Observe {
                instruction: args.non_empty_str("instruction")?,
            },
            MobileClick => ToolRequest::Tap {
                x: args.required_int("x")?,
                y: args.required_int("y")?,
            },
            MobileSwipe => ToolRequest::Swipe(Swipe {
                start_x: args.required_int("start_x")?,
                start_y: args.required_int("start_y")?,
                end_x: args.required_int("end_x")?,
                end_y: args.required_int("end_y")?,
                duration_ms: args
                    .optional_int("duration_ms")?
                    .map(|ms| ms.max(0) as u64)
                    .unwrap_or(DEFAULT_SWIPE_MS),
            }),
            MobileSendKey => ToolRequest::SendKey(
                args.optional_str("key")?
                    .map(|name| KeyCode::from_name(&name))
                    .unwrap_or(KeyCode::Home),
            ),
        })
    }
}

struct Args<'a> {
    tool: SandboxTool,
    map: &'a Map<String, Value>,
}

impl Args<'_> {
    fn invalid(&self, parameter: &'static str, reason: impl Into<String>) -> ToolError {
        ToolError::InvalidArgument {
            tool: self.tool.name(),
            parameter,
            reason: reason.into(),
        }
    }

    fn optional_str(&self, key: &'static str) -> Result<Option<String>, ToolError> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.invalid(
                key,
                format!("expected a string, got {}", json_type(other)),
            )),
        }
    }

    fn required_str(&self, key: &'static str) -> Result<String, ToolError> {
        self.optional_str(key)?
            .ok_or_else(|| self.invalid(key, "missing required parameter"))
    }

    fn non_empty_str(&self, key: &'static str) -> Result<String, ToolError> {
        let value = self.required_str(key)?;
        if value.trim().is_empty() {
            return Err(self.invalid(key, "cannot be empty"));
        }
        Ok(value)
    }

    fn optional_int(&self, key: &'static str) -> Result<Option<i64>, ToolError> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.round() as i64))
                .map(Some)
                .ok_or_else(|| self.invalid(key, "number out of range")),
            Some(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| self.invalid(key, format!("expected an integer, got '{s}'"))),
            Some(other) => Err(self.invalid(
                key,
                format!("expected an integer, got {}", json_type(other)),
            )),
        }
    }

    fn required_int(&self, key: &'static str) -> Result<i64, ToolError> {
        self.optional_int(key)?
            .ok_or_else(|| self.invalid(key, "missing required parameter"))
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
