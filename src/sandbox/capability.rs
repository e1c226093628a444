//! Static capability tables: which tools each sandbox kind exposes.
//!
//! Tool enumeration never touches the vendor. Every `(kind, tool)` pair the
//! agent can call is listed here, and [`SandboxTool`] is the closed set the
//! handle dispatches on.

use super::kind::SandboxKind;
use crate::error::ConfigurationError;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// Grouping used in listings and prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    File,
    Command,
    Code,
    Desktop,
    Browser,
    Agent,
    Ui,
    App,
    System,
}

impl ToolCategory {
    pub const ALL: [ToolCategory; 9] = [
        ToolCategory::File,
        ToolCategory::Command,
        ToolCategory::Code,
        ToolCategory::Desktop,
        ToolCategory::Browser,
        ToolCategory::Agent,
        ToolCategory::Ui,
        ToolCategory::App,
        ToolCategory::System,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolCategory::File => "file",
            ToolCategory::Command => "command",
            ToolCategory::Code => "code",
            ToolCategory::Desktop => "desktop",
            ToolCategory::Browser => "browser",
            ToolCategory::Agent => "agent",
            ToolCategory::Ui => "ui",
            ToolCategory::App => "app",
            ToolCategory::System => "system",
        }
    }
}

impl fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolCategory {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        ToolCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == needle)
            .ok_or_else(|| ConfigurationError::Invalid(format!("unknown tool category '{s}'")))
    }
}

/// Every tool any sandbox kind can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SandboxTool {
    RunShellCommand,
    RunIpythonCell,
    RunPythonCode,
    RunJavascriptCode,
    ReadFile,
    WriteFile,
    ListDirectory,
    CreateDirectory,
    MoveFile,
    DeleteFile,
    Screenshot,
    StartApp,
    StopApp,
    InputText,
    WindowMaximize,
    WindowMinimize,
    BrowserNavigate,
    BrowserClick,
    BrowserInput,
    BrowserAgentNavigate,
    BrowserAgentAct,
    BrowserAgentExtract,
    BrowserAgentObserve,
    BrowserScreenshot,
    MobileClick,
    MobileSwipe,
    MobileInputText,
    MobileSendKey,
    MobileStartApp,
    MobileStopApp,
    MobileScreenshot,
}

use SandboxTool::*;

const LINUX_TOOLS: &[SandboxTool] = &[
    ReadFile,
    WriteFile,
    ListDirectory,
    CreateDirectory,
    MoveFile,
    DeleteFile,
    RunShellCommand,
    RunIpythonCell,
    Screenshot,
];

const WINDOWS_TOOLS: &[SandboxTool] = &[
    ReadFile,
    WriteFile,
    ListDirectory,
    CreateDirectory,
    MoveFile,
    DeleteFile,
    RunShellCommand,
    StartApp,
    StopApp,
    InputText,
    WindowMaximize,
    WindowMinimize,
    Screenshot,
];

const BROWSER_TOOLS: &[SandboxTool] = &[
    ReadFile,
    WriteFile,
    ListDirectory,
    BrowserNavigate,
    BrowserClick,
    BrowserInput,
    BrowserAgentNavigate,
    BrowserAgentAct,
    BrowserAgentExtract,
    BrowserAgentObserve,
    BrowserScreenshot,
];

const MOBILE_TOOLS: &[SandboxTool] = &[
    ReadFile,
    WriteFile,
    ListDirectory,
    MobileClick,
    MobileSwipe,
    MobileInputText,
    MobileSendKey,
    MobileStartApp,
    MobileStopApp,
    MobileScreenshot,
];

const CODE_TOOLS: &[SandboxTool] = &[
    ReadFile,
    WriteFile,
    ListDirectory,
    CreateDirectory,
    MoveFile,
    DeleteFile,
    RunShellCommand,
    RunPythonCode,
    RunJavascriptCode,
];

const ALL_TOOLS: [SandboxTool; 31] = [
    RunShellCommand,
    RunIpythonCell,
    RunPythonCode,
    RunJavascriptCode,
    ReadFile,
    WriteFile,
    ListDirectory,
    CreateDirectory,
    MoveFile,
    DeleteFile,
    Screenshot,
    StartApp,
    StopApp,
    InputText,
    WindowMaximize,
    WindowMinimize,
    BrowserNavigate,
    BrowserClick,
    BrowserInput,
    BrowserAgentNavigate,
    BrowserAgentAct,
    BrowserAgentExtract,
    BrowserAgentObserve,
    BrowserScreenshot,
    MobileClick,
    MobileSwipe,
    MobileInputText,
    MobileSendKey,
    MobileStartApp,
    MobileStopApp,
    MobileScreenshot,
];

impl SandboxKind {
    /// Capability table for this kind.
    pub fn tools(self) -> &'static [SandboxTool] {
        match self {
            SandboxKind::Linux => LINUX_TOOLS,
            SandboxKind::Windows => WINDOWS_TOOLS,
            SandboxKind::Browser => BROWSER_TOOLS,
            SandboxKind::Mobile => MOBILE_TOOLS,
            SandboxKind::Code => CODE_TOOLS,
        }
    }

    pub fn supports(self, tool: SandboxTool) -> bool {
        self.tools().contains(&tool)
    }

    /// This kind's tools in one category, in table order.
    pub fn tools_in(self, category: ToolCategory) -> Vec<SandboxTool> {
        self.tools()
            .iter()
            .copied()
            .filter(|tool| tool.category() == category)
            .collect()
    }

    /// The tool that captures this kind's screen, if it has one.
    pub fn screenshot_tool(self) -> Option<SandboxTool> {
        match self {
            SandboxKind::Linux | SandboxKind::Windows => Some(Screenshot),
            SandboxKind::Browser => Some(BrowserScreenshot),
            SandboxKind::Mobile => Some(MobileScreenshot),
            SandboxKind::Code => None,
        }
    }
}

impl SandboxTool {
    pub fn all() -> &'static [SandboxTool] {
        &ALL_TOOLS
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ALL_TOOLS.into_iter().find(|tool| tool.name() == name)
    }

    /// Wire name, as the vendor and the agent see it.
    pub fn name(self) -> &'static str {
        match self {
            RunShellCommand => "run_shell_command",
            RunIpythonCell => "run_ipython_cell",
            RunPythonCode => "run_python_code",
            RunJavascriptCode => "run_javascript_code",
            ReadFile => "read_file",
            WriteFile => "write_file",
            ListDirectory => "list_directory",
            CreateDirectory => "create_directory",
            MoveFile => "move_file",
            DeleteFile => "delete_file",
            Screenshot => "screenshot",
            StartApp => "start_app",
            StopApp => "stop_app",
            InputText => "input_text",
            WindowMaximize => "window_maximize",
            WindowMinimize => "window_minimize",
            BrowserNavigate => "browser_navigate",
            BrowserClick => "browser_click",
            BrowserInput => "browser_input",
            BrowserAgentNavigate => "browser_agent_navigate",
            BrowserAgentAct => "browser_agent_act",
            BrowserAgentExtract => "browser_agent_extract",
            BrowserAgentObserve => "browser_agent_observe",
            BrowserScreenshot => "browser_screenshot",
            MobileClick => "mobile_click",
            MobileSwipe => "mobile_swipe",
            MobileInputText => "mobile_input_text",
            MobileSendKey => "mobile_send_key",
            MobileStartApp => "mobile_start_app",
            MobileStopApp => "mobile_stop_app",
            MobileScreenshot => "mobile_screenshot",
        }
    }

    pub fn category(self) -> ToolCategory {
        match self {
            ReadFile | WriteFile | ListDirectory | CreateDirectory | MoveFile | DeleteFile => {
                ToolCategory::File
            }
            RunShellCommand => ToolCategory::Command,
            RunIpythonCell | RunPythonCode | RunJavascriptCode => ToolCategory::Code,
            StartApp | StopApp | InputText | WindowMaximize | WindowMinimize => {
                ToolCategory::Desktop
            }
            BrowserNavigate | BrowserClick | BrowserInput => ToolCategory::Browser,
            BrowserAgentNavigate | BrowserAgentAct | BrowserAgentExtract
            | BrowserAgentObserve => ToolCategory::Agent,
            MobileClick | MobileSwipe | MobileInputText | MobileSendKey => ToolCategory::Ui,
            MobileStartApp | MobileStopApp => ToolCategory::App,
            Screenshot | BrowserScreenshot | MobileScreenshot => ToolCategory::System,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            RunShellCommand => "Run a shell command. Returns output and exit_code.",
            RunIpythonCell => "Run Python code in an IPython cell and return its result.",
            RunPythonCode => "Run a Python snippet and return its output.",
            RunJavascriptCode => "Run a JavaScript snippet and return its output.",
            ReadFile => "Read a file and return its content.",
            WriteFile => "Write content to a file, creating it if needed.",
            ListDirectory => "List the entries of a directory.",
            CreateDirectory => "Create a directory.",
            MoveFile => "Move or rename a file.",
            DeleteFile => "Delete a file.",
            Screenshot => "Capture the desktop screen. Returns a screenshot URL.",
            StartApp => "Start a desktop application by name or command line.",
            StopApp => "Stop a running desktop application.",
            InputText => "Type text into the focused desktop window.",
            WindowMaximize => "Maximize the active window.",
            WindowMinimize => "Minimize the active window.",
            BrowserNavigate => {
                "Open a URL in the browser. The browser is initialized on first use."
            }
            BrowserClick => "Click the page element matching a CSS selector.",
            BrowserInput => "Type text into the page element matching a CSS selector.",
            BrowserAgentNavigate => "Navigate to a URL through the browser agent.",
            BrowserAgentAct => "Perform a natural-language action on the current page.",
            BrowserAgentExtract => "Extract data from the current page following an instruction.",
            BrowserAgentObserve => "Describe page elements relevant to an instruction.",
            BrowserScreenshot => "Capture the browser page. Returns a base64 image.",
            MobileClick => "Tap the screen at the given coordinates.",
            MobileSwipe => "Swipe from one screen coordinate to another.",
            MobileInputText => "Type text into the focused input field.",
            MobileSendKey => {
                "Send a hardware key event (HOME, BACK, MENU, VOLUME_UP, VOLUME_DOWN, ENTER, POWER)."
            }
            MobileStartApp => "Start a mobile app by package name or launch command.",
            MobileStopApp => "Stop a running mobile app.",
            MobileScreenshot => "Capture the device screen. Returns a screenshot URL.",
        }
    }

    /// JSON Schema for the tool's arguments.
    pub fn parameters_schema(self) -> Value {
        match self {
            RunShellCommand => object(
                json!({ "command": string("Shell command to execute (e.g. 'ls -la /tmp')") }),
                &["command"],
            ),
            RunIpythonCell | RunPythonCode | RunJavascriptCode => {
                object(json!({ "code": string("Source code to execute") }), &["code"])
            }
            ReadFile | DeleteFile | CreateDirectory => {
                object(json!({ "path": string("Absolute path inside the sandbox") }), &["path"])
            }
            WriteFile => object(
                json!({
                    "path": string("Absolute path inside the sandbox"),
                    "content": string("Full file content to write"),
                }),
                &["path", "content"],
            ),
            ListDirectory => object(
                json!({ "path": string("Directory to list. Default: current directory") }),
                &[],
            ),
            MoveFile => object(
                json!({
                    "source": string("Path to move from"),
                    "destination": string("Path to move to"),
                }),
                &["source", "destination"],
            ),
            StartApp | StopApp | MobileStartApp | MobileStopApp => object(
                json!({ "app_name": string("Application name, package or launch command") }),
                &["app_name"],
            ),
            InputText | MobileInputText => {
                object(json!({ "text": string("Text to type") }), &["text"])
            }
            BrowserNavigate | BrowserAgentNavigate => {
                object(json!({ "url": string("URL to open") }), &["url"])
            }
            BrowserClick => object(
                json!({ "selector": string("CSS selector of the element") }),
                &["selector"],
            ),
            BrowserInput => object(
                json!({
                    "selector": string("CSS selector of the element"),
                    "text": string("Text to type"),
                }),
                &["selector", "text"],
            ),
            BrowserAgentAct => object(
                json!({ "action": string("Natural-language action, e.g. 'click the login button'") }),
                &["action"],
            ),
            BrowserAgentExtract | BrowserAgentObserve => object(
                json!({ "instruction": string("What to extract or observe on the page") }),
                &["instruction"],
            ),
            MobileClick => object(
                json!({
                    "x": integer("Horizontal screen coordinate"),
                    "y": integer("Vertical screen coordinate"),
                }),
                &["x", "y"],
            ),
            MobileSwipe => object(
                json!({
                    "start_x": integer("Start X coordinate"),
                    "start_y": integer("Start Y coordinate"),
                    "end_x": integer("End X coordinate"),
                    "end_y": integer("End Y coordinate"),
                    "duration_ms": integer("Swipe duration in milliseconds. Default: 300"),
                }),
                &["start_x", "start_y", "end_x", "end_y"],
            ),
            MobileSendKey => object(
                json!({
                    "key": {
                        "type": "string",
                        "description": "Key name. Default: HOME",
                        "enum": ["HOME", "BACK", "MENU", "VOLUME_UP", "VOLUME_DOWN", "ENTER", "POWER"]
                    }
                }),
                &[],
            ),
            Screenshot | WindowMaximize | WindowMinimize | BrowserScreenshot
            | MobileScreenshot => object(json!({}), &[]),
        }
    }
}

impl fmt::Display for SandboxTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn object(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn string(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

fn integer(description: &str) -> Value {
    json!({ "type": "integer", "description": description })
}

/// A tool as the agent sees it, derived from the capability table.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub kind: SandboxKind,
    #[serde(rename = "tool_name")]
    pub tool: &'static str,
    /// Agent-facing name: `{kind}_{tool}`.
    pub name: String,
    pub category: ToolCategory,
    pub description: String,
    pub parameters: Value,
    #[serde(skip)]
    pub(crate) sandbox_tool: SandboxTool,
}

impl ToolDescriptor {
    pub fn new(kind: SandboxKind, tool: SandboxTool) -> Self {
        Self {
            kind,
            tool: tool.name(),
            name: format!("{kind}_{}", tool.name()),
            category: tool.category(),
            description: format!(
                "Execute {tool} on the {kind} sandbox. {} The {kind} sandbox is created automatically on first use.",
                tool.description()
            ),
            parameters: tool.parameters_schema(),
            sandbox_tool: tool,
        }
    }

    pub fn sandbox_tool(&self) -> SandboxTool {
        self.sandbox_tool
    }
}

/// Descriptors for every tool of one kind, in table order.
pub fn describe(kind: SandboxKind) -> Vec<ToolDescriptor> {
    kind.tools()
        .iter()
        .map(|tool| ToolDescriptor::new(kind, *tool))
        .collect()
}

/// Like [`describe`], limited to one category.
pub fn describe_category(kind: SandboxKind, category: ToolCategory) -> Vec<ToolDescriptor> {
    kind.tools_in(category)
        .into_iter()
        .map(|tool| ToolDescriptor::new(kind, tool))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const FULL_FILE_TOOLS: [SandboxTool; 6] = [
        ReadFile,
        WriteFile,
        ListDirectory,
        CreateDirectory,
        MoveFile,
        DeleteFile,
    ];

    #[test]
    fn every_kind_has_tools() {
        for kind in SandboxKind::ALL {
            assert!(!kind.tools().is_empty(), "{kind} has no tools");
        }
    }

    #[test]
    fn tool_names_are_unique_and_resolvable() {
        let mut seen = HashSet::new();
        for tool in SandboxTool::all() {
            assert!(seen.insert(tool.name()), "duplicate {}", tool.name());
            assert_eq!(SandboxTool::from_name(tool.name()), Some(*tool));
        }
        assert_eq!(SandboxTool::from_name("rm_rf"), None);
    }

    #[test]
    fn kind_tables_have_no_duplicates() {
        for kind in SandboxKind::ALL {
            let unique: HashSet<_> = kind.tools().iter().collect();
            assert_eq!(unique.len(), kind.tools().len(), "{kind}");
        }
    }

    #[test]
    fn full_file_tools_are_shared_by_desktop_kinds() {
        for kind in [SandboxKind::Linux, SandboxKind::Windows, SandboxKind::Code] {
            for tool in FULL_FILE_TOOLS {
                assert!(kind.supports(tool), "{kind} missing {tool}");
            }
        }
        assert!(!SandboxKind::Browser.supports(DeleteFile));
    }

    #[test]
    fn screenshot_tool_belongs_to_its_kind() {
        for kind in SandboxKind::ALL {
            if let Some(tool) = kind.screenshot_tool() {
                assert!(kind.supports(tool));
            }
        }
        assert_eq!(SandboxKind::Code.screenshot_tool(), None);
    }

    #[test]
    fn schemas_list_required_fields_as_properties() {
        for tool in SandboxTool::all() {
            let schema = tool.parameters_schema();
            let props = schema["properties"].as_object().unwrap();
            for required in schema["required"].as_array().unwrap() {
                let key = required.as_str().unwrap();
                assert!(props.contains_key(key), "{tool}: {key}");
            }
        }
    }

    #[test]
    fn descriptor_uses_kind_prefix() {
        let descriptor = ToolDescriptor::new(SandboxKind::Linux, RunShellCommand);
        assert_eq!(descriptor.name, "linux_run_shell_command");
        assert_eq!(descriptor.tool, "run_shell_command");
        assert_eq!(descriptor.category, ToolCategory::Command);
    }

    #[test]
    fn category_filter_keeps_table_order() {
        assert_eq!(
            SandboxKind::Mobile.tools_in(ToolCategory::Ui),
            vec![MobileClick, MobileSwipe, MobileInputText, MobileSendKey]
        );
        assert_eq!(
            SandboxKind::Mobile.tools_in(ToolCategory::App),
            vec![MobileStartApp, MobileStopApp]
        );
        assert!(SandboxKind::Code.tools_in(ToolCategory::Browser).is_empty());

        let described = describe_category(SandboxKind::Mobile, ToolCategory::System);
        assert_eq!(described.len(), 1);
        assert_eq!(described[0].name, "mobile_mobile_screenshot");
    }

    #[test]
    fn categories_parse_case_insensitively() {
        assert_eq!("UI".parse::<ToolCategory>().unwrap(), ToolCategory::Ui);
        assert_eq!(" file ".parse::<ToolCategory>().unwrap(), ToolCategory::File);
        assert!("gpu".parse::<ToolCategory>().is_err());
        for category in ToolCategory::ALL {
            assert_eq!(category.to_string().parse::<ToolCategory>().unwrap(), category);
        }
    }
}
