use crate::sandbox::{SandboxKind, ToolDescriptor};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Tools listed per kind before the rest are summarized as "and N more".
const PREVIEW_TOOLS: usize = 5;

/// Build the system prompt for a multi-sandbox agent.
pub fn create_system_prompt(tools: &BTreeMap<SandboxKind, Vec<ToolDescriptor>>) -> String {
    let mut environments = String::new();
    for (i, kind) in tools.keys().enumerate() {
        let _ = writeln!(
            environments,
            "{}. **{}** sandbox - {}",
            i + 1,
            capitalize(kind.as_str()),
            kind.summary()
        );
    }

    let mut tools_list = String::new();
    for (kind, descriptors) in tools {
        let names: Vec<&str> = descriptors
            .iter()
            .take(PREVIEW_TOOLS)
            .map(|d| d.tool)
            .collect();
        let _ = write!(
            tools_list,
            "- **{}** sandbox: {}",
            kind.as_str().to_uppercase(),
            names.join(", ")
        );
        if descriptors.len() > PREVIEW_TOOLS {
            let _ = write!(tools_list, " and {} more", descriptors.len() - PREVIEW_TOOLS);
        }
        tools_list.push('\n');
    }

    let example = tools
        .values()
        .flat_map(|d| d.first())
        .map(|d| format!("`{}`", d.name))
        .take(2)
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "You are an AI assistant with access to {count} sandbox environments:\n\
         {environments}\n\
         Available tools are prefixed with the sandbox type (e.g., {example}).\n\n\
         **Important**: Sandboxes are created on-demand when you use their tools. \
         You don't need to worry about initialization - just use the appropriate \
         tool and the sandbox will be created automatically if needed.\n\n\
         When users ask you to do something:\n\
         1. Understand the task and determine which sandbox(es) are needed\n\
         2. Use the appropriate tools with the correct sandbox prefix\n\
         3. The sandbox will be automatically created when you first use its tools\n\
         4. You can use multiple sandboxes in sequence or parallel if needed\n\
         5. Always explain what you're doing and provide helpful responses\n\n\
         Available tools by sandbox:\n\
         {tools_list}\n\
         Remember:\n\
         - Tool names follow the pattern: `{{sandbox_type}}_{{tool_name}}`\n\
         - Choose the right sandbox based on the task (Linux for commands, Browser for web, etc.)\n\
         - Sandboxes are created automatically when needed - just use the tools\n\
         - You can coordinate multiple sandboxes to complete complex tasks\n\
         - Always provide clear feedback about what you're doing\n",
        count = tools.len(),
    )
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
