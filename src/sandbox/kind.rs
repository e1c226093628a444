//! Sandbox kinds: the closed set of environment categories a session can use.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category of remote sandbox. Selects the vendor image and capability table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxKind {
    Linux,
    Windows,
    Browser,
    Mobile,
    Code,
}

impl SandboxKind {
    pub const ALL: [SandboxKind; 5] = [
        SandboxKind::Linux,
        SandboxKind::Windows,
        SandboxKind::Browser,
        SandboxKind::Mobile,
        SandboxKind::Code,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SandboxKind::Linux => "linux",
            SandboxKind::Windows => "windows",
            SandboxKind::Browser => "browser",
            SandboxKind::Mobile => "mobile",
            SandboxKind::Code => "code",
        }
    }

    /// Vendor image used when no override is configured.
    pub fn default_image(self) -> &'static str {
        match self {
            SandboxKind::Linux => "linux_latest",
            SandboxKind::Windows => "windows_latest",
            SandboxKind::Browser => "browser_latest",
            SandboxKind::Mobile => "mobile_latest",
            SandboxKind::Code => "code_latest",
        }
    }

    /// One-line summary used in the agent's system prompt.
    pub fn summary(self) -> &'static str {
        match self {
            SandboxKind::Linux => "Linux desktop environment for command execution and file operations",
            SandboxKind::Windows => {
                "Windows desktop environment for application management and desktop automation"
            }
            SandboxKind::Browser => {
                "Browser automation environment for web navigation and interaction"
            }
            SandboxKind::Mobile => "Android device environment for mobile UI automation",
            SandboxKind::Code => "Code runner for shell, Python and JavaScript execution",
        }
    }
}

impl fmt::Display for SandboxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SandboxKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        SandboxKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == needle)
            .ok_or_else(|| ConfigurationError::UnknownKind { name: s.to_string() })
    }
}
