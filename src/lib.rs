//! boxbridge: on-demand remote sandboxes as LLM agent tools.
//!
//! A [`manager::SandboxManager`] lazily provisions one vendor session per
//! [`sandbox::SandboxKind`]; a [`tools::ToolRegistry`] binds every capability
//! of every enabled kind into a flat toolkit of `{kind}_{tool}` tools; an
//! [`agent::AgentService`] ties the toolkit to a conversation.

pub mod agent;
pub mod config;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod sandbox;
pub mod tools;

pub use agent::{AgentService, ChatAgent};
pub use config::Config;
pub use error::{ConfigurationError, ProvisioningError, ToolError};
pub use manager::SandboxManager;
pub use sandbox::{SandboxHandle, SandboxKind, SandboxProvider, ToolResult};
pub use tools::{ToolRegistry, Toolkit};
