//! Agent-facing tools.
//!
//! Every sandbox capability reaches the agent as a [`Tool`] in a [`Toolkit`].
//! [`ToolRegistry`] produces one [`SandboxBoundTool`] per `(kind, tool)` pair;
//! the bound tool provisions its sandbox on first use and renders the
//! sandbox's structured result into a [`ToolResponse`].

pub mod registry;
pub mod toolkit;
pub mod traits;

pub use registry::{RegisteredTool, SandboxBoundTool, ToolRegistry};
pub use toolkit::Toolkit;
pub use traits::{Tool, ToolResponse, ToolSpec};
