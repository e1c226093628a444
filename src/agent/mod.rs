//! Agent-facing service layer.
//!
//! The LLM itself is behind the [`ChatAgent`] trait: it receives the system
//! prompt, the conversation so far and the sandbox [`Toolkit`], and answers
//! with text (whole or streamed). [`service::AgentService`] owns everything
//! else: conversation state, tool binding and sandbox lifecycle.

pub mod api;
pub mod prompt;
pub mod service;

pub use api::{
    CreateSandboxResponse, ResourceUrlResponse, SandboxResourceEvent, SandboxToolsResponse,
    ScreenshotResponse, ServiceEvent,
};
pub use prompt::create_system_prompt;
pub use service::AgentService;

use crate::tools::Toolkit;
use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One piece of a streamed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentChunk {
    /// The whole reply text so far.
    Snapshot(String),
    /// Only the new text.
    Delta(String),
}

/// Everything the agent needs to produce one reply.
#[derive(Clone)]
pub struct AgentRequest {
    pub system_prompt: Arc<str>,
    /// Conversation so far, ending with the new user message.
    pub history: Vec<ChatMessage>,
    pub toolkit: Arc<Toolkit>,
}

impl AgentRequest {
    /// The message being answered.
    pub fn latest_user_message(&self) -> Option<&str> {
        self.history
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// An LLM reasoning loop that may call tools from the request's toolkit.
#[async_trait]
pub trait ChatAgent: Send + Sync {
    async fn reply(&self, request: AgentRequest) -> anyhow::Result<String>;

    /// Streamed reply. Defaults to a single snapshot holding the full reply.
    fn reply_stream<'a>(&'a self, request: AgentRequest) -> BoxStream<'a, anyhow::Result<AgentChunk>> {
        Box::pin(stream::once(async move {
            self.reply(request).await.map(AgentChunk::Snapshot)
        }))
    }
}
