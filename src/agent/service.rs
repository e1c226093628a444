//! The agent service: one conversation, one sandbox session.

use super::api::{
    CreateSandboxResponse, ResourceUrlResponse, SandboxResourceEvent, SandboxToolsResponse,
    ScreenshotResponse, ServiceEvent,
};
use super::prompt::create_system_prompt;
use super::{AgentChunk, AgentRequest, ChatAgent, ChatMessage};
use crate::config::Config;
use crate::error::ConfigurationError;
use crate::manager::{SandboxEvent, SandboxInfo, SandboxManager};
use crate::metrics::Metrics;
use crate::sandbox::{SandboxKind, SandboxProvider};
use crate::tools::{RegisteredTool, ToolRegistry, Toolkit};
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;

const EVENT_CAPACITY: usize = 64;

pub struct AgentService {
    agent: Arc<dyn ChatAgent>,
    manager: Arc<SandboxManager>,
    registry: ToolRegistry,
    toolkit: Arc<Toolkit>,
    system_prompt: Arc<str>,
    history: Mutex<Vec<ChatMessage>>,
    events: broadcast::Sender<ServiceEvent>,
    forwarder: JoinHandle<()>,
}

impl AgentService {
    /// Build the manager, bind the toolkit and start event forwarding.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(
        config: &Config,
        provider: Arc<dyn SandboxProvider>,
        agent: Arc<dyn ChatAgent>,
    ) -> Result<Self, ConfigurationError> {
        let metrics = Metrics::new()
            .map_err(|e| ConfigurationError::Invalid(format!("metrics registry: {e}")))?;
        Self::with_metrics(config, provider, agent, Arc::new(metrics))
    }

    pub fn with_metrics(
        config: &Config,
        provider: Arc<dyn SandboxProvider>,
        agent: Arc<dyn ChatAgent>,
        metrics: Arc<Metrics>,
    ) -> Result<Self, ConfigurationError> {
        let manager = Arc::new(SandboxManager::new(provider, config, metrics)?);
        let registry = ToolRegistry::for_manager(&manager);
        let toolkit = Arc::new(registry.build_toolkit(manager.clone())?);
        let system_prompt: Arc<str> = create_system_prompt(&registry.describe_all()).into();

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let forwarder = tokio::spawn(forward_events(
            Arc::downgrade(&manager),
            manager.subscribe(),
            events.clone(),
        ));

        tracing::info!(
            session_id = %manager.session_id(),
            tools = toolkit.len(),
            "agent service ready"
        );

        Ok(Self {
            agent,
            manager,
            registry,
            toolkit,
            system_prompt,
            history: Mutex::new(Vec::new()),
            events,
            forwarder,
        })
    }

    pub fn manager(&self) -> &Arc<SandboxManager> {
        &self.manager
    }

    pub fn toolkit(&self) -> &Arc<Toolkit> {
        &self.toolkit
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub async fn history(&self) -> Vec<ChatMessage> {
        self.history.lock().await.clone()
    }

    fn request(&self, history: Vec<ChatMessage>) -> AgentRequest {
        AgentRequest {
            system_prompt: self.system_prompt.clone(),
            history,
            toolkit: self.toolkit.clone(),
        }
    }

    /// Send a message and wait for the full reply.
    ///
    /// A failed reply leaves the history as it was before the call.
    pub async fn chat(&self, message: impl Into<String>) -> anyhow::Result<String> {
        let mut history = self.history.lock().await;
        history.push(ChatMessage::user(message));
        match self.agent.reply(self.request(history.clone())).await {
            Ok(reply) => {
                history.push(ChatMessage::assistant(reply.clone()));
                Ok(reply)
            }
            Err(e) => {
                history.pop();
                tracing::error!("chat failed: {e:#}");
                Err(e)
            }
        }
    }

    /// Send a message and stream the reply as incremental text.
    ///
    /// Snapshot chunks are converted to deltas. An agent error ends the
    /// stream with a final `Error: ...` chunk.
    pub fn chat_stream(&self, message: impl Into<String>) -> BoxStream<'_, String> {
        let start = StreamState::Start(message.into());
        Box::pin(stream::unfold(start, move |state| self.advance(state)))
    }

    async fn advance<'a>(&'a self, mut state: StreamState<'a>) -> Option<(String, StreamState<'a>)> {
        loop {
            state = match state {
                StreamState::Start(message) => {
                    let turn = Turn::begin(self.history.lock().await, message);
                    let chunks = self.agent.reply_stream(self.request(turn.history.clone()));
                    StreamState::Streaming {
                        chunks,
                        tracker: DeltaTracker::default(),
                        turn,
                    }
                }
                StreamState::Streaming {
                    mut chunks,
                    mut tracker,
                    turn,
                } => match chunks.next().await {
                    Some(Ok(chunk)) => {
                        let delta = tracker.push(chunk);
                        let next = StreamState::Streaming {
                            chunks,
                            tracker,
                            turn,
                        };
                        match delta {
                            Some(delta) => return Some((delta, next)),
                            None => next,
                        }
                    }
                    Some(Err(e)) => {
                        tracing::error!("chat stream failed: {e:#}");
                        // keep partial text; with none, the turn rolls back
                        if !tracker.text().is_empty() {
                            turn.commit(tracker.into_text());
                        }
                        return Some((format!("Error: {e}"), StreamState::Done));
                    }
                    None => {
                        turn.commit(tracker.into_text());
                        return None;
                    }
                },
                StreamState::Done => return None,
            };
        }
    }

    /// Provision a sandbox of the named kind ahead of any tool call.
    pub async fn create_sandbox(&self, kind: &str) -> CreateSandboxResponse {
        let kind: SandboxKind = match kind.parse() {
            Ok(kind) => kind,
            Err(_) => return CreateSandboxResponse::failure(format!("Invalid sandbox type: {kind}")),
        };
        match self.manager.ensure(kind).await {
            Ok(handle) => CreateSandboxResponse {
                success: true,
                sandbox_id: Some(handle.sandbox_id().to_string()),
                kind: Some(kind),
                image_id: Some(handle.image_id().to_string()),
                error: None,
            },
            Err(e) => {
                tracing::error!(kind = %kind, "error creating sandbox: {e}");
                CreateSandboxResponse::failure(e.to_string())
            }
        }
    }

    pub async fn get_screenshot(&self, sandbox_id: &str) -> ScreenshotResponse {
        let Some(handle) = self.manager.get_by_id(sandbox_id) else {
            return ScreenshotResponse::failure(format!("Sandbox {sandbox_id} not found."));
        };
        let kind = handle.kind();
        let Some(tool) = kind.screenshot_tool() else {
            return ScreenshotResponse::failure(format!(
                "Sandbox kind '{kind}' does not support screenshots"
            ));
        };

        let result = handle.call(tool, &serde_json::json!({})).await;
        if !result.success {
            return ScreenshotResponse::failure(result.error_message());
        }
        ScreenshotResponse {
            success: true,
            screenshot: result.screenshot,
            screenshot_url: result.screenshot_url,
            sandbox_id: Some(sandbox_id.to_string()),
            kind: Some(kind),
            error: None,
        }
    }

    pub async fn get_resource_url(&self, sandbox_id: &str) -> ResourceUrlResponse {
        resource_url(&self.manager, sandbox_id).await
    }

    pub fn sandbox_info(&self) -> Vec<SandboxInfo> {
        self.manager.info()
    }

    pub fn tools_info(&self) -> BTreeMap<String, RegisteredTool> {
        self.registry.registered_tools()
    }

    /// The tools bound to one live sandbox's kind.
    pub fn tools_for_sandbox(&self, sandbox_id: &str) -> SandboxToolsResponse {
        let Some(kind) = self.manager.kind_of(sandbox_id) else {
            return SandboxToolsResponse::failure(format!("Sandbox {sandbox_id} not found"));
        };
        SandboxToolsResponse {
            success: true,
            sandbox_id: Some(sandbox_id.to_string()),
            kind: Some(kind),
            tools: self.registry.registered_tools_for(kind),
            error: None,
        }
    }

    /// Provision every enabled kind up front. True if at least one came up.
    pub async fn provision_all(&self) -> bool {
        self.manager.ensure_all().await > 0
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServiceEvent> {
        self.events.subscribe()
    }

    /// Service events as a stream, for server-sent-event style consumers.
    /// Events missed by a slow consumer are skipped.
    pub fn event_stream(&self) -> impl Stream<Item = ServiceEvent> + Send + 'static {
        BroadcastStream::new(self.events.subscribe()).filter_map(|event| async move {
            match event {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::warn!("event stream lagged: {e}");
                    None
                }
            }
        })
    }

    /// Tear down every sandbox of this session.
    pub async fn cleanup(&self) {
        self.manager.cleanup_all().await;
        tracing::info!(session_id = %self.manager.session_id(), "agent service cleaned up");
    }
}

impl Drop for AgentService {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

async fn resource_url(manager: &SandboxManager, sandbox_id: &str) -> ResourceUrlResponse {
    let Some(handle) = manager.get_by_id(sandbox_id) else {
        return ResourceUrlResponse::failure(format!("Sandbox {sandbox_id} not found."));
    };
    match handle.resource_info().await {
        Ok(info) => ResourceUrlResponse {
            success: true,
            resource_url: Some(info.resource_url),
            sandbox_id: Some(if info.session_id.is_empty() {
                sandbox_id.to_string()
            } else {
                info.session_id
            }),
            resource_id: info.resource_id,
            app_id: info.app_id,
            resource_type: info.resource_type,
            kind: Some(handle.kind()),
            error: None,
        },
        Err(e) => {
            tracing::warn!(sandbox_id = %sandbox_id, "error getting resource url: {e:#}");
            ResourceUrlResponse::failure(format!("{e:#}"))
        }
    }
}

/// Turn manager lifecycle events into service events, fetching live-view
/// details for new sandboxes.
async fn forward_events(
    manager: Weak<SandboxManager>,
    mut rx: broadcast::Receiver<SandboxEvent>,
    tx: broadcast::Sender<ServiceEvent>,
) {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "sandbox event listener lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        let service_event = match event {
            SandboxEvent::Created {
                sandbox_id,
                kind,
                image_id,
            } => {
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                let info = resource_url(&manager, &sandbox_id).await;
                ServiceEvent::SandboxResource(SandboxResourceEvent {
                    sandbox_id,
                    kind,
                    image_id,
                    resource_url: info.resource_url,
                    resource_id: info.resource_id,
                    app_id: info.app_id,
                    resource_type: info.resource_type,
                    error: info.error,
                })
            }
            SandboxEvent::CleanedUp { sandbox_id, kind } => {
                ServiceEvent::SandboxCleaned { sandbox_id, kind }
            }
        };
        // no subscribers is fine
        let _ = tx.send(service_event);
    }
}

enum StreamState<'a> {
    Start(String),
    Streaming {
        chunks: BoxStream<'a, anyhow::Result<AgentChunk>>,
        tracker: DeltaTracker,
        turn: Turn<'a>,
    },
    Done,
}

/// A user message awaiting its reply. Dropped without [`Turn::commit`], it
/// removes the user message again, so an abandoned or failed stream leaves
/// the history as it was.
struct Turn<'a> {
    history: MutexGuard<'a, Vec<ChatMessage>>,
    committed: bool,
}

impl<'a> Turn<'a> {
    fn begin(mut history: MutexGuard<'a, Vec<ChatMessage>>, message: String) -> Self {
        history.push(ChatMessage::user(message));
        Self {
            history,
            committed: false,
        }
    }

    fn commit(mut self, reply: String) {
        self.history.push(ChatMessage::assistant(reply));
        self.committed = true;
    }
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.history.pop();
        }
    }
}

/// Converts a mix of snapshot and delta chunks into deltas.
#[derive(Debug, Default)]
struct DeltaTracker {
    /// Text of the snapshot currently being extended.
    current: String,
    /// Everything emitted so far.
    full: String,
}

impl DeltaTracker {
    fn push(&mut self, chunk: AgentChunk) -> Option<String> {
        let delta = match chunk {
            AgentChunk::Delta(delta) => {
                self.current.push_str(&delta);
                delta
            }
            AgentChunk::Snapshot(snapshot) => {
                if snapshot == self.current {
                    return None;
                }
                let delta = match snapshot.strip_prefix(self.current.as_str()) {
                    Some(rest) => rest.to_string(),
                    // discontinuous: a new message started
                    None => snapshot.clone(),
                };
                self.current = snapshot;
                delta
            }
        };
        if delta.is_empty() {
            return None;
        }
        self.full.push_str(&delta);
        Some(delta)
    }

    fn text(&self) -> &str {
        &self.full
    }

    fn into_text(self) -> String {
        self.full
    }
}
