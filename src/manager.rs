//! Per-session registry of live sandboxes.
//!
//! [`SandboxManager`] holds at most one [`SandboxHandle`] per [`SandboxKind`].
//! Handles are created on first `ensure` and torn down by `cleanup_all`.
//! Concurrent `ensure` calls for the same kind queue on a per-kind async slot
//! so the vendor sees a single creation request. Creation runs in its own
//! task: a caller that gives up waiting does not lose the vendor session, it
//! is still registered and `cleanup_all` deletes it.

use crate::config::Config;
use crate::error::{ConfigurationError, ProvisioningError};
use crate::metrics::Metrics;
use crate::sandbox::{SandboxHandle, SandboxKind, SandboxProvider};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use futures_util::future::join_all;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

const EVENT_CAPACITY: usize = 64;

/// Lifecycle notifications for observers (UI live views, logs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxEvent {
    Created {
        sandbox_id: String,
        kind: SandboxKind,
        image_id: String,
    },
    CleanedUp {
        sandbox_id: String,
        kind: SandboxKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxStatus {
    Active,
    NotInitialized,
}

/// Status line for one enabled kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SandboxInfo {
    pub kind: SandboxKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox_id: Option<String>,
    pub image_id: String,
    pub status: SandboxStatus,
    pub tools_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

pub struct SandboxManager {
    session_id: String,
    user_id: String,
    provider: Arc<dyn SandboxProvider>,
    kinds: Vec<SandboxKind>,
    images: HashMap<SandboxKind, String>,
    labels: BTreeMap<String, String>,
    slots: HashMap<SandboxKind, Arc<Mutex<()>>>,
    live: Arc<DashMap<SandboxKind, Arc<SandboxHandle>>>,
    by_id: Arc<DashMap<String, SandboxKind>>,
    events: broadcast::Sender<SandboxEvent>,
    metrics: Arc<Metrics>,
}

impl SandboxManager {
    pub fn new(
        provider: Arc<dyn SandboxProvider>,
        config: &Config,
        metrics: Arc<Metrics>,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let kinds = config.enabled_kinds()?;
        let images = kinds
            .iter()
            .map(|&kind| (kind, config.image_for(kind)))
            .collect();
        let slots = kinds
            .iter()
            .map(|&kind| (kind, Arc::new(Mutex::new(()))))
            .collect();
        let session_id = config
            .session
            .session_id
            .clone()
            .unwrap_or_else(|| format!("session-{}", uuid::Uuid::new_v4()));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        tracing::debug!(
            session_id = %session_id,
            provider = provider.name(),
            kinds = ?kinds,
            "sandbox manager ready"
        );

        Ok(Self {
            session_id,
            user_id: config.session.user_id.clone(),
            provider,
            kinds,
            images,
            labels: config.sandbox.labels.clone(),
            slots,
            live: Arc::new(DashMap::new()),
            by_id: Arc::new(DashMap::new()),
            events,
            metrics,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn enabled_kinds(&self) -> &[SandboxKind] {
        &self.kinds
    }

    pub fn is_enabled(&self, kind: SandboxKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn image_for(&self, kind: SandboxKind) -> &str {
        self.images
            .get(&kind)
            .map(String::as_str)
            .unwrap_or_else(|| kind.default_image())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SandboxEvent> {
        self.events.subscribe()
    }

    /// Return the live handle for `kind`, creating the vendor session if none
    /// exists yet.
    pub async fn ensure(&self, kind: SandboxKind) -> Result<Arc<SandboxHandle>, ProvisioningError> {
        let slot = self
            .slots
            .get(&kind)
            .ok_or(ProvisioningError::KindDisabled { kind })?;

        if let Some(handle) = self.get(kind) {
            return Ok(handle);
        }

        let creating = slot.clone().lock_owned().await;
        // another caller may have finished creating while we waited
        if let Some(handle) = self.get(kind) {
            return Ok(handle);
        }

        let provisioning = self.provisioning(kind);
        tokio::spawn(async move {
            let _creating = creating;
            provisioning.run().await
        })
        .await
        .map_err(|e| ProvisioningError::Vendor {
            kind,
            message: format!("provisioning task failed: {e}"),
        })?
    }

    /// Provision every enabled kind concurrently. Failures are logged and
    /// skipped; returns how many kinds have a live sandbox afterwards.
    pub async fn ensure_all(&self) -> usize {
        tracing::info!(kinds = ?self.kinds, "provisioning all sandboxes");
        let results = join_all(self.kinds.iter().map(|&kind| async move {
            (kind, self.ensure(kind).await)
        }))
        .await;

        let mut ready = 0;
        for (kind, result) in results {
            match result {
                Ok(_) => ready += 1,
                Err(e) => tracing::warn!(kind = %kind, "skipping sandbox: {e}"),
            }
        }
        if ready == 0 {
            tracing::error!("no sandbox could be provisioned");
        }
        ready
    }

    fn provisioning(&self, kind: SandboxKind) -> Provisioning {
        let mut labels = self.labels.clone();
        labels.insert("session_id".into(), self.session_id.clone());
        labels.insert("user_id".into(), self.user_id.clone());
        labels.insert("sandbox_type".into(), kind.as_str().into());

        Provisioning {
            kind,
            image_id: self.image_for(kind).to_string(),
            labels,
            provider: self.provider.clone(),
            live: self.live.clone(),
            by_id: self.by_id.clone(),
            events: self.events.clone(),
            metrics: self.metrics.clone(),
        }
    }

    pub fn get(&self, kind: SandboxKind) -> Option<Arc<SandboxHandle>> {
        self.live.get(&kind).map(|entry| entry.value().clone())
    }

    pub fn get_by_id(&self, sandbox_id: &str) -> Option<Arc<SandboxHandle>> {
        self.kind_of(sandbox_id).and_then(|kind| self.get(kind))
    }

    pub fn kind_of(&self, sandbox_id: &str) -> Option<SandboxKind> {
        self.by_id.get(sandbox_id).map(|entry| *entry.value())
    }

    pub fn active_count(&self) -> usize {
        self.live.len()
    }

    /// One entry per enabled kind, in configured order.
    pub fn info(&self) -> Vec<SandboxInfo> {
        self.kinds
            .iter()
            .map(|&kind| {
                let handle = self.get(kind);
                SandboxInfo {
                    kind,
                    sandbox_id: handle.as_ref().map(|h| h.sandbox_id().to_string()),
                    image_id: handle
                        .as_ref()
                        .map(|h| h.image_id().to_string())
                        .unwrap_or_else(|| self.image_for(kind).to_string()),
                    status: if handle.is_some() {
                        SandboxStatus::Active
                    } else {
                        SandboxStatus::NotInitialized
                    },
                    tools_count: kind.tools().len(),
                    created_at: handle.as_ref().map(|h| h.created_at()),
                }
            })
            .collect()
    }

    /// Tear down every live sandbox. Failures are logged, never raised.
    pub async fn cleanup_all(&self) {
        for kind in self.kinds.iter().copied() {
            let Some(slot) = self.slots.get(&kind) else {
                continue;
            };
            let _creating = slot.lock().await;
            let Some((_, handle)) = self.live.remove(&kind) else {
                continue;
            };
            self.by_id.remove(handle.sandbox_id());

            if let Err(e) = handle.cleanup().await {
                tracing::warn!(
                    kind = %kind,
                    sandbox_id = %handle.sandbox_id(),
                    "sandbox cleanup failed: {e:#}"
                );
            }
            let _ = self.events.send(SandboxEvent::CleanedUp {
                sandbox_id: handle.sandbox_id().to_string(),
                kind,
            });
        }
    }
}

/// One vendor session creation plus its registration, detached from the
/// caller that asked for it.
struct Provisioning {
    kind: SandboxKind,
    image_id: String,
    labels: BTreeMap<String, String>,
    provider: Arc<dyn SandboxProvider>,
    live: Arc<DashMap<SandboxKind, Arc<SandboxHandle>>>,
    by_id: Arc<DashMap<String, SandboxKind>>,
    events: broadcast::Sender<SandboxEvent>,
    metrics: Arc<Metrics>,
}

impl Provisioning {
    async fn run(self) -> Result<Arc<SandboxHandle>, ProvisioningError> {
        let kind = self.kind;
        tracing::info!(kind = %kind, image_id = %self.image_id, "creating sandbox");
        let sandbox_id = self
            .provider
            .create_session(&self.image_id, &self.labels)
            .await
            .map_err(|e| {
                tracing::warn!(kind = %kind, "sandbox creation failed: {e:#}");
                ProvisioningError::Vendor {
                    kind,
                    message: format!("{e:#}"),
                }
            })?;
        if sandbox_id.trim().is_empty() {
            return Err(ProvisioningError::EmptySessionId { kind });
        }

        tracing::info!(kind = %kind, sandbox_id = %sandbox_id, "sandbox created");
        let handle = Arc::new(SandboxHandle::new(
            kind,
            sandbox_id,
            self.image_id,
            self.provider,
        ));
        self.by_id.insert(handle.sandbox_id().to_string(), kind);
        self.live.insert(kind, handle.clone());
        self.metrics.record_sandbox_created(kind.as_str());
        // no subscribers is fine
        let _ = self.events.send(SandboxEvent::Created {
            sandbox_id: handle.sandbox_id().to_string(),
            kind,
            image_id: handle.image_id().to_string(),
        });
        Ok(handle)
    }
}

impl Drop for SandboxManager {
    fn drop(&mut self) {
        if !self.live.is_empty() {
            tracing::warn!(
                session_id = %self.session_id,
                live = self.live.len(),
                "sandbox manager dropped with live sandboxes; call cleanup_all first"
            );
        }
    }
}
