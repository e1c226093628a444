//! Scripted in-memory provider for unit tests.

use super::{
    ActOutcome, CodeLanguage, CommandOutput, FileEntry, KeyCode, ResourceInfo, SandboxProvider,
    Screenshot, Surface, Swipe,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
pub(crate) struct FakeProvider {
    create_delay: Option<Duration>,
    call_delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    creates: AtomicUsize,
    browser_inits: AtomicUsize,
    fail_create: AtomicBool,
    fail_delete: AtomicBool,
    fail_browser_init: AtomicBool,
    browser_ready: AtomicBool,
    deleted: Mutex<Vec<String>>,
    files: Mutex<HashMap<String, String>>,
}

impl FakeProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Sleep inside `create_session`, widening the window for races.
    pub(crate) fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = Some(delay);
        self
    }

    /// Sleep inside command execution and browser startup, so overlapping
    /// calls show up in [`Self::max_in_flight`].
    pub(crate) fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = Some(delay);
        self
    }

    /// Most vendor operations observed running at once.
    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn work(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.call_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_browser_init(&self, fail: bool) {
        self.fail_browser_init.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub(crate) fn browser_init_count(&self) -> usize {
        self.browser_inits.load(Ordering::SeqCst)
    }

    pub(crate) fn deleted(&self) -> Vec<String> {
        self.deleted.lock().clone()
    }
}

#[async_trait]
impl SandboxProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn create_session(
        &self,
        image_id: &str,
        _labels: &BTreeMap<String, String>,
    ) -> anyhow::Result<String> {
        if let Some(delay) = self.create_delay {
            tokio::time::sleep(delay).await;
        }
        let n = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        anyhow::ensure!(!self.fail_create.load(Ordering::SeqCst), "quota exceeded");
        Ok(format!("{image_id}-{n}"))
    }

    async fn delete_session(&self, session_id: &str) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.fail_delete.load(Ordering::SeqCst),
            "vendor unavailable"
        );
        self.deleted.lock().push(session_id.to_string());
        Ok(())
    }

    async fn session_info(&self, session_id: &str) -> anyhow::Result<ResourceInfo> {
        Ok(ResourceInfo {
            session_id: session_id.to_string(),
            resource_url: format!("https://live.test/{session_id}"),
            resource_id: Some(format!("res-{session_id}")),
            app_id: None,
            resource_type: Some("desktop".into()),
        })
    }

    async fn execute_command(
        &self,
        session_id: &str,
        command: &str,
    ) -> anyhow::Result<CommandOutput> {
        self.work().await;
        anyhow::ensure!(
            !self.deleted.lock().iter().any(|id| id == session_id),
            "session {session_id} not found"
        );
        if let Some(text) = command.strip_prefix("echo ") {
            return Ok(CommandOutput {
                success: true,
                output: format!("{text}\n"),
                error: None,
                exit_code: 0,
            });
        }
        if let Some(code) = command.strip_prefix("exit ") {
            let exit_code = code.trim().parse().unwrap_or(1);
            return Ok(CommandOutput {
                success: exit_code == 0,
                output: String::new(),
                error: None,
                exit_code,
            });
        }
        Ok(CommandOutput {
            success: true,
            ..CommandOutput::default()
        })
    }

    async fn run_code(
        &self,
        _session_id: &str,
        code: &str,
        language: CodeLanguage,
    ) -> anyhow::Result<String> {
        Ok(format!("[{}] {code}", language.as_str()))
    }

    async fn read_file(&self, _session_id: &str, path: &str) -> anyhow::Result<String> {
        self.files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("No such file: {path}"))
    }

    async fn write_file(&self, _session_id: &str, path: &str, content: &str) -> anyhow::Result<()> {
        self.files
            .lock()
            .insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn list_directory(&self, _session_id: &str, path: &str) -> anyhow::Result<Vec<FileEntry>> {
        let prefix = path.trim_end_matches('/');
        let mut entries: Vec<FileEntry> = self
            .files
            .lock()
            .iter()
            .filter_map(|(file, content)| {
                let rest = file.strip_prefix(prefix)?.trim_start_matches('/');
                (!rest.is_empty() && !rest.contains('/')).then(|| FileEntry {
                    name: rest.to_string(),
                    is_directory: false,
                    size: Some(content.len() as u64),
                })
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn create_directory(&self, _session_id: &str, _path: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn move_file(&self, _session_id: &str, source: &str, destination: &str) -> anyhow::Result<()> {
        let mut files = self.files.lock();
        let content = files
            .remove(source)
            .ok_or_else(|| anyhow::anyhow!("No such file: {source}"))?;
        files.insert(destination.to_string(), content);
        Ok(())
    }

    async fn delete_file(&self, _session_id: &str, path: &str) -> anyhow::Result<()> {
        self.files.lock().remove(path);
        Ok(())
    }

    async fn screenshot(&self, session_id: &str, surface: Surface) -> anyhow::Result<Screenshot> {
        Ok(match surface {
            Surface::Browser => Screenshot::Image(b"png".to_vec()),
            Surface::Desktop | Surface::Mobile => {
                Screenshot::Url(format!("https://shots.test/{session_id}.png"))
            }
        })
    }

    async fn start_app(&self, _: &str, _: Surface, _: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn stop_app(&self, _: &str, _: Surface, _: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn input_text(&self, _: &str, _: Surface, _: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn window_maximize(&self, _: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn window_minimize(&self, _: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn mobile_click(&self, _: &str, _: i64, _: i64) -> anyhow::Result<()> {
        Ok(())
    }

    async fn mobile_swipe(&self, _: &str, _: Swipe) -> anyhow::Result<()> {
        Ok(())
    }

    async fn mobile_send_key(&self, _: &str, _: KeyCode) -> anyhow::Result<()> {
        Ok(())
    }

    async fn browser_initialized(&self, _: &str) -> anyhow::Result<bool> {
        Ok(self.browser_ready.load(Ordering::SeqCst))
    }

    async fn browser_initialize(&self, _: &str) -> anyhow::Result<bool> {
        self.browser_inits.fetch_add(1, Ordering::SeqCst);
        self.work().await;
        if self.fail_browser_init.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.browser_ready.store(true, Ordering::SeqCst);
        Ok(true)
    }

    async fn browser_navigate(&self, _: &str, url: &str) -> anyhow::Result<String> {
        Ok(format!("Navigated to {url}"))
    }

    async fn browser_agent_navigate(&self, _: &str, url: &str) -> anyhow::Result<String> {
        Ok(format!("Agent navigated to {url}"))
    }

    async fn browser_act(&self, _: &str, action: &str) -> anyhow::Result<ActOutcome> {
        Ok(ActOutcome {
            success: true,
            message: format!("Done: {action}"),
            error: None,
        })
    }

    async fn browser_extract(&self, _: &str, instruction: &str) -> anyhow::Result<Value> {
        Ok(json!({ "instruction": instruction, "items": [] }))
    }

    async fn browser_observe(&self, _: &str, _: &str) -> anyhow::Result<Value> {
        Ok(json!([{ "selector": "#main", "description": "main content" }]))
    }
}
