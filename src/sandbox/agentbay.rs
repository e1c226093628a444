//! AgentBay sandbox provider: HTTP client for the AgentBay session API.
//!
//! Every session operation is a `POST /v1/sessions/{id}/{area}/{action}`
//! returning the same envelope: `{success, data, error_message}`. Session
//! lifecycle uses plain `POST`/`GET`/`DELETE` on `/v1/sessions`.

use super::{
    ActOutcome, CodeLanguage, CommandOutput, FileEntry, KeyCode, ResourceInfo, SandboxProvider,
    Screenshot, Surface, Swipe,
};
use crate::config::AgentBayConfig;
use anyhow::Context as _;
use async_trait::async_trait;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// Base URL for the AgentBay REST API.
pub const AGENTBAY_API_BASE: &str = "https://agentbay.aliyuncs.com";

/// Response wrapper shared by every AgentBay endpoint.
#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    error_message: Option<String>,
}

impl Envelope {
    fn error_text(&self) -> &str {
        self.error_message.as_deref().unwrap_or("unknown error")
    }
}

/// Shared HTTP client for AgentBay API calls.
pub struct AgentBayClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl AgentBayClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build reqwest client")?;

        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn from_config(config: &AgentBayConfig) -> anyhow::Result<Self> {
        Self::new(
            config.api_key.clone().unwrap_or_default(),
            config.base_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn session_url(&self, session_id: &str) -> String {
        format!(
            "{}/v1/sessions/{}",
            self.base_url,
            urlencoding::encode(session_id)
        )
    }

    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> anyhow::Result<Envelope> {
        let resp = request
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("AgentBay {what} request failed: {e}"))?;

        let status = resp.status();
        let body_text = resp
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable>".to_string());

        anyhow::ensure!(
            status.is_success(),
            "AgentBay API returned {status}: {body_text}"
        );

        if body_text.trim().is_empty() {
            return Ok(Envelope {
                success: true,
                ..Envelope::default()
            });
        }

        serde_json::from_str(&body_text).map_err(|e| {
            anyhow::anyhow!("Failed to parse AgentBay response: {e}\nBody: {body_text}")
        })
    }

    /// Run one session operation and return the raw envelope.
    async fn op_raw(
        &self,
        session_id: &str,
        area: &str,
        action: &str,
        body: Value,
    ) -> anyhow::Result<Envelope> {
        let url = format!("{}/{area}/{action}", self.session_url(session_id));
        self.send(self.http.post(&url).json(&body), &format!("{area}/{action}"))
            .await
    }

    /// Run one session operation; a `success: false` envelope is an error.
    async fn op(&self, session_id: &str, area: &str, action: &str, body: Value) -> anyhow::Result<Value> {
        let envelope = self.op_raw(session_id, area, action, body).await?;
        anyhow::ensure!(
            envelope.success,
            "AgentBay {area}/{action} failed: {}",
            envelope.error_text()
        );
        Ok(envelope.data)
    }

    async fn op_message(
        &self,
        session_id: &str,
        area: &str,
        action: &str,
        body: Value,
    ) -> anyhow::Result<String> {
        let data = self.op(session_id, area, action, body).await?;
        Ok(data["message"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| "ok".to_string()))
    }
}

#[async_trait]
impl SandboxProvider for AgentBayClient {
    fn name(&self) -> &str {
        "agentbay"
    }

    async fn create_session(
        &self,
        image_id: &str,
        labels: &BTreeMap<String, String>,
    ) -> anyhow::Result<String> {
        anyhow::ensure!(!self.api_key.is_empty(), "AgentBay API key is not set");

        let url = format!("{}/v1/sessions", self.base_url);
        let body = json!({
            "image_id": image_id,
            "labels": labels,
        });

        let envelope = self
            .send(self.http.post(&url).json(&body), "create session")
            .await?;
        anyhow::ensure!(
            envelope.success,
            "AgentBay create session failed: {}",
            envelope.error_text()
        );

        let session_id = envelope.data["session_id"]
            .as_str()
            .unwrap_or("")
            .to_string();
        anyhow::ensure!(
            !session_id.is_empty(),
            "AgentBay returned no session_id. Data: {}",
            envelope.data
        );
        Ok(session_id)
    }

    async fn delete_session(&self, session_id: &str) -> anyhow::Result<()> {
        let resp = self
            .http
            .delete(self.session_url(session_id))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("AgentBay delete request failed: {e}"))?;

        let status = resp.status();
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            let body_text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable>".to_string());
            anyhow::bail!("AgentBay API returned {status}: {body_text}")
        }
    }

    async fn session_info(&self, session_id: &str) -> anyhow::Result<ResourceInfo> {
        let envelope = self
            .send(self.http.get(self.session_url(session_id)), "session info")
            .await?;
        anyhow::ensure!(
            envelope.success,
            "AgentBay session info failed: {}",
            envelope.error_text()
        );
        let mut info: ResourceInfo = serde_json::from_value(envelope.data)
            .context("Failed to parse AgentBay session info")?;
        if info.session_id.is_empty() {
            info.session_id = session_id.to_string();
        }
        Ok(info)
    }

    async fn execute_command(
        &self,
        session_id: &str,
        command: &str,
    ) -> anyhow::Result<CommandOutput> {
        let envelope = self
            .op_raw(session_id, "command", "execute", json!({ "command": command }))
            .await?;
        let data = &envelope.data;
        Ok(CommandOutput {
            success: envelope.success,
            output: data["output"].as_str().unwrap_or("").to_string(),
            error: envelope
                .error_message
                .clone()
                .or_else(|| data["error"].as_str().map(str::to_string)),
            exit_code: data["exit_code"]
                .as_i64()
                .unwrap_or(if envelope.success { 0 } else { 1 }),
        })
    }

    async fn run_code(
        &self,
        session_id: &str,
        code: &str,
        language: CodeLanguage,
    ) -> anyhow::Result<String> {
        let data = self
            .op(
                session_id,
                "code",
                "run",
                json!({ "code": code, "language": language.as_str() }),
            )
            .await?;
        Ok(data["result"].as_str().unwrap_or("").to_string())
    }

    async fn read_file(&self, session_id: &str, path: &str) -> anyhow::Result<String> {
        let data = self
            .op(session_id, "filesystem", "read", json!({ "path": path }))
            .await?;
        Ok(data["content"].as_str().unwrap_or("").to_string())
    }

    async fn write_file(&self, session_id: &str, path: &str, content: &str) -> anyhow::Result<()> {
        self.op(
            session_id,
            "filesystem",
            "write",
            json!({ "path": path, "content": content }),
        )
        .await?;
        Ok(())
    }

    async fn list_directory(&self, session_id: &str, path: &str) -> anyhow::Result<Vec<FileEntry>> {
        let data = self
            .op(session_id, "filesystem", "list", json!({ "path": path }))
            .await?;
        let entries = data.get("entries").cloned().unwrap_or(Value::Array(vec![]));
        serde_json::from_value(entries).context("Failed to parse AgentBay directory listing")
    }

    async fn create_directory(&self, session_id: &str, path: &str) -> anyhow::Result<()> {
        self.op(session_id, "filesystem", "create_directory", json!({ "path": path }))
            .await?;
        Ok(())
    }

    async fn move_file(
        &self,
        session_id: &str,
        source: &str,
        destination: &str,
    ) -> anyhow::Result<()> {
        self.op(
            session_id,
            "filesystem",
            "move",
            json!({ "source": source, "destination": destination }),
        )
        .await?;
        Ok(())
    }

    async fn delete_file(&self, session_id: &str, path: &str) -> anyhow::Result<()> {
        self.op(session_id, "filesystem", "delete", json!({ "path": path }))
            .await?;
        Ok(())
    }

    async fn screenshot(&self, session_id: &str, surface: Surface) -> anyhow::Result<Screenshot> {
        let data = self
            .op(session_id, surface.as_str(), "screenshot", json!({}))
            .await?;
        if let Some(encoded) = data["image_base64"].as_str() {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .context("AgentBay returned an invalid base64 screenshot")?;
            return Ok(Screenshot::Image(bytes));
        }
        match data["url"].as_str() {
            Some(url) if !url.is_empty() => Ok(Screenshot::Url(url.to_string())),
            _ => anyhow::bail!("AgentBay returned no screenshot. Data: {data}"),
        }
    }

    async fn start_app(&self, session_id: &str, surface: Surface, app_name: &str) -> anyhow::Result<()> {
        self.op(session_id, surface.as_str(), "start_app", json!({ "app_name": app_name }))
            .await?;
        Ok(())
    }

    async fn stop_app(&self, session_id: &str, surface: Surface, app_name: &str) -> anyhow::Result<()> {
        self.op(session_id, surface.as_str(), "stop_app", json!({ "app_name": app_name }))
            .await?;
        Ok(())
    }

    async fn input_text(&self, session_id: &str, surface: Surface, text: &str) -> anyhow::Result<()> {
        self.op(session_id, surface.as_str(), "input_text", json!({ "text": text }))
            .await?;
        Ok(())
    }

    async fn window_maximize(&self, session_id: &str) -> anyhow::Result<()> {
        self.op(session_id, "computer", "window_maximize", json!({}))
            .await?;
        Ok(())
    }

    async fn window_minimize(&self, session_id: &str) -> anyhow::Result<()> {
        self.op(session_id, "computer", "window_minimize", json!({}))
            .await?;
        Ok(())
    }

    async fn mobile_click(&self, session_id: &str, x: i64, y: i64) -> anyhow::Result<()> {
        self.op(session_id, "mobile", "tap", json!({ "x": x, "y": y }))
            .await?;
        Ok(())
    }

    async fn mobile_swipe(&self, session_id: &str, swipe: Swipe) -> anyhow::Result<()> {
        self.op(
            session_id,
            "mobile",
            "swipe",
            json!({
                "start_x": swipe.start_x,
                "start_y": swipe.start_y,
                "end_x": swipe.end_x,
                "end_y": swipe.end_y,
                "duration_ms": swipe.duration_ms,
            }),
        )
        .await?;
        Ok(())
    }

    async fn mobile_send_key(&self, session_id: &str, key: KeyCode) -> anyhow::Result<()> {
        self.op(session_id, "mobile", "send_key", json!({ "key_code": key.code() }))
            .await?;
        Ok(())
    }

    async fn browser_initialized(&self, session_id: &str) -> anyhow::Result<bool> {
        let data = self.op(session_id, "browser", "status", json!({})).await?;
        Ok(data["initialized"].as_bool().unwrap_or(false))
    }

    async fn browser_initialize(&self, session_id: &str) -> anyhow::Result<bool> {
        let envelope = self
            .op_raw(session_id, "browser", "initialize", json!({}))
            .await?;
        Ok(envelope.success && envelope.data["initialized"].as_bool().unwrap_or(true))
    }

    async fn browser_navigate(&self, session_id: &str, url: &str) -> anyhow::Result<String> {
        self.op_message(session_id, "browser", "navigate", json!({ "url": url }))
            .await
    }

    async fn browser_agent_navigate(&self, session_id: &str, url: &str) -> anyhow::Result<String> {
        self.op_message(session_id, "browser", "agent_navigate", json!({ "url": url }))
            .await
    }

    async fn browser_act(&self, session_id: &str, action: &str) -> anyhow::Result<ActOutcome> {
        let envelope = self
            .op_raw(session_id, "browser", "act", json!({ "action": action }))
            .await?;
        let data = &envelope.data;
        let success = envelope.success && data["success"].as_bool().unwrap_or(true);
        Ok(ActOutcome {
            success,
            message: data["message"].as_str().unwrap_or("").to_string(),
            error: envelope
                .error_message
                .clone()
                .or_else(|| data["error"].as_str().map(str::to_string)),
        })
    }

    async fn browser_extract(&self, session_id: &str, instruction: &str) -> anyhow::Result<Value> {
        self.op(session_id, "browser", "extract", json!({ "instruction": instruction }))
            .await
    }

    async fn browser_observe(&self, session_id: &str, instruction: &str) -> anyhow::Result<Value> {
        self.op(session_id, "browser", "observe", json!({ "instruction": instruction }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> AgentBayClient {
        AgentBayClient::new("test-key", server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn create_session_sends_image_and_labels() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/sessions"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_json(json!({
                "image_id": "linux_latest",
                "labels": {"user_id": "alice"},
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"session_id": "s-123"},
            })))
            .expect(1)
            .mount(&server)
            .await;

        let labels = BTreeMap::from([("user_id".to_string(), "alice".to_string())]);
        let id = client(&server)
            .create_session("linux_latest", &labels)
            .await
            .unwrap();
        assert_eq!(id, "s-123");
    }

    #[tokio::test]
    async fn create_session_requires_api_key() {
        let server = MockServer::start().await;
        let client = AgentBayClient::new("", server.uri(), Duration::from_secs(5)).unwrap();
        let err = client
            .create_session("linux_latest", &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("API key is not set"));
    }

    #[tokio::test]
    async fn create_session_without_id_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/sessions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": {}})),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .create_session("code_latest", &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no session_id"));
    }

    #[tokio::test]
    async fn http_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/sessions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = client(&server)
            .create_session("code_latest", &BTreeMap::new())
            .await
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("503"), "{text}");
        assert!(text.contains("overloaded"), "{text}");
    }

    #[tokio::test]
    async fn delete_treats_not_found_as_success() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/sessions/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        client(&server).delete_session("gone").await.unwrap();
    }

    #[tokio::test]
    async fn execute_command_keeps_vendor_failure_as_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/sessions/s-1/command/execute"))
            .and(body_json(json!({"command": "false"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "data": {"output": "", "exit_code": 1},
                "error_message": "command failed",
            })))
            .mount(&server)
            .await;

        let out = client(&server).execute_command("s-1", "false").await.unwrap();
        assert!(!out.success);
        assert_eq!(out.exit_code, 1);
        assert_eq!(out.error.as_deref(), Some("command failed"));
    }

    #[tokio::test]
    async fn failed_envelope_becomes_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/sessions/s-1/filesystem/read"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "error_message": "No such file",
            })))
            .mount(&server)
            .await;

        let err = client(&server).read_file("s-1", "/nope").await.unwrap_err();
        assert!(err.to_string().contains("No such file"));
    }

    #[tokio::test]
    async fn list_directory_parses_entries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/sessions/s-1/filesystem/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"entries": [
                    {"name": "src", "is_directory": true},
                    {"name": "README.md", "is_directory": false, "size": 42},
                ]},
            })))
            .mount(&server)
            .await;

        let entries = client(&server).list_directory("s-1", "/app").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_directory);
        assert_eq!(entries[1].size, Some(42));
    }

    #[tokio::test]
    async fn screenshot_decodes_inline_image() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/sessions/s-1/browser/screenshot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"image_base64": "cG5n"},
            })))
            .mount(&server)
            .await;

        let shot = client(&server)
            .screenshot("s-1", Surface::Browser)
            .await
            .unwrap();
        assert_eq!(shot, Screenshot::Image(b"png".to_vec()));
    }

    #[tokio::test]
    async fn screenshot_prefers_hosted_url_when_no_image() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/sessions/s-1/mobile/screenshot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"url": "https://cdn.example/shot.png"},
            })))
            .mount(&server)
            .await;

        let shot = client(&server)
            .screenshot("s-1", Surface::Mobile)
            .await
            .unwrap();
        assert_eq!(shot, Screenshot::Url("https://cdn.example/shot.png".into()));
    }

    #[tokio::test]
    async fn send_key_uses_android_key_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/sessions/s-1/mobile/send_key"))
            .and(body_json(json!({"key_code": 4})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .mobile_send_key("s-1", KeyCode::Back)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn session_info_fills_missing_session_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/sessions/s-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"resource_url": "https://live.example/s-9", "app_id": "app"},
            })))
            .mount(&server)
            .await;

        let info = client(&server).session_info("s-9").await.unwrap();
        assert_eq!(info.session_id, "s-9");
        assert_eq!(info.resource_url, "https://live.example/s-9");
        assert_eq!(info.app_id.as_deref(), Some("app"));
    }
}
