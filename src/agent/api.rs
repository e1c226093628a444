//! Response payloads returned by [`super::AgentService`].
//!
//! Shaped for a JSON front end: every payload carries `success`, and failures
//! carry `error` instead of the success fields.

use crate::sandbox::SandboxKind;
use crate::tools::RegisteredTool;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateSandboxResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<SandboxKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CreateSandboxResponse {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScreenshotResponse {
    pub success: bool,
    /// Base64-encoded image, when the vendor returned bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<SandboxKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScreenshotResponse {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceUrlResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<SandboxKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResourceUrlResponse {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Tools bound to one sandbox's kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SandboxToolsResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<SandboxKind>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tools: BTreeMap<String, RegisteredTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SandboxToolsResponse {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Live-view details published when a sandbox comes up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SandboxResourceEvent {
    pub sandbox_id: String,
    pub kind: SandboxKind,
    pub image_id: String,
    pub resource_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServiceEvent {
    SandboxResource(SandboxResourceEvent),
    SandboxCleaned {
        sandbox_id: String,
        kind: SandboxKind,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failures_omit_success_fields() {
        let value = serde_json::to_value(CreateSandboxResponse::failure("nope")).unwrap();
        assert_eq!(value, json!({"success": false, "error": "nope"}));
    }

    #[test]
    fn events_serialize_with_event_tag() {
        let event = ServiceEvent::SandboxCleaned {
            sandbox_id: "s-1".into(),
            kind: SandboxKind::Mobile,
        };
        assert_eq!(
            serde_json::to_value(event).unwrap(),
            json!({"event": "sandbox_cleaned", "data": {"sandbox_id": "s-1", "kind": "mobile"}})
        );
    }
}
