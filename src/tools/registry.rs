//! Binds every `(kind, tool)` pair into an agent tool named `{kind}_{tool}`.
//!
//! Binding is static: descriptors come from the capability tables, so building
//! a toolkit never touches the vendor. The sandbox behind a bound tool is
//! provisioned the first time the agent calls it.

use super::toolkit::Toolkit;
use super::traits::{Tool, ToolResponse};
use crate::error::ConfigurationError;
use crate::manager::SandboxManager;
use crate::sandbox::capability::{describe, describe_category, ToolCategory, ToolDescriptor};
use crate::sandbox::SandboxKind;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Summary of one bound tool, keyed by its full name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisteredTool {
    pub kind: SandboxKind,
    pub tool: &'static str,
    pub description: String,
}

impl RegisteredTool {
    fn entry(descriptor: ToolDescriptor) -> (String, Self) {
        (
            descriptor.name,
            Self {
                kind: descriptor.kind,
                tool: descriptor.tool,
                description: descriptor.description,
            },
        )
    }
}

#[derive(Debug, Clone)]
pub struct ToolRegistry {
    kinds: Vec<SandboxKind>,
}

impl ToolRegistry {
    pub fn new(kinds: &[SandboxKind]) -> Self {
        let mut unique = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            if !unique.contains(&kind) {
                unique.push(kind);
            }
        }
        Self { kinds: unique }
    }

    /// Registry over every kind the manager has enabled.
    pub fn for_manager(manager: &SandboxManager) -> Self {
        Self::new(manager.enabled_kinds())
    }

    pub fn kinds(&self) -> &[SandboxKind] {
        &self.kinds
    }

    /// Tool descriptors for every kind. No vendor session is created.
    pub fn describe_all(&self) -> BTreeMap<SandboxKind, Vec<ToolDescriptor>> {
        self.kinds
            .iter()
            .map(|&kind| (kind, describe(kind)))
            .collect()
    }

    /// Tool descriptors in one category. Kinds without such tools are left out.
    pub fn describe_category(
        &self,
        category: ToolCategory,
    ) -> BTreeMap<SandboxKind, Vec<ToolDescriptor>> {
        self.kinds
            .iter()
            .map(|&kind| (kind, describe_category(kind, category)))
            .filter(|(_, tools)| !tools.is_empty())
            .collect()
    }

    pub fn registered_tools(&self) -> BTreeMap<String, RegisteredTool> {
        self.kinds
            .iter()
            .flat_map(|&kind| describe(kind))
            .map(RegisteredTool::entry)
            .collect()
    }

    /// Registered tools bound to one kind. Empty if the kind is not registered.
    pub fn registered_tools_for(&self, kind: SandboxKind) -> BTreeMap<String, RegisteredTool> {
        if !self.kinds.contains(&kind) {
            return BTreeMap::new();
        }
        describe(kind).into_iter().map(RegisteredTool::entry).collect()
    }

    pub fn build_toolkit(&self, manager: Arc<SandboxManager>) -> Result<Toolkit, ConfigurationError> {
        let mut toolkit = Toolkit::new();
        self.extend_toolkit(&mut toolkit, manager)?;
        Ok(toolkit)
    }

    /// Add the bound tools to an existing toolkit. Fails on the first name
    /// that collides with a tool already registered.
    pub fn extend_toolkit(
        &self,
        toolkit: &mut Toolkit,
        manager: Arc<SandboxManager>,
    ) -> Result<(), ConfigurationError> {
        for &kind in &self.kinds {
            if !manager.is_enabled(kind) {
                return Err(ConfigurationError::Invalid(format!(
                    "sandbox kind '{kind}' is not enabled in the session manager"
                )));
            }
        }
        for descriptors in self.describe_all().into_values() {
            for descriptor in descriptors {
                toolkit.register(Arc::new(SandboxBoundTool::new(descriptor, manager.clone())))?;
            }
        }
        tracing::debug!(tools = toolkit.len(), "sandbox tools bound");
        Ok(())
    }
}

/// Deferred invocation wrapper: provisions the sandbox on first call.
pub struct SandboxBoundTool {
    descriptor: ToolDescriptor,
    manager: Arc<SandboxManager>,
}

impl SandboxBoundTool {
    pub fn new(descriptor: ToolDescriptor, manager: Arc<SandboxManager>) -> Self {
        Self {
            descriptor,
            manager,
        }
    }

    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }
}

#[async_trait]
impl Tool for SandboxBoundTool {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn description(&self) -> &str {
        &self.descriptor.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.descriptor.parameters.clone()
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResponse> {
        let kind = self.descriptor.kind;
        let metrics = self.manager.metrics();

        let handle = match self.manager.ensure(kind).await {
            Ok(handle) => handle,
            Err(e) => {
                metrics.record_tool_call(kind.as_str(), self.descriptor.tool, false);
                return Ok(ToolResponse::failure(format!(
                    "Failed to create or access sandbox '{kind}': {e}. \
                     Please check the sandbox configuration."
                )));
            }
        };

        let result = handle.call(self.descriptor.sandbox_tool(), &args).await;
        metrics.record_tool_call(kind.as_str(), self.descriptor.tool, result.success);
        Ok(ToolResponse::from_result(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::metrics::Metrics;
    use crate::sandbox::testing::FakeProvider;
    use serde_json::json;
    use std::collections::HashSet;

    fn manager(provider: Arc<FakeProvider>) -> Arc<SandboxManager> {
        Arc::new(
            SandboxManager::new(provider, &Config::default(), Arc::new(Metrics::new().unwrap()))
                .unwrap(),
        )
    }

    #[test]
    fn describe_all_is_static_and_complete() {
        let registry = ToolRegistry::new(&SandboxKind::ALL);
        let all = registry.describe_all();
        assert_eq!(all.len(), SandboxKind::ALL.len());
        for (kind, tools) in &all {
            assert!(!tools.is_empty(), "{kind} has no tools");
            assert!(tools.iter().all(|d| d.kind == *kind));
        }
    }

    #[tokio::test]
    async fn toolkit_names_are_unique_and_prefixed() {
        let provider = Arc::new(FakeProvider::new());
        let mgr = manager(provider.clone());
        let registry = ToolRegistry::for_manager(&mgr);
        let toolkit = registry.build_toolkit(mgr.clone()).unwrap();

        let expected: usize = SandboxKind::ALL.iter().map(|k| k.tools().len()).sum();
        assert_eq!(toolkit.len(), expected);

        let names: HashSet<_> = toolkit.names().into_iter().collect();
        assert_eq!(names.len(), expected);
        assert!(names.contains("linux_run_shell_command"));
        assert!(names.contains("mobile_mobile_send_key"));
        assert_eq!(provider.create_count(), 0);
    }

    #[tokio::test]
    async fn first_call_provisions_then_reuses() {
        let provider = Arc::new(FakeProvider::new());
        let mgr = manager(provider.clone());
        let toolkit = ToolRegistry::for_manager(&mgr)
            .build_toolkit(mgr.clone())
            .unwrap();

        let response = toolkit
            .execute("linux_run_shell_command", json!({"command": "echo hi"}))
            .await;
        assert!(response.success, "{response:?}");
        assert_eq!(response.output, "Output:\nhi\n");

        toolkit
            .execute("linux_write_file", json!({"path": "/tmp/a", "content": "x"}))
            .await;
        assert_eq!(provider.create_count(), 1);
        assert_eq!(
            mgr.metrics()
                .tool_calls("linux", "run_shell_command", true),
            1
        );
        mgr.cleanup_all().await;
    }

    #[tokio::test]
    async fn provisioning_failure_is_a_failed_response() {
        let provider = Arc::new(FakeProvider::new());
        provider.set_fail_create(true);
        let mgr = manager(provider.clone());
        let toolkit = ToolRegistry::for_manager(&mgr)
            .build_toolkit(mgr.clone())
            .unwrap();

        let response = toolkit
            .execute("browser_browser_navigate", json!({"url": "https://example.com"}))
            .await;
        assert!(!response.success);
        assert!(response
            .output
            .contains("Failed to create or access sandbox 'browser'"));
        assert!(response.output.contains("quota exceeded"));
    }

    #[tokio::test]
    async fn collisions_with_existing_tools_fail_fast() {
        let mgr = manager(Arc::new(FakeProvider::new()));
        let registry = ToolRegistry::for_manager(&mgr);
        let mut toolkit = registry.build_toolkit(mgr.clone()).unwrap();
        let err = registry.extend_toolkit(&mut toolkit, mgr).unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateTool { .. }));
    }

    #[test]
    fn registry_rejects_kinds_the_manager_disabled() {
        let mut config = Config::default();
        config.sandbox.enabled_kinds = vec!["code".into()];
        let mgr = Arc::new(
            SandboxManager::new(
                Arc::new(FakeProvider::new()),
                &config,
                Arc::new(Metrics::new().unwrap()),
            )
            .unwrap(),
        );
        let err = ToolRegistry::new(&[SandboxKind::Linux])
            .build_toolkit(mgr)
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::Invalid(_)));
    }

    #[test]
    fn registered_tools_map_back_to_kind_and_tool() {
        let registry = ToolRegistry::new(&[SandboxKind::Mobile, SandboxKind::Mobile]);
        let tools = registry.registered_tools();
        assert_eq!(tools.len(), SandboxKind::Mobile.tools().len());
        let click = &tools["mobile_mobile_click"];
        assert_eq!(click.kind, SandboxKind::Mobile);
        assert_eq!(click.tool, "mobile_click");
    }

    #[test]
    fn registered_tools_for_one_kind() {
        let registry = ToolRegistry::new(&[SandboxKind::Linux, SandboxKind::Code]);
        let code = registry.registered_tools_for(SandboxKind::Code);
        assert_eq!(code.len(), SandboxKind::Code.tools().len());
        assert!(code.values().all(|t| t.kind == SandboxKind::Code));
        assert!(code.contains_key("code_run_python_code"));
        assert!(registry.registered_tools_for(SandboxKind::Mobile).is_empty());
    }

    #[test]
    fn describe_category_filters_and_drops_empty_kinds() {
        let registry = ToolRegistry::new(&SandboxKind::ALL);
        let browser = registry.describe_category(ToolCategory::Agent);
        assert_eq!(browser.keys().copied().collect::<Vec<_>>(), vec![SandboxKind::Browser]);
        assert!(browser[&SandboxKind::Browser]
            .iter()
            .all(|d| d.category == ToolCategory::Agent));

        let files = registry.describe_category(ToolCategory::File);
        assert_eq!(files.len(), SandboxKind::ALL.len());
    }
}
