//! Prometheus metrics for sandbox provisioning and tool calls.
//!
//! Metrics live on an owned [`Registry`] rather than the process-global one,
//! so several services (and tests) can coexist in one process.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    /// Vendor sessions created, by sandbox kind.
    sandboxes_created: IntCounterVec,
    /// Tool calls, by kind, tool and outcome (`success` / `failure`).
    tool_calls: IntCounterVec,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let sandboxes_created = IntCounterVec::new(
            Opts::new(
                "boxbridge_sandboxes_created_total",
                "Total vendor sandbox sessions created",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(sandboxes_created.clone()))?;

        let tool_calls = IntCounterVec::new(
            Opts::new("boxbridge_tool_calls_total", "Total sandbox tool calls"),
            &["kind", "tool", "outcome"],
        )?;
        registry.register(Box::new(tool_calls.clone()))?;

        Ok(Self {
            registry,
            sandboxes_created,
            tool_calls,
        })
    }

    pub fn record_sandbox_created(&self, kind: &str) {
        self.sandboxes_created.with_label_values(&[kind]).inc();
    }

    pub fn record_tool_call(&self, kind: &str, tool: &str, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.tool_calls
            .with_label_values(&[kind, tool, outcome])
            .inc();
    }

    pub fn sandboxes_created(&self, kind: &str) -> u64 {
        self.sandboxes_created.with_label_values(&[kind]).get()
    }

    pub fn tool_calls(&self, kind: &str, tool: &str, success: bool) -> u64 {
        let outcome = if success { "success" } else { "failure" };
        self.tool_calls
            .with_label_values(&[kind, tool, outcome])
            .get()
    }

    /// Render every metric in the Prometheus text exposition format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment_per_label_set() {
        let metrics = Metrics::new().unwrap();
        metrics.record_sandbox_created("linux");
        metrics.record_sandbox_created("linux");
        metrics.record_sandbox_created("browser");
        assert_eq!(metrics.sandboxes_created("linux"), 2);
        assert_eq!(metrics.sandboxes_created("browser"), 1);
        assert_eq!(metrics.sandboxes_created("mobile"), 0);
    }

    #[test]
    fn tool_calls_split_by_outcome() {
        let metrics = Metrics::new().unwrap();
        metrics.record_tool_call("code", "run_python_code", true);
        metrics.record_tool_call("code", "run_python_code", false);
        metrics.record_tool_call("code", "run_python_code", false);
        assert_eq!(metrics.tool_calls("code", "run_python_code", true), 1);
        assert_eq!(metrics.tool_calls("code", "run_python_code", false), 2);
    }

    #[test]
    fn encode_emits_text_format() {
        let metrics = Metrics::new().unwrap();
        metrics.record_sandbox_created("windows");
        let text = metrics.encode().unwrap();
        assert!(text.contains("boxbridge_sandboxes_created_total{kind=\"windows\"} 1"));
    }

    #[test]
    fn registries_are_independent() {
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.record_sandbox_created("code");
        assert_eq!(b.sandboxes_created("code"), 0);
    }
}
