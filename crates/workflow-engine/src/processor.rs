//! The processing capability of a component
//!
//! A [`Processor`] does the actual work of a component: it reads the bound
//! inputs and the configuration from a [`ProcessContext`] and returns the
//! values for its output ports, or a [`ProcessingFailure`]. It never reports
//! failure by panicking; the component converts a panic into an error result
//! anyway, but processors should return failures explicitly.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::events::{EventSink, WorkflowEvent};
use crate::types::{is_bound, ComponentId, ConfigMap, PortValues};

/// Failure reported by a processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingFailure {
    /// Human-readable message
    pub message: String,
    /// Optional structured details (stack of causes, offending values, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ProcessingFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
        }
    }

    /// Attach structured details
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl std::fmt::Display for ProcessingFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ProcessingFailure {}

/// Outcome of a processor run: output values keyed by port name
pub type ProcessResult = std::result::Result<PortValues, ProcessingFailure>;

/// Forwards progress notifications of one component to the event sink
pub struct ProgressReporter {
    sink: Option<Arc<dyn EventSink>>,
    component_id: String,
    execution_id: String,
    last: AtomicU8,
}

impl ProgressReporter {
    pub(crate) fn new(
        sink: Arc<dyn EventSink>,
        component_id: &ComponentId,
        execution_id: &str,
    ) -> Self {
        Self {
            sink: Some(sink),
            component_id: component_id.to_string(),
            execution_id: execution_id.to_string(),
            last: AtomicU8::new(0),
        }
    }

    /// A reporter that only logs
    pub fn detached(component_id: &ComponentId) -> Self {
        Self {
            sink: None,
            component_id: component_id.to_string(),
            execution_id: String::new(),
            last: AtomicU8::new(0),
        }
    }

    /// Report progress as a percentage (clamped to 100)
    pub fn report(&self, progress: u8, message: Option<String>) {
        let progress = progress.min(100);
        self.last.store(progress, Ordering::Relaxed);
        log::debug!(
            "Component {} progress {}%{}",
            self.component_id,
            progress,
            message.as_deref().map(|m| format!(": {m}")).unwrap_or_default()
        );
        let Some(sink) = &self.sink else {
            return;
        };
        let event = WorkflowEvent::component_progress(
            &self.component_id,
            &self.execution_id,
            progress,
            message,
        );
        if let Err(e) = sink.send(event) {
            log::warn!("Dropped progress event for {}: {}", self.component_id, e);
        }
    }

    /// The most recently reported percentage, 0 if nothing was reported
    pub fn last_reported(&self) -> u8 {
        self.last.load(Ordering::Relaxed)
    }
}

/// Everything a processor may look at while it runs
pub struct ProcessContext<'a> {
    component_id: &'a ComponentId,
    config: &'a ConfigMap,
    inputs: &'a PortValues,
    progress: &'a ProgressReporter,
}

impl<'a> ProcessContext<'a> {
    pub fn new(
        component_id: &'a ComponentId,
        config: &'a ConfigMap,
        inputs: &'a PortValues,
        progress: &'a ProgressReporter,
    ) -> Self {
        Self {
            component_id,
            config,
            inputs,
            progress,
        }
    }

    pub fn component_id(&self) -> &ComponentId {
        self.component_id
    }

    pub fn config(&self) -> &ConfigMap {
        self.config
    }

    /// A single configuration entry
    pub fn config_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.config.get(key)
    }

    /// All bound input values
    pub fn inputs(&self) -> &PortValues {
        self.inputs
    }

    /// Value bound to an input port, if any
    pub fn input(&self, port: &str) -> Option<&serde_json::Value> {
        let value = self.inputs.get(port);
        if is_bound(value) {
            value
        } else {
            None
        }
    }

    /// Value bound to an input port, or a failure naming the port
    pub fn require_input(
        &self,
        port: &str,
    ) -> std::result::Result<&serde_json::Value, ProcessingFailure> {
        self.input(port)
            .ok_or_else(|| ProcessingFailure::new(format!("input '{port}' is not bound")))
    }

    /// Report progress to whoever observes the run
    pub fn report_progress(&self, progress: u8, message: Option<String>) {
        self.progress.report(progress, message);
    }
}

/// Processing capability of a component
///
/// `validate` and `cleanup` are optional extensions with no-op defaults.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Produce a value for every declared output port, or fail
    async fn process(&mut self, ctx: ProcessContext<'_>) -> ProcessResult;

    /// Component-specific configuration checks, reported by graph validation
    fn validate(&self, _config: &ConfigMap) -> Vec<String> {
        Vec::new()
    }

    /// Release any external resources held by the processor
    fn cleanup(&mut self) -> std::result::Result<(), ProcessingFailure> {
        Ok(())
    }
}

/// Synchronous closure-based processor
///
/// Wraps a closure for components whose work is a plain function of their
/// inputs and configuration.
pub struct FnProcessor<F> {
    func: F,
}

impl<F> FnProcessor<F>
where
    F: FnMut(&ProcessContext<'_>) -> ProcessResult + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> Processor for FnProcessor<F>
where
    F: FnMut(&ProcessContext<'_>) -> ProcessResult + Send + Sync,
{
    async fn process(&mut self, ctx: ProcessContext<'_>) -> ProcessResult {
        (self.func)(&ctx)
    }
}
