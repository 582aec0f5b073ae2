//! Components: the nodes of a workflow
//!
//! A [`Component`] owns its declared ports, the values currently bound to
//! them, its configuration and a boxed [`Processor`] that does the work.
//! Status moves `initialized → processing → (completed | error)`; a
//! component in `error` or `cleaned` must be [`reset`](Component::reset)
//! before it processes again.

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkflowError};
use crate::port::{Port, PortList};
use crate::processor::{ProcessContext, ProcessingFailure, Processor, ProgressReporter};
use crate::types::{
    is_bound, ComponentId, ComponentStatus, ConfigMap, PortDirection, PortType, PortValues,
};

/// Category of a per-component failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentErrorKind {
    /// A required input was not bound when the component was due to run
    MissingRequiredInput,
    /// The processor reported a failure
    Processing,
    /// The component was in `error` or `cleaned` and was not reset
    NotReady,
}

/// Error attached to a component's result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentError {
    pub kind: ComponentErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ComponentError {
    pub fn new(kind: ComponentErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }
}

impl std::fmt::Display for ComponentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<&WorkflowError> for ComponentError {
    fn from(err: &WorkflowError) -> Self {
        let kind = match err {
            WorkflowError::MissingRequiredInput { .. } => ComponentErrorKind::MissingRequiredInput,
            WorkflowError::ComponentNotReady { .. } => ComponentErrorKind::NotReady,
            _ => ComponentErrorKind::Processing,
        };
        Self::new(kind, err.to_string())
    }
}

/// Result record of one component in one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentResult {
    pub status: ComponentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ComponentError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<PortValues>,
}

impl ComponentResult {
    pub fn success(outputs: PortValues) -> Self {
        Self {
            status: ComponentStatus::Completed,
            error: None,
            outputs: Some(outputs),
        }
    }

    pub fn failure(error: ComponentError) -> Self {
        Self {
            status: ComponentStatus::Error,
            error: Some(error),
            outputs: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ComponentStatus::Completed
    }
}

/// State of one port as shown to the editor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortState {
    pub name: String,
    pub data_type: PortType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub required: bool,
    pub has_value: bool,
}

/// Serializable view of a component's current state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSnapshot {
    pub id: ComponentId,
    pub type_name: String,
    pub status: ComponentStatus,
    pub progress: u8,
    pub error: Option<String>,
    pub config: ConfigMap,
    pub input_ports: Vec<PortState>,
    pub output_ports: Vec<PortState>,
}

/// A processing node with declared ports, configuration and a processor
pub struct Component {
    instance_id: ComponentId,
    type_name: String,
    config: ConfigMap,
    inputs: PortList,
    outputs: PortList,
    input_values: PortValues,
    output_values: PortValues,
    required_inputs: HashSet<String>,
    status: ComponentStatus,
    progress: u8,
    last_error: Option<String>,
    processor: Box<dyn Processor>,
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("instance_id", &self.instance_id)
            .field("type_name", &self.type_name)
            .field("status", &self.status)
            .field("inputs", &self.inputs.names().collect::<Vec<_>>())
            .field("outputs", &self.outputs.names().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Component {
    /// Create a component with a freshly generated instance id
    pub fn new(type_name: impl Into<String>, processor: impl Processor + 'static) -> Self {
        Self::with_id(ComponentId::generate(), type_name, processor)
    }

    /// Create a component with a known instance id
    pub fn with_id(
        instance_id: impl Into<ComponentId>,
        type_name: impl Into<String>,
        processor: impl Processor + 'static,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            type_name: type_name.into(),
            config: ConfigMap::new(),
            inputs: PortList::default(),
            outputs: PortList::default(),
            input_values: PortValues::new(),
            output_values: PortValues::new(),
            required_inputs: HashSet::new(),
            status: ComponentStatus::Initialized,
            progress: 0,
            last_error: None,
            processor: Box::new(processor),
        }
    }

    /// Replace the configuration
    pub fn with_config(mut self, config: ConfigMap) -> Self {
        self.config = config;
        self
    }

    pub fn id(&self) -> &ComponentId {
        &self.instance_id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub(crate) fn set_type_name(&mut self, type_name: &str) {
        self.type_name = type_name.to_string();
    }

    pub fn config(&self) -> &ConfigMap {
        &self.config
    }

    /// Set one configuration entry, returning the previous value
    pub fn set_config_value(
        &mut self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Option<serde_json::Value> {
        self.config.insert(key.into(), value)
    }

    pub fn status(&self) -> ComponentStatus {
        self.status
    }

    /// Last known progress: 100 after success, otherwise the last value the
    /// processor reported before it stopped
    pub fn progress(&self) -> u8 {
        self.progress
    }

    /// Diagnostic from the most recent failure
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // =========================================================================
    // Port declarations
    // =========================================================================

    /// Declare a port; the port is re-owned by this component
    pub fn add_port(&mut self, mut port: Port) -> Result<()> {
        port.component_id = self.instance_id.clone();
        let direction = port.direction;
        let name = port.name.clone();
        let inserted = match direction {
            PortDirection::Input => self.inputs.insert(port),
            PortDirection::Output => self.outputs.insert(port),
        };
        if !inserted {
            return Err(WorkflowError::DuplicatePort {
                component: self.instance_id.clone(),
                port: name,
                direction,
            });
        }
        Ok(())
    }

    pub fn add_input_port(
        &mut self,
        name: impl Into<String>,
        data_type: impl Into<PortType>,
    ) -> Result<()> {
        let port = Port::new(self.instance_id.clone(), name, data_type, PortDirection::Input);
        self.add_port(port)
    }

    pub fn add_output_port(
        &mut self,
        name: impl Into<String>,
        data_type: impl Into<PortType>,
    ) -> Result<()> {
        let port = Port::new(self.instance_id.clone(), name, data_type, PortDirection::Output);
        self.add_port(port)
    }

    /// Declare an input port and mark it required
    pub fn add_required_input_port(
        &mut self,
        name: impl Into<String>,
        data_type: impl Into<PortType>,
    ) -> Result<()> {
        let name = name.into();
        self.add_input_port(name.clone(), data_type)?;
        self.require_input(&name)
    }

    /// Mark a declared input as required
    pub fn require_input(&mut self, name: &str) -> Result<()> {
        if !self.inputs.contains(name) {
            return Err(self.invalid_port(name, PortDirection::Input));
        }
        self.required_inputs.insert(name.to_string());
        Ok(())
    }

    pub fn input_port(&self, name: &str) -> Option<&Port> {
        self.inputs.get(name)
    }

    pub fn output_port(&self, name: &str) -> Option<&Port> {
        self.outputs.get(name)
    }

    /// Look up a port by direction
    pub fn port(&self, name: &str, direction: PortDirection) -> Option<&Port> {
        match direction {
            PortDirection::Input => self.input_port(name),
            PortDirection::Output => self.output_port(name),
        }
    }

    /// Declared input ports in declaration order
    pub fn input_ports(&self) -> impl Iterator<Item = &Port> {
        self.inputs.iter()
    }

    /// Declared output ports in declaration order
    pub fn output_ports(&self) -> impl Iterator<Item = &Port> {
        self.outputs.iter()
    }

    /// Required input names in declaration order
    pub fn required_inputs(&self) -> Vec<&str> {
        self.inputs
            .names()
            .filter(|name| self.required_inputs.contains(*name))
            .collect()
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required_inputs.contains(name)
    }

    // =========================================================================
    // Port values
    // =========================================================================

    /// Bind a value to a declared input port
    ///
    /// No type checking happens here; compatibility is a connection concern.
    pub fn set_input(&mut self, port: &str, value: serde_json::Value) -> Result<()> {
        if !self.inputs.contains(port) {
            return Err(self.invalid_port(port, PortDirection::Input));
        }
        self.input_values.insert(port.to_string(), value);
        Ok(())
    }

    /// Unbind a declared input port
    pub fn clear_input(&mut self, port: &str) -> Result<Option<serde_json::Value>> {
        if !self.inputs.contains(port) {
            return Err(self.invalid_port(port, PortDirection::Input));
        }
        Ok(self.input_values.remove(port))
    }

    /// Value currently bound to an input port
    pub fn input(&self, port: &str) -> Option<&serde_json::Value> {
        let value = self.input_values.get(port);
        if is_bound(value) {
            value
        } else {
            None
        }
    }

    /// Value produced on an output port; `None` when unset
    pub fn get_output(&self, port: &str) -> Option<&serde_json::Value> {
        let value = self.output_values.get(port);
        if is_bound(value) {
            value
        } else {
            None
        }
    }

    pub fn has_output(&self, port: &str) -> bool {
        self.get_output(port).is_some()
    }

    /// All produced output values
    pub fn outputs(&self) -> &PortValues {
        &self.output_values
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Check that every required input is bound
    ///
    /// On failure the component moves to `error` and records which port was
    /// missing (the first one in declaration order).
    pub fn validate_inputs(&mut self) -> Result<()> {
        let missing = self
            .required_inputs()
            .into_iter()
            .find(|name| !is_bound(self.input_values.get(*name)))
            .map(str::to_string);

        if let Some(port) = missing {
            let err = WorkflowError::MissingRequiredInput {
                component: self.instance_id.clone(),
                port,
            };
            self.fail(err.to_string());
            return Err(err);
        }
        Ok(())
    }

    /// Component-specific configuration issues
    pub fn validate_config(&self) -> Vec<String> {
        self.processor.validate(&self.config)
    }

    /// Run the processor on the currently bound inputs
    ///
    /// Callers are expected to have passed [`validate_inputs`](Self::validate_inputs).
    /// Every failure, including a panic inside the processor, comes back as
    /// an error result; on failure the previous outputs are left untouched.
    pub async fn process(&mut self, reporter: &ProgressReporter) -> ComponentResult {
        if !self.status.can_process() {
            let err = WorkflowError::ComponentNotReady {
                component: self.instance_id.clone(),
                status: self.status,
            };
            log::warn!("{}", err);
            return ComponentResult::failure(ComponentError::from(&err));
        }

        self.status = ComponentStatus::Processing;
        self.last_error = None;
        self.progress = 0;

        let ctx = ProcessContext::new(
            &self.instance_id,
            &self.config,
            &self.input_values,
            reporter,
        );
        let outcome = AssertUnwindSafe(self.processor.process(ctx))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(ProcessingFailure::new(format!(
                    "processor panicked: {}",
                    panic_message(panic.as_ref())
                )))
            });

        match outcome.and_then(|outputs| self.check_outputs(outputs)) {
            Ok(outputs) => {
                self.output_values = outputs.clone();
                self.status = ComponentStatus::Completed;
                self.progress = 100;
                ComponentResult::success(outputs)
            }
            Err(failure) => {
                let err = WorkflowError::processing(&self.instance_id, failure.message.clone());
                self.progress = reporter.last_reported();
                self.fail(err.to_string());
                let mut error =
                    ComponentError::new(ComponentErrorKind::Processing, failure.message);
                error.details = failure.details;
                ComponentResult::failure(error)
            }
        }
    }

    /// Clear bound values and return to `initialized`
    pub fn reset(&mut self) {
        self.input_values.clear();
        self.output_values.clear();
        self.progress = 0;
        self.last_error = None;
        self.status = ComponentStatus::Initialized;
    }

    /// Release held resources and mark the component `cleaned`
    ///
    /// Idempotent: the processor's cleanup hook runs at most once until the
    /// next reset. The component ends up `cleaned` even if the hook fails.
    pub fn cleanup(&mut self) -> std::result::Result<(), ProcessingFailure> {
        if self.status == ComponentStatus::Cleaned {
            return Ok(());
        }
        let hook = self.processor.cleanup();
        self.input_values.clear();
        self.output_values.clear();
        self.status = ComponentStatus::Cleaned;
        log::debug!("Component {} cleaned", self.instance_id);
        hook
    }

    /// Serializable view of the current state
    pub fn snapshot(&self) -> ComponentSnapshot {
        let port_state = |port: &Port, values: &PortValues| PortState {
            name: port.name.clone(),
            data_type: port.data_type.clone(),
            description: port.description.clone(),
            required: self.required_inputs.contains(&port.name),
            has_value: is_bound(values.get(&port.name)),
        };
        ComponentSnapshot {
            id: self.instance_id.clone(),
            type_name: self.type_name.clone(),
            status: self.status,
            progress: self.progress,
            error: self.last_error.clone(),
            config: self.config.clone(),
            input_ports: self
                .inputs
                .iter()
                .map(|p| port_state(p, &self.input_values))
                .collect(),
            output_ports: self
                .outputs
                .iter()
                .map(|p| port_state(p, &self.output_values))
                .collect(),
        }
    }

    fn check_outputs(
        &self,
        mut outputs: PortValues,
    ) -> std::result::Result<PortValues, ProcessingFailure> {
        if let Some(missing) = self.outputs.names().find(|name| !is_bound(outputs.get(*name))) {
            return Err(ProcessingFailure::new(format!(
                "output '{missing}' was not produced"
            )));
        }
        outputs.retain(|name, _| {
            let declared = self.outputs.contains(name);
            if !declared {
                log::warn!(
                    "Component {} produced undeclared output '{}', dropping it",
                    self.instance_id,
                    name
                );
            }
            declared
        });
        Ok(outputs)
    }

    fn fail(&mut self, message: String) {
        log::warn!("{}", message);
        self.last_error = Some(message);
        self.status = ComponentStatus::Error;
    }

    fn invalid_port(&self, port: &str, direction: PortDirection) -> WorkflowError {
        WorkflowError::InvalidPort {
            component: self.instance_id.clone(),
            port: port.to_string(),
            direction,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{FnProcessor, ProcessResult};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn doubling_model() -> Component {
        let mut component = Component::with_id(
            "model",
            "model",
            FnProcessor::new(|ctx: &ProcessContext<'_>| {
                let data = ctx.require_input("data")?.as_i64().unwrap_or(0);
                let mut outputs = PortValues::new();
                outputs.insert("result".to_string(), json!(data * 2));
                Ok(outputs)
            }),
        );
        component.add_required_input_port("data", "dataset").unwrap();
        component.add_input_port("labels", "dataset").unwrap();
        component.add_output_port("result", "metrics").unwrap();
        component
    }

    fn reporter(component: &Component) -> ProgressReporter {
        ProgressReporter::detached(component.id())
    }

    #[test]
    fn test_duplicate_port_rejected() {
        let mut component = doubling_model();
        let err = component.add_input_port("data", "tensor").unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::DuplicatePort {
                direction: PortDirection::Input,
                ..
            }
        ));
        // Same name on the other side is fine
        component.add_output_port("data", "dataset").unwrap();
    }

    #[test]
    fn test_set_input_unknown_port() {
        let mut component = doubling_model();
        let err = component.set_input("weights", json!(1)).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidPort { .. }));
        assert_eq!(component.status(), ComponentStatus::Initialized);
    }

    #[test]
    fn test_get_output_unset() {
        let component = doubling_model();
        assert!(component.get_output("result").is_none());
        assert!(component.get_output("nonexistent").is_none());
    }

    #[test]
    fn test_validate_inputs_names_first_missing_port() {
        let mut component = Component::with_id(
            "joiner",
            "joiner",
            FnProcessor::new(|_: &ProcessContext<'_>| Ok(PortValues::new())),
        );
        component.add_required_input_port("left", "dataset").unwrap();
        component.add_required_input_port("right", "dataset").unwrap();

        let err = component.validate_inputs().unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::MissingRequiredInput { ref port, .. } if port == "left"
        ));
        assert_eq!(component.status(), ComponentStatus::Error);
        assert!(component.last_error().unwrap().contains("'left'"));

        component.reset();
        component.set_input("left", json!([1])).unwrap();
        component.set_input("right", serde_json::Value::Null).unwrap();
        let err = component.validate_inputs().unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::MissingRequiredInput { ref port, .. } if port == "right"
        ));
    }

    #[tokio::test]
    async fn test_process_success_populates_outputs() {
        let mut component = doubling_model();
        component.set_input("data", json!(21)).unwrap();
        component.validate_inputs().unwrap();

        let result = component.process(&reporter(&component)).await;
        assert!(result.is_success());
        assert_eq!(component.get_output("result"), Some(&json!(42)));
        assert_eq!(component.status(), ComponentStatus::Completed);
        assert_eq!(component.progress(), 100);
    }

    #[tokio::test]
    async fn test_process_failure_leaves_outputs_untouched() {
        let mut component = Component::with_id(
            "model",
            "model",
            FnProcessor::new(|_: &ProcessContext<'_>| -> ProcessResult {
                Err(ProcessingFailure::new("training diverged")
                    .with_details(json!({"loss": "NaN"})))
            }),
        );
        component.add_output_port("result", "metrics").unwrap();

        let result = component.process(&reporter(&component)).await;
        assert_eq!(result.status, ComponentStatus::Error);
        let error = result.error.unwrap();
        assert_eq!(error.kind, ComponentErrorKind::Processing);
        assert_eq!(error.message, "training diverged");
        assert_eq!(error.details, Some(json!({"loss": "NaN"})));
        assert!(result.outputs.is_none());
        assert!(!component.has_output("result"));
        assert_eq!(component.status(), ComponentStatus::Error);
    }

    #[tokio::test]
    async fn test_failure_keeps_last_reported_progress() {
        let mut component = Component::with_id(
            "model",
            "model",
            FnProcessor::new(|ctx: &ProcessContext<'_>| -> ProcessResult {
                ctx.report_progress(25, None);
                ctx.report_progress(60, Some("epoch 3".to_string()));
                Err(ProcessingFailure::new("out of memory"))
            }),
        );
        component.add_output_port("result", "metrics").unwrap();

        let result = component.process(&reporter(&component)).await;
        assert!(!result.is_success());
        assert_eq!(component.progress(), 60);
        assert_eq!(component.snapshot().progress, 60);

        component.reset();
        assert_eq!(component.progress(), 0);
    }

    #[tokio::test]
    async fn test_missing_declared_output_is_a_failure() {
        let mut component = Component::with_id(
            "loader",
            "loader",
            FnProcessor::new(|_: &ProcessContext<'_>| Ok(PortValues::new())),
        );
        component.add_output_port("data", "dataset").unwrap();

        let result = component.process(&reporter(&component)).await;
        assert!(!result.is_success());
        assert!(result.error.unwrap().message.contains("'data'"));
    }

    #[tokio::test]
    async fn test_panicking_processor_becomes_error_result() {
        let mut component = Component::with_id(
            "loader",
            "loader",
            FnProcessor::new(|_: &ProcessContext<'_>| -> ProcessResult { panic!("disk on fire") }),
        );

        let result = component.process(&reporter(&component)).await;
        assert_eq!(result.status, ComponentStatus::Error);
        assert!(result.error.unwrap().message.contains("disk on fire"));
    }

    #[tokio::test]
    async fn test_error_state_requires_reset() {
        let mut component = doubling_model();
        assert!(component.validate_inputs().is_err());

        let result = component.process(&reporter(&component)).await;
        assert_eq!(result.error.unwrap().kind, ComponentErrorKind::NotReady);

        component.reset();
        component.set_input("data", json!(1)).unwrap();
        assert!(component.process(&reporter(&component)).await.is_success());
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        struct Counting(Arc<AtomicUsize>);

        #[async_trait::async_trait]
        impl Processor for Counting {
            async fn process(&mut self, _ctx: ProcessContext<'_>) -> ProcessResult {
                Ok(PortValues::new())
            }

            fn cleanup(&mut self) -> std::result::Result<(), ProcessingFailure> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let mut component = Component::with_id("model", "model", Counting(calls.clone()));
        component.add_input_port("data", "dataset").unwrap();
        component.set_input("data", json!([1, 2])).unwrap();

        component.cleanup().unwrap();
        component.cleanup().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(component.status(), ComponentStatus::Cleaned);
        assert!(component.input("data").is_none());
        // Declarations survive cleanup
        assert!(component.input_port("data").is_some());
    }

    #[test]
    fn test_snapshot() {
        let mut component = doubling_model();
        component.set_config_value("epochs", json!(10));
        component.set_input("data", json!([1])).unwrap();

        let snapshot = component.snapshot();
        assert_eq!(snapshot.id.as_str(), "model");
        assert_eq!(snapshot.config["epochs"], json!(10));
        assert_eq!(snapshot.input_ports.len(), 2);
        assert!(snapshot.input_ports[0].required && snapshot.input_ports[0].has_value);
        assert!(!snapshot.input_ports[1].required && !snapshot.input_ports[1].has_value);
        assert!(!snapshot.output_ports[0].has_value);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["typeName"], "model");
        assert_eq!(json["status"], "initialized");
    }

    #[test]
    fn test_required_inputs_in_declaration_order() {
        let mut component = doubling_model();
        component.add_required_input_port("weights", "tensor").unwrap();
        assert_eq!(component.required_inputs(), vec!["data", "weights"]);
        assert!(component.require_input("missing").is_err());
    }
}
