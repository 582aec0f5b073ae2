//! Sequential execution of a workflow graph
//!
//! The engine validates the graph, computes the execution order and then
//! runs each component in turn. Outputs flow forward along connections;
//! a component that fails only takes down the components that depend on
//! it, never the run itself.
//!
//! Execution is strictly sequential: a component starts only after the
//! previous one in the order has finished. Cancellation is cooperative and
//! checked between components.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::component::{ComponentError, ComponentResult};
use crate::config::EngineConfig;
use crate::events::{EventSink, NullEventSink, WorkflowEvent};
use crate::graph::WorkflowGraph;
use crate::processor::ProgressReporter;
use crate::types::ComponentId;
use crate::validation::ValidationIssue;

/// How a run ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RunOutcome {
    /// Every component in the order was attempted
    Completed,
    /// Validation found issues; nothing was executed
    ValidationFailed { issues: Vec<String> },
    /// The graph could not be ordered; nothing was executed
    StructuralFailure { message: String },
    /// Cancellation was requested; the listed components never started
    Cancelled { skipped: Vec<ComponentId> },
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub workflow_id: String,
    pub execution_id: String,
    /// Execution order; empty when the run was refused
    pub order: Vec<ComponentId>,
    /// One result per attempted component
    pub results: HashMap<ComponentId, ComponentResult>,
    pub outcome: RunOutcome,
}

impl RunReport {
    fn refused(workflow_id: String, execution_id: String, outcome: RunOutcome) -> Self {
        Self {
            workflow_id,
            execution_id,
            order: Vec::new(),
            results: HashMap::new(),
            outcome,
        }
    }

    /// Whether every component ran and succeeded
    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Completed
            && self.results.values().all(ComponentResult::is_success)
    }

    /// Result of a single component
    pub fn result(&self, id: &ComponentId) -> Option<&ComponentResult> {
        self.results.get(id)
    }

    /// Components that succeeded, in execution order
    pub fn succeeded(&self) -> Vec<&ComponentId> {
        self.filter_order(true)
    }

    /// Components that failed, in execution order
    pub fn failed(&self) -> Vec<&ComponentId> {
        self.filter_order(false)
    }

    fn filter_order(&self, success: bool) -> Vec<&ComponentId> {
        self.order
            .iter()
            .filter(|id| {
                self.results
                    .get(*id)
                    .is_some_and(|result| result.is_success() == success)
            })
            .collect()
    }
}

/// Runs workflow graphs
pub struct ExecutionEngine {
    config: EngineConfig,
    event_sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new(Arc::new(NullEventSink))
    }
}

impl ExecutionEngine {
    /// Create an engine with default settings
    pub fn new(event_sink: Arc<dyn EventSink>) -> Self {
        Self::with_config(event_sink, EngineConfig::default())
    }

    pub fn with_config(event_sink: Arc<dyn EventSink>, config: EngineConfig) -> Self {
        Self {
            config,
            event_sink,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Token that stops runs of this engine before their next component
    ///
    /// Once cancelled, every later run is cancelled too until a fresh token
    /// is installed with [`with_cancellation_token`](Self::with_cancellation_token).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Check a graph without running it
    pub fn validate(&self, graph: &WorkflowGraph) -> Vec<ValidationIssue> {
        graph.validate()
    }

    /// Execute a graph
    ///
    /// Never fails as a whole: structural problems are reported through the
    /// outcome, and per-component failures through the results.
    pub async fn run(&self, graph: &mut WorkflowGraph) -> RunReport {
        let execution_id = uuid::Uuid::new_v4().to_string();
        let workflow_id = graph.id().to_string();
        log::info!(
            "Running workflow '{}' ({} components, execution {})",
            graph.name(),
            graph.len(),
            execution_id
        );

        if self.config.reset_before_run {
            graph.reset_all();
        }

        let issues = graph.validate();
        if !issues.is_empty() {
            let issues: Vec<String> = issues.iter().map(ToString::to_string).collect();
            log::warn!(
                "Workflow '{}' failed validation: {}",
                graph.name(),
                issues.join("; ")
            );
            self.emit(WorkflowEvent::RunFailed {
                workflow_id: workflow_id.clone(),
                execution_id: execution_id.clone(),
                issues: issues.clone(),
            });
            return RunReport::refused(
                workflow_id,
                execution_id,
                RunOutcome::ValidationFailed { issues },
            );
        }

        let order = match graph.execution_order() {
            Ok(order) => order,
            Err(e) => {
                log::warn!("Workflow '{}' cannot be ordered: {}", graph.name(), e);
                self.emit(WorkflowEvent::RunFailed {
                    workflow_id: workflow_id.clone(),
                    execution_id: execution_id.clone(),
                    issues: vec![e.to_string()],
                });
                let outcome = RunOutcome::StructuralFailure {
                    message: e.to_string(),
                };
                return RunReport::refused(workflow_id, execution_id, outcome);
            }
        };

        self.emit(WorkflowEvent::RunStarted {
            workflow_id: workflow_id.clone(),
            execution_id: execution_id.clone(),
            order: order.iter().map(ToString::to_string).collect(),
        });

        let mut results: HashMap<ComponentId, ComponentResult> = HashMap::new();
        let mut outcome = RunOutcome::Completed;

        for (position, id) in order.iter().enumerate() {
            if self.cancel.is_cancelled() {
                let skipped = order[position..].to_vec();
                log::info!(
                    "Workflow '{}' cancelled, skipping {} component(s)",
                    graph.name(),
                    skipped.len()
                );
                self.emit(WorkflowEvent::RunCancelled {
                    workflow_id: workflow_id.clone(),
                    execution_id: execution_id.clone(),
                    skipped: skipped.iter().map(ToString::to_string).collect(),
                });
                outcome = RunOutcome::Cancelled { skipped };
                break;
            }

            if let Some(result) = self.run_component(graph, id, &results, &execution_id).await {
                results.insert(id.clone(), result);
            }
        }

        let report = RunReport {
            workflow_id,
            execution_id,
            order,
            results,
            outcome,
        };

        if report.outcome == RunOutcome::Completed {
            let succeeded = report.succeeded().len();
            let failed = report.failed().len();
            log::info!(
                "Workflow '{}' finished: {} succeeded, {} failed",
                graph.name(),
                succeeded,
                failed
            );
            self.emit(WorkflowEvent::RunCompleted {
                workflow_id: report.workflow_id.clone(),
                execution_id: report.execution_id.clone(),
                succeeded,
                failed,
            });
        }

        if self.config.cleanup_after_run {
            self.cleanup(graph);
        }

        report
    }

    /// Clean up every component, reporting failures as events
    pub fn cleanup(&self, graph: &mut WorkflowGraph) {
        for (component_id, failure) in graph.cleanup_all() {
            self.emit(WorkflowEvent::CleanupFailed {
                component_id: component_id.to_string(),
                error: failure.to_string(),
            });
        }
    }

    async fn run_component(
        &self,
        graph: &mut WorkflowGraph,
        id: &ComponentId,
        results: &HashMap<ComponentId, ComponentResult>,
        execution_id: &str,
    ) -> Option<ComponentResult> {
        let bindings = gather_inputs(graph, id, results);
        let component = graph.get_mut(id)?;

        for (port, value) in bindings {
            if let Err(e) = component.clear_input(&port) {
                log::warn!("Could not rebind input: {}", e);
                continue;
            }
            if let Some(value) = value {
                // Port existence was just confirmed by clear_input
                let _ = component.set_input(&port, value);
            }
        }

        if let Err(e) = component.validate_inputs() {
            let result = ComponentResult::failure(ComponentError::from(&e));
            self.emit(WorkflowEvent::ComponentFailed {
                component_id: id.to_string(),
                execution_id: execution_id.to_string(),
                error: e.to_string(),
            });
            return Some(result);
        }

        log::debug!("Processing component {} ({})", id, component.type_name());
        self.emit(WorkflowEvent::ComponentStarted {
            component_id: id.to_string(),
            execution_id: execution_id.to_string(),
        });

        let reporter = ProgressReporter::new(self.event_sink.clone(), id, execution_id);
        let result = component.process(&reporter).await;

        let event = match (&result.error, &result.outputs) {
            (Some(error), _) => WorkflowEvent::ComponentFailed {
                component_id: id.to_string(),
                execution_id: execution_id.to_string(),
                error: error.message.clone(),
            },
            (None, outputs) => {
                let mut output_ports: Vec<String> =
                    outputs.iter().flat_map(|o| o.keys().cloned()).collect();
                output_ports.sort();
                WorkflowEvent::ComponentCompleted {
                    component_id: id.to_string(),
                    execution_id: execution_id.to_string(),
                    output_ports,
                }
            }
        };
        self.emit(event);

        Some(result)
    }

    fn emit(&self, event: WorkflowEvent) {
        if let Err(e) = self.event_sink.send(event) {
            log::warn!("Failed to deliver workflow event: {}", e);
        }
    }
}

/// Values for every connected input of a component
///
/// Only outputs produced by sources that succeeded in this run are
/// forwarded; a port fed by a failed or skipped source maps to `None` and is
/// left unbound.
fn gather_inputs(
    graph: &WorkflowGraph,
    id: &ComponentId,
    results: &HashMap<ComponentId, ComponentResult>,
) -> Vec<(String, Option<serde_json::Value>)> {
    graph
        .incoming_connections(id)
        .map(|connection| {
            let value = results
                .get(&connection.source_component)
                .filter(|result| result.is_success())
                .and_then(|result| result.outputs.as_ref())
                .and_then(|outputs| outputs.get(&connection.source_port))
                .cloned();
            (connection.target_port.clone(), value)
        })
        .collect()
}
