//! Graph validation
//!
//! Checks that a graph is executable without touching its state: the
//! connection graph must be acyclic, every required input must be covered,
//! and every processor's own configuration checks must pass.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::graph::WorkflowGraph;
use crate::topology;
use crate::types::ComponentId;

/// A reason the graph cannot run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ValidationIssue {
    /// The connection graph contains a cycle
    #[serde(rename_all = "camelCase")]
    CycleDetected { components: Vec<ComponentId> },
    /// A required input has no incoming connection and no bound value
    #[serde(rename_all = "camelCase")]
    UnconnectedRequiredInput { component: ComponentId, port: String },
    /// A processor rejected its component's configuration
    #[serde(rename_all = "camelCase")]
    InvalidConfiguration { component: ComponentId, message: String },
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CycleDetected { components } => {
                let path: Vec<&str> = components.iter().map(ComponentId::as_str).collect();
                write!(f, "Cycle detected in workflow: {}", path.join(" -> "))
            }
            Self::UnconnectedRequiredInput { component, port } => {
                write!(
                    f,
                    "Required input '{}' on component '{}' is not connected",
                    port, component
                )
            }
            Self::InvalidConfiguration { component, message } => {
                write!(f, "Component '{}': {}", component, message)
            }
        }
    }
}

impl std::error::Error for ValidationIssue {}

/// Validate a workflow graph
///
/// Returns every issue found, not just the first. An empty list means the
/// graph can be executed.
pub fn validate_graph(graph: &WorkflowGraph) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    detect_cycles(graph, &mut issues);
    validate_required_inputs(graph, &mut issues);
    validate_configurations(graph, &mut issues);

    issues
}

fn detect_cycles(graph: &WorkflowGraph, issues: &mut Vec<ValidationIssue>) {
    let components = topology::find_cycle(graph);
    if !components.is_empty() {
        issues.push(ValidationIssue::CycleDetected { components });
    }
}

/// Required inputs must be fed by a connection
fn validate_required_inputs(graph: &WorkflowGraph, issues: &mut Vec<ValidationIssue>) {
    let connected: HashSet<(&ComponentId, &str)> = graph
        .connections()
        .iter()
        .map(|c| (&c.target_component, c.target_port.as_str()))
        .collect();

    for component in graph.components() {
        for port in component.required_inputs() {
            if connected.contains(&(component.id(), port)) {
                continue;
            }
            issues.push(ValidationIssue::UnconnectedRequiredInput {
                component: component.id().clone(),
                port: port.to_string(),
            });
        }
    }
}

fn validate_configurations(graph: &WorkflowGraph, issues: &mut Vec<ValidationIssue>) {
    for component in graph.components() {
        issues.extend(component.validate_config().into_iter().map(|message| {
            ValidationIssue::InvalidConfiguration {
                component: component.id().clone(),
                message,
            }
        }));
    }
}
