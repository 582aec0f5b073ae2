//! Error types for the workflow engine

use thiserror::Error;

use crate::types::{ComponentId, ComponentStatus, PortDirection, PortType};

/// Result type alias using WorkflowError
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Why two ports cannot be wired together
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incompatibility {
    /// Source and target are the same component
    SelfLoop,
    /// The named port exists, but on the wrong side of its component
    DirectionMismatch,
    /// Neither side is `any` and the data types differ
    TypeMismatch { source: PortType, target: PortType },
}

impl std::fmt::Display for Incompatibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelfLoop => write!(f, "a component cannot feed its own input"),
            Self::DirectionMismatch => write!(f, "ports must go from an output to an input"),
            Self::TypeMismatch { source, target } => {
                write!(f, "'{}' does not match '{}'", source, target)
            }
        }
    }
}

/// Errors that can occur while building or running a workflow
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A port with the same direction and name already exists
    #[error("Component '{component}' already has an {direction} port named '{port}'")]
    DuplicatePort {
        component: ComponentId,
        port: String,
        direction: PortDirection,
    },

    /// A component with the same instance id is already in the graph
    #[error("Component '{0}' is already part of the workflow")]
    DuplicateComponent(ComponentId),

    /// No component with this id exists in the graph
    #[error("Component '{0}' not found")]
    ComponentNotFound(ComponentId),

    /// Reference to a port name that was never declared
    #[error("Component '{component}' has no {direction} port named '{port}'")]
    InvalidPort {
        component: ComponentId,
        port: String,
        direction: PortDirection,
    },

    /// Connection rejected by a compatibility rule
    #[error(
        "Cannot connect {source_component}.{source_port} -> {target_component}.{target_port}: {reason}"
    )]
    IncompatiblePorts {
        source_component: ComponentId,
        source_port: String,
        target_component: ComponentId,
        target_port: String,
        reason: Incompatibility,
    },

    /// Target input port already has an incoming connection
    #[error(
        "Input '{port}' on component '{component}' is already fed by component '{existing_source}'"
    )]
    FanInViolation {
        component: ComponentId,
        port: String,
        existing_source: ComponentId,
    },

    /// The connection graph cannot be ordered
    #[error("Workflow contains a cycle through: {}", join_ids(.components))]
    CyclicWorkflow { components: Vec<ComponentId> },

    /// A component was asked to process without all required inputs bound
    #[error("Required input '{port}' on component '{component}' is not connected")]
    MissingRequiredInput { component: ComponentId, port: String },

    /// The component's processor signalled failure
    #[error("Component '{component}' failed: {message}")]
    ComponentProcessing {
        component: ComponentId,
        message: String,
    },

    /// The component is in a state it cannot process from without a reset
    #[error("Component '{component}' is {status} and must be reset before processing")]
    ComponentNotReady {
        component: ComponentId,
        status: ComponentStatus,
    },

    /// Disconnect of a connection that is not in the graph
    #[error("Connection {0} not found")]
    ConnectionNotFound(String),

    /// The registry has no factory for a component type
    #[error("Unknown component type '{0}'")]
    UnknownComponentType(String),

    /// A factory built a component under a different id than requested
    #[error("Factory for '{type_name}' built component '{actual}' instead of '{expected}'")]
    FactoryIdMismatch {
        type_name: String,
        expected: ComponentId,
        actual: ComponentId,
    },

    /// A workflow document could not be reconstructed
    #[error("Failed to load workflow: {}", join_issues(.issues))]
    Load { issues: Vec<String> },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkflowError {
    /// Create a processing error for a component
    pub fn processing(component: &ComponentId, message: impl Into<String>) -> Self {
        Self::ComponentProcessing {
            component: component.clone(),
            message: message.into(),
        }
    }

    /// Whether this error describes the shape of the graph rather than a run
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::DuplicatePort { .. }
                | Self::DuplicateComponent(_)
                | Self::InvalidPort { .. }
                | Self::IncompatiblePorts { .. }
                | Self::FanInViolation { .. }
                | Self::CyclicWorkflow { .. }
        )
    }
}

fn join_ids(ids: &[ComponentId]) -> String {
    ids.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn join_issues(issues: &[String]) -> String {
    issues.join("; ")
}
