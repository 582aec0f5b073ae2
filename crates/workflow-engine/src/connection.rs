//! Connections between component ports
//!
//! A connection carries data from one component's output port to another
//! component's input port. [`can_connect`] holds every wiring rule; the
//! graph calls it before inserting a connection.

use serde::{Deserialize, Serialize};

use crate::component::Component;
use crate::error::{Incompatibility, Result, WorkflowError};
use crate::types::{ComponentId, PortDirection};

/// A directed edge from an output port to an input port
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    /// Component producing the value
    pub source_component: ComponentId,
    /// Output port on the source
    pub source_port: String,
    /// Component consuming the value
    pub target_component: ComponentId,
    /// Input port on the target
    pub target_port: String,
}

impl Connection {
    pub fn new(
        source_component: impl Into<ComponentId>,
        source_port: impl Into<String>,
        target_component: impl Into<ComponentId>,
        target_port: impl Into<String>,
    ) -> Self {
        Self {
            source_component: source_component.into(),
            source_port: source_port.into(),
            target_component: target_component.into(),
            target_port: target_port.into(),
        }
    }

    /// Whether this connection touches the given component on either end
    pub fn touches(&self, component: &ComponentId) -> bool {
        &self.source_component == component || &self.target_component == component
    }

    /// Whether this connection feeds the given input port
    pub fn feeds(&self, component: &ComponentId, port: &str) -> bool {
        &self.target_component == component && self.target_port == port
    }
}

impl std::fmt::Display for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.source_component, self.source_port, self.target_component, self.target_port
        )
    }
}

/// Check whether `source.source_port` may be wired to `target.target_port`
///
/// Rules, in order: no self-loop; the source port must be a declared output
/// and the target port a declared input; the target port must not already be
/// fed by one of `existing`; the data types must match unless either is `any`.
pub fn can_connect(
    source: &Component,
    source_port: &str,
    target: &Component,
    target_port: &str,
    existing: &[Connection],
) -> Result<()> {
    let incompatible = |reason: Incompatibility| WorkflowError::IncompatiblePorts {
        source_component: source.id().clone(),
        source_port: source_port.to_string(),
        target_component: target.id().clone(),
        target_port: target_port.to_string(),
        reason,
    };

    if source.id() == target.id() {
        return Err(incompatible(Incompatibility::SelfLoop));
    }

    let from = resolve_port(source, source_port, PortDirection::Output)
        .map_err(|e| e.unwrap_or_else(|| incompatible(Incompatibility::DirectionMismatch)))?;
    let to = resolve_port(target, target_port, PortDirection::Input)
        .map_err(|e| e.unwrap_or_else(|| incompatible(Incompatibility::DirectionMismatch)))?;

    if let Some(existing) = existing.iter().find(|c| c.feeds(target.id(), target_port)) {
        return Err(WorkflowError::FanInViolation {
            component: target.id().clone(),
            port: target_port.to_string(),
            existing_source: existing.source_component.clone(),
        });
    }

    if !from.data_type.is_compatible_with(&to.data_type) {
        return Err(incompatible(Incompatibility::TypeMismatch {
            source: from.data_type.clone(),
            target: to.data_type.clone(),
        }));
    }

    Ok(())
}

/// Find a port on the expected side
///
/// `Err(None)` means the name exists on the opposite side (a direction
/// mismatch); `Err(Some(_))` means it was never declared.
fn resolve_port<'a>(
    component: &'a Component,
    name: &str,
    direction: PortDirection,
) -> std::result::Result<&'a crate::port::Port, Option<WorkflowError>> {
    if let Some(port) = component.port(name, direction) {
        return Ok(port);
    }
    if component.port(name, direction.opposite()).is_some() {
        return Err(None);
    }
    Err(Some(WorkflowError::InvalidPort {
        component: component.id().clone(),
        port: name.to_string(),
        direction,
    }))
}
