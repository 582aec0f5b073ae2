//! Port declarations
//!
//! A port is a named, typed, directional plug on a component. Ports are
//! owned by their component and record the owner's id instead of holding a
//! reference to it.

use serde::{Deserialize, Serialize};

use crate::types::{ComponentId, PortDirection, PortType};

/// A declared port on a component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    /// Port name, unique per component and direction
    pub name: String,
    /// Data type tag
    pub data_type: PortType,
    /// Input or output
    pub direction: PortDirection,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Id of the owning component
    pub component_id: ComponentId,
}

impl Port {
    pub fn new(
        component_id: ComponentId,
        name: impl Into<String>,
        data_type: impl Into<PortType>,
        direction: PortDirection,
    ) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            direction,
            description: String::new(),
            component_id,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_input(&self) -> bool {
        self.direction == PortDirection::Input
    }

    pub fn is_output(&self) -> bool {
        self.direction == PortDirection::Output
    }

    /// Check if this port can feed `target`
    ///
    /// Only covers direction and data type; component identity and fan-in
    /// are connection-level rules.
    pub fn can_feed(&self, target: &Port) -> bool {
        self.is_output()
            && target.is_input()
            && self.data_type.is_compatible_with(&target.data_type)
    }
}

/// Ports of one direction, kept in declaration order
#[derive(Debug, Clone, Default)]
pub(crate) struct PortList {
    ports: Vec<Port>,
}

impl PortList {
    pub(crate) fn get(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.name == name)
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Append a port; returns false if the name is taken
    pub(crate) fn insert(&mut self, port: Port) -> bool {
        if self.contains(&port.name) {
            return false;
        }
        self.ports.push(port);
        true
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter()
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        self.ports.iter().map(|p| p.name.as_str())
    }
}
