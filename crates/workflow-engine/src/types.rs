//! Core types shared by components, connections and graphs
//!
//! Identifiers, port data types, port direction and component status.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Free-form configuration of a component instance
pub type ConfigMap = serde_json::Map<String, serde_json::Value>;

/// Values keyed by port name
pub type PortValues = HashMap<String, serde_json::Value>;

/// Editor position of a component (x, y), carried without interpretation
pub type Position = (f64, f64);

/// Unique identifier for a component instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(String);

impl ComponentId {
    /// Create an identifier from an existing string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ComponentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ComponentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for ComponentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Which side of a component a port sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDirection {
    Input,
    Output,
}

impl PortDirection {
    /// The other side
    pub fn opposite(self) -> Self {
        match self {
            Self::Input => Self::Output,
            Self::Output => Self::Input,
        }
    }
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// Data type tag of a port (e.g. "dataset", "tensor", "metrics")
///
/// Tags are open-ended strings. The tag `any` is a wildcard that is
/// compatible with every other tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortType(String);

impl PortType {
    /// Wildcard tag
    pub const ANY: &'static str = "any";

    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// The wildcard type
    pub fn any() -> Self {
        Self(Self::ANY.to_string())
    }

    pub fn is_any(&self) -> bool {
        self.0 == Self::ANY
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if this type can connect to another type
    pub fn is_compatible_with(&self, other: &PortType) -> bool {
        if self.is_any() || other.is_any() {
            return true;
        }
        self == other
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PortType {
    fn from(tag: &str) -> Self {
        Self(tag.to_string())
    }
}

impl From<String> for PortType {
    fn from(tag: String) -> Self {
        Self(tag)
    }
}

/// Lifecycle status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    #[default]
    Initialized,
    Processing,
    Completed,
    Error,
    Cleaned,
}

impl ComponentStatus {
    /// Whether a component in this status may enter `Processing`
    ///
    /// `Error` and `Cleaned` require an explicit reset first.
    pub fn can_process(self) -> bool {
        matches!(self, Self::Initialized | Self::Completed)
    }
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Initialized => "initialized",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Cleaned => "cleaned",
        };
        f.write_str(label)
    }
}

/// Whether a port value counts as bound
///
/// JSON `null` is treated the same as no value at all.
pub(crate) fn is_bound(value: Option<&serde_json::Value>) -> bool {
    value.is_some_and(|v| !v.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_type_compatibility() {
        let dataset = PortType::from("dataset");
        let metrics = PortType::from("metrics");
        assert!(PortType::any().is_compatible_with(&dataset));
        assert!(dataset.is_compatible_with(&PortType::any()));
        assert!(dataset.is_compatible_with(&PortType::from("dataset")));
        assert!(!dataset.is_compatible_with(&metrics));
    }

    #[test]
    fn test_status_gate() {
        assert!(ComponentStatus::Initialized.can_process());
        assert!(ComponentStatus::Completed.can_process());
        assert!(!ComponentStatus::Error.can_process());
        assert!(!ComponentStatus::Cleaned.can_process());
        assert!(!ComponentStatus::Processing.can_process());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&ComponentStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
    }

    #[test]
    fn test_null_is_unbound() {
        assert!(!is_bound(None));
        assert!(!is_bound(Some(&serde_json::Value::Null)));
        assert!(is_bound(Some(&serde_json::json!(0))));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(ComponentId::generate(), ComponentId::generate());
    }
}
