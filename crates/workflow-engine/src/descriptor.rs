//! Component type metadata
//!
//! Describes a component type for the editor palette: what it is called,
//! what it does and where it is grouped.

use serde::{Deserialize, Serialize};

/// Palette group of a component type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentCategory {
    /// Data sources (file loaders, generators)
    Input,
    /// Transformations on data
    Processing,
    /// Trainable models
    Model,
    /// Plots, reports, exports
    Output,
}

impl std::fmt::Display for ComponentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Input => "input",
            Self::Processing => "processing",
            Self::Model => "model",
            Self::Output => "output",
        };
        f.write_str(name)
    }
}

/// Metadata for a component type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentMetadata {
    /// Unique type identifier (e.g., "file_loader")
    pub type_name: String,
    /// Human-readable label
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub category: ComponentCategory,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

impl ComponentMetadata {
    pub fn new(
        type_name: impl Into<String>,
        label: impl Into<String>,
        category: ComponentCategory,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            label: label.into(),
            description: String::new(),
            version: default_version(),
            category,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}
