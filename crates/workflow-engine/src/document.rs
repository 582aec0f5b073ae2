//! Workflow documents: the saved form of a graph
//!
//! A document records which components exist (by id, type, configuration
//! and editor position) and how they are connected. Bound port values and
//! run state are not saved. Loading goes through a [`ComponentRegistry`] to
//! rebuild components and replays every connection through
//! [`WorkflowGraph::connect`], so a document can never produce a graph that
//! could not have been built by hand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::GraphConfig;
use crate::connection::Connection;
use crate::error::{Result, WorkflowError};
use crate::graph::WorkflowGraph;
use crate::registry::ComponentRegistry;
use crate::types::{ComponentId, ConfigMap, Position};

/// Format version written into new documents
pub const DOCUMENT_VERSION: &str = "1.0";

/// Descriptive data about a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub workflow_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl Default for DocumentMetadata {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            workflow_id: String::new(),
            name: String::new(),
            created_at: now,
            last_modified: now,
        }
    }
}

/// One saved component
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentEntry {
    pub id: ComponentId,
    pub type_name: String,
    pub config: ConfigMap,
    pub position: Option<Position>,
}

/// A saved workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDocument {
    pub version: String,
    #[serde(default)]
    pub metadata: DocumentMetadata,
    /// Components in graph insertion order, written as an object keyed by id
    #[serde(default, with = "component_map")]
    pub components: Vec<ComponentEntry>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl WorkflowDocument {
    /// Capture the structure of a graph
    pub fn from_graph(graph: &WorkflowGraph) -> Self {
        let components = graph
            .components()
            .map(|component| ComponentEntry {
                id: component.id().clone(),
                type_name: component.type_name().to_string(),
                config: component.config().clone(),
                position: graph.position(component.id()),
            })
            .collect();

        Self {
            version: DOCUMENT_VERSION.to_string(),
            metadata: DocumentMetadata {
                workflow_id: graph.id().to_string(),
                name: graph.name().to_string(),
                ..DocumentMetadata::default()
            },
            components,
            connections: graph.connections().to_vec(),
        }
    }

    /// Rebuild a graph from this document
    ///
    /// Every component is created through `registry` and every connection is
    /// replayed. All failures are collected and returned together; no
    /// partially loaded graph is ever returned.
    ///
    /// # Errors
    ///
    /// `Load` listing every component or connection that could not be restored.
    pub fn into_graph(
        self,
        registry: &ComponentRegistry,
        config: GraphConfig,
    ) -> Result<WorkflowGraph> {
        if self.version != DOCUMENT_VERSION {
            log::warn!(
                "Workflow document version '{}' differs from '{}', loading anyway",
                self.version,
                DOCUMENT_VERSION
            );
        }

        let mut graph =
            WorkflowGraph::with_config(self.metadata.workflow_id, self.metadata.name, config);
        let mut issues = Vec::new();

        for entry in self.components {
            let created = registry.create(&entry.type_name, entry.id.clone(), entry.config);
            let component = match created {
                Ok(component) => component,
                Err(e) => {
                    issues.push(format!("component '{}': {}", entry.id, e));
                    continue;
                }
            };
            if let Err(e) = graph.add_component(component) {
                issues.push(format!("component '{}': {}", entry.id, e));
                continue;
            }
            if let Some(position) = entry.position {
                // The component was inserted just above
                let _ = graph.set_position(&entry.id, position);
            }
        }

        for connection in &self.connections {
            if let Err(e) = graph.connect(
                &connection.source_component,
                &connection.source_port,
                &connection.target_component,
                &connection.target_port,
            ) {
                issues.push(format!("connection {}: {}", connection, e));
            }
        }

        if !issues.is_empty() {
            return Err(WorkflowError::Load { issues });
        }
        log::info!(
            "Loaded workflow '{}' ({} components, {} connections)",
            graph.name(),
            graph.len(),
            graph.connections().len()
        );
        Ok(graph)
    }

    /// Mark the document as modified now
    pub fn touch(&mut self) {
        self.metadata.last_modified = Utc::now();
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Serializes components as a JSON object keyed by id, keeping list order
mod component_map {
    use std::fmt;

    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::ComponentEntry;
    use crate::types::{ComponentId, ConfigMap, Position};

    #[derive(Serialize, Deserialize)]
    struct Body {
        #[serde(rename = "type")]
        type_name: String,
        #[serde(default)]
        config: ConfigMap,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<Position>,
    }

    pub fn serialize<S: Serializer>(
        entries: &[ComponentEntry],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for entry in entries {
            let body = Body {
                type_name: entry.type_name.clone(),
                config: entry.config.clone(),
                position: entry.position,
            };
            map.serialize_entry(&entry.id, &body)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<ComponentEntry>, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = Vec<ComponentEntry>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of components keyed by id")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((id, body)) = access.next_entry::<ComponentId, Body>()? {
                    entries.push(ComponentEntry {
                        id,
                        type_name: body.type_name,
                        config: body.config,
                        position: body.position,
                    });
                }
                Ok(entries)
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}
