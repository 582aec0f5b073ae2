//! The workflow graph: components and the connections between them
//!
//! Components are kept in insertion order, which is the tie-break key for
//! execution ordering. Every mutation that adds structure is checked at the
//! moment it happens, so an invalid wiring never enters the graph.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::component::{Component, ComponentSnapshot};
use crate::config::GraphConfig;
use crate::connection::{can_connect, Connection};
use crate::error::{Result, WorkflowError};
use crate::processor::ProcessingFailure;
use crate::topology;
use crate::types::{ComponentId, Position};
use crate::validation::{self, ValidationIssue};

/// A complete workflow graph
pub struct WorkflowGraph {
    id: String,
    name: String,
    config: GraphConfig,
    components: Vec<Component>,
    connections: Vec<Connection>,
    positions: HashMap<ComponentId, Position>,
}

impl std::fmt::Debug for WorkflowGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowGraph")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("components", &self.components)
            .field("connections", &self.connections)
            .finish()
    }
}

impl WorkflowGraph {
    /// Create a new empty graph with default editing rules
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::with_config(id, name, GraphConfig::default())
    }

    /// Create a new empty graph with explicit editing rules
    pub fn with_config(
        id: impl Into<String>,
        name: impl Into<String>,
        config: GraphConfig,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            config,
            components: Vec::new(),
            connections: Vec::new(),
            positions: HashMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn config(&self) -> GraphConfig {
        self.config
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Insert a component
    pub fn add_component(&mut self, component: Component) -> Result<ComponentId> {
        let id = component.id().clone();
        if self.contains(&id) {
            return Err(WorkflowError::DuplicateComponent(id));
        }
        log::debug!("Added component {} ({})", id, component.type_name());
        self.components.push(component);
        Ok(id)
    }

    /// Remove a component and every connection touching it
    ///
    /// Inputs that were fed by the removed component are unbound.
    pub fn remove_component(&mut self, id: &ComponentId) -> Option<Component> {
        let index = self.index_of(id)?;
        let (touching, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.connections)
            .into_iter()
            .partition(|c| c.touches(id));
        self.connections = kept;
        for connection in touching.iter().filter(|c| &c.source_component == id) {
            self.unbind_target(connection);
        }
        self.positions.remove(id);
        log::debug!(
            "Removed component {} and {} connection(s)",
            id,
            touching.len()
        );
        Some(self.components.remove(index))
    }

    pub fn get(&self, id: &ComponentId) -> Option<&Component> {
        self.components.iter().find(|c| c.id() == id)
    }

    pub fn get_mut(&mut self, id: &ComponentId) -> Option<&mut Component> {
        self.components.iter_mut().find(|c| c.id() == id)
    }

    pub fn contains(&self, id: &ComponentId) -> bool {
        self.get(id).is_some()
    }

    /// Components in insertion order
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.iter()
    }

    pub fn components_mut(&mut self) -> impl Iterator<Item = &mut Component> {
        self.components.iter_mut()
    }

    /// Component ids in insertion order
    pub fn component_ids(&self) -> Vec<ComponentId> {
        self.components.iter().map(|c| c.id().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Insertion index of a component
    pub(crate) fn index_of(&self, id: &ComponentId) -> Option<usize> {
        self.components.iter().position(|c| c.id() == id)
    }

    /// Current state of every component, in insertion order
    pub fn snapshots(&self) -> Vec<ComponentSnapshot> {
        self.components.iter().map(Component::snapshot).collect()
    }

    // =========================================================================
    // Editor positions
    // =========================================================================

    /// Record where the editor draws a component
    pub fn set_position(&mut self, id: &ComponentId, position: Position) -> Result<()> {
        if !self.contains(id) {
            return Err(WorkflowError::ComponentNotFound(id.clone()));
        }
        self.positions.insert(id.clone(), position);
        Ok(())
    }

    pub fn position(&self, id: &ComponentId) -> Option<Position> {
        self.positions.get(id).copied()
    }

    // =========================================================================
    // Connections
    // =========================================================================

    /// Wire an output port to an input port
    ///
    /// # Errors
    ///
    /// `ComponentNotFound` for unknown ids, any rule violated by
    /// [`can_connect`], and `CyclicWorkflow` when the connection would close
    /// a cycle and the graph is configured to reject that at connect time.
    pub fn connect(
        &mut self,
        source_id: &ComponentId,
        source_port: &str,
        target_id: &ComponentId,
        target_port: &str,
    ) -> Result<Connection> {
        let source = self
            .get(source_id)
            .ok_or_else(|| WorkflowError::ComponentNotFound(source_id.clone()))?;
        let target = self
            .get(target_id)
            .ok_or_else(|| WorkflowError::ComponentNotFound(target_id.clone()))?;

        can_connect(source, source_port, target, target_port, &self.connections)?;

        if self.config.reject_cycles_on_connect {
            if let Some(path) = self.path_between(target_id, source_id) {
                let mut cycle = vec![source_id.clone()];
                cycle.extend(path);
                cycle.pop();
                return Err(WorkflowError::CyclicWorkflow { components: cycle });
            }
        }

        let connection =
            Connection::new(source_id.clone(), source_port, target_id.clone(), target_port);
        log::debug!("Connected {}", connection);
        self.connections.push(connection.clone());
        Ok(connection)
    }

    /// Remove a connection and unbind the input it fed
    pub fn disconnect(&mut self, connection: &Connection) -> Result<()> {
        let index = self
            .connections
            .iter()
            .position(|c| c == connection)
            .ok_or_else(|| WorkflowError::ConnectionNotFound(connection.to_string()))?;
        let removed = self.connections.remove(index);
        self.unbind_target(&removed);
        log::debug!("Disconnected {}", removed);
        Ok(())
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Connections feeding a component
    pub fn incoming_connections<'a>(
        &'a self,
        id: &'a ComponentId,
    ) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections
            .iter()
            .filter(move |c| &c.target_component == id)
    }

    /// Connections leaving a component
    pub fn outgoing_connections<'a>(
        &'a self,
        id: &'a ComponentId,
    ) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections
            .iter()
            .filter(move |c| &c.source_component == id)
    }

    /// Components this component reads from (upstream), without duplicates
    pub fn dependencies(&self, id: &ComponentId) -> Vec<ComponentId> {
        dedup(self.incoming_connections(id).map(|c| c.source_component.clone()))
    }

    /// Components reading from this component (downstream), without duplicates
    pub fn dependents(&self, id: &ComponentId) -> Vec<ComponentId> {
        dedup(self.outgoing_connections(id).map(|c| c.target_component.clone()))
    }

    // =========================================================================
    // Validation & ordering
    // =========================================================================

    /// Non-destructive check; an empty list means the graph is executable
    pub fn validate(&self) -> Vec<ValidationIssue> {
        validation::validate_graph(self)
    }

    /// Components in an order consistent with every connection
    pub fn execution_order(&self) -> Result<Vec<ComponentId>> {
        topology::execution_order(self)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Reset every component
    pub fn reset_all(&mut self) {
        for component in &mut self.components {
            component.reset();
        }
    }

    /// Clean up every component
    ///
    /// Failures are logged and returned; they never stop the remaining
    /// components from being cleaned.
    pub fn cleanup_all(&mut self) -> Vec<(ComponentId, ProcessingFailure)> {
        let mut failures = Vec::new();
        for component in &mut self.components {
            if let Err(failure) = component.cleanup() {
                log::warn!("Cleanup of component {} failed: {}", component.id(), failure);
                failures.push((component.id().clone(), failure));
            }
        }
        failures
    }

    /// Clean up and remove everything
    pub fn clear(&mut self) -> Vec<(ComponentId, ProcessingFailure)> {
        let failures = self.cleanup_all();
        self.components.clear();
        self.connections.clear();
        self.positions.clear();
        failures
    }

    fn unbind_target(&mut self, connection: &Connection) {
        if let Some(target) = self.get_mut(&connection.target_component) {
            // The port was validated when the connection was made
            let _ = target.clear_input(&connection.target_port);
        }
    }

    /// Shortest path `from → ... → to` along connections, if one exists
    fn path_between(&self, from: &ComponentId, to: &ComponentId) -> Option<Vec<ComponentId>> {
        let mut parents: HashMap<&ComponentId, &ComponentId> = HashMap::new();
        let mut seen: HashSet<&ComponentId> = HashSet::from([from]);
        let mut queue: VecDeque<&ComponentId> = VecDeque::from([from]);

        while let Some(current) = queue.pop_front() {
            if current == to {
                let mut path = vec![current.clone()];
                let mut cursor = current;
                while let Some(&parent) = parents.get(cursor) {
                    path.push(parent.clone());
                    cursor = parent;
                }
                path.reverse();
                return Some(path);
            }
            for connection in self.outgoing_connections(current) {
                let next = &connection.target_component;
                if seen.insert(next) {
                    parents.insert(next, current);
                    queue.push_back(next);
                }
            }
        }
        None
    }
}

fn dedup(ids: impl Iterator<Item = ComponentId>) -> Vec<ComponentId> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(id.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{FnProcessor, ProcessContext};
    use crate::types::PortValues;
    use serde_json::json;

    fn node(id: &str, inputs: &[&str], outputs: &[&str]) -> Component {
        let mut component = Component::with_id(
            id,
            "node",
            FnProcessor::new(|_: &ProcessContext<'_>| Ok(PortValues::new())),
        );
        for name in inputs {
            component.add_required_input_port(*name, "any").unwrap();
        }
        for name in outputs {
            component.add_output_port(*name, "any").unwrap();
        }
        component
    }

    fn id(s: &str) -> ComponentId {
        ComponentId::from(s)
    }

    fn chain() -> WorkflowGraph {
        let mut graph = WorkflowGraph::new("wf", "Chain");
        graph.add_component(node("a", &[], &["out"])).unwrap();
        graph.add_component(node("b", &["in"], &["out"])).unwrap();
        graph.add_component(node("c", &["in"], &["out"])).unwrap();
        graph.connect(&id("a"), "out", &id("b"), "in").unwrap();
        graph.connect(&id("b"), "out", &id("c"), "in").unwrap();
        graph
    }

    #[test]
    fn test_duplicate_component() {
        let mut graph = WorkflowGraph::new("wf", "Test");
        graph.add_component(node("a", &[], &[])).unwrap();
        let err = graph.add_component(node("a", &[], &[])).unwrap_err();
        assert!(matches!(err, WorkflowError::DuplicateComponent(_)));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_connect_unknown_component() {
        let mut graph = chain();
        let err = graph.connect(&id("a"), "out", &id("zzz"), "in").unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::ComponentNotFound(ref missing) if missing.as_str() == "zzz"
        ));
    }

    #[test]
    fn test_connect_rejects_cycle_by_default() {
        let mut graph = chain();
        graph.get_mut(&id("a")).unwrap().add_input_port("back", "any").unwrap();

        let err = graph.connect(&id("c"), "out", &id("a"), "back").unwrap_err();
        match err {
            WorkflowError::CyclicWorkflow { components } => {
                assert_eq!(components, vec![id("c"), id("a"), id("b")]);
            }
            other => panic!("Expected CyclicWorkflow, got {other:?}"),
        }
        assert_eq!(graph.connections().len(), 2);
    }

    #[test]
    fn test_connect_allows_cycle_when_configured() {
        let config = GraphConfig {
            reject_cycles_on_connect: false,
        };
        let mut graph = WorkflowGraph::with_config("wf", "Loose", config);
        graph.add_component(node("a", &["in"], &["out"])).unwrap();
        graph.add_component(node("b", &["in"], &["out"])).unwrap();
        graph.connect(&id("a"), "out", &id("b"), "in").unwrap();
        graph.connect(&id("b"), "out", &id("a"), "in").unwrap();
        assert_eq!(graph.connections().len(), 2);
    }

    #[test]
    fn test_remove_component_cascades() {
        let mut graph = chain();
        graph.set_position(&id("b"), (10.0, 20.0)).unwrap();
        graph.get_mut(&id("c")).unwrap().set_input("in", json!(1)).unwrap();

        let removed = graph.remove_component(&id("b")).unwrap();
        assert_eq!(removed.id(), &id("b"));
        assert!(graph.connections().is_empty());
        assert!(graph.position(&id("b")).is_none());
        assert!(graph.get(&id("c")).unwrap().input("in").is_none());

        // Removing again is a no-op
        assert!(graph.remove_component(&id("b")).is_none());
    }

    #[test]
    fn test_disconnect_clears_bound_input() {
        let mut graph = chain();
        graph.get_mut(&id("b")).unwrap().set_input("in", json!("rows")).unwrap();

        let connection = Connection::new("a", "out", "b", "in");
        graph.disconnect(&connection).unwrap();
        assert_eq!(graph.connections().len(), 1);
        assert!(graph.get(&id("b")).unwrap().input("in").is_none());

        let err = graph.disconnect(&connection).unwrap_err();
        assert!(matches!(err, WorkflowError::ConnectionNotFound(_)));
    }

    #[test]
    fn test_dependencies_and_dependents() {
        let mut graph = chain();
        graph.add_component(node("d", &["x", "y"], &[])).unwrap();
        graph.connect(&id("c"), "out", &id("d"), "x").unwrap();
        graph.connect(&id("c"), "out", &id("d"), "y").unwrap();

        assert_eq!(graph.dependencies(&id("b")), vec![id("a")]);
        assert_eq!(graph.dependencies(&id("d")), vec![id("c")]);
        assert_eq!(graph.dependents(&id("c")), vec![id("d")]);
        assert!(graph.dependents(&id("d")).is_empty());
        assert_eq!(graph.incoming_connections(&id("d")).count(), 2);
    }

    #[test]
    fn test_set_position_unknown_component() {
        let mut graph = chain();
        assert!(graph.set_position(&id("nope"), (0.0, 0.0)).is_err());
    }

    #[test]
    fn test_clear() {
        let mut graph = chain();
        let failures = graph.clear();
        assert!(failures.is_empty());
        assert!(graph.is_empty());
        assert!(graph.connections().is_empty());
    }
}
