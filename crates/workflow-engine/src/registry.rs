//! Component type registry
//!
//! Maps component type names to metadata and a factory that builds fresh
//! instances. The registry is an explicit value handed to whoever needs to
//! create components (the document loader, the editor palette); there is no
//! process-wide registry.
//!
//! # Usage
//!
//! ```ignore
//! let mut registry = ComponentRegistry::new();
//! registry.register_fn(
//!     ComponentMetadata::new("file_loader", "File Loader", ComponentCategory::Input),
//!     |id, _config| {
//!         let mut component = Component::with_id(id, "file_loader", LoaderProcessor::default());
//!         component.add_output_port("data", "dataset")?;
//!         Ok(component)
//!     },
//! );
//! let loader = registry.create("file_loader", "loader-1".into(), ConfigMap::new())?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::component::Component;
use crate::descriptor::{ComponentCategory, ComponentMetadata};
use crate::error::{Result, WorkflowError};
use crate::types::{ComponentId, ConfigMap};

/// Builds components of one type
pub trait ComponentFactory: Send + Sync {
    /// Create a component with the given id
    ///
    /// `config` is the configuration the instance will carry; factories may
    /// read it to decide which ports to declare.
    fn create(&self, id: ComponentId, config: &ConfigMap) -> Result<Component>;
}

/// Closure-based factory
pub struct FnFactory<F> {
    func: F,
}

impl<F> FnFactory<F>
where
    F: Fn(ComponentId, &ConfigMap) -> Result<Component> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> ComponentFactory for FnFactory<F>
where
    F: Fn(ComponentId, &ConfigMap) -> Result<Component> + Send + Sync,
{
    fn create(&self, id: ComponentId, config: &ConfigMap) -> Result<Component> {
        (self.func)(id, config)
    }
}

struct RegistryEntry {
    metadata: ComponentMetadata,
    factory: Arc<dyn ComponentFactory>,
}

/// Registry of component types
pub struct ComponentRegistry {
    entries: HashMap<String, RegistryEntry>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a component type; replaces any earlier registration
    pub fn register(&mut self, metadata: ComponentMetadata, factory: Arc<dyn ComponentFactory>) {
        log::debug!("Registered component type '{}'", metadata.type_name);
        self.entries
            .insert(metadata.type_name.clone(), RegistryEntry { metadata, factory });
    }

    /// Register a component type backed by a closure
    pub fn register_fn<F>(&mut self, metadata: ComponentMetadata, func: F)
    where
        F: Fn(ComponentId, &ConfigMap) -> Result<Component> + Send + Sync + 'static,
    {
        self.register(metadata, Arc::new(FnFactory::new(func)));
    }

    /// Build a new instance of a registered type
    ///
    /// The instance always carries `type_name` and exactly `config`,
    /// whatever the factory did with them. A factory that ignores `id` is
    /// an error.
    pub fn create(
        &self,
        type_name: &str,
        id: ComponentId,
        config: ConfigMap,
    ) -> Result<Component> {
        let entry = self
            .entries
            .get(type_name)
            .ok_or_else(|| WorkflowError::UnknownComponentType(type_name.to_string()))?;
        let mut component = entry.factory.create(id.clone(), &config)?;
        if component.id() != &id {
            return Err(WorkflowError::FactoryIdMismatch {
                type_name: type_name.to_string(),
                expected: id,
                actual: component.id().clone(),
            });
        }
        component.set_type_name(type_name);
        Ok(component.with_config(config))
    }

    pub fn has_type(&self, type_name: &str) -> bool {
        self.entries.contains_key(type_name)
    }

    pub fn metadata(&self, type_name: &str) -> Option<&ComponentMetadata> {
        self.entries.get(type_name).map(|e| &e.metadata)
    }

    /// All registered metadata, sorted by type name
    pub fn all_metadata(&self) -> Vec<&ComponentMetadata> {
        let mut all: Vec<_> = self.entries.values().map(|e| &e.metadata).collect();
        all.sort_by(|a, b| a.type_name.cmp(&b.type_name));
        all
    }

    /// Metadata grouped by palette category
    pub fn metadata_by_category(&self) -> HashMap<ComponentCategory, Vec<&ComponentMetadata>> {
        let mut grouped: HashMap<ComponentCategory, Vec<&ComponentMetadata>> = HashMap::new();
        for metadata in self.all_metadata() {
            grouped.entry(metadata.category).or_default().push(metadata);
        }
        grouped
    }

    /// Registered type names, sorted
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge another registry into this one
    ///
    /// Entries from `other` override entries in `self` with the same type name.
    pub fn merge(&mut self, other: ComponentRegistry) {
        self.entries.extend(other.entries);
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
