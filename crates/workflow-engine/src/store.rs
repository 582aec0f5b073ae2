//! Workflow document storage with file persistence
//!
//! Documents are kept in memory, keyed by name, and optionally mirrored to a
//! directory as `<name>.json`. Overwriting a persisted document first copies
//! the previous file into a `backups/` subdirectory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::StoreConfig;
use crate::document::WorkflowDocument;
use crate::error::Result;

const BACKUP_DIR: &str = "backups";

/// Summary of a stored document (for listing)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredWorkflow {
    pub name: String,
    pub component_count: usize,
    pub connection_count: usize,
}

/// In-memory document store with optional directory persistence
#[derive(Debug, Default)]
pub struct WorkflowStore {
    documents: HashMap<String, WorkflowDocument>,
    persist_path: Option<PathBuf>,
    keep_backups: bool,
}

impl WorkflowStore {
    /// Create a store without persistence
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that persists to `config.path`
    ///
    /// The directory is created on first save.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            documents: HashMap::new(),
            persist_path: Some(config.path),
            keep_backups: config.keep_backups,
        }
    }

    pub fn persist_path(&self) -> Option<&Path> {
        self.persist_path.as_deref()
    }

    /// Load every `*.json` document from the persistence directory
    ///
    /// Files that cannot be parsed are skipped with a warning. Returns the
    /// number of documents loaded.
    pub fn load_from_disk(&mut self) -> Result<usize> {
        let Some(path) = &self.persist_path else {
            return Ok(0);
        };
        if !path.exists() {
            return Ok(0);
        }

        let mut count = 0;
        for entry in std::fs::read_dir(path)? {
            let file_path = entry?.path();
            if !file_path.is_file() || file_path.extension().map_or(true, |e| e != "json") {
                continue;
            }
            let Some(name) = file_path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
            else {
                continue;
            };

            let content = std::fs::read_to_string(&file_path)?;
            match WorkflowDocument::from_json_str(&content) {
                Ok(document) => {
                    log::info!("Loaded workflow '{}' from {:?}", name, file_path);
                    self.documents.insert(name, document);
                    count += 1;
                }
                Err(e) => {
                    log::warn!("Failed to parse workflow from {:?}: {}", file_path, e);
                }
            }
        }
        Ok(count)
    }

    /// Insert or replace a document, refreshing its modification time
    ///
    /// The document is persisted before it is stored in memory, so a failed
    /// write leaves the store unchanged.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        mut document: WorkflowDocument,
    ) -> Result<()> {
        let name = name.into();
        document.touch();
        self.save_to_disk(&name, &document)?;
        self.documents.insert(name, document);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&WorkflowDocument> {
        self.documents.get(name)
    }

    /// Remove a document from memory and disk
    pub fn remove(&mut self, name: &str) -> Result<Option<WorkflowDocument>> {
        self.delete_from_disk(name)?;
        Ok(self.documents.remove(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.documents.contains_key(name)
    }

    /// Summaries of every stored document, sorted by name
    pub fn list(&self) -> Vec<StoredWorkflow> {
        let mut list: Vec<StoredWorkflow> = self
            .documents
            .iter()
            .map(|(name, document)| StoredWorkflow {
                name: name.clone(),
                component_count: document.components.len(),
                connection_count: document.connections.len(),
            })
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    fn file_path(&self, name: &str) -> Option<PathBuf> {
        self.persist_path
            .as_ref()
            .map(|path| path.join(format!("{}.json", name)))
    }

    fn save_to_disk(&self, name: &str, document: &WorkflowDocument) -> Result<()> {
        let (Some(dir), Some(file_path)) = (&self.persist_path, self.file_path(name)) else {
            return Ok(());
        };

        std::fs::create_dir_all(dir)?;
        if self.keep_backups && file_path.exists() {
            let backup = self.create_backup(dir, name, &file_path)?;
            log::info!("Created backup {:?}", backup);
        }

        std::fs::write(&file_path, document.to_json_string()?)?;
        log::debug!("Saved workflow '{}' to {:?}", name, file_path);
        Ok(())
    }

    fn create_backup(&self, dir: &Path, name: &str, file_path: &Path) -> Result<PathBuf> {
        let backup_dir = dir.join(BACKUP_DIR);
        std::fs::create_dir_all(&backup_dir)?;
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S_%3f");
        let backup_path = backup_dir.join(format!("{}_backup_{}.json", name, timestamp));
        std::fs::copy(file_path, &backup_path)?;
        Ok(backup_path)
    }

    fn delete_from_disk(&self, name: &str) -> Result<()> {
        let Some(file_path) = self.file_path(name) else {
            return Ok(());
        };
        if file_path.exists() {
            std::fs::remove_file(&file_path)?;
            log::debug!("Deleted workflow '{}' from {:?}", name, file_path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::document::ComponentEntry;
    use crate::graph::WorkflowGraph;
    use crate::types::{ComponentId, ConfigMap};
    use tempfile::TempDir;

    fn document(components: &[&str]) -> WorkflowDocument {
        let mut doc = WorkflowDocument::from_graph(&WorkflowGraph::new("wf", "Test"));
        doc.components = components
            .iter()
            .map(|id| ComponentEntry {
                id: ComponentId::from(*id),
                type_name: "node".to_string(),
                config: ConfigMap::new(),
                position: None,
            })
            .collect();
        if components.len() > 1 {
            doc.connections
                .push(Connection::new(components[0], "out", components[1], "in"));
        }
        doc
    }

    fn store_at(dir: &TempDir, keep_backups: bool) -> WorkflowStore {
        WorkflowStore::with_config(StoreConfig {
            path: dir.path().join("workflows"),
            keep_backups,
        })
    }

    #[test]
    fn test_in_memory_store() {
        let mut store = WorkflowStore::new();
        store.insert("pipeline", document(&["a", "b"])).unwrap();

        assert!(store.contains("pipeline"));
        assert!(store.get("nonexistent").is_none());
        assert_eq!(
            store.list(),
            vec![StoredWorkflow {
                name: "pipeline".to_string(),
                component_count: 2,
                connection_count: 1,
            }]
        );

        let removed = store.remove("pipeline").unwrap();
        assert!(removed.is_some());
        assert!(!store.contains("pipeline"));
    }

    #[test]
    fn test_persistent_store() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut store = store_at(&temp_dir, true);
            store.insert("first", document(&["a"])).unwrap();
            store.insert("second", document(&["a", "b"])).unwrap();
        }

        let mut store = store_at(&temp_dir, true);
        assert_eq!(store.load_from_disk().unwrap(), 2);
        assert_eq!(store.get("second").unwrap().components.len(), 2);
        assert_eq!(store.list()[0].name, "first");
    }

    #[test]
    fn test_overwrite_creates_backup() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_at(&temp_dir, true);
        store.insert("flow", document(&["a"])).unwrap();
        store.insert("flow", document(&["a", "b"])).unwrap();

        let backup_dir = temp_dir.path().join("workflows").join(BACKUP_DIR);
        let backups: Vec<_> = std::fs::read_dir(&backup_dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(backups.len(), 1);
        let name = backups[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("flow_backup_"));

        // The backup holds the previous version; backups are not loaded as workflows
        let old = std::fs::read_to_string(&backups[0]).unwrap();
        assert_eq!(WorkflowDocument::from_json_str(&old).unwrap().components.len(), 1);
        let mut reloaded = store_at(&temp_dir, true);
        assert_eq!(reloaded.load_from_disk().unwrap(), 1);
    }

    #[test]
    fn test_backups_disabled() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_at(&temp_dir, false);
        store.insert("flow", document(&["a"])).unwrap();
        store.insert("flow", document(&["a", "b"])).unwrap();
        assert!(!temp_dir.path().join("workflows").join(BACKUP_DIR).exists());
    }

    #[test]
    fn test_load_skips_unparseable_files() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("workflows");
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join("broken.json"), "{ not json").unwrap();
        std::fs::write(path.join("notes.txt"), "ignored").unwrap();
        std::fs::write(path.join("good.json"), document(&["a"]).to_json_string().unwrap()).unwrap();

        let mut store = store_at(&temp_dir, true);
        assert_eq!(store.load_from_disk().unwrap(), 1);
        assert!(store.contains("good"));
        assert!(!store.contains("broken"));
    }

    #[test]
    fn test_remove_deletes_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_at(&temp_dir, true);
        store.insert("flow", document(&["a"])).unwrap();
        let file = temp_dir.path().join("workflows").join("flow.json");
        assert!(file.exists());

        store.remove("flow").unwrap();
        assert!(!file.exists());
    }

    #[test]
    fn test_insert_refreshes_last_modified() {
        let mut store = WorkflowStore::new();
        let doc = document(&["a"]);
        let created = doc.metadata.last_modified;
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.insert("flow", doc).unwrap();
        assert!(store.get("flow").unwrap().metadata.last_modified > created);
    }

    #[test]
    fn test_missing_directory_loads_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_at(&temp_dir, true);
        assert_eq!(store.load_from_disk().unwrap(), 0);
        assert_eq!(WorkflowStore::new().load_from_disk().unwrap(), 0);
    }
}
