//! Configuration types for graphs, the engine and the document store

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default values
pub mod defaults {
    /// Reject a connection that would close a cycle at connect time
    pub const REJECT_CYCLES_ON_CONNECT: bool = true;
    /// Reset every component before a run
    pub const RESET_BEFORE_RUN: bool = false;
    /// Clean up every component after a run
    pub const CLEANUP_AFTER_RUN: bool = false;
    /// Directory for persisted workflow documents
    pub const STORE_PATH: &str = "./data/workflows";
    /// Copy the previous document aside before overwriting it
    pub const KEEP_BACKUPS: bool = true;
}

/// Rules applied while editing a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GraphConfig {
    /// When off, cycles are only reported by validation and ordering
    pub reject_cycles_on_connect: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            reject_cycles_on_connect: defaults::REJECT_CYCLES_ON_CONNECT,
        }
    }
}

/// Behavior of [`ExecutionEngine`](crate::engine::ExecutionEngine) runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub reset_before_run: bool,
    pub cleanup_after_run: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reset_before_run: defaults::RESET_BEFORE_RUN,
            cleanup_after_run: defaults::CLEANUP_AFTER_RUN,
        }
    }
}

/// Where and how workflow documents are persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreConfig {
    pub path: PathBuf,
    pub keep_backups: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(defaults::STORE_PATH),
            keep_backups: defaults::KEEP_BACKUPS,
        }
    }
}

/// All settings of the workflow core
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkflowConfig {
    pub graph: GraphConfig,
    pub engine: EngineConfig,
    pub store: StoreConfig,
}

impl WorkflowConfig {
    /// Parse settings from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
