//! Workflow Engine - typed component graphs for data mining workflows
//!
//! This crate models a workflow as a directed graph of components wired
//! together through typed ports, and executes it in a deterministic
//! topological order. It supports:
//!
//! - Typed input/output ports with an `any` wildcard
//! - Connection rules checked at wiring time (no self-loops, single
//!   incoming connection per input, compatible types)
//! - Validation of cycles, required inputs and component configuration
//! - Sequential execution where a failing component only affects its
//!   dependents
//! - Cooperative cancellation, progress events and JSON documents
//!
//! # Architecture
//!
//! - `Component`: declared ports, bound values and a boxed `Processor`
//! - `WorkflowGraph`: components plus connections, validation and ordering
//! - `ExecutionEngine`: runs a graph and returns a `RunReport`
//! - `ComponentRegistry` / `WorkflowDocument` / `WorkflowStore`: rebuild and
//!   persist graphs
//! - `EventSink`: generic event streaming to the editor
//!
//! # Example
//!
//! ```ignore
//! use workflow_engine::{ExecutionEngine, WorkflowGraph};
//!
//! let mut graph = WorkflowGraph::new("wf-1", "Training");
//! graph.add_component(loader)?;
//! graph.add_component(model)?;
//! graph.connect(&"loader".into(), "data", &"model".into(), "data")?;
//!
//! let report = ExecutionEngine::default().run(&mut graph).await;
//! assert!(report.is_success());
//! ```

pub mod component;
pub mod config;
pub mod connection;
pub mod descriptor;
pub mod document;
pub mod engine;
pub mod error;
pub mod events;
pub mod graph;
pub mod port;
pub mod processor;
pub mod registry;
pub mod store;
pub mod topology;
pub mod types;
pub mod validation;

// Re-export key types
pub use component::{
    Component, ComponentError, ComponentErrorKind, ComponentResult, ComponentSnapshot, PortState,
};
pub use config::{EngineConfig, GraphConfig, StoreConfig, WorkflowConfig};
pub use connection::{can_connect, Connection};
pub use descriptor::{ComponentCategory, ComponentMetadata};
pub use document::{ComponentEntry, DocumentMetadata, WorkflowDocument, DOCUMENT_VERSION};
pub use engine::{ExecutionEngine, RunOutcome, RunReport};
pub use error::{Incompatibility, Result, WorkflowError};
pub use events::{
    ChannelEventSink, EventError, EventSink, NullEventSink, VecEventSink, WorkflowEvent,
};
pub use graph::WorkflowGraph;
pub use port::Port;
pub use processor::{
    FnProcessor, ProcessContext, ProcessResult, ProcessingFailure, Processor, ProgressReporter,
};
pub use registry::{ComponentFactory, ComponentRegistry, FnFactory};
pub use store::{StoredWorkflow, WorkflowStore};
pub use types::{
    ComponentId, ComponentStatus, ConfigMap, PortDirection, PortType, PortValues, Position,
};
pub use validation::ValidationIssue;

// Consumers hold on to the token returned by `ExecutionEngine::cancellation_token`
pub use tokio_util::sync::CancellationToken;
