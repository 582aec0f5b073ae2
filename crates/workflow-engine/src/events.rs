//! Event types for streaming workflow progress
//!
//! Events are sent from the engine to the editor (or any consumer)
//! to report status changes, progress and failures. They are fire-and-forget:
//! a sink that fails to deliver never affects the run.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Trait for sending workflow events
///
/// This abstracts over the transport mechanism (channel, UI bridge, etc.)
/// allowing the engine to be used in different contexts.
pub trait EventSink: Send + Sync {
    /// Send an event
    ///
    /// Returns an error if the event could not be sent (e.g., channel closed)
    fn send(&self, event: WorkflowEvent) -> Result<(), EventError>;
}

/// Error when sending events fails
#[derive(Debug, Clone)]
pub struct EventError {
    pub message: String,
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Event error: {}", self.message)
    }
}

impl std::error::Error for EventError {}

impl EventError {
    pub fn channel_closed() -> Self {
        Self {
            message: "Channel closed".to_string(),
        }
    }
}

/// Events emitted while a workflow runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkflowEvent {
    /// Run started, after validation and ordering succeeded
    #[serde(rename_all = "camelCase")]
    RunStarted {
        workflow_id: String,
        execution_id: String,
        order: Vec<String>,
    },

    /// Every component in the order was attempted
    #[serde(rename_all = "camelCase")]
    RunCompleted {
        workflow_id: String,
        execution_id: String,
        succeeded: usize,
        failed: usize,
    },

    /// Run refused for structural reasons; nothing executed
    #[serde(rename_all = "camelCase")]
    RunFailed {
        workflow_id: String,
        execution_id: String,
        issues: Vec<String>,
    },

    /// Run stopped between components by a cancellation request
    #[serde(rename_all = "camelCase")]
    RunCancelled {
        workflow_id: String,
        execution_id: String,
        skipped: Vec<String>,
    },

    /// A component entered `processing`
    #[serde(rename_all = "camelCase")]
    ComponentStarted {
        component_id: String,
        execution_id: String,
    },

    /// A component completed successfully
    #[serde(rename_all = "camelCase")]
    ComponentCompleted {
        component_id: String,
        execution_id: String,
        output_ports: Vec<String>,
    },

    /// A component ended in `error`
    #[serde(rename_all = "camelCase")]
    ComponentFailed {
        component_id: String,
        execution_id: String,
        error: String,
    },

    /// Progress update reported by a component while processing
    #[serde(rename_all = "camelCase")]
    ComponentProgress {
        component_id: String,
        execution_id: String,
        progress: u8,
        message: Option<String>,
    },

    /// Releasing a component's resources failed
    #[serde(rename_all = "camelCase")]
    CleanupFailed { component_id: String, error: String },
}

impl WorkflowEvent {
    /// Create a component progress event
    pub fn component_progress(
        component_id: &str,
        execution_id: &str,
        progress: u8,
        message: Option<String>,
    ) -> Self {
        Self::ComponentProgress {
            component_id: component_id.to_string(),
            execution_id: execution_id.to_string(),
            progress: progress.min(100),
            message,
        }
    }

    /// Component the event concerns, if any
    pub fn component_id(&self) -> Option<&str> {
        match self {
            Self::ComponentStarted { component_id, .. }
            | Self::ComponentCompleted { component_id, .. }
            | Self::ComponentFailed { component_id, .. }
            | Self::ComponentProgress { component_id, .. }
            | Self::CleanupFailed { component_id, .. } => Some(component_id),
            _ => None,
        }
    }
}

/// A no-op event sink that discards all events
///
/// Useful for testing or when events aren't needed.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: WorkflowEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
pub struct VecEventSink {
    events: std::sync::Mutex<Vec<WorkflowEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl Default for VecEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: WorkflowEvent) -> Result<(), EventError> {
        let mut events = self.events.lock().map_err(|_| EventError {
            message: "Event buffer poisoned".to_string(),
        })?;
        events.push(event);
        Ok(())
    }
}

/// Event sink that forwards into a tokio channel
///
/// The receiving half is typically drained by the editor's UI task.
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<WorkflowEvent>,
}

impl ChannelEventSink {
    /// Create a sink together with the receiver it feeds
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<WorkflowEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn send(&self, event: WorkflowEvent) -> Result<(), EventError> {
        self.sender
            .send(event)
            .map_err(|_| EventError::channel_closed())
    }
}
