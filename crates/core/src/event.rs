//! Outbound event channel: what the UI sees while a run progresses.
//!
//! Events are write-only from the engine's point of view: pushing one never
//! changes the conversation. Sinks decide whether to buffer, forward, or
//! drop them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};
use tracing::warn;

/// The coarse category of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Intermediate reasoning or recovered failures
    Thinking,
    /// A user-visible answer
    Response,
    /// An unrecoverable problem
    Error,
    /// Progress: step counters, tool activity
    Status,
    /// The run is over
    Complete,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thinking => "thinking",
            Self::Response => "response",
            Self::Error => "error",
            Self::Status => "status",
            Self::Complete => "complete",
        }
    }
}

/// A single pushed event with optional side-channel fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,

    pub content: String,

    /// Title suggestion for a brand-new conversation (first answer only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_title: Option<String>,

    /// Structured tool activity (name, parameters, result)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_data: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,

    pub timestamp: DateTime<Utc>,
}

impl AgentEvent {
    pub fn new(kind: EventKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            suggested_title: None,
            tool_data: None,
            progress: None,
            total: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.suggested_title = Some(title.into());
        self
    }

    pub fn with_tool_data(mut self, data: serde_json::Value) -> Self {
        self.tool_data = Some(data);
        self
    }

    pub fn with_progress(mut self, progress: u32, total: u32) -> Self {
        self.progress = Some(progress);
        self.total = Some(total);
        self
    }
}

/// Where events go. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: AgentEvent);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: AgentEvent) {}
}

/// Keeps every event in memory, in push order.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<AgentEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events pushed so far.
    pub fn events(&self) -> Vec<AgentEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Events of one kind, in push order.
    pub fn of_kind(&self, kind: EventKind) -> Vec<AgentEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.kind == kind)
            .collect()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: AgentEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}

/// Forwards events into a bounded mpsc channel (one consumer, e.g. an SSE
/// response). A full or closed channel drops the event.
pub struct ChannelSink {
    sender: mpsc::Sender<AgentEvent>,
}

impl ChannelSink {
    /// Create a sink and its receiving half.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<AgentEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: AgentEvent) {
        if let Err(e) = self.sender.try_send(event) {
            warn!(kind = e.into_inner().kind.as_str(), "Event channel unavailable, dropping event");
        }
    }
}

/// A broadcast-based sink for multiple subscribers.
///
/// Uses `tokio::sync::broadcast`; slow subscribers lag rather than block
/// the run.
pub struct BroadcastSink {
    sender: broadcast::Sender<Arc<AgentEvent>>,
}

impl BroadcastSink {
    /// Create a new broadcast sink with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<AgentEvent>> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: AgentEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }
}
