//! Typed helpers over an [`EventSink`].
//!
//! The emitter is the only way the agent crate talks to the UI. It never
//! reads anything back, so nothing pushed here can affect the conversation.

use std::sync::Arc;

use campuspilot_core::event::{AgentEvent, EventKind, EventSink};
use campuspilot_core::tool::ToolCall;
use serde_json::{Value, json};

#[derive(Clone)]
pub struct EventEmitter {
    sink: Arc<dyn EventSink>,
}

impl EventEmitter {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    pub fn emit(&self, event: AgentEvent) {
        self.sink.emit(event);
    }

    pub fn thinking(&self, text: impl Into<String>) {
        self.emit(AgentEvent::new(EventKind::Thinking, text));
    }

    /// A user-visible answer, optionally carrying a title suggestion.
    pub fn answer(&self, text: impl Into<String>, title: Option<String>) {
        let mut event = AgentEvent::new(EventKind::Response, text);
        event.suggested_title = title;
        self.emit(event);
    }

    pub fn status(&self, text: impl Into<String>) {
        self.emit(AgentEvent::new(EventKind::Status, text));
    }

    /// Step counter for progress bars.
    pub fn step(&self, step: u32, limit: u32) {
        self.emit(
            AgentEvent::new(EventKind::Status, format!("Step {step} of at most {limit}"))
                .with_progress(step, limit),
        );
    }

    pub fn tool_started(&self, call: &ToolCall) {
        self.emit(
            AgentEvent::new(EventKind::Status, format!("Using {}", call.name)).with_tool_data(
                json!({
                    "name": call.name,
                    "parameters": call.parameters,
                }),
            ),
        );
    }

    pub fn tool_result(&self, name: &str, text: &str, succeeded: bool) {
        let shown = display_result(text);
        self.emit(
            AgentEvent::new(EventKind::Status, shown.clone()).with_tool_data(json!({
                "name": name,
                "result": shown,
                "succeeded": succeeded,
            })),
        );
    }

    pub fn error(&self, text: impl Into<String>) {
        self.emit(AgentEvent::new(EventKind::Error, text));
    }

    pub fn complete(&self, text: impl Into<String>) {
        self.emit(AgentEvent::new(EventKind::Complete, text));
    }
}

/// Pretty-print JSON results, pass anything else through unchanged.
fn display_result(text: &str) -> String {
    match serde_json::from_str::<Value>(text) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => {
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| text.to_string())
        }
        _ => text.to_string(),
    }
}
