//! Tool dispatcher: resolves decoded calls against the injected registry.
//!
//! Every failure mode (undecodable region, unknown name, handler error,
//! handler panic) is turned into a failed [`ToolOutcome`] whose text is fed
//! back to the model. Nothing here can abort a run.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use campuspilot_core::error::ToolError;
use campuspilot_core::message::Message;
use campuspilot_core::tool::{ToolCall, ToolContext, ToolOutcome, ToolRegistry};
use futures::FutureExt;
use tracing::{debug, warn};

use crate::decoder;
use crate::emitter::EventEmitter;

/// The result of dispatching one tool region.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    /// The decoded call, if the region could be decoded at all
    pub call: Option<ToolCall>,
    pub outcome: ToolOutcome,
}

impl Dispatched {
    /// The synthetic history message that carries this result back to the model.
    pub fn to_message(&self) -> Message {
        match (&self.call, self.outcome.succeeded) {
            (Some(call), true) => {
                Message::user(format!("Tool {} returned: {}", call.name, self.outcome.text))
            }
            (Some(call), false) => {
                Message::user(format!("Tool {} failed: {}", call.name, self.outcome.text))
            }
            (None, _) => Message::user(format!(
                "Tool call could not be parsed: {}",
                self.outcome.text
            )),
        }
    }
}

pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Decode a raw `<tool>` region and dispatch it.
    pub async fn dispatch_region(
        &self,
        content: &str,
        context: &ToolContext,
        emitter: &EventEmitter,
    ) -> Dispatched {
        match decoder::decode(content) {
            Ok(call) => {
                let outcome = self.dispatch(&call, context, emitter).await;
                Dispatched {
                    call: Some(call),
                    outcome,
                }
            }
            Err(e) => {
                warn!(error = %e, "Could not decode tool call");
                emitter.thinking(format!("I wrote a tool call that could not be read ({e})."));
                Dispatched {
                    call: None,
                    outcome: ToolOutcome::failure(e.to_string()),
                }
            }
        }
    }

    /// Execute a decoded call, emitting start and result events.
    pub async fn dispatch(
        &self,
        call: &ToolCall,
        context: &ToolContext,
        emitter: &EventEmitter,
    ) -> ToolOutcome {
        emitter.tool_started(call);

        let start = Instant::now();
        let result = AssertUnwindSafe(self.registry.execute(call, context))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(ToolError::failed(&call.name, "handler panicked")));
        let duration_ms = start.elapsed().as_millis() as u64;

        let outcome = match result {
            Ok(text) => {
                debug!(tool = %call.name, duration_ms, "Tool call succeeded");
                ToolOutcome::success(text)
            }
            Err(e) => {
                warn!(tool = %call.name, duration_ms, error = %e, "Tool call failed");
                emitter.thinking(format!("{} did not work: {e}", call.name));
                ToolOutcome::failure(failure_text(e))
            }
        };

        emitter.tool_result(&call.name, &outcome.text, outcome.succeeded);
        outcome
    }
}

/// The history already names the tool, so execution failures carry only
/// their reason.
fn failure_text(error: ToolError) -> String {
    match error {
        ToolError::ExecutionFailed { reason, .. } => reason,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FailingTool, PanickingTool, StaticTool, test_context};
    use campuspilot_core::event::{CollectingSink, EventKind};

    fn dispatcher() -> ToolDispatcher {
        let registry = ToolRegistry::new()
            .with(Box::new(StaticTool::new("lookup", "42")))
            .with(Box::new(FailingTool::new("flaky", "index offline")))
            .with(Box::new(PanickingTool::new("explode")));
        ToolDispatcher::new(Arc::new(registry))
    }

    fn emitter() -> (EventEmitter, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::new());
        (EventEmitter::new(sink.clone()), sink)
    }

    #[tokio::test]
    async fn successful_call() {
        let (emitter, sink) = emitter();
        let dispatched = dispatcher()
            .dispatch_region(
                r#"<name>lookup</name><parameters>{"q":"x"}</parameters>"#,
                &test_context(),
                &emitter,
            )
            .await;

        assert_eq!(dispatched.outcome, ToolOutcome::success("42"));
        assert_eq!(dispatched.to_message(), Message::user("Tool lookup returned: 42"));

        let statuses = sink.of_kind(EventKind::Status);
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].tool_data.as_ref().unwrap()["parameters"]["q"], "x");
        assert_eq!(statuses[1].content, "42");
    }

    #[tokio::test]
    async fn unknown_tool_is_recovered() {
        let (emitter, sink) = emitter();
        let dispatched = dispatcher()
            .dispatch_region("<name>bogus</name><parameters>{}</parameters>", &test_context(), &emitter)
            .await;

        assert!(!dispatched.outcome.succeeded);
        assert_eq!(
            dispatched.to_message(),
            Message::user("Tool bogus failed: unknown tool 'bogus'")
        );
        assert_eq!(sink.of_kind(EventKind::Thinking).len(), 1);
    }

    #[tokio::test]
    async fn handler_error_is_recovered() {
        let (emitter, _) = emitter();
        let dispatched = dispatcher()
            .dispatch_region("<name>flaky</name><parameters>{}</parameters>", &test_context(), &emitter)
            .await;
        assert!(!dispatched.outcome.succeeded);
        assert_eq!(
            dispatched.to_message(),
            Message::user("Tool flaky failed: index offline")
        );
    }

    #[tokio::test]
    async fn handler_panic_is_recovered() {
        let (emitter, _) = emitter();
        let dispatched = dispatcher()
            .dispatch_region("<name>explode</name><parameters>{}</parameters>", &test_context(), &emitter)
            .await;
        assert!(!dispatched.outcome.succeeded);
        assert!(dispatched.outcome.text.contains("panicked"));
    }

    #[tokio::test]
    async fn decode_failure_is_recovered() {
        let (emitter, sink) = emitter();
        let dispatched = dispatcher()
            .dispatch_region("<name>lookup</name><parameters>{oops</parameters>", &test_context(), &emitter)
            .await;

        assert_eq!(dispatched.call, None);
        assert!(!dispatched.outcome.succeeded);
        assert!(
            dispatched
                .to_message()
                .content
                .starts_with("Tool call could not be parsed: invalid parameters")
        );
        // Never reached a handler
        assert!(sink.of_kind(EventKind::Status).is_empty());
        let thinking = sink.of_kind(EventKind::Thinking);
        assert_eq!(thinking.len(), 1);
        assert!(thinking[0].content.contains("could not be read"));
        assert!(!thinking[0].content.contains("retry"));
    }
}
