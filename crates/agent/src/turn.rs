//! Turn processor: one model invocation from first chunk to outcome.
//!
//! # States
//!
//! ```text
//! Streaming ──(complete <tool> at the front, cancellable source)──► ToolDetected ─┐
//!     │                                                                           ├─► Finalizing ─► Continue | Done
//!     └──────────────(source reports done)─────────────────────────► MessageEnd ──┘
//! ```
//!
//! While streaming, regions are pulled off the front of the buffer as soon
//! as they close: nothing behind an unclosed `<thinking>`, `<title>`,
//! `<answer>` or `<tool>` opening tag is touched, and a complete tool region
//! at the front stops the reveal. What gets shown or stored therefore
//! depends only on the text, never on how it was chunked.
//!
//! Early exit keeps the text up to the end of that first tool region and
//! treats the rest as unread. Finalizing then works through what is left
//! in source order, one region at a time.

use campuspilot_core::error::TokenSourceError;
use campuspilot_core::message::{Message, Role};
use campuspilot_core::model::TokenSource;
use campuspilot_core::tool::ToolContext;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dispatcher::ToolDispatcher;
use crate::emitter::EventEmitter;
use crate::scanner::{self, TagKind, TagRegion};

/// Tags that open a region of their own in model output.
const OUTER_TAGS: [TagKind; 4] = [TagKind::Thinking, TagKind::Title, TagKind::Answer, TagKind::Tool];

/// When tool regions are looked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolScanMode {
    /// Stop reading as soon as a complete tool region arrives, if the
    /// source supports cancellation. Otherwise behaves like `EndOfStream`.
    #[default]
    EarlyExit,
    /// Always read the stream to its end first.
    EndOfStream,
}

/// What the driver should do after a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    /// Tool results were added; the model needs another turn.
    Continue,
    /// The turn produced a final answer (or nothing at all).
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnResult {
    pub outcome: TurnOutcome,
    pub had_tool_call: bool,
    /// Whether an explicit `<answer>` was captured this turn
    pub answered: bool,
    pub messages_appended: usize,
    /// Whether the token source was cancelled after a tool region arrived
    pub exited_early: bool,
    /// Everything the model sent this turn, verbatim
    pub transcript: String,
}

/// Run-scoped facts the turn processor needs to carry between turns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunMarkers {
    /// Title suggestions are only wanted for conversations with no answers yet
    pub title_wanted: bool,
    /// Any answer (tagged or implicit) has been produced this run
    pub answered: bool,
    /// An explicit `<answer>` tag has been seen this run
    pub tagged_answer_seen: bool,
}

impl RunMarkers {
    pub fn new(title_wanted: bool) -> Self {
        Self {
            title_wanted,
            ..Self::default()
        }
    }
}

/// Per-turn scratch state. Dropped at turn end.
#[derive(Default)]
struct TurnState {
    buffer: String,
    transcript: String,
    pending_title: Option<String>,
    answered: bool,
    had_tool_call: bool,
    appended: usize,
}

pub struct TurnProcessor<'a> {
    dispatcher: &'a ToolDispatcher,
    emitter: &'a EventEmitter,
    context: &'a ToolContext,
    mode: ToolScanMode,
}

impl<'a> TurnProcessor<'a> {
    pub fn new(
        dispatcher: &'a ToolDispatcher,
        emitter: &'a EventEmitter,
        context: &'a ToolContext,
        mode: ToolScanMode,
    ) -> Self {
        Self {
            dispatcher,
            emitter,
            context,
            mode,
        }
    }

    /// Drive one turn. Messages are appended to `messages` as they are
    /// produced, so a mid-stream failure leaves every answer captured so far
    /// in place.
    pub async fn process(
        &self,
        source: &mut dyn TokenSource,
        messages: &mut Vec<Message>,
        markers: &mut RunMarkers,
    ) -> Result<TurnResult, TokenSourceError> {
        let mut state = TurnState::default();
        let early_exit = self.mode == ToolScanMode::EarlyExit && source.can_cancel();
        let mut exited_early = false;

        // ── Streaming ──
        while let Some(chunk) = source.next_chunk().await {
            let chunk = chunk?;
            state.buffer.push_str(&chunk);
            state.transcript.push_str(&chunk);

            self.reveal(&mut state, messages, markers);

            if early_exit
                && let Some(tool) = scanner::peek_front(&state.buffer, &OUTER_TAGS)
                && tool.kind == TagKind::Tool
            {
                let unread = state.buffer.len() - tool.span.end;
                debug!(unread, "Tool region complete, releasing token source");
                state.buffer.truncate(tool.span.end);
                source.cancel();
                exited_early = true;
                break;
            }
        }

        // ── MessageEnd ──
        if state.transcript.trim().is_empty() {
            debug!("Empty turn");
            return Ok(state.finish(TurnOutcome::Done, exited_early));
        }

        // ── Finalizing ──
        self.reveal(&mut state, messages, markers);

        while let Some(region) = next_in_source_order(&mut state.buffer) {
            if region.kind == TagKind::Tool {
                let dispatched = self
                    .dispatcher
                    .dispatch_region(&region.content, self.context, self.emitter)
                    .await;
                state.had_tool_call = true;
                state.push(messages, dispatched.to_message());
            } else {
                self.show(&mut state, messages, markers, region);
            }
        }

        let leftover = state.buffer.trim().to_string();
        let outcome = if state.had_tool_call {
            if !leftover.is_empty() {
                debug!(chars = leftover.len(), "Discarding untagged text next to a tool call");
            }
            if state.answered {
                TurnOutcome::Done
            } else {
                TurnOutcome::Continue
            }
        } else {
            if !leftover.is_empty() {
                let role = if markers.tagged_answer_seen {
                    Role::Answer
                } else {
                    Role::Question
                };
                self.capture_answer(&mut state, messages, markers, leftover, role);
            }
            TurnOutcome::Done
        };

        Ok(state.finish(outcome, exited_early))
    }

    /// Pull regions off the front of the buffer until a tool region or an
    /// unclosed tag is reached.
    fn reveal(&self, state: &mut TurnState, messages: &mut Vec<Message>, markers: &mut RunMarkers) {
        while let Some(region) = scanner::take_front(&mut state.buffer, &OUTER_TAGS, &[TagKind::Tool]) {
            self.show(state, messages, markers, region);
        }
    }

    /// Handle a thinking, title or answer region.
    fn show(
        &self,
        state: &mut TurnState,
        messages: &mut Vec<Message>,
        markers: &mut RunMarkers,
        region: TagRegion,
    ) {
        match region.kind {
            TagKind::Thinking => self.emitter.thinking(region.content),
            TagKind::Title => {
                if markers.title_wanted && !markers.answered && state.pending_title.is_none() {
                    state.pending_title = Some(region.content);
                } else {
                    debug!(title = %region.content, "Ignoring title suggestion");
                }
            }
            TagKind::Answer => {
                self.capture_answer(state, messages, markers, region.content, Role::Answer)
            }
            other => debug!(kind = %other, "Ignoring region"),
        }
    }

    fn capture_answer(
        &self,
        state: &mut TurnState,
        messages: &mut Vec<Message>,
        markers: &mut RunMarkers,
        content: String,
        role: Role,
    ) {
        let title = if markers.title_wanted && !markers.answered {
            state.pending_title.take()
        } else {
            None
        };

        markers.answered = true;
        if role == Role::Answer {
            state.answered = true;
            markers.tagged_answer_seen = true;
        }

        self.emitter.answer(content.clone(), title);
        state.push(messages, Message::new(role, content));
    }
}

impl TurnState {
    fn push(&mut self, messages: &mut Vec<Message>, message: Message) {
        messages.push(message);
        self.appended += 1;
    }

    fn finish(self, outcome: TurnOutcome, exited_early: bool) -> TurnResult {
        TurnResult {
            outcome,
            had_tool_call: self.had_tool_call,
            answered: self.answered,
            messages_appended: self.appended,
            exited_early,
            transcript: self.transcript,
        }
    }
}

/// Remove whichever complete region starts first in the buffer. Unclosed
/// tags are passed over and end up in the leftover text.
fn next_in_source_order(buffer: &mut String) -> Option<TagRegion> {
    let kind = OUTER_TAGS
        .iter()
        .filter_map(|kind| scanner::find(buffer, *kind).map(|r| (*kind, r.span.start)))
        .min_by_key(|(_, start)| *start)?
        .0;
    scanner::take(buffer, kind)
}
