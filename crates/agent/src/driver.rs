//! The conversation driver: repeats turns until the model answers.
//!
//! 1. **Open** a token stream for the accumulated history
//! 2. **Process** the turn (answers and tool results land in history)
//! 3. **If Continue**: loop back to step 1
//! 4. **If Done**: push a completion event and hand the history back
//!
//! A step counter bounds the loop. When it reaches the limit the driver
//! appends a directive telling the model to answer now, runs exactly one
//! more turn, and stops whatever that turn does.

use std::sync::Arc;
use std::time::Duration;

use campuspilot_core::error::{Error, TokenSourceError};
use campuspilot_core::event::EventSink;
use campuspilot_core::message::{Message, Role};
use campuspilot_core::model::{ModelClient, TurnRequest};
use campuspilot_core::tool::{ToolContext, ToolRegistry};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::dispatcher::ToolDispatcher;
use crate::emitter::EventEmitter;
use crate::turn::{RunMarkers, ToolScanMode, TurnOutcome, TurnProcessor, TurnResult};

/// Appended to the first turn's instruction for conversations without answers.
pub const DEFAULT_TITLE_INSTRUCTION: &str = "This is the start of a new conversation. \
Along with your answer, suggest a short title for it (at most six words) inside <title></title> tags.";

/// Injected as a user message when the step limit is reached.
pub const DEFAULT_FINAL_ANSWER_DIRECTIVE: &str = "You have used all of your available steps. \
Do not call any more tools. Using only the information you already have, reply now with your \
final answer inside <answer></answer> tags.";

pub const DEFAULT_STEP_LIMIT: u32 = 150;

#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Turns allowed before the circuit breaker forces a final answer
    pub step_limit: u32,
    pub scan_mode: ToolScanMode,
    /// Deadline for the whole run, checked around every turn
    pub run_timeout: Option<Duration>,
    pub title_instruction: String,
    pub final_answer_directive: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            step_limit: DEFAULT_STEP_LIMIT,
            scan_mode: ToolScanMode::default(),
            run_timeout: None,
            title_instruction: DEFAULT_TITLE_INSTRUCTION.into(),
            final_answer_directive: DEFAULT_FINAL_ANSWER_DIRECTIVE.into(),
        }
    }
}

impl DriverConfig {
    pub fn with_step_limit(mut self, limit: u32) -> Self {
        self.step_limit = limit;
        self
    }

    pub fn with_scan_mode(mut self, mode: ToolScanMode) -> Self {
        self.scan_mode = mode;
        self
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }
}

/// Why a run ended normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// A turn reported Done.
    Answered,
    /// The step limit was hit and the forced final turn ran.
    CircuitBreaker,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// The full history: initial messages plus everything this run added
    pub messages: Vec<Message>,
    /// Model invocations made, including a forced final turn
    pub turns: u32,
    pub termination: Termination,
}

/// A run that stopped because the token source failed or the deadline
/// passed. The history up to that point is preserved.
#[derive(Debug, thiserror::Error)]
#[error("run aborted after {turns} turn(s): {error}")]
pub struct RunFailure {
    pub messages: Vec<Message>,
    pub turns: u32,
    #[source]
    pub error: Error,
}

pub struct ConversationDriver {
    model: Arc<dyn ModelClient>,
    dispatcher: ToolDispatcher,
    config: DriverConfig,
}

impl ConversationDriver {
    pub fn new(model: Arc<dyn ModelClient>, tools: Arc<ToolRegistry>, config: DriverConfig) -> Self {
        Self {
            model,
            dispatcher: ToolDispatcher::new(tools),
            config,
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Run a conversation to completion.
    pub async fn run(
        &self,
        initial: Vec<Message>,
        system_instruction: &str,
        context: &ToolContext,
        sink: Arc<dyn EventSink>,
    ) -> Result<RunReport, RunFailure> {
        let emitter = EventEmitter::new(sink);
        let step_limit = self.config.step_limit.max(1);
        let deadline = self.config.run_timeout.map(|t| Instant::now() + t);
        let initial_len = initial.len();
        let mut messages = initial;
        let mut markers = RunMarkers::new(!messages.iter().any(|m| m.role == Role::Answer));
        let mut step = 0u32;
        let mut turns = 0u32;

        info!(
            conversation_id = %context.conversation_id,
            model = self.model.name(),
            messages = messages.len(),
            step_limit,
            "Starting run"
        );

        let termination = loop {
            step += 1;
            turns += 1;
            emitter.step(step, step_limit);

            let instruction = if turns == 1 && markers.title_wanted {
                format!("{system_instruction}\n\n{}", self.config.title_instruction)
            } else {
                system_instruction.to_string()
            };

            let result = match self
                .turn(instruction, &mut messages, &mut markers, context, &emitter, deadline)
                .await
            {
                Ok(result) => result,
                Err(error) => return Err(abort(&emitter, error, messages, turns)),
            };

            debug!(
                conversation_id = %context.conversation_id,
                step,
                outcome = ?result.outcome,
                appended = result.messages_appended,
                "Turn finished"
            );

            if result.outcome == TurnOutcome::Done {
                break Termination::Answered;
            }

            if step >= step_limit {
                warn!(
                    conversation_id = %context.conversation_id,
                    step_limit,
                    "Step limit reached, forcing a final answer"
                );
                emitter.status("Step limit reached, asking for a final answer");
                messages.push(Message::user(self.config.final_answer_directive.clone()));

                turns += 1;
                if let Err(error) = self
                    .turn(
                        system_instruction.to_string(),
                        &mut messages,
                        &mut markers,
                        context,
                        &emitter,
                        deadline,
                    )
                    .await
                {
                    return Err(abort(&emitter, error, messages, turns));
                }
                break Termination::CircuitBreaker;
            }
        };

        let final_text = last_visible(&messages[initial_len..]).unwrap_or_default();
        emitter.complete(final_text);

        info!(
            conversation_id = %context.conversation_id,
            turns,
            added = messages.len() - initial_len,
            termination = ?termination,
            "Run complete"
        );

        Ok(RunReport {
            messages,
            turns,
            termination,
        })
    }

    /// Open a stream and process one turn, bounded by the run deadline.
    async fn turn(
        &self,
        system_instruction: String,
        messages: &mut Vec<Message>,
        markers: &mut RunMarkers,
        context: &ToolContext,
        emitter: &EventEmitter,
        deadline: Option<Instant>,
    ) -> Result<TurnResult, Error> {
        let processor = TurnProcessor::new(&self.dispatcher, emitter, context, self.config.scan_mode);
        let request = TurnRequest {
            system_instruction,
            messages: messages.clone(),
        };

        let work = async {
            let mut source = self.model.open(request).await?;
            processor.process(source.as_mut(), messages, markers).await
        };

        let result = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, work).await {
                Ok(result) => result,
                Err(_) => Err(TokenSourceError::Timeout {
                    secs: self.config.run_timeout.map(|t| t.as_secs()).unwrap_or_default(),
                }),
            },
            None => work.await,
        };

        result.map_err(Error::from)
    }
}

fn abort(emitter: &EventEmitter, error: Error, messages: Vec<Message>, turns: u32) -> RunFailure {
    warn!(error = %error, turns, "Run aborted");
    emitter.error(error.to_string());
    let final_text = last_visible(&messages).unwrap_or_default();
    emitter.complete(final_text);
    RunFailure {
        messages,
        turns,
        error,
    }
}

fn last_visible(messages: &[Message]) -> Option<String> {
    messages
        .iter()
        .rev()
        .find(|m| m.role.is_user_visible())
        .map(|m| m.content.clone())
}
