//! Shared test helpers: scripted model output and canned tools.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use campuspilot_core::error::{TokenSourceError, ToolError};
use campuspilot_core::message::{CallerId, ConversationId};
use campuspilot_core::model::{ModelClient, TokenSource, TurnRequest};
use campuspilot_core::tool::{ToolContext, ToolHandler};

pub fn test_context() -> ToolContext {
    ToolContext::new(CallerId::from("student-1"), ConversationId::from("chat-1"))
}

/// Split text into one chunk per character.
pub fn char_chunks(text: &str) -> Vec<String> {
    text.chars().map(String::from).collect()
}

/// A token source that plays back prepared chunks.
pub struct ScriptedSource {
    chunks: VecDeque<Result<String, TokenSourceError>>,
    cancellable: bool,
    stall: bool,
    cancelled: Arc<AtomicBool>,
}

impl ScriptedSource {
    pub fn new<I, T>(chunks: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(|c| Ok(c.into())).collect(),
            cancellable: true,
            stall: false,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Report `can_cancel() == false`.
    pub fn uncancellable(mut self) -> Self {
        self.cancellable = false;
        self
    }

    /// Fail with `error` after the prepared chunks.
    pub fn then_fail(mut self, error: TokenSourceError) -> Self {
        self.chunks.push_back(Err(error));
        self
    }

    /// Never finish after the prepared chunks.
    pub fn then_stall(mut self) -> Self {
        self.stall = true;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }
}

#[async_trait]
impl TokenSource for ScriptedSource {
    async fn next_chunk(&mut self) -> Option<Result<String, TokenSourceError>> {
        if self.cancelled.load(Ordering::SeqCst) {
            return None;
        }
        match self.chunks.pop_front() {
            Some(chunk) => Some(chunk),
            None if self.stall => futures::future::pending().await,
            None => None,
        }
    }

    fn can_cancel(&self) -> bool {
        self.cancellable
    }

    fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

/// A model that returns one scripted source per turn.
///
/// Panics if more turns are requested than scripted, unless built with
/// [`repeating`](ScriptedModel::repeating).
pub struct ScriptedModel {
    turns: Mutex<VecDeque<Result<ScriptedSource, TokenSourceError>>>,
    repeat: Option<String>,
    requests: Mutex<Vec<TurnRequest>>,
}

impl ScriptedModel {
    pub fn new(turns: Vec<ScriptedSource>) -> Self {
        Self {
            turns: Mutex::new(turns.into_iter().map(Ok).collect()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// One single-chunk turn per string.
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| ScriptedSource::new([*t])).collect())
    }

    /// Emits the same text on every turn, forever.
    pub fn repeating(text: &str) -> Self {
        Self {
            turns: Mutex::new(VecDeque::new()),
            repeat: Some(text.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fail to open the next turn's stream.
    pub fn then_open_error(self, error: TokenSourceError) -> Self {
        self.turns.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<TurnRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn open(&self, request: TurnRequest) -> Result<Box<dyn TokenSource>, TokenSourceError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };

        let next = self.turns.lock().unwrap().pop_front();
        match (next, &self.repeat) {
            (Some(Ok(source)), _) => Ok(Box::new(source)),
            (Some(Err(e)), _) => Err(e),
            (None, Some(text)) => Ok(Box::new(ScriptedSource::new([text.clone()]))),
            (None, None) => panic!("ScriptedModel: no more turns (call #{call})"),
        }
    }
}

/// Always returns the same text.
pub struct StaticTool {
    name: String,
    output: String,
}

impl StaticTool {
    pub fn new(name: &str, output: &str) -> Self {
        Self {
            name: name.into(),
            output: output.into(),
        }
    }
}

#[async_trait]
impl ToolHandler for StaticTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        _parameters: &serde_json::Map<String, serde_json::Value>,
        _context: &ToolContext,
    ) -> Result<String, ToolError> {
        Ok(self.output.clone())
    }
}

/// Always fails with the same reason.
pub struct FailingTool {
    name: String,
    reason: String,
}

impl FailingTool {
    pub fn new(name: &str, reason: &str) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ToolHandler for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        _parameters: &serde_json::Map<String, serde_json::Value>,
        _context: &ToolContext,
    ) -> Result<String, ToolError> {
        Err(ToolError::failed(&self.name, &self.reason))
    }
}

/// Panics when called.
pub struct PanickingTool {
    name: String,
}

impl PanickingTool {
    pub fn new(name: &str) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl ToolHandler for PanickingTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        _parameters: &serde_json::Map<String, serde_json::Value>,
        _context: &ToolContext,
    ) -> Result<String, ToolError> {
        panic!("{} blew up", self.name)
    }
}
