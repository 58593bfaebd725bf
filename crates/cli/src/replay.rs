//! Transcript replay: drives a full conversation run from a JSON script of
//! pre-recorded model output and canned tool results.
//!
//! ```json
//! {
//!   "system": "You are a college planning assistant.",
//!   "messages": [{ "role": "user", "content": "Find me schools in Ohio" }],
//!   "turns": [
//!     "<tool><name>school_search</name><parameters>{\"state\":\"OH\"}</parameters></tool>",
//!     ["<answer>Try ", "Kenyon.</answer>"],
//!     { "chunks": ["<thinking>hm"], "error": "connection reset" }
//!   ],
//!   "tools": {
//!     "school_search": { "schools": ["Kenyon", "Oberlin"] },
//!     "fafsa_lookup": { "error": "service offline" }
//!   }
//! }
//! ```

use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use async_trait::async_trait;
use campuspilot_agent::{ConversationDriver, DriverConfig, RunFailure, RunReport, StreamTokenSource};
use campuspilot_core::{
    AgentEvent, CallerId, ConversationId, EventSink, Message, ModelClient, TokenSource,
    TokenSourceError, ToolContext, ToolError, ToolHandler, ToolRegistry, TurnRequest,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A recorded conversation to play back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub system: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,

    /// History the run starts from
    #[serde(default)]
    pub messages: Vec<Message>,

    /// Model output, one entry per turn
    pub turns: Vec<ScriptTurn>,

    #[serde(default)]
    pub tools: HashMap<String, CannedResult>,
}

/// What the model "says" on one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptTurn {
    Text(String),
    Chunks(Vec<String>),
    /// Some chunks, then a stream failure
    Broken {
        #[serde(default)]
        chunks: Vec<String>,
        error: String,
    },
}

/// What a canned tool returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CannedResult {
    Failure { error: String },
    Output(serde_json::Value),
}

impl Script {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading replay script {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parsing replay script {}", path.display()))
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let script: Self = serde_json::from_str(raw)?;
        if script.turns.is_empty() {
            anyhow::bail!("script has no turns");
        }
        Ok(script)
    }

    pub fn context(&self) -> ToolContext {
        let caller = self
            .caller
            .as_deref()
            .map(CallerId::from)
            .unwrap_or_else(CallerId::anonymous);
        let conversation = self
            .conversation_id
            .as_deref()
            .map(ConversationId::from)
            .unwrap_or_default();
        ToolContext::new(caller, conversation)
    }

    pub fn registry(&self) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for (name, result) in &self.tools {
            registry.register(Box::new(CannedTool::new(name, result.clone())));
        }
        registry
    }
}

/// Plays back scripted turns in order.
pub struct ReplayModel {
    turns: Mutex<VecDeque<ScriptTurn>>,
    chunk_size: Option<usize>,
    served: Mutex<usize>,
}

impl ReplayModel {
    pub fn new(turns: Vec<ScriptTurn>, chunk_size: Option<usize>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            chunk_size: chunk_size.filter(|size| *size > 0),
            served: Mutex::new(0),
        }
    }

    fn chunks(&self, chunks: Vec<String>) -> Vec<String> {
        match self.chunk_size {
            Some(size) => rechunk(&chunks.concat(), size),
            None => chunks,
        }
    }
}

/// Split `text` into pieces of at most `size` characters.
pub fn rechunk(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size.max(1))
        .map(|piece| piece.iter().collect())
        .collect()
}

#[async_trait]
impl ModelClient for ReplayModel {
    fn name(&self) -> &str {
        "replay"
    }

    async fn open(&self, request: TurnRequest) -> Result<Box<dyn TokenSource>, TokenSourceError> {
        let turn_number = {
            let mut served = self.served.lock().unwrap_or_else(|p| p.into_inner());
            *served += 1;
            *served
        };
        let next = self
            .turns
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front();

        debug!(
            turn = turn_number,
            history = request.messages.len(),
            "Replaying turn"
        );

        let items: Vec<Result<String, TokenSourceError>> = match next {
            Some(ScriptTurn::Text(text)) => self.chunks(vec![text]).into_iter().map(Ok).collect(),
            Some(ScriptTurn::Chunks(chunks)) => self.chunks(chunks).into_iter().map(Ok).collect(),
            Some(ScriptTurn::Broken { chunks, error }) => self
                .chunks(chunks)
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(TokenSourceError::StreamInterrupted(error))))
                .collect(),
            None => {
                warn!(turn = turn_number, "Replay script exhausted");
                return Err(TokenSourceError::Unavailable(format!(
                    "replay script has no turn {turn_number}"
                )));
            }
        };

        Ok(Box::new(StreamTokenSource::new(futures::stream::iter(items))))
    }
}

/// A tool that returns a fixed result regardless of parameters.
pub struct CannedTool {
    name: String,
    result: CannedResult,
}

impl CannedTool {
    pub fn new(name: &str, result: CannedResult) -> Self {
        Self {
            name: name.to_string(),
            result,
        }
    }
}

#[async_trait]
impl ToolHandler for CannedTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Replays a recorded result"
    }

    async fn execute(
        &self,
        _parameters: &serde_json::Map<String, serde_json::Value>,
        _context: &ToolContext,
    ) -> Result<String, ToolError> {
        match &self.result {
            CannedResult::Failure { error } => Err(ToolError::failed(&self.name, error)),
            CannedResult::Output(serde_json::Value::String(text)) => Ok(text.clone()),
            CannedResult::Output(value) => Ok(value.to_string()),
        }
    }
}

/// Writes each event as one JSON line.
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn emit(&self, event: AgentEvent) {
        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to serialize event");
                return;
            }
        };
        let mut writer = self.writer.lock().unwrap_or_else(|p| p.into_inner());
        if let Err(e) = writeln!(writer, "{line}").and_then(|_| writer.flush()) {
            warn!(error = %e, "Failed to write event");
        }
    }
}

/// Run `script` through a fresh driver.
pub async fn run_script(
    script: Script,
    config: DriverConfig,
    chunk_size: Option<usize>,
    sink: Arc<dyn EventSink>,
) -> Result<RunReport, RunFailure> {
    let context = script.context();
    let registry = Arc::new(script.registry());
    let model = Arc::new(ReplayModel::new(script.turns, chunk_size));
    let driver = ConversationDriver::new(model, registry, config);

    driver
        .run(script.messages, &script.system, &context, sink)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_turn_shapes() {
        let script = Script::from_json(
            r#"{
                "turns": [
                    "<answer>hi</answer>",
                    ["<answer>", "hi</answer>"],
                    { "chunks": ["<thinking>"], "error": "reset" }
                ],
                "tools": {
                    "a": "plain",
                    "b": { "rows": 2 },
                    "c": { "error": "offline" }
                }
            }"#,
        )
        .unwrap();

        assert!(matches!(script.turns[0], ScriptTurn::Text(_)));
        assert!(matches!(script.turns[1], ScriptTurn::Chunks(_)));
        assert!(matches!(script.turns[2], ScriptTurn::Broken { .. }));
        assert!(matches!(script.tools["c"], CannedResult::Failure { .. }));
        assert!(matches!(script.tools["b"], CannedResult::Output(_)));
    }

    #[test]
    fn script_without_turns_rejected() {
        let err = Script::from_json(r#"{ "turns": [] }"#).unwrap_err();
        assert!(err.to_string().contains("no turns"));
    }

    #[test]
    fn rechunk_respects_char_boundaries() {
        assert_eq!(rechunk("héllo", 2), vec!["hé", "ll", "o"]);
        assert_eq!(rechunk("", 3), Vec::<String>::new());
    }

    #[tokio::test]
    async fn canned_tool_results() {
        let ctx = ToolContext::new(CallerId::anonymous(), ConversationId::from("c"));
        let params = serde_json::Map::new();

        let text = CannedTool::new("a", CannedResult::Output("plain".into()));
        assert_eq!(text.execute(&params, &ctx).await.unwrap(), "plain");

        let json = CannedTool::new("b", CannedResult::Output(serde_json::json!({"rows": 2})));
        assert_eq!(json.execute(&params, &ctx).await.unwrap(), r#"{"rows":2}"#);

        let failing = CannedTool::new(
            "c",
            CannedResult::Failure {
                error: "offline".into(),
            },
        );
        let err = failing.execute(&params, &ctx).await.unwrap_err();
        assert_eq!(err, ToolError::failed("c", "offline"));
    }

    #[tokio::test]
    async fn exhausted_script_fails_open() {
        let model = ReplayModel::new(vec![ScriptTurn::Text("x".into())], None);
        let request = TurnRequest {
            system_instruction: "sys".into(),
            messages: Vec::new(),
        };
        assert!(model.open(request.clone()).await.is_ok());
        let err = model.open(request).await.err().unwrap();
        assert!(matches!(err, TokenSourceError::Unavailable(_)));
    }

    #[test]
    fn json_lines_sink_writes_one_line_per_event() {
        let sink = JsonLinesSink::new(Vec::new());
        sink.emit(AgentEvent::new(campuspilot_core::EventKind::Thinking, "a"));
        sink.emit(AgentEvent::new(campuspilot_core::EventKind::Complete, ""));

        let out = String::from_utf8(sink.writer.into_inner().unwrap()).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["type"], "thinking");
        assert_eq!(first["content"], "a");
    }
}
