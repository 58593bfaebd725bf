//! Tool handler trait: the abstraction over external capabilities.
//!
//! Tools are how the assistant reaches the rest of the product: look up a
//! school, update a student's list, search locations. The engine only knows
//! a name, a JSON parameter object, and the text that comes back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ToolError;
use crate::message::{CallerId, ConversationId};

/// A decoded request to execute a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to execute
    pub name: String,

    /// Parameters as a JSON object
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, parameters: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }
}

/// The normalized result of a dispatched tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// Whether the tool ran and returned normally
    pub succeeded: bool,

    /// Handler output on success, failure reason otherwise
    pub text: String,
}

impl ToolOutcome {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            text: text.into(),
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            text: reason.into(),
        }
    }
}

/// Ambient context handed to every tool handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolContext {
    /// Who the run acts on behalf of
    pub caller: CallerId,

    /// The chat the run belongs to
    pub conversation_id: ConversationId,
}

impl ToolContext {
    pub fn new(caller: CallerId, conversation_id: ConversationId) -> Self {
        Self {
            caller,
            conversation_id,
        }
    }
}

/// The core tool handler trait.
///
/// Each capability (school search, list update, location lookup, ...)
/// implements this trait and is registered in a [`ToolRegistry`] that the
/// dispatcher is constructed with.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// The unique name the model uses to call this tool.
    fn name(&self) -> &str;

    /// A description of what this tool does (for prompt construction).
    fn description(&self) -> &str {
        ""
    }

    /// Execute the tool with the given parameters.
    async fn execute(
        &self,
        parameters: &serde_json::Map<String, serde_json::Value>,
        context: &ToolContext,
    ) -> std::result::Result<String, ToolError>;
}

/// A registry of available tool handlers, keyed by name.
///
/// Built once by the host and injected into the dispatcher; it is never
/// mutated during a run, so concurrent runs can share it behind an `Arc`.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a handler. Replaces any existing handler with the same name.
    pub fn register(&mut self, tool: Box<dyn ToolHandler>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, tool: Box<dyn ToolHandler>) -> Self {
        self.register(tool);
        self
    }

    /// Get a handler by name.
    pub fn get(&self, name: &str) -> Option<&dyn ToolHandler> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Resolve and execute a tool call.
    pub async fn execute(
        &self,
        call: &ToolCall,
        context: &ToolContext,
    ) -> std::result::Result<String, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::UnknownTool(call.name.clone()))?;
        tool.execute(&call.parameters, context).await
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Echoes the `text` parameter back, prefixed with the caller id.
    struct EchoTool;

    #[async_trait]
    impl ToolHandler for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        async fn execute(
            &self,
            parameters: &serde_json::Map<String, serde_json::Value>,
            context: &ToolContext,
        ) -> std::result::Result<String, ToolError> {
            let text = parameters
                .get("text")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ToolError::InvalidParameters("missing 'text'".into()))?;
            Ok(format!("{}: {text}", context.caller))
        }
    }

    fn ctx() -> ToolContext {
        ToolContext::new(CallerId::from("student-7"), ConversationId::from("chat-1"))
    }

    fn params(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn registry_register_and_lookup() {
        let registry = ToolRegistry::new().with(Box::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.names(), vec!["echo"]);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn registry_execute_tool() {
        let registry = ToolRegistry::new().with(Box::new(EchoTool));
        let call = ToolCall::new("echo", params(serde_json::json!({"text": "hello"})));
        let output = registry.execute(&call, &ctx()).await.unwrap();
        assert_eq!(output, "student-7: hello");
    }

    #[tokio::test]
    async fn registry_execute_missing_tool() {
        let registry = ToolRegistry::new();
        let call = ToolCall::new("nonexistent", serde_json::Map::new());
        let err = registry.execute(&call, &ctx()).await.unwrap_err();
        assert_eq!(err, ToolError::UnknownTool("nonexistent".into()));
    }

    #[tokio::test]
    async fn handler_errors_pass_through() {
        let registry = ToolRegistry::new().with(Box::new(EchoTool));
        let call = ToolCall::new("echo", serde_json::Map::new());
        let err = registry.execute(&call, &ctx()).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters(_)));
    }
}
