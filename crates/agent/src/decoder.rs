//! Tool-call decoder: turns a `<tool>` region's content into a [`ToolCall`].
//!
//! Expected shape:
//!
//! ```text
//! <name>school_lookup</name>
//! <parameters>{"name": "Reed College"}</parameters>
//! ```
//!
//! Whether the name refers to a registered tool is not checked here; that is
//! the dispatcher's job.

use campuspilot_core::error::ToolError;
use campuspilot_core::tool::ToolCall;
use serde_json::Value;

use crate::scanner::{self, TagKind};

/// Decode a tool region's inner content.
pub fn decode(content: &str) -> Result<ToolCall, ToolError> {
    let name = scanner::find(content, TagKind::Name)
        .ok_or_else(|| ToolError::MalformedToolCall("missing <name> section".into()))?;
    let parameters = scanner::find(content, TagKind::Parameters)
        .ok_or_else(|| ToolError::MalformedToolCall("missing <parameters> section".into()))?;

    let value: Value = serde_json::from_str(&parameters.content)
        .map_err(|e| ToolError::InvalidParameters(format!("parameters are not valid JSON: {e}")))?;

    match value {
        Value::Object(map) => Ok(ToolCall::new(name.content, map)),
        other => Err(ToolError::InvalidParameters(format!(
            "parameters must be a JSON object, got {}",
            json_type(&other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
