//! Tool calling types shared by the chat and run protocol variants

use serde::{Deserialize, Serialize};

/// A complete, reassembled tool call requested by the model.
///
/// `arguments` is the raw argument text exactly as the model produced it.
/// It is usually a JSON object but may legitimately be malformed; decoding
/// happens at invocation time, not here. Within one turn, fragments that
/// shared a slot `index` were concatenated into this call in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: String,
    #[serde(default)]
    pub index: u32,
}

/// Result of one executed tool call, submitted back to the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

impl ToolOutput {
    pub fn new(tool_call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            output: output.into(),
        }
    }
}

/// Outbound description of a registered function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: serde_json::Value,
}
