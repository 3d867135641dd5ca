//! Incremental fragments of a streamed model turn

use serde::{Deserialize, Serialize};

use super::message::MessageRole;

/// One delta from a streamed chat turn.
///
/// A delta carries the role (first fragment of the turn only), a content
/// fragment, a single tool-call fragment, or none of these. A delta with
/// none of them is the turn-end sentinel and carries the finish reason.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<MessageRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCallFragment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl StreamDelta {
    pub fn role(role: MessageRole) -> Self {
        Self {
            role: Some(role),
            ..Self::default()
        }
    }

    pub fn content(fragment: impl Into<String>) -> Self {
        Self {
            content: Some(fragment.into()),
            ..Self::default()
        }
    }

    pub fn tool_fragment(fragment: ToolCallFragment) -> Self {
        Self {
            tool_call: Some(fragment),
            ..Self::default()
        }
    }

    pub fn finish(reason: FinishReason) -> Self {
        Self {
            finish_reason: Some(reason),
            ..Self::default()
        }
    }

    /// Sentinel check: no role, no content, no tool fragment.
    pub fn is_turn_end(&self) -> bool {
        self.role.is_none() && self.content.is_none() && self.tool_call.is_none()
    }
}

/// One fragment of a tool call under assembly.
///
/// `index` is the slot index distinguishing concurrently-announced calls
/// within a turn; `id` and `name` arrive on a call's first fragment,
/// `arguments` text accumulates across all of them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolCallFragment {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: String,
}

impl ToolCallFragment {
    /// First fragment of a call: opens the slot and names the function.
    pub fn opener(index: u32, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index,
            id: Some(id.into()),
            name: Some(name.into()),
            arguments: String::new(),
        }
    }

    /// Argument-text continuation for an already-opened slot.
    pub fn arguments(index: u32, fragment: impl Into<String>) -> Self {
        Self {
            index,
            id: None,
            name: None,
            arguments: fragment.into(),
        }
    }
}

/// Terminal classifier of a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    ContentFilter,
    #[serde(untagged)]
    Other(String),
}

impl FinishReason {
    pub fn from_wire(s: &str) -> Self {
        match s {
            "stop" => FinishReason::Stop,
            "tool_calls" => FinishReason::ToolCalls,
            "length" => FinishReason::Length,
            "content_filter" => FinishReason::ContentFilter,
            other => FinishReason::Other(other.to_string()),
        }
    }

    pub fn as_wire(&self) -> &str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::ToolCalls => "tool_calls",
            FinishReason::Length => "length",
            FinishReason::ContentFilter => "content_filter",
            FinishReason::Other(s) => s.as_str(),
        }
    }

    /// Whether the turn paused for tool execution.
    pub fn is_tool_calls(&self) -> bool {
        matches!(self, FinishReason::ToolCalls)
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_wire())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_has_no_payload() {
        assert!(StreamDelta::finish(FinishReason::Stop).is_turn_end());
        assert!(!StreamDelta::content("hi").is_turn_end());
        assert!(!StreamDelta::role(MessageRole::Assistant).is_turn_end());
        assert!(!StreamDelta::tool_fragment(ToolCallFragment::arguments(0, "{")).is_turn_end());
    }

    #[test]
    fn finish_reason_wire_names_round() {
        assert_eq!(FinishReason::from_wire("tool_calls"), FinishReason::ToolCalls);
        assert_eq!(FinishReason::from_wire("stop"), FinishReason::Stop);
        assert_eq!(
            FinishReason::from_wire("function_call"),
            FinishReason::Other("function_call".into())
        );
        assert_eq!(FinishReason::ToolCalls.as_wire(), "tool_calls");
    }
}
