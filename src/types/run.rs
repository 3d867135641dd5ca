//! Run lifecycle types for the assistant/thread protocol variant

use serde::{Deserialize, Serialize};

use super::tool::{ToolCallRequest, ToolDescriptor};

/// Snapshot of a server-side run.
///
/// Owned by the remote service; the local system never mutates one, it only
/// reacts to snapshots carried by lifecycle events. `pending_calls` is
/// populated (in submission order) when `status` is `RequiresAction`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub thread_id: String,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_calls: Vec<ToolCallRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<RunError>,
}

impl Run {
    /// Detail string for failure reporting, if the service supplied one.
    pub fn error_detail(&self) -> Option<String> {
        self.last_error
            .as_ref()
            .map(|e| format!("{}: {}", e.code, e.message))
    }
}

/// Lifecycle states a run progresses through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
}

impl RunStatus {
    /// Terminal states that abort dispatch with an error.
    pub fn is_terminal_failure(&self) -> bool {
        matches!(
            self,
            RunStatus::Failed | RunStatus::Cancelled | RunStatus::Incomplete | RunStatus::Expired
        )
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
            RunStatus::Completed => "completed",
            RunStatus::Incomplete => "incomplete",
            RunStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Error block attached to a failed run snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    pub code: String,
    pub message: String,
}

/// One lifecycle event from a run event stream.
///
/// Wire payloads are resolved into this union exactly once, at the transport
/// boundary; downstream code never re-inspects raw event names or JSON.
/// Unrecognized events map to `Ignored` and are skipped, never an error.
#[derive(Debug, Clone)]
pub enum RunEvent {
    RunCreated(Run),
    RunRequiresAction(Run),
    RunCompleted(Run),
    /// Any other run snapshot (failed, cancelled, queued, ...). Keeps
    /// terminal failures observable without a variant per status.
    RunStatusChanged(Run),
    MessageDelta(MessageDeltaPayload),
    MessageCompleted,
    Ignored { name: String },
}

impl RunEvent {
    /// The run snapshot this event carries, if any.
    pub fn run(&self) -> Option<&Run> {
        match self {
            RunEvent::RunCreated(run)
            | RunEvent::RunRequiresAction(run)
            | RunEvent::RunCompleted(run)
            | RunEvent::RunStatusChanged(run) => Some(run),
            _ => None,
        }
    }
}

/// Text fragments carried by one message delta event, in order.
#[derive(Debug, Clone, Default)]
pub struct MessageDeltaPayload {
    pub fragments: Vec<String>,
}

/// Everything needed to create a remote assistant.
#[derive(Debug, Clone)]
pub struct AssistantSpec {
    pub name: String,
    pub model: String,
    pub instructions: String,
    pub tools: Vec<ToolDescriptor>,
}

impl AssistantSpec {
    pub fn new(
        name: impl Into<String>,
        model: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            instructions: instructions.into(),
            tools: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.tools = tools;
        self
    }
}
