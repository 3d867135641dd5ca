//! Decides what an accumulated turn means for the conversation

use serde_json::{json, Value};

use crate::registry::FunctionRegistry;
use crate::types::{FinishReason, Message, ToolCallRequest};
use crate::{Error, Result};

/// What the conversation does next after one accumulated turn.
#[derive(Debug)]
pub enum ConversationStep {
    /// The turn is final; the text is ready to record and display.
    Answer(String),
    /// The turn paused for tools. Contains the assistant message (with its
    /// calls) followed by one tool message per call, ready to append to
    /// history before re-requesting without further user input.
    ToolRound(Vec<Message>),
}

/// Resolve one accumulated assistant message against the registry.
///
/// A finish reason of `tool_calls` runs every requested call in listed
/// order. A call that fails is isolated: its tool message carries an
/// error-marker payload and the remaining calls still run, so the model
/// always receives exactly one tool message per call it made.
pub async fn resolve_turn(
    message: Message,
    finish_reason: &FinishReason,
    registry: &FunctionRegistry,
) -> Result<ConversationStep> {
    if finish_reason.is_tool_calls() && message.has_tool_calls() {
        let calls = message.tool_calls.clone();
        let mut follow_up = Vec::with_capacity(calls.len() + 1);
        follow_up.push(message);
        for call in &calls {
            let output = execute_call(registry, call).await?;
            follow_up.push(Message::tool(output, &call.id));
        }
        return Ok(ConversationStep::ToolRound(follow_up));
    }

    Ok(ConversationStep::Answer(
        message.text_content().unwrap_or_default().to_string(),
    ))
}

/// Run a single tool call, turning call-scoped failures into error-marker
/// output instead of aborting the round.
pub(crate) async fn execute_call(
    registry: &FunctionRegistry,
    call: &ToolCallRequest,
) -> Result<String> {
    match registry.invoke(&call.name, &call.arguments).await {
        Ok(value) => Ok(render_output(value)),
        Err(err) if err.is_call_scoped() => {
            tracing::warn!(
                function = %call.name,
                call_id = %call.id,
                error = %err,
                "tool call failed, continuing round"
            );
            Ok(error_marker(&err))
        }
        Err(err) => Err(err),
    }
}

/// String payload for a tool message. Bare strings stay bare so the model
/// reads them directly; everything else is serialized JSON.
fn render_output(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn error_marker(err: &Error) -> String {
    let kind = match err {
        Error::UnknownFunction { .. } => "unknown_function",
        Error::ArgumentDecode { .. } => "invalid_arguments",
        Error::HandlerExecution { .. } => "execution_failed",
        _ => "tool_error",
    };
    json!({ "error": kind, "detail": err.to_string() }).to_string()
}
