//! Folds streamed deltas into one complete assistant message

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::types::{FinishReason, Message, MessageRole, StreamDelta, ToolCallFragment};
use crate::types::ToolCallRequest;
use crate::{Error, Result};

use super::sink::OutputSink;

/// Result of accumulating one streamed turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub message: Message,
    pub finish_reason: FinishReason,
}

/// Partially assembled tool call. Fragments join the builder by slot index;
/// the id and name come from the opening fragment.
struct CallBuilder {
    index: u32,
    id: String,
    name: String,
    arguments: String,
}

impl CallBuilder {
    fn open(fragment: &ToolCallFragment) -> Self {
        tracing::debug!(
            index = fragment.index,
            name = fragment.name.as_deref().unwrap_or(""),
            "opened tool call slot"
        );
        Self {
            index: fragment.index,
            id: fragment.id.clone().unwrap_or_default(),
            name: fragment.name.clone().unwrap_or_default(),
            arguments: fragment.arguments.clone(),
        }
    }

    fn absorb(&mut self, fragment: &ToolCallFragment) {
        if self.id.is_empty() {
            if let Some(ref id) = fragment.id {
                self.id = id.clone();
            }
        }
        if self.name.is_empty() {
            if let Some(ref name) = fragment.name {
                self.name = name.clone();
            }
        }
        self.arguments.push_str(&fragment.arguments);
    }

    fn finish(self) -> ToolCallRequest {
        ToolCallRequest {
            id: self.id,
            name: self.name,
            arguments: self.arguments,
            index: self.index,
        }
    }
}

/// Fold an entire delta stream into one assistant message.
///
/// Content fragments are appended in order and mirrored to `sink` as they
/// arrive. Tool-call fragments are routed by slot index: a fragment whose
/// index matches the most recently created builder extends that call's
/// argument text, any other index opens a new call. The index is only
/// compared against the newest builder; slot indices within a turn are
/// non-decreasing, so no map lookup is needed.
///
/// The role advertised by the first role-bearing delta becomes the
/// assembled message's role; a stream that never sends one yields an
/// assistant message.
///
/// The first delta with no role, no content and no tool fragment is the
/// turn-end sentinel; it finalizes the open builder and supplies the finish
/// reason. A stream that ends without a sentinel is treated as complete,
/// with the finish reason inferred from what accumulated. All state lives
/// in this call frame; nothing carries over between turns.
///
/// Errors: [`Error::EmptyTurn`] when the turn produced neither content nor
/// tool calls, [`Error::Cancelled`] when `cancel` fires mid-stream (partial
/// state is discarded), and any error the stream itself yields.
pub async fn collect_turn<S>(
    mut deltas: S,
    sink: &mut dyn OutputSink,
    cancel: &CancellationToken,
) -> Result<TurnOutcome>
where
    S: Stream<Item = Result<StreamDelta>> + Unpin,
{
    let mut role: Option<MessageRole> = None;
    let mut text = String::new();
    let mut builders: Vec<CallBuilder> = Vec::new();
    let mut finish: Option<FinishReason> = None;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            next = deltas.next() => next,
        };
        let delta = match next {
            Some(delta) => delta?,
            None => break,
        };

        if role.is_none() {
            role = delta.role;
        }
        if let Some(ref reason) = delta.finish_reason {
            finish = Some(reason.clone());
        }

        if let Some(ref fragment) = delta.content {
            sink.write_fragment(fragment);
            text.push_str(fragment);
        }
        if let Some(ref fragment) = delta.tool_call {
            match builders.last_mut() {
                Some(current) if current.index == fragment.index => current.absorb(fragment),
                _ => builders.push(CallBuilder::open(fragment)),
            }
        }
        if delta.is_turn_end() {
            break;
        }
    }

    let tool_calls: Vec<ToolCallRequest> = builders.into_iter().map(CallBuilder::finish).collect();
    let content = (!text.is_empty()).then_some(text);
    if content.is_none() && tool_calls.is_empty() {
        return Err(Error::EmptyTurn);
    }

    let finish_reason = finish.unwrap_or(if tool_calls.is_empty() {
        FinishReason::Stop
    } else {
        FinishReason::ToolCalls
    });

    tracing::debug!(
        finish_reason = %finish_reason,
        tool_calls = tool_calls.len(),
        content_len = content.as_deref().map(str::len).unwrap_or(0),
        "turn accumulated"
    );

    Ok(TurnOutcome {
        message: Message::streamed_turn(
            role.unwrap_or(MessageRole::Assistant),
            content,
            tool_calls,
        ),
        finish_reason,
    })
}
