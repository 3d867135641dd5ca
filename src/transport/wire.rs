//! Wire mapping between OpenAI-style JSON payloads and domain types
//!
//! Payloads are resolved here, once, at the boundary. Downstream code only
//! ever sees [`StreamDelta`] and [`RunEvent`] values; no raw JSON or event
//! name strings escape this module.

use futures::{stream, StreamExt};
use serde_json::{json, Map, Value};

use crate::types::{
    AssistantSpec, FinishReason, Message, MessageContent, MessageDeltaPayload, MessageRole, Run,
    RunError, RunEvent, RunStatus, StreamDelta, ToolCallFragment, ToolCallRequest, ToolDescriptor,
    TurnRequest,
};
use crate::{BoxStream, Result};

use super::sse::SseFrame;
use super::{DeltaStream, RunEventStream, TransportError};

// ---------------------------------------------------------------------------
// Outbound request bodies
// ---------------------------------------------------------------------------

pub fn chat_request_body(request: &TurnRequest) -> Result<Value> {
    let mut messages = Vec::with_capacity(request.messages.len());
    for message in &request.messages {
        messages.push(message_json(message)?);
    }
    let mut body = json!({
        "model": request.model,
        "messages": messages,
        "stream": true,
    });
    if !request.tools.is_empty() {
        body["tools"] = tools_json(&request.tools);
    }
    if let Some(temperature) = request.temperature {
        body["temperature"] = json!(temperature);
    }
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    Ok(body)
}

pub fn assistant_request_body(spec: &AssistantSpec) -> Value {
    json!({
        "name": spec.name,
        "model": spec.model,
        "instructions": spec.instructions,
        "tools": tools_json(&spec.tools),
    })
}

pub fn tools_json(tools: &[ToolDescriptor]) -> Value {
    Value::Array(
        tools
            .iter()
            .map(|tool| {
                let mut function = json!({
                    "name": tool.name,
                    "parameters": tool.parameters,
                });
                if let Some(ref description) = tool.description {
                    function["description"] = json!(description);
                }
                json!({ "type": "function", "function": function })
            })
            .collect(),
    )
}

fn message_json(message: &Message) -> Result<Value> {
    let mut obj = Map::new();
    obj.insert("role".into(), json!(message.role.as_wire()));
    match &message.content {
        Some(MessageContent::Text(text)) => {
            obj.insert("content".into(), json!(text));
        }
        Some(MessageContent::Parts(parts)) => {
            obj.insert("content".into(), serde_json::to_value(parts)?);
        }
        None => {
            obj.insert("content".into(), Value::Null);
        }
    }
    if !message.tool_calls.is_empty() {
        let calls: Vec<Value> = message
            .tool_calls
            .iter()
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": { "name": call.name, "arguments": call.arguments },
                })
            })
            .collect();
        obj.insert("tool_calls".into(), Value::Array(calls));
    }
    if let Some(ref id) = message.tool_call_id {
        obj.insert("tool_call_id".into(), json!(id));
    }
    Ok(Value::Object(obj))
}

// ---------------------------------------------------------------------------
// Inbound: chat completion chunks -> StreamDelta
// ---------------------------------------------------------------------------

/// Adapt decoded SSE frames into the chat delta stream.
pub fn delta_stream(frames: BoxStream<'static, SseFrame>) -> DeltaStream {
    Box::pin(frames.flat_map(|frame| {
        let items: Vec<Result<StreamDelta>> = match frame {
            Ok(frame) => match chat_frame_deltas(&frame) {
                Ok(deltas) => deltas.into_iter().map(Ok).collect(),
                Err(e) => vec![Err(e.into())],
            },
            Err(e) => vec![Err(e)],
        };
        stream::iter(items)
    }))
}

/// Map one chat chunk to its deltas.
///
/// A single chunk can carry a role, a content fragment and several tool-call
/// fragments at once; it fans out so each [`StreamDelta`] carries at most
/// one payload, with the role riding the first delta and the finish reason
/// the last. Chunks without choices (usage reports) map to nothing.
pub fn chat_frame_deltas(frame: &SseFrame) -> std::result::Result<Vec<StreamDelta>, TransportError> {
    let chunk: Value = serde_json::from_str(&frame.data)
        .map_err(|e| TransportError::Decode(format!("chat chunk is not JSON: {}", e)))?;
    let choice = match chunk.pointer("/choices/0") {
        Some(choice) => choice,
        None => return Ok(Vec::new()),
    };
    let delta = &choice["delta"];

    let mut role = delta["role"].as_str().and_then(MessageRole::from_wire);
    let content = delta["content"].as_str().map(str::to_string);
    let finish = choice["finish_reason"].as_str().map(FinishReason::from_wire);

    let mut out = Vec::new();
    if let Some(text) = content {
        out.push(StreamDelta {
            role: role.take(),
            content: Some(text),
            ..StreamDelta::default()
        });
    }
    if let Some(calls) = delta["tool_calls"].as_array() {
        for entry in calls {
            out.push(StreamDelta {
                role: role.take(),
                tool_call: Some(fragment_json(entry)),
                ..StreamDelta::default()
            });
        }
    }
    if let Some(role) = role.take() {
        out.push(StreamDelta::role(role));
    }
    if let Some(reason) = finish {
        match out.last_mut() {
            Some(last) => last.finish_reason = Some(reason),
            None => out.push(StreamDelta::finish(reason)),
        }
    }
    Ok(out)
}

fn fragment_json(entry: &Value) -> ToolCallFragment {
    ToolCallFragment {
        index: entry["index"].as_u64().unwrap_or(0) as u32,
        id: entry["id"].as_str().map(str::to_string),
        name: entry
            .pointer("/function/name")
            .and_then(Value::as_str)
            .map(str::to_string),
        arguments: entry
            .pointer("/function/arguments")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    }
}

// ---------------------------------------------------------------------------
// Inbound: named lifecycle events -> RunEvent
// ---------------------------------------------------------------------------

/// Adapt decoded SSE frames into the run event stream.
pub fn run_event_stream(frames: BoxStream<'static, SseFrame>) -> RunEventStream {
    Box::pin(frames.map(|frame| match frame {
        Ok(frame) => run_event_from(&frame).map_err(Into::into),
        Err(e) => Err(e),
    }))
}

/// Resolve one named event and its payload.
///
/// Run snapshots parse into [`Run`]; `thread.run.step.*` events describe
/// steps, not the run itself, and are ignored along with everything else
/// not listed.
pub fn run_event_from(frame: &SseFrame) -> std::result::Result<RunEvent, TransportError> {
    let name = frame.event.as_deref().unwrap_or("");
    match name {
        "thread.run.created" => Ok(RunEvent::RunCreated(parse_run(&frame.data)?)),
        "thread.run.requires_action" => Ok(RunEvent::RunRequiresAction(parse_run(&frame.data)?)),
        "thread.run.completed" => Ok(RunEvent::RunCompleted(parse_run(&frame.data)?)),
        "thread.message.delta" => Ok(RunEvent::MessageDelta(parse_message_delta(&frame.data)?)),
        "thread.message.completed" => Ok(RunEvent::MessageCompleted),
        other if other.starts_with("thread.run.step") => Ok(RunEvent::Ignored {
            name: other.to_string(),
        }),
        other if other.starts_with("thread.run.") => {
            Ok(RunEvent::RunStatusChanged(parse_run(&frame.data)?))
        }
        other => Ok(RunEvent::Ignored {
            name: other.to_string(),
        }),
    }
}

fn parse_run(data: &str) -> std::result::Result<Run, TransportError> {
    let v: Value = serde_json::from_str(data)
        .map_err(|e| TransportError::Decode(format!("run snapshot is not JSON: {}", e)))?;
    let id = v["id"]
        .as_str()
        .ok_or_else(|| TransportError::Decode("run snapshot missing id".into()))?
        .to_string();
    let status_str = v["status"]
        .as_str()
        .ok_or_else(|| TransportError::Decode("run snapshot missing status".into()))?;
    let status: RunStatus = serde_json::from_value(Value::String(status_str.to_string()))
        .map_err(|_| TransportError::Decode(format!("unknown run status '{}'", status_str)))?;

    let pending_calls = v
        .pointer("/required_action/submit_tool_outputs/tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .enumerate()
                .map(|(i, call)| ToolCallRequest {
                    id: call["id"].as_str().unwrap_or_default().to_string(),
                    name: call
                        .pointer("/function/name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    arguments: call
                        .pointer("/function/arguments")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    index: i as u32,
                })
                .collect()
        })
        .unwrap_or_default();

    let last_error = v["last_error"].as_object().map(|e| RunError {
        code: e.get("code").and_then(Value::as_str).unwrap_or_default().to_string(),
        message: e
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    });

    Ok(Run {
        id,
        thread_id: v["thread_id"].as_str().unwrap_or_default().to_string(),
        status,
        pending_calls,
        last_error,
    })
}

fn parse_message_delta(data: &str) -> std::result::Result<MessageDeltaPayload, TransportError> {
    let v: Value = serde_json::from_str(data)
        .map_err(|e| TransportError::Decode(format!("message delta is not JSON: {}", e)))?;
    let fragments = v
        .pointer("/delta/content")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| {
                    part.pointer("/text/value")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(MessageDeltaPayload { fragments })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event: Option<&str>, data: &str) -> SseFrame {
        SseFrame {
            event: event.map(str::to_string),
            data: data.to_string(),
        }
    }

    #[test]
    fn chat_chunk_fans_out_role_content_and_calls() {
        let data = r#"{
            "choices": [{
                "delta": {
                    "role": "assistant",
                    "content": "Hm",
                    "tool_calls": [
                        {"index": 0, "id": "call_a", "function": {"name": "get_rain_probability", "arguments": ""}},
                        {"index": 1, "id": "call_b", "function": {"name": "get_current_temperature", "arguments": ""}}
                    ]
                },
                "finish_reason": null
            }]
        }"#;
        let deltas = chat_frame_deltas(&frame(None, data)).unwrap();
        assert_eq!(deltas.len(), 3);
        assert_eq!(deltas[0].role, Some(MessageRole::Assistant));
        assert_eq!(deltas[0].content.as_deref(), Some("Hm"));
        assert!(deltas[0].tool_call.is_none());
        assert_eq!(deltas[1].role, None);
        assert_eq!(deltas[1].tool_call.as_ref().unwrap().index, 0);
        assert_eq!(deltas[2].tool_call.as_ref().unwrap().index, 1);
    }

    #[test]
    fn argument_fragments_keep_their_slot_index() {
        let data = r#"{"choices":[{"delta":{"tool_calls":[{"index":1,"function":{"arguments":"{\"loc"}}]},"finish_reason":null}]}"#;
        let deltas = chat_frame_deltas(&frame(None, data)).unwrap();
        assert_eq!(deltas.len(), 1);
        let fragment = deltas[0].tool_call.as_ref().unwrap();
        assert_eq!(fragment.index, 1);
        assert_eq!(fragment.id, None);
        assert_eq!(fragment.arguments, "{\"loc");
    }

    #[test]
    fn sentinel_chunk_maps_to_finish_delta() {
        let data = r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#;
        let deltas = chat_frame_deltas(&frame(None, data)).unwrap();
        assert_eq!(deltas.len(), 1);
        assert!(deltas[0].is_turn_end());
        assert_eq!(deltas[0].finish_reason, Some(FinishReason::ToolCalls));
    }

    #[test]
    fn usage_only_chunks_map_to_nothing() {
        let data = r#"{"choices":[],"usage":{"total_tokens":42}}"#;
        assert!(chat_frame_deltas(&frame(None, data)).unwrap().is_empty());
    }

    #[test]
    fn malformed_chunk_is_a_decode_error() {
        let err = chat_frame_deltas(&frame(None, "{not json")).unwrap_err();
        assert!(matches!(err, TransportError::Decode(_)));
    }

    #[test]
    fn requires_action_event_carries_ordered_pending_calls() {
        let data = r#"{
            "id": "run_1", "thread_id": "thread_1", "status": "requires_action",
            "required_action": {"type": "submit_tool_outputs", "submit_tool_outputs": {"tool_calls": [
                {"id": "call_a", "type": "function", "function": {"name": "get_rain_probability", "arguments": "{\"location\":\"Lima\"}"}},
                {"id": "call_b", "type": "function", "function": {"name": "get_current_temperature", "arguments": "{}"}}
            ]}}
        }"#;
        let event = run_event_from(&frame(Some("thread.run.requires_action"), data)).unwrap();
        let run = match event {
            RunEvent::RunRequiresAction(run) => run,
            other => panic!("expected RunRequiresAction, got {:?}", other),
        };
        assert_eq!(run.status, RunStatus::RequiresAction);
        assert_eq!(run.pending_calls.len(), 2);
        assert_eq!(run.pending_calls[0].id, "call_a");
        assert_eq!(run.pending_calls[0].index, 0);
        assert_eq!(run.pending_calls[1].name, "get_current_temperature");
        assert_eq!(run.pending_calls[1].index, 1);
    }

    #[test]
    fn failed_run_maps_to_status_change_with_error() {
        let data = r#"{"id":"run_1","thread_id":"thread_1","status":"failed","last_error":{"code":"rate_limit_exceeded","message":"try later"}}"#;
        let event = run_event_from(&frame(Some("thread.run.failed"), data)).unwrap();
        let run = match event {
            RunEvent::RunStatusChanged(run) => run,
            other => panic!("expected RunStatusChanged, got {:?}", other),
        };
        assert!(run.status.is_terminal_failure());
        assert_eq!(
            run.error_detail().as_deref(),
            Some("rate_limit_exceeded: try later")
        );
    }

    #[test]
    fn message_delta_collects_text_fragments_in_order() {
        let data = r#"{"id":"msg_1","delta":{"content":[
            {"index":0,"type":"text","text":{"value":"Hel","annotations":[]}},
            {"index":0,"type":"text","text":{"value":"lo","annotations":[]}}
        ]}}"#;
        let event = run_event_from(&frame(Some("thread.message.delta"), data)).unwrap();
        match event {
            RunEvent::MessageDelta(payload) => assert_eq!(payload.fragments, ["Hel", "lo"]),
            other => panic!("expected MessageDelta, got {:?}", other),
        }
    }

    #[test]
    fn unlisted_and_step_events_are_ignored() {
        let created = run_event_from(&frame(Some("thread.message.created"), "{}")).unwrap();
        assert!(matches!(created, RunEvent::Ignored { .. }));
        let step = run_event_from(&frame(Some("thread.run.step.completed"), "{}")).unwrap();
        assert!(matches!(step, RunEvent::Ignored { name } if name == "thread.run.step.completed"));
    }

    #[test]
    fn chat_request_body_carries_tools_and_knobs() {
        let request = TurnRequest::new("gpt-4-turbo")
            .with_messages(vec![
                Message::system("You are a skilled tutor on geo-politic topics."),
                Message::user("How's the weather in Lima?"),
            ])
            .with_tools(vec![ToolDescriptor {
                name: "get_rain_probability".into(),
                description: Some("Rain odds".into()),
                parameters: json!({"type":"object","properties":{}}),
            }])
            .with_temperature(0.2)
            .with_max_tokens(500);
        let body = chat_request_body(&request).unwrap();
        assert_eq!(body["model"], "gpt-4-turbo");
        assert_eq!(body["stream"], true);
        assert_eq!(body["temperature"], 0.2);
        assert_eq!(body["max_tokens"], 500);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "get_rain_probability");
    }

    #[test]
    fn tool_round_messages_serialize_with_linkage() {
        let assistant = Message::assistant_turn(
            None,
            vec![ToolCallRequest {
                id: "call_a".into(),
                name: "get_rain_probability".into(),
                arguments: r#"{"location":"Lima"}"#.into(),
                index: 0,
            }],
        );
        let tool = Message::tool("{\"probability\":65.0}", "call_a");
        let request = TurnRequest::new("gpt-4-turbo").with_messages(vec![assistant, tool]);
        let body = chat_request_body(&request).unwrap();
        let assistant_json = &body["messages"][0];
        assert_eq!(assistant_json["content"], Value::Null);
        assert_eq!(assistant_json["tool_calls"][0]["id"], "call_a");
        assert_eq!(
            assistant_json["tool_calls"][0]["function"]["arguments"],
            r#"{"location":"Lima"}"#
        );
        let tool_json = &body["messages"][1];
        assert_eq!(tool_json["role"], "tool");
        assert_eq!(tool_json["tool_call_id"], "call_a");
    }

    #[test]
    fn multimodal_parts_serialize_as_typed_array() {
        use crate::types::ContentPart;
        let message = Message::user_parts(vec![
            ContentPart::text("What is in this image?"),
            ContentPart::image_url("https://example.com/machupicchu.jpg"),
        ]);
        let request = TurnRequest::new("gpt-4-turbo").with_messages(vec![message]);
        let body = chat_request_body(&request).unwrap();
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(
            content[1]["image_url"]["url"],
            "https://example.com/machupicchu.jpg"
        );
    }
}
