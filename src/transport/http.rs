//! Default HTTP implementation of the transport traits, backed by reqwest.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use crate::types::{AssistantSpec, ToolOutput, TurnRequest};
use crate::{BoxStream, Error, Result};

use super::{sse, wire, ChatTransport, DeltaStream, RunEventStream, RunTransport, TransportError};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const REQUEST_ID_HEADER: &str = "x-turnflow-request-id";

/// OpenAI-compatible HTTP transport covering both protocol variants.
///
/// Only the connection phase is bounded by a timeout; response bodies are
/// open-ended event streams and must stay unbounded.
pub struct OpenAiTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiTransport {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        // Pool and timeout defaults, overridable through the environment.
        let connect_timeout = env::var("TURNFLOW_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout))
            .pool_max_idle_per_host(
                env::var("TURNFLOW_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(32),
            )
            .build()
            .map_err(TransportError::from)?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        })
    }

    /// Point the transport at a different endpoint family (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .header(REQUEST_ID_HEADER, Uuid::new_v4().to_string())
    }

    fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .delete(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .header(REQUEST_ID_HEADER, Uuid::new_v4().to_string())
    }

    // Assistants endpoints require the beta opt-in header.
    fn post_v2(&self, path: &str) -> reqwest::RequestBuilder {
        self.post(path).header("OpenAI-Beta", "assistants=v2")
    }

    fn delete_v2(&self, path: &str) -> reqwest::RequestBuilder {
        self.delete(path).header("OpenAI-Beta", "assistants=v2")
    }

    async fn send_json(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request.send().await.map_err(TransportError::from)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }
        let value = response.json::<Value>().await.map_err(TransportError::from)?;
        Ok(value)
    }

    async fn send_stream(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<BoxStream<'static, Bytes>> {
        let response = request
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(TransportError::from)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }
        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| Error::from(TransportError::from(e))));
        Ok(Box::pin(bytes))
    }
}

#[async_trait]
impl ChatTransport for OpenAiTransport {
    async fn stream_turn(&self, request: &TurnRequest) -> Result<DeltaStream> {
        let body = wire::chat_request_body(request)?;
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "starting chat completion stream"
        );
        let bytes = self
            .send_stream(self.post("/chat/completions").json(&body))
            .await?;
        Ok(wire::delta_stream(sse::decode_sse(bytes)))
    }
}

#[async_trait]
impl RunTransport for OpenAiTransport {
    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<String> {
        let body = wire::assistant_request_body(spec);
        let value = self.send_json(self.post_v2("/assistants").json(&body)).await?;
        let id = require_id(&value, "assistant")?;
        debug!(assistant_id = %id, model = %spec.model, "assistant created");
        Ok(id)
    }

    async fn delete_assistant(&self, assistant_id: &str) -> Result<bool> {
        let value = self
            .send_json(self.delete_v2(&format!("/assistants/{}", assistant_id)))
            .await?;
        Ok(value["deleted"].as_bool().unwrap_or(false))
    }

    async fn create_thread(&self) -> Result<String> {
        let value = self
            .send_json(self.post_v2("/threads").json(&json!({})))
            .await?;
        let id = require_id(&value, "thread")?;
        debug!(thread_id = %id, "thread created");
        Ok(id)
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<bool> {
        let value = self
            .send_json(self.delete_v2(&format!("/threads/{}", thread_id)))
            .await?;
        Ok(value["deleted"].as_bool().unwrap_or(false))
    }

    async fn add_user_message(&self, thread_id: &str, text: &str) -> Result<()> {
        let body = json!({ "role": "user", "content": text });
        self.send_json(
            self.post_v2(&format!("/threads/{}/messages", thread_id))
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn stream_run(&self, thread_id: &str, assistant_id: &str) -> Result<RunEventStream> {
        let body = json!({ "assistant_id": assistant_id, "stream": true });
        debug!(thread_id, assistant_id, "starting run stream");
        let bytes = self
            .send_stream(
                self.post_v2(&format!("/threads/{}/runs", thread_id))
                    .json(&body),
            )
            .await?;
        Ok(wire::run_event_stream(sse::decode_sse(bytes)))
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<RunEventStream> {
        let body = json!({ "tool_outputs": outputs, "stream": true });
        debug!(thread_id, run_id, outputs = outputs.len(), "submitting tool outputs");
        let bytes = self
            .send_stream(
                self.post_v2(&format!(
                    "/threads/{}/runs/{}/submit_tool_outputs",
                    thread_id, run_id
                ))
                .json(&body),
            )
            .await?;
        Ok(wire::run_event_stream(sse::decode_sse(bytes)))
    }
}

fn require_id(value: &Value, what: &str) -> Result<String> {
    value["id"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| TransportError::Decode(format!("{} response missing id", what)).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_override_trims_trailing_slash() {
        let transport = OpenAiTransport::new("sk-test")
            .unwrap()
            .with_base_url("http://127.0.0.1:9999/v1/");
        assert_eq!(transport.base_url, "http://127.0.0.1:9999/v1");
    }

    #[test]
    fn missing_id_is_a_decode_error() {
        let err = require_id(&json!({"object": "assistant"}), "assistant").unwrap_err();
        assert!(err.to_string().contains("assistant response missing id"));
    }
}
