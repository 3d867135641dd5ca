//! 传输层：聊天与运行两种协议变体的外部边界。
//!
//! Transport boundary for the two protocol variants. The rest of the crate
//! talks to [`ChatTransport`] and [`RunTransport`] only; wire formats, SSE
//! framing and HTTP details stay behind this module. [`http::OpenAiTransport`]
//! is the default implementation, and tests swap in scripted ones.

pub mod http;
pub mod sse;
pub mod wire;

use async_trait::async_trait;

use crate::types::{AssistantSpec, RunEvent, StreamDelta, ToolOutput, TurnRequest};
use crate::{BoxStream, Result};

pub use http::OpenAiTransport;

/// One chat turn's worth of deltas: lazy, finite, consumed exactly once.
pub type DeltaStream = BoxStream<'static, StreamDelta>;

/// Lifecycle events of one run (or one resumed continuation of it).
pub type RunEventStream = BoxStream<'static, RunEvent>;

/// Chat-style protocol variant: stateless server, full history per request.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn stream_turn(&self, request: &TurnRequest) -> Result<DeltaStream>;
}

/// Run-style protocol variant: server-side threads, assistants and runs.
#[async_trait]
pub trait RunTransport: Send + Sync {
    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<String>;

    async fn delete_assistant(&self, assistant_id: &str) -> Result<bool>;

    async fn create_thread(&self) -> Result<String>;

    async fn delete_thread(&self, thread_id: &str) -> Result<bool>;

    async fn add_user_message(&self, thread_id: &str, text: &str) -> Result<()>;

    /// Start a run over the thread and stream its lifecycle events.
    async fn stream_run(&self, thread_id: &str, assistant_id: &str) -> Result<RunEventStream>;

    /// Answer a `requires_action` pause. The returned stream carries the
    /// continuation of the same run.
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<RunEventStream>;
}

/// Errors raised below the protocol boundary.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("stream decode error: {0}")]
    Decode(String),
}
