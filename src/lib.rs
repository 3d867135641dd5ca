//! # turnflow
//!
//! 面向 OpenAI 风格接口的流式对话库：从增量片段装配回合，注册并执行模型请求的函数，
//! 在两种协议变体上驱动完整的多轮会话。
//!
//! Streaming conversation turns for OpenAI-style APIs: assemble turns from
//! deltas, execute the functions the model asks for, and drive multi-turn
//! sessions over either protocol variant.
//!
//! ## Overview
//!
//! This library covers the full path from a raw event stream to a finished
//! conversation turn. Chat completions stream untyped deltas that are
//! reassembled into one assistant message; assistant runs stream named
//! lifecycle events that pause when the model wants tools. Both variants end
//! up in the same place: text on an output sink, tool calls executed through
//! one registry, and a conversation that keeps going.
//!
//! ## Design
//!
//! - **Streaming-first**: fragments reach the output sink as they arrive;
//!   nothing waits for the turn to finish.
//! - **Typed boundary**: wire payloads resolve into typed deltas and events
//!   once, inside [`transport`]; nothing downstream touches JSON or event
//!   name strings.
//! - **Injected edges**: user input and assistant output are traits, so the
//!   same session loop drives a terminal or a test script.
//! - **Tool failures stay in-band**: a failed function call becomes an error
//!   payload the model can read, not a crashed conversation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use serde_json::{json, Value};
//! use tokio_util::sync::CancellationToken;
//! use turnflow::conversation::{ChatSession, SessionConfig, StdinLineSource};
//! use turnflow::registry::{
//!     FunctionRegistry, FunctionSchema, FunctionSpec, HandlerFn, ParameterSpec,
//! };
//! use turnflow::streaming::StdoutSink;
//! use turnflow::transport::OpenAiTransport;
//!
//! #[tokio::main]
//! async fn main() -> turnflow::Result<()> {
//!     let mut registry = FunctionRegistry::new();
//!     registry.register(
//!         FunctionSpec::new("get_rain_probability", "Rain odds for a location").schema(
//!             FunctionSchema::object().parameter(ParameterSpec::string("location").required()),
//!         ),
//!         HandlerFn(|_args: Value| async move { Ok(json!({ "probability": 65.0 })) }),
//!     )?;
//!
//!     let transport =
//!         OpenAiTransport::new(std::env::var("OPENAI_API_KEY").unwrap_or_default())?;
//!     let config = SessionConfig::new("gpt-4-turbo")
//!         .with_instructions("You are a skilled tutor on geo-politic topics.");
//!
//!     let mut session = ChatSession::new(&transport, &registry, config);
//!     session
//!         .run(
//!             &mut StdinLineSource,
//!             &mut StdoutSink,
//!             &CancellationToken::new(),
//!         )
//!         .await
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`types`] | Core data types: messages, deltas, runs, tool calls |
//! | [`registry`] | Callable function registration, validation and dispatch |
//! | [`streaming`] | Turn assembly from delta streams, output sinks |
//! | [`executor`] | Resolves a finished turn into an answer or a tool round |
//! | [`runs`] | Run lifecycle dispatch with iterative resumption |
//! | [`transport`] | HTTP and SSE boundary for both protocol variants |
//! | [`conversation`] | Interactive session loops over either variant |

pub mod conversation;
pub mod executor;
pub mod registry;
pub mod runs;
pub mod streaming;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use conversation::{ChatSession, RunSession, SessionConfig};
pub use executor::ConversationStep;
pub use registry::FunctionRegistry;
pub use runs::{RunDispatcher, RunOutcome};
pub use streaming::{collect_turn, OutputSink, TurnOutcome};
pub use transport::{ChatTransport, OpenAiTransport, RunTransport};
pub use types::{FinishReason, Message, MessageRole, RunEvent, StreamDelta, ToolCallRequest};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream of fallible items
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{BoxError, Error};
