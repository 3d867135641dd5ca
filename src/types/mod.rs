//! 类型系统模块：会话消息、流式增量与运行生命周期的核心数据类型。
//!
//! # Types Module
//!
//! Core data model for streamed conversations: messages, incremental
//! deltas, reassembled tool calls, and run lifecycle snapshots.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Message`] | Chat message with role, content and tool linkage |
//! | [`StreamDelta`] | One incremental fragment of a streamed turn |
//! | [`ToolCallRequest`] | Complete, reassembled tool call from the model |
//! | [`FinishReason`] | Terminal classifier of a turn |
//! | [`RunEvent`] | Resolved lifecycle event of the run protocol variant |
//! | [`RunStatus`] | Lifecycle state of a server-side run |
//!
//! ## Submodules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`message`] | Messages with multimodal content support |
//! | [`delta`] | Streamed turn fragments and finish reasons |
//! | [`tool`] | Tool call, output and descriptor types |
//! | [`run`] | Run snapshots, statuses and lifecycle events |
//! | [`request`] | Outbound request shapes |

pub mod delta;
pub mod message;
pub mod request;
pub mod run;
pub mod tool;

pub use delta::{FinishReason, StreamDelta, ToolCallFragment};
pub use message::{ContentPart, ImageUrlSource, Message, MessageContent, MessageRole};
pub use request::TurnRequest;
pub use run::{AssistantSpec, MessageDeltaPayload, Run, RunError, RunEvent, RunStatus};
pub use tool::{ToolCallRequest, ToolDescriptor, ToolOutput};
