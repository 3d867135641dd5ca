//! 流式累积模块：把乱序到达的增量还原为完整的助手消息。
//!
//! Streaming accumulation: reassembles a complete assistant message, text
//! plus fully-argued tool calls, out of the incremental deltas a streamed
//! turn produces. Accumulation is a single pass with no lookahead; state is
//! scoped to one turn and never reused.

pub mod accumulator;
pub mod sink;

pub use accumulator::{collect_turn, TurnOutcome};
pub use sink::{BufferSink, NullSink, OutputSink, StdoutSink};
