//! 运行事件分发：消费运行生命周期事件流，在暂停处提交工具结果。
//!
//! Drives one run from its event stream to a terminal status. A run pauses
//! with `requires_action` when the model wants tools; answering the pause
//! returns a continuation stream for the same run, which is queued and
//! drained in turn. Resumption is iterative by construction: however many
//! times the run pauses, the dispatcher never recurses and the queue never
//! holds more than the one continuation the last submission produced.

use std::collections::VecDeque;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::registry::FunctionRegistry;
use crate::streaming::OutputSink;
use crate::transport::{RunEventStream, RunTransport, TransportError};
use crate::types::{Run, RunEvent, RunStatus, ToolCallRequest, ToolOutput};
use crate::{Error, Result};

/// What one dispatched run amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Last status snapshot the stream carried. Terminal failures never get
    /// here; they surface as [`Error::RunFailed`] instead.
    pub status: RunStatus,
    /// How many `requires_action` pauses were answered.
    pub tool_submissions: usize,
}

/// Event-driven executor for the run protocol variant.
pub struct RunDispatcher<'a, T: ?Sized> {
    transport: &'a T,
    registry: &'a FunctionRegistry,
    sink: &'a mut dyn OutputSink,
}

impl<'a, T: RunTransport + ?Sized> RunDispatcher<'a, T> {
    pub fn new(
        transport: &'a T,
        registry: &'a FunctionRegistry,
        sink: &'a mut dyn OutputSink,
    ) -> Self {
        Self {
            transport,
            registry,
            sink,
        }
    }

    /// Consume `events` and every continuation stream it leads to.
    ///
    /// Message fragments go to the sink as they arrive. Each
    /// `requires_action` snapshot has its pending calls executed in order
    /// and answered with exactly one submission. Ends when the last queued
    /// stream is drained, or early with [`Error::RunFailed`] on a terminal
    /// failure snapshot and [`Error::Cancelled`] when `cancel` fires.
    pub async fn dispatch(
        &mut self,
        events: RunEventStream,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        let mut queue: VecDeque<RunEventStream> = VecDeque::new();
        queue.push_back(events);

        let mut last_status: Option<RunStatus> = None;
        let mut tool_submissions = 0usize;

        while let Some(mut stream) = queue.pop_front() {
            loop {
                let event = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    next = stream.next() => match next {
                        Some(event) => event?,
                        None => break,
                    },
                };

                match event {
                    RunEvent::RunCreated(run)
                    | RunEvent::RunStatusChanged(run)
                    | RunEvent::RunCompleted(run) => {
                        self.observe(&run, &mut last_status)?;
                    }
                    RunEvent::RunRequiresAction(run) => {
                        self.observe(&run, &mut last_status)?;
                        let outputs = self.resolve_outputs(&run.pending_calls).await?;
                        debug!(
                            run_id = %run.id,
                            outputs = outputs.len(),
                            "answering requires_action pause"
                        );
                        let continuation = self
                            .transport
                            .submit_tool_outputs(&run.thread_id, &run.id, outputs)
                            .await?;
                        tool_submissions += 1;
                        queue.push_back(continuation);
                    }
                    RunEvent::MessageDelta(payload) => {
                        for fragment in &payload.fragments {
                            self.sink.write_fragment(fragment);
                        }
                    }
                    RunEvent::MessageCompleted => self.sink.end_message(),
                    RunEvent::Ignored { name } => {
                        trace!(event = %name, "ignoring unhandled event");
                    }
                }
            }
        }

        let status = last_status.ok_or_else(|| {
            Error::from(TransportError::Decode(
                "run stream ended without a run snapshot".into(),
            ))
        })?;
        Ok(RunOutcome {
            status,
            tool_submissions,
        })
    }

    fn observe(&self, run: &Run, last: &mut Option<RunStatus>) -> Result<()> {
        if *last != Some(run.status) {
            info!(run_id = %run.id, status = %run.status, "run status");
        }
        *last = Some(run.status);
        if run.status.is_terminal_failure() {
            return Err(Error::run_failed(run.status, run.error_detail()));
        }
        Ok(())
    }

    async fn resolve_outputs(&self, calls: &[ToolCallRequest]) -> Result<Vec<ToolOutput>> {
        let mut outputs = Vec::with_capacity(calls.len());
        for call in calls {
            let output = crate::executor::execute_call(self.registry, call).await?;
            outputs.push(ToolOutput::new(&call.id, output));
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures::stream;
    use serde_json::{json, Value};

    use super::*;
    use crate::registry::{FunctionSchema, FunctionSpec, HandlerFn, ParameterSpec};
    use crate::streaming::BufferSink;
    use crate::types::{AssistantSpec, MessageDeltaPayload, RunError};

    fn events(items: Vec<RunEvent>) -> RunEventStream {
        Box::pin(stream::iter(items.into_iter().map(Ok)))
    }

    fn run(status: RunStatus) -> Run {
        Run {
            id: "run_1".into(),
            thread_id: "thread_1".into(),
            status,
            pending_calls: Vec::new(),
            last_error: None,
        }
    }

    fn paused_run(pending_calls: Vec<ToolCallRequest>) -> Run {
        Run {
            pending_calls,
            ..run(RunStatus::RequiresAction)
        }
    }

    fn weather_registry() -> FunctionRegistry {
        let mut registry = FunctionRegistry::new();
        registry
            .register(
                FunctionSpec::new("get_rain_probability", "Rain odds for a location").schema(
                    FunctionSchema::object()
                        .parameter(ParameterSpec::string("location").required()),
                ),
                HandlerFn(|args: Value| async move {
                    let location = args["location"].as_str().unwrap_or_default().to_string();
                    Ok(json!({ "location": location, "probability": 65.0 }))
                }),
            )
            .unwrap();
        registry
    }

    /// Run transport with pre-scripted continuation streams.
    struct ScriptedRuns {
        continuations: Mutex<VecDeque<Vec<RunEvent>>>,
        submissions: Mutex<Vec<Vec<ToolOutput>>>,
    }

    impl ScriptedRuns {
        fn new(continuations: Vec<Vec<RunEvent>>) -> Self {
            Self {
                continuations: Mutex::new(continuations.into()),
                submissions: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RunTransport for ScriptedRuns {
        async fn create_assistant(&self, _spec: &AssistantSpec) -> Result<String> {
            Ok("asst_scripted".into())
        }

        async fn delete_assistant(&self, _assistant_id: &str) -> Result<bool> {
            Ok(true)
        }

        async fn create_thread(&self) -> Result<String> {
            Ok("thread_scripted".into())
        }

        async fn delete_thread(&self, _thread_id: &str) -> Result<bool> {
            Ok(true)
        }

        async fn add_user_message(&self, _thread_id: &str, _text: &str) -> Result<()> {
            Ok(())
        }

        async fn stream_run(&self, _thread_id: &str, _assistant_id: &str) -> Result<RunEventStream> {
            Ok(events(Vec::new()))
        }

        async fn submit_tool_outputs(
            &self,
            thread_id: &str,
            run_id: &str,
            outputs: Vec<ToolOutput>,
        ) -> Result<RunEventStream> {
            assert_eq!(thread_id, "thread_1");
            assert_eq!(run_id, "run_1");
            self.submissions.lock().unwrap().push(outputs);
            let next = self
                .continuations
                .lock()
                .unwrap()
                .pop_front()
                .expect("no continuation scripted for this submission");
            Ok(events(next))
        }
    }

    #[tokio::test]
    async fn plain_run_streams_text_without_submissions() {
        let transport = ScriptedRuns::new(Vec::new());
        let registry = FunctionRegistry::new();
        let mut sink = BufferSink::new();
        let outcome = RunDispatcher::new(&transport, &registry, &mut sink)
            .dispatch(
                events(vec![
                    RunEvent::RunCreated(run(RunStatus::Queued)),
                    RunEvent::MessageDelta(MessageDeltaPayload {
                        fragments: vec!["Hel".into(), "lo".into()],
                    }),
                    RunEvent::MessageCompleted,
                    RunEvent::RunCompleted(run(RunStatus::Completed)),
                ]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.tool_submissions, 0);
        assert_eq!(sink.completed_messages(), ["Hello"]);
    }

    #[tokio::test]
    async fn pause_is_answered_once_and_the_continuation_drained() {
        let transport = ScriptedRuns::new(vec![vec![
            RunEvent::MessageDelta(MessageDeltaPayload {
                fragments: vec!["Take an umbrella.".into()],
            }),
            RunEvent::MessageCompleted,
            RunEvent::RunCompleted(run(RunStatus::Completed)),
        ]]);
        let registry = weather_registry();
        let mut sink = BufferSink::new();
        let pending = vec![ToolCallRequest {
            id: "call_a".into(),
            name: "get_rain_probability".into(),
            arguments: r#"{"location":"Lima, Peru"}"#.into(),
            index: 0,
        }];
        let outcome = RunDispatcher::new(&transport, &registry, &mut sink)
            .dispatch(
                events(vec![
                    RunEvent::RunCreated(run(RunStatus::Queued)),
                    RunEvent::RunRequiresAction(paused_run(pending)),
                ]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.tool_submissions, 1);
        assert_eq!(sink.text(), "Take an umbrella.");

        let submissions = transport.submissions.lock().unwrap();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].len(), 1);
        assert_eq!(submissions[0][0].tool_call_id, "call_a");
        assert!(submissions[0][0].output.contains("probability"));
    }

    #[tokio::test]
    async fn unknown_function_in_pause_is_reported_not_fatal() {
        let transport = ScriptedRuns::new(vec![vec![RunEvent::RunCompleted(run(
            RunStatus::Completed,
        ))]]);
        let registry = weather_registry();
        let mut sink = BufferSink::new();
        let pending = vec![ToolCallRequest {
            id: "call_a".into(),
            name: "frobnicate".into(),
            arguments: "{}".into(),
            index: 0,
        }];
        let outcome = RunDispatcher::new(&transport, &registry, &mut sink)
            .dispatch(
                events(vec![RunEvent::RunRequiresAction(paused_run(pending))]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.status, RunStatus::Completed);

        let submissions = transport.submissions.lock().unwrap();
        assert!(submissions[0][0].output.contains("unknown_function"));
    }

    #[tokio::test]
    async fn terminal_failure_surfaces_as_run_failed() {
        let transport = ScriptedRuns::new(Vec::new());
        let registry = FunctionRegistry::new();
        let mut sink = BufferSink::new();
        let mut failed = run(RunStatus::Failed);
        failed.last_error = Some(RunError {
            code: "rate_limit_exceeded".into(),
            message: "try later".into(),
        });
        let err = RunDispatcher::new(&transport, &registry, &mut sink)
            .dispatch(
                events(vec![
                    RunEvent::RunCreated(run(RunStatus::Queued)),
                    RunEvent::RunStatusChanged(failed),
                ]),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        match err {
            Error::RunFailed { status, detail } => {
                assert_eq!(status, RunStatus::Failed);
                assert_eq!(detail.as_deref(), Some("rate_limit_exceeded: try later"));
            }
            other => panic!("expected RunFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn cancellation_wins_over_a_stalled_stream() {
        let transport = ScriptedRuns::new(Vec::new());
        let registry = FunctionRegistry::new();
        let mut sink = BufferSink::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = RunDispatcher::new(&transport, &registry, &mut sink)
            .dispatch(Box::pin(stream::pending::<Result<RunEvent>>()), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn exhausted_stream_without_snapshot_is_a_decode_error() {
        let transport = ScriptedRuns::new(Vec::new());
        let registry = FunctionRegistry::new();
        let mut sink = BufferSink::new();
        let err = RunDispatcher::new(&transport, &registry, &mut sink)
            .dispatch(events(Vec::new()), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("without a run snapshot"));
    }
}
