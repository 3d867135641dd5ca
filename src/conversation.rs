//! Interactive conversation loops over either protocol variant.
//!
//! Sessions read user lines from an injected [`LineSource`] and stream
//! assistant output to an [`OutputSink`], so the same loop drives a terminal,
//! a test script, or anything else line-shaped. A line equal to `exit`
//! (case-insensitive) ends the session; so does source exhaustion.
//!
//! [`ChatSession`] keeps the whole history client-side and resends it every
//! turn. [`RunSession`] keeps history server-side in a thread and sends only
//! the new user line, then removes the thread and assistant it created when
//! the loop ends, clean or not.

use std::collections::VecDeque;
use std::io::Write;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::executor::{resolve_turn, ConversationStep};
use crate::registry::FunctionRegistry;
use crate::runs::RunDispatcher;
use crate::streaming::{collect_turn, OutputSink};
use crate::transport::{ChatTransport, RunTransport};
use crate::types::{AssistantSpec, Message, TurnRequest};
use crate::{Error, Result};

const PROMPT: &str = "You: ";

fn is_exit(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("exit")
}

/// Where user lines come from.
pub trait LineSource: Send {
    /// Next line, or `None` once the source is exhausted.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;
}

/// Reads lines from standard input, echoing the prompt first.
pub struct StdinLineSource;

impl LineSource for StdinLineSource {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        print!("{}", prompt);
        std::io::stdout().flush()?;
        let mut line = String::new();
        let read = std::io::stdin().read_line(&mut line)?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(
            line.trim_end_matches(|c| c == '\r' || c == '\n').to_string(),
        ))
    }
}

/// Pre-scripted lines, exhausted front to back.
pub struct ScriptedLineSource {
    lines: VecDeque<String>,
}

impl ScriptedLineSource {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

impl LineSource for ScriptedLineSource {
    fn read_line(&mut self, _prompt: &str) -> Result<Option<String>> {
        Ok(self.lines.pop_front())
    }
}

/// Knobs shared by both session variants.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub model: String,
    pub instructions: String,
    pub assistant_name: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

impl SessionConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            instructions: String::new(),
            assistant_name: "turnflow-assistant".into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_assistant_name(mut self, name: impl Into<String>) -> Self {
        self.assistant_name = name.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Conversation loop over the chat protocol variant.
pub struct ChatSession<'a, T> {
    transport: &'a T,
    registry: &'a FunctionRegistry,
    config: SessionConfig,
    history: Vec<Message>,
}

impl<'a, T: ChatTransport> ChatSession<'a, T> {
    pub fn new(transport: &'a T, registry: &'a FunctionRegistry, config: SessionConfig) -> Self {
        let mut history = Vec::new();
        if !config.instructions.is_empty() {
            history.push(Message::system(&config.instructions));
        }
        Self {
            transport,
            registry,
            config,
            history,
        }
    }

    /// Everything exchanged so far, system prompt included.
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub async fn run(
        &mut self,
        source: &mut dyn LineSource,
        sink: &mut dyn OutputSink,
        cancel: &CancellationToken,
    ) -> Result<()> {
        while let Some(line) = source.read_line(PROMPT)? {
            if is_exit(&line) {
                break;
            }
            if line.trim().is_empty() {
                continue;
            }
            self.take_turn(&line, sink, cancel).await?;
        }
        debug!(messages = self.history.len(), "chat session ended");
        Ok(())
    }

    /// One user line to one final answer, looping through tool rounds.
    pub async fn take_turn(
        &mut self,
        line: &str,
        sink: &mut dyn OutputSink,
        cancel: &CancellationToken,
    ) -> Result<String> {
        self.history.push(Message::user(line));
        loop {
            let request = self.request();
            let deltas = self.transport.stream_turn(&request).await?;
            let outcome = collect_turn(deltas, sink, cancel).await?;
            match resolve_turn(outcome.message, &outcome.finish_reason, self.registry).await? {
                ConversationStep::Answer(text) => {
                    self.history.push(Message::assistant(&text));
                    sink.end_message();
                    return Ok(text);
                }
                ConversationStep::ToolRound(messages) => {
                    debug!(messages = messages.len(), "tool round resolved, continuing turn");
                    self.history.extend(messages);
                }
            }
        }
    }

    // The server is stateless, so every request carries the full history.
    fn request(&self) -> TurnRequest {
        let mut request =
            TurnRequest::new(&self.config.model).with_messages(self.history.clone());
        if !self.registry.is_empty() {
            request = request.with_tools(self.registry.describe_all());
        }
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.config.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        request
    }
}

/// Conversation loop over the run protocol variant.
pub struct RunSession<'a, T> {
    transport: &'a T,
    registry: &'a FunctionRegistry,
    config: SessionConfig,
}

impl<'a, T: RunTransport> RunSession<'a, T> {
    pub fn new(transport: &'a T, registry: &'a FunctionRegistry, config: SessionConfig) -> Self {
        Self {
            transport,
            registry,
            config,
        }
    }

    /// Create the assistant and thread, loop until exit, then remove both.
    ///
    /// A run that ends in a terminal failure is logged and the loop waits
    /// for the next line; transport errors end the session.
    pub async fn run(
        &self,
        source: &mut dyn LineSource,
        sink: &mut dyn OutputSink,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let spec = AssistantSpec::new(
            &self.config.assistant_name,
            &self.config.model,
            &self.config.instructions,
        )
        .with_tools(self.registry.describe_all());
        let assistant_id = self.transport.create_assistant(&spec).await?;
        let thread_id = match self.transport.create_thread().await {
            Ok(id) => id,
            Err(e) => {
                self.teardown(&assistant_id, None).await;
                return Err(e);
            }
        };

        let result = self.drive(source, sink, cancel, &thread_id, &assistant_id).await;
        self.teardown(&assistant_id, Some(&thread_id)).await;
        result
    }

    async fn drive(
        &self,
        source: &mut dyn LineSource,
        sink: &mut dyn OutputSink,
        cancel: &CancellationToken,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<()> {
        while let Some(line) = source.read_line(PROMPT)? {
            if is_exit(&line) {
                break;
            }
            if line.trim().is_empty() {
                continue;
            }
            self.transport.add_user_message(thread_id, &line).await?;
            let events = self.transport.stream_run(thread_id, assistant_id).await?;
            match RunDispatcher::new(self.transport, self.registry, sink)
                .dispatch(events, cancel)
                .await
            {
                Ok(outcome) => debug!(
                    status = %outcome.status,
                    submissions = outcome.tool_submissions,
                    "run finished"
                ),
                // A failed run ends that run only; the loop keeps reading input.
                Err(e @ Error::RunFailed { .. }) => warn!(error = %e, "run failed"),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    // Best effort; a failed delete must not mask the loop's own result.
    async fn teardown(&self, assistant_id: &str, thread_id: Option<&str>) {
        if let Some(thread_id) = thread_id {
            match self.transport.delete_thread(thread_id).await {
                Ok(deleted) => info!(thread_id, deleted, "thread removed"),
                Err(e) => warn!(thread_id, error = %e, "failed to delete thread"),
            }
        }
        match self.transport.delete_assistant(assistant_id).await {
            Ok(deleted) => info!(assistant_id, deleted, "assistant removed"),
            Err(e) => warn!(assistant_id, error = %e, "failed to delete assistant"),
        }
    }
}
