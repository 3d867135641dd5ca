use thiserror::Error;

use crate::transport::TransportError;
use crate::types::RunStatus;

/// Boxed error for tool handler failures, whatever the handler chose to raise.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Unified error type for the crate.
///
/// Call-scoped variants ([`Error::UnknownFunction`], [`Error::ArgumentDecode`],
/// [`Error::HandlerExecution`]) describe a single failed tool invocation and
/// can be reported back to the model without ending the conversation; the
/// rest end the turn they occur in.
#[derive(Debug, Error)]
pub enum Error {
    #[error("stream ended without producing any content or tool calls")]
    EmptyTurn,

    #[error("function '{name}' is already registered")]
    DuplicateFunction { name: String },

    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("invalid arguments for function '{function}': {reason}")]
    ArgumentDecode { function: String, reason: String },

    #[error("function '{function}' failed: {source}")]
    HandlerExecution {
        function: String,
        #[source]
        source: BoxError,
    },

    #[error("run ended in status '{status}'{}", detail_suffix(.detail))]
    RunFailed {
        status: RunStatus,
        detail: Option<String>,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(detail) => format!(": {}", detail),
        None => String::new(),
    }
}

impl Error {
    pub fn unknown_function(name: impl Into<String>) -> Self {
        Error::UnknownFunction { name: name.into() }
    }

    pub fn argument_decode(function: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::ArgumentDecode {
            function: function.into(),
            reason: reason.into(),
        }
    }

    pub fn handler_execution(function: impl Into<String>, source: BoxError) -> Self {
        Error::HandlerExecution {
            function: function.into(),
            source,
        }
    }

    pub fn run_failed(status: RunStatus, detail: Option<String>) -> Self {
        Error::RunFailed { status, detail }
    }

    /// Whether the error is scoped to one tool call rather than the whole turn.
    pub fn is_call_scoped(&self) -> bool {
        matches!(
            self,
            Error::UnknownFunction { .. }
                | Error::ArgumentDecode { .. }
                | Error::HandlerExecution { .. }
        )
    }
}
