//! Live output sinks for streamed assistant text

use std::io::Write as _;

/// Receives assistant text as it streams in, fragment by fragment.
///
/// Sinks see fragments in arrival order and `end_message` once per
/// completed message. Implementations decide presentation; the runtime
/// never writes to a console directly.
pub trait OutputSink: Send {
    fn write_fragment(&mut self, text: &str);

    /// Called when one assistant message has fully streamed.
    fn end_message(&mut self);
}

/// Prints fragments to stdout as they arrive, flushing each one so the
/// text appears token by token.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write_fragment(&mut self, text: &str) {
        print!("{}", text);
        let _ = std::io::stdout().flush();
    }

    fn end_message(&mut self) {
        println!();
    }
}

/// Collects fragments in memory. Used by tests and by callers that want
/// the streamed text without console output.
#[derive(Debug, Default)]
pub struct BufferSink {
    fragments: Vec<String>,
    completed: Vec<String>,
    current: String,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fragment seen so far, in arrival order.
    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    /// Messages closed off by `end_message`.
    pub fn completed_messages(&self) -> &[String] {
        &self.completed
    }

    /// All text seen so far, concatenated.
    pub fn text(&self) -> String {
        let mut out: String = self.completed.concat();
        out.push_str(&self.current);
        out
    }
}

impl OutputSink for BufferSink {
    fn write_fragment(&mut self, text: &str) {
        self.fragments.push(text.to_string());
        self.current.push_str(text);
    }

    fn end_message(&mut self) {
        self.completed.push(std::mem::take(&mut self.current));
    }
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn write_fragment(&mut self, _text: &str) {}
    fn end_message(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_sink_tracks_fragments_and_messages() {
        let mut sink = BufferSink::new();
        sink.write_fragment("Hel");
        sink.write_fragment("lo");
        sink.end_message();
        sink.write_fragment("again");
        assert_eq!(sink.fragments(), ["Hel", "lo", "again"]);
        assert_eq!(sink.completed_messages(), ["Hello"]);
        assert_eq!(sink.text(), "Helloagain");
    }
}
