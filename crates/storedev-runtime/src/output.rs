//! Prefixed output lines.
//!
//! Every running task writes through an [`OutputSink`] bound to its prefix
//! and stream. Lines land on one unbounded channel, so a single renderer
//! prints them and lines from different tasks never interleave mid-line.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// One line of output, without its trailing newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub prefix: Arc<str>,
    pub stream: OutputStream,
    pub payload: Bytes,
}

impl OutputLine {
    /// Payload decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Writer bound to one prefix and stream.
#[derive(Debug, Clone)]
pub struct OutputSink {
    prefix: Arc<str>,
    stream: OutputStream,
    tx: mpsc::UnboundedSender<OutputLine>,
}

impl OutputSink {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub const fn stream(&self) -> OutputStream {
        self.stream
    }

    /// Emit one line. Lines written after the renderer is gone are dropped.
    pub fn write(&self, payload: impl Into<Bytes>) {
        let _ = self.tx.send(OutputLine {
            prefix: Arc::clone(&self.prefix),
            stream: self.stream,
            payload: payload.into(),
        });
    }

    /// Emit text, one output line per input line.
    pub fn line(&self, text: impl AsRef<str>) {
        for line in text.as_ref().lines() {
            self.write(Bytes::copy_from_slice(line.as_bytes()));
        }
    }
}

/// Factory for sinks feeding one channel.
#[derive(Debug, Clone)]
pub struct OutputMux {
    tx: mpsc::UnboundedSender<OutputLine>,
}

impl OutputMux {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutputLine>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn sink(&self, prefix: &str, stream: OutputStream) -> OutputSink {
        OutputSink {
            prefix: Arc::from(prefix),
            stream,
            tx: self.tx.clone(),
        }
    }

    /// Stdout and stderr sinks for one prefix.
    pub fn pair(&self, prefix: &str) -> (OutputSink, OutputSink) {
        (
            self.sink(prefix, OutputStream::Stdout),
            self.sink(prefix, OutputStream::Stderr),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sinks_tag_lines_with_prefix_and_stream() {
        let (mux, mut rx) = OutputMux::new();
        let (stdout, stderr) = mux.pair("frontend");

        stdout.write("ready");
        stderr.line("warn one\nwarn two");

        let first = rx.try_recv().unwrap();
        assert_eq!(&*first.prefix, "frontend");
        assert_eq!(first.stream, OutputStream::Stdout);
        assert_eq!(first.text(), "ready");

        let second = rx.try_recv().unwrap();
        assert_eq!(second.stream, OutputStream::Stderr);
        assert_eq!(second.text(), "warn one");
        assert_eq!(rx.try_recv().unwrap().text(), "warn two");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn writes_after_receiver_drop_are_ignored() {
        let (mux, rx) = OutputMux::new();
        drop(rx);
        mux.sink("backend", OutputStream::Stdout).write("lost");
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let (mux, mut rx) = OutputMux::new();
        mux.sink("x", OutputStream::Stdout)
            .write(Bytes::from_static(b"ok \xff"));
        assert_eq!(rx.try_recv().unwrap().text(), "ok \u{fffd}");
    }
}
