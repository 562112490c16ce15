//! Async stream line readers (non-UTF8-safe).
//!
//! Dev tools can emit non-UTF8 bytes on stdout/stderr, and
//! `BufReader::lines()` would end the reader on the first invalid sequence.
//! Lines are read as bytes and forwarded untouched; decoding happens when
//! they are rendered.

use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::output::OutputSink;

pub fn spawn_stream_reader(
    stream: impl AsyncRead + Unpin + Send + 'static,
    sink: OutputSink,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf: Vec<u8> = Vec::with_capacity(1024);

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break, // EOF
                Ok(_) => {
                    // Trim trailing newline(s)
                    if buf.last() == Some(&b'\n') {
                        buf.pop();
                        if buf.last() == Some(&b'\r') {
                            buf.pop();
                        }
                    }
                    sink.write(Bytes::copy_from_slice(&buf));
                }
                Err(e) => {
                    debug!(
                        prefix = sink.prefix(),
                        stream = sink.stream().as_str(),
                        error = %e,
                        "stream reader exiting due to read error"
                    );
                    break;
                }
            }
        }

        debug!(
            prefix = sink.prefix(),
            stream = sink.stream().as_str(),
            "stream reader task exiting"
        );
    })
}
