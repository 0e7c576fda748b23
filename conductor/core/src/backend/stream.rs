//! Line-oriented stream decoding
//!
//! Both backends stream text as lines: Ollama as newline-delimited JSON,
//! OpenAI-compatible servers as server-sent events (`data: {...}`). This
//! module turns a response byte stream into a fragment stream, given a
//! per-line decoder.

use std::time::Duration;

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

/// What a single decoded line means
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum LineEvent {
    /// A text fragment to yield
    Fragment(String),
    /// A fragment (possibly empty) followed by end of stream
    Done(Option<String>),
    /// Nothing to yield (blank, malformed or metadata-only line)
    Skip,
}

/// Stream containing a single error fragment
pub(crate) fn error_stream(message: impl std::fmt::Display) -> BoxStream<'static, String> {
    futures::stream::once(futures::future::ready(format!("Error: {message}"))).boxed()
}

/// Decode a streaming HTTP response into text fragments.
///
/// `idle` bounds the wait for each chunk, not the whole reply, so a long
/// generation is never cut off while the server keeps sending.
pub(crate) fn fragments(
    response: reqwest::Response,
    idle: Duration,
    decode: fn(&str) -> LineEvent,
) -> BoxStream<'static, String> {
    decode_body(response.bytes_stream(), idle, decode)
}

/// Decode any chunked byte stream into text fragments.
///
/// A task reads the body and forwards fragments over a bounded channel, so
/// the body is only read as fast as the consumer pulls.
pub(crate) fn decode_body<S, B, E>(
    body: S,
    idle: Duration,
    decode: fn(&str) -> LineEvent,
) -> BoxStream<'static, String>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let (tx, rx) = mpsc::channel(32);
    let mut body = Box::pin(body);

    tokio::spawn(async move {
        // Bytes, not a String: a chunk may end inside a multi-byte character
        let mut buffer: Vec<u8> = Vec::new();

        loop {
            let chunk = match tokio::time::timeout(idle, body.next()).await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(_) => {
                    warn!(idle_secs = idle.as_secs_f64(), "Stream stalled");
                    let _ = tx
                        .send(format!(
                            "Error: no data received for {} seconds",
                            idle.as_secs()
                        ))
                        .await;
                    return;
                }
            };

            match chunk {
                Ok(bytes) => {
                    buffer.extend_from_slice(bytes.as_ref());

                    while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                        let line: Vec<u8> = buffer.drain(..=pos).collect();
                        let line = String::from_utf8_lossy(&line);
                        if !forward(&tx, decode(line.trim())).await {
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Stream interrupted");
                    let _ = tx.send(format!("Error: {e}")).await;
                    return;
                }
            }
        }

        // Trailing line without a newline terminator
        let rest = String::from_utf8_lossy(&buffer);
        let rest = rest.trim();
        if !rest.is_empty() {
            forward(&tx, decode(rest)).await;
        }
        debug!("Stream ended");
    });

    ReceiverStream::new(rx).boxed()
}

/// Send one decoded event; returns false when the stream should stop
async fn forward(tx: &mpsc::Sender<String>, event: LineEvent) -> bool {
    match event {
        LineEvent::Fragment(text) => tx.send(text).await.is_ok(),
        LineEvent::Done(last) => {
            if let Some(text) = last.filter(|t| !t.is_empty()) {
                let _ = tx.send(text).await;
            }
            false
        }
        LineEvent::Skip => true,
    }
}
