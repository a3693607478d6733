//! Live log delivery for executions
//!
//! The gateway pushes an execution's output as Server-Sent Events named
//! `stdout` and `stderr`. [`LogSubscription`] owns the task reading that
//! stream: every event is appended to the execution's log buffer and also
//! handed to the subscription's receiver as a typed [`LogEvent`].

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::Method;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::api::paths;
use crate::client::SandboxClient;
use crate::error::{SandboxError, SandboxResult};
use crate::execution::SharedLogs;

/// Which output stream a log line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl LogStream {
    /// Map an SSE event name to a stream. Unknown names yield `None`.
    pub fn from_event_name(name: &str) -> Option<Self> {
        match name {
            "stdout" => Some(LogStream::Stdout),
            "stderr" => Some(LogStream::Stderr),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogStream::Stdout => "stdout",
            LogStream::Stderr => "stderr",
        }
    }
}

impl std::fmt::Display for LogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of execution output, exactly as the server sent it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub stream: LogStream,
    pub data: String,
}

/// A dispatched Server-Sent Event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental `text/event-stream` decoder.
///
/// Bytes are buffered until a full line is available, so chunk boundaries may
/// fall anywhere, including inside a multibyte character or between `\r` and
/// `\n`. An event still being assembled when the stream ends is discarded.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event_type: String,
    data: String,
    has_data: bool,
    started: bool,
    pending_cr: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect every event it completes
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        // An empty chunk must not consume a pending CR
        if chunk.is_empty() {
            return Vec::new();
        }

        let mut input = chunk;
        if self.pending_cr {
            self.pending_cr = false;
            if input.first() == Some(&b'\n') {
                input = &input[1..];
            }
        }
        self.buffer.extend_from_slice(input);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n' || *b == b'\r') {
            let mut consumed = pos + 1;
            if self.buffer[pos] == b'\r' {
                match self.buffer.get(pos + 1) {
                    Some(b'\n') => consumed += 1,
                    None => self.pending_cr = true,
                    Some(_) => {}
                }
            }

            let line: Vec<u8> = self.buffer.drain(..consumed).take(pos).collect();
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        events
    }

    fn process_line(&mut self, raw: &[u8]) -> Option<SseEvent> {
        let decoded = String::from_utf8_lossy(raw);
        let mut line: &str = &decoded;
        if !self.started {
            self.started = true;
            line = line.strip_prefix('\u{feff}').unwrap_or(line);
        }

        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.find(':') {
            Some(idx) => {
                let value = &line[idx + 1..];
                (&line[..idx], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };

        match field {
            "event" => self.event_type = value.to_string(),
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            // id and retry only matter for reconnection, which is not done here
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let has_data = std::mem::take(&mut self.has_data);
        let data = std::mem::take(&mut self.data);
        let event_type = std::mem::take(&mut self.event_type);
        if !has_data {
            return None;
        }

        Some(SseEvent {
            event: if event_type.is_empty() {
                "message".to_string()
            } else {
                event_type
            },
            data,
        })
    }
}

/// Handle to the live event stream of one execution.
///
/// Dropping the handle detaches it: the reader keeps appending to the
/// execution's logs until the server closes the stream. Call [`close`](Self::close)
/// to stop it. Events are also available from [`recv`](Self::recv) or by using
/// the subscription as a [`Stream`].
#[derive(Debug)]
pub struct LogSubscription {
    execution_id: String,
    receiver: mpsc::UnboundedReceiver<LogEvent>,
    handle: JoinHandle<()>,
}

impl LogSubscription {
    /// Open the event stream for an execution.
    ///
    /// Resolves once the server has accepted the stream request.
    pub(crate) async fn open(
        client: &SandboxClient,
        sandbox_id: &str,
        execution_id: &str,
        logs: SharedLogs,
    ) -> SandboxResult<Self> {
        let url = client.url_for(&paths::events(sandbox_id, execution_id));
        debug!("Opening event stream {}", url);

        let response = client
            .authorized(Method::GET, &url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| SandboxError::subscription(format!("Failed to connect: {}", e)))?;

        if !response.status().is_success() {
            return Err(SandboxError::subscription(format!(
                "Event stream rejected: {}",
                response.status()
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let task_execution_id = execution_id.to_string();
        let handle = tokio::spawn(async move {
            let mut decoder = SseDecoder::new();
            let mut body = response.bytes_stream();

            while let Some(chunk) = body.next().await {
                match chunk {
                    Ok(bytes) => {
                        for event in decoder.feed(&bytes) {
                            let Some(stream) = LogStream::from_event_name(&event.event) else {
                                debug!(
                                    "Ignoring '{}' event for execution {}",
                                    event.event, task_execution_id
                                );
                                continue;
                            };

                            let log_event = LogEvent {
                                stream,
                                data: event.data,
                            };
                            logs.write().await.push(&log_event);
                            // The receiver may be gone; the log buffer still fills
                            let _ = tx.send(log_event);
                        }
                    }
                    Err(e) => {
                        error!(
                            "Event stream for execution {} failed: {}",
                            task_execution_id, e
                        );
                        break;
                    }
                }
            }

            debug!("Event stream for execution {} closed", task_execution_id);
        });

        Ok(Self {
            execution_id: execution_id.to_string(),
            receiver: rx,
            handle,
        })
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    /// Next event, or `None` once the stream has ended and all events were taken
    pub async fn recv(&mut self) -> Option<LogEvent> {
        self.receiver.recv().await
    }

    /// Next already-delivered event without waiting
    pub fn try_recv(&mut self) -> Option<LogEvent> {
        self.receiver.try_recv().ok()
    }

    /// Stop reading the stream. Events delivered before the call stay readable.
    pub fn close(&mut self) {
        self.handle.abort();
        self.receiver.close();
    }

    /// Whether the reader has stopped, either because the server closed the
    /// stream or because the subscription was closed
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Stream for LogSubscription {
    type Item = LogEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ExecutionLogs;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn event(name: &str, data: &str) -> SseEvent {
        SseEvent {
            event: name.to_string(),
            data: data.to_string(),
        }
    }

    #[test]
    fn test_named_events() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"event: stdout\ndata: hello\n\nevent: stderr\ndata: oops\n\n");
        assert_eq!(events, vec![event("stdout", "hello"), event("stderr", "oops")]);
    }

    #[test]
    fn test_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"event: std").is_empty());
        assert!(decoder.feed(b"out\ndata: hel").is_empty());
        assert!(decoder.feed(b"lo\n").is_empty());
        assert_eq!(decoder.feed(b"\n"), vec![event("stdout", "hello")]);
    }

    #[test]
    fn test_crlf_and_cr_line_endings() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"event: stdout\r\ndata: a\r\n\r\nevent: stderr\rdata: b\r\r");
        assert_eq!(events, vec![event("stdout", "a"), event("stderr", "b")]);
    }

    #[test]
    fn test_crlf_split_between_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: x\r").is_empty());
        // The \n completing the CRLF must not count as an empty line
        assert!(decoder.feed(b"\n").is_empty());
        assert_eq!(decoder.feed(b"\r\n"), vec![event("message", "x")]);
    }

    #[test]
    fn test_empty_chunk_between_cr_and_lf() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"event: stdout\r").is_empty());
        assert!(decoder.feed(b"").is_empty());
        assert_eq!(decoder.feed(b"\ndata: a\r\n\r\n"), vec![event("stdout", "a")]);
    }

    fn wire_event() -> impl Strategy<Value = (LogStream, String, &'static str)> {
        (
            prop_oneof![Just(LogStream::Stdout), Just(LogStream::Stderr)],
            "[^\r\n]{0,12}",
            prop_oneof![Just("\n"), Just("\r\n"), Just("\r")],
        )
    }

    proptest! {
        #[test]
        fn prop_logs_keep_order_for_any_chunking(
            sent in proptest::collection::vec(wire_event(), 0..16),
            cuts in proptest::collection::vec(any::<proptest::sample::Index>(), 0..12),
        ) {
            let mut wire = Vec::new();
            for (stream, data, eol) in &sent {
                wire.extend_from_slice(format!("event: {stream}{eol}data: {data}{eol}{eol}").as_bytes());
            }

            // Repeated cut points produce empty chunks
            let mut points: Vec<usize> = cuts.iter().map(|cut| cut.index(wire.len() + 1)).collect();
            points.push(0);
            points.push(wire.len());
            points.sort_unstable();

            let mut decoder = SseDecoder::new();
            let mut logs = ExecutionLogs::default();
            for window in points.windows(2) {
                for ev in decoder.feed(&wire[window[0]..window[1]]) {
                    if let Some(stream) = LogStream::from_event_name(&ev.event) {
                        logs.push(&LogEvent { stream, data: ev.data });
                    }
                }
            }

            let expected = |wanted: LogStream| -> Vec<String> {
                sent.iter()
                    .filter(|(stream, _, _)| *stream == wanted)
                    .map(|(_, data, _)| data.clone())
                    .collect()
            };
            prop_assert_eq!(logs.stdout, expected(LogStream::Stdout));
            prop_assert_eq!(logs.stderr, expected(LogStream::Stderr));
        }
    }

    #[test]
    fn test_multibyte_split() {
        let bytes = "event: stdout\ndata: héllo ✓\n\n".as_bytes();
        let split = bytes.len() - 4;
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(&bytes[..split]).is_empty());
        assert_eq!(decoder.feed(&bytes[split..]), vec![event("stdout", "héllo ✓")]);
    }

    #[test]
    fn test_multiline_data_and_comments() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b": keep-alive\nevent: stdout\ndata: one\ndata:two\nid: 7\nretry: 10\n\n");
        assert_eq!(events, vec![event("stdout", "one\ntwo")]);
    }

    #[test]
    fn test_only_one_leading_space_stripped() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"event: stdout\ndata:   indented\n\n");
        assert_eq!(events, vec![event("stdout", "  indented")]);
    }

    #[test]
    fn test_empty_data_dispatches_but_no_data_does_not() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"event: stdout\n\nevent: stdout\ndata\n\n");
        assert_eq!(events, vec![event("stdout", "")]);
    }

    #[test]
    fn test_leading_bom_skipped() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed("\u{feff}event: stderr\ndata: x\n\n".as_bytes());
        assert_eq!(events, vec![event("stderr", "x")]);
    }

    #[test]
    fn test_event_name_resets_between_events() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"event: stdout\ndata: a\n\ndata: b\n\n");
        assert_eq!(events, vec![event("stdout", "a"), event("message", "b")]);
    }

    #[test]
    fn test_log_stream_names() {
        assert_eq!(LogStream::from_event_name("stdout"), Some(LogStream::Stdout));
        assert_eq!(LogStream::from_event_name("stderr"), Some(LogStream::Stderr));
        assert_eq!(LogStream::from_event_name("message"), None);
        assert_eq!(LogStream::Stderr.to_string(), "stderr");
    }
}
