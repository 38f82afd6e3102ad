//! Line-delimited JSON decoding for daemon streams.
//!
//! Each non-empty line carries one JSON document. Server-sent-event framing is
//! accepted too: a `data:` prefix is stripped, other SSE fields and `:`
//! keep-alive comments are skipped.

use std::collections::VecDeque;
use std::fmt::Display;

use bytes::Bytes;
use cluster::HostError;
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;

const SSE_FIELDS: [&[u8]; 3] = [b"event:", b"id:", b"retry:"];

/// Longest line accepted from a daemon stream, newline excluded.
pub(crate) const MAX_LINE_LEN: usize = 1024 * 1024;

/// Decodes one line. `Ok(None)` means the line carries no document.
pub(crate) fn parse_line<T: DeserializeOwned>(line: &[u8]) -> Result<Option<T>, serde_json::Error> {
    let line = line.trim_ascii();
    if line.is_empty() || line.starts_with(b":") {
        return Ok(None);
    }
    if let Some(data) = line.strip_prefix(b"data:") {
        return serde_json::from_slice(data.trim_ascii_start()).map(Some);
    }
    if SSE_FIELDS.iter().any(|field| line.starts_with(field)) {
        return Ok(None);
    }
    serde_json::from_slice(line).map(Some)
}

struct LineState<S, T> {
    body: S,
    buf: Vec<u8>,
    pending: VecDeque<T>,
    failed: Option<HostError>,
    done: bool,
    operation: String,
}

impl<S, T: DeserializeOwned> LineState<S, T> {
    /// Moves every complete line out of `buf`, decoding into `pending`.
    fn drain_lines(&mut self) {
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            match parse_line(&line) {
                Ok(Some(item)) => self.pending.push_back(item),
                Ok(None) => {}
                Err(err) => {
                    self.fail(HostError::transport(&self.operation, format!("decode: {err}")));
                    return;
                }
            }
        }
    }

    fn fail(&mut self, err: HostError) {
        self.failed = Some(err);
        self.done = true;
    }
}

/// Turns a chunked response body into a stream of decoded documents.
///
/// Documents decoded before a failure are yielded before the failure itself;
/// nothing is yielded after it. A trailing line without a newline is decoded
/// when the body ends. A line longer than [`MAX_LINE_LEN`] is a transport
/// failure.
pub(crate) fn decode_lines<T, S, E>(
    body: S,
    operation: impl Into<String>,
) -> impl Stream<Item = Result<T, HostError>> + Send
where
    T: DeserializeOwned + Send + 'static,
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: Display + Send + 'static,
{
    let state = LineState {
        body,
        buf: Vec::new(),
        pending: VecDeque::new(),
        failed: None,
        done: false,
        operation: operation.into(),
    };
    futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                return Some((Ok(item), st));
            }
            if let Some(err) = st.failed.take() {
                return Some((Err(err), st));
            }
            if st.done {
                return None;
            }
            match st.body.next().await {
                Some(Ok(chunk)) => {
                    st.buf.extend_from_slice(&chunk);
                    st.drain_lines();
                    if st.buf.len() > MAX_LINE_LEN && st.failed.is_none() {
                        let err = HostError::transport(
                            &st.operation,
                            format!("line exceeds {MAX_LINE_LEN} bytes"),
                        );
                        st.buf.clear();
                        st.fail(err);
                    }
                }
                Some(Err(err)) => {
                    let err = HostError::transport(&st.operation, err);
                    st.fail(err);
                }
                None => {
                    st.done = true;
                    st.buf.push(b'\n');
                    st.drain_lines();
                }
            }
        }
    })
}
