//! Stream session controller.
//!
//! One session is one query/response exchange against the streaming answer
//! endpoint. The controller owns the whole lifecycle: it opens the
//! connection, decodes and classifies frames, accumulates the thinking
//! trace, arms a liveness watchdog, and yields an async event sequence to
//! the consumer:
//!
//! - zero or more [`SessionEvent::Thinking`] snapshots (full prefix, never a
//!   diff, never shrinking), then
//! - exactly one [`SessionEvent::Done`] with the normalized [`FinalResult`],
//!   then end of stream.
//!
//! Every way a session can end — final frame, server error frame, transport
//! failure, liveness timeout, cancellation — converges on that single
//! terminal event. The guarantee is structural: the session task returns
//! immediately after sending `Done`, and the consumer-side state machine in
//! [`SessionHandle`] stops yielding once a terminal state is reached.

use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::backend::BackendClient;
use crate::error::ClientError;
use crate::models::AnswerRequest;
use crate::stream::decoder::FrameDecoder;
use crate::stream::frame::{classify, FinalResult, Frame, ThinkingEntry};

/// Watchdog interval: a session with no frame (heartbeats included) for this
/// long is declared dead.
pub const LIVENESS_TIMEOUT: Duration = Duration::from_secs(30);

/// Error message for a liveness timeout. Distinguishes "server died
/// silently" from a server-reported error.
pub const TIMEOUT_MESSAGE: &str = "Connection timeout - no response from server";

/// Error message when the server closes the stream without a terminal frame.
pub const CLOSED_MESSAGE: &str = "Stream closed before a final frame arrived";

/// One element of the event sequence a session yields.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Latest complete snapshot of the thinking trace
    Thinking(Vec<ThinkingEntry>),
    /// Terminal result; always the last event of a session
    Done(FinalResult),
}

/// Observable lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connection requested, no frame seen yet
    Open,
    /// At least one thinking snapshot delivered
    Streaming,
    /// Terminal result delivered with success status
    Completed,
    /// Terminal result delivered with error status
    Failed,
    /// Cancelled by the consumer; no further events
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Failed | SessionState::Cancelled
        )
    }
}

/// Consumer handle for one in-flight session.
///
/// Dropping the handle aborts the session task.
#[derive(Debug)]
pub struct SessionHandle {
    events: mpsc::UnboundedReceiver<SessionEvent>,
    abort: AbortHandle,
    state: SessionState,
}

/// Cloneable cancellation handle, for callers that hand the
/// [`SessionHandle`] itself to a consuming task.
#[derive(Debug, Clone)]
pub struct SessionCancel {
    abort: AbortHandle,
}

impl SessionCancel {
    /// Abort the session task. The owning [`SessionHandle`] sees end of
    /// stream at its next poll.
    pub fn cancel(&self) {
        self.abort.abort();
    }
}

impl SessionHandle {
    /// Run a session over an already-open frame stream. Useful on its own
    /// for exercising the state machine without a network transport.
    pub fn over_stream<S>(stream: S, liveness: Duration, thread_hint: Option<String>) -> Self
    where
        S: Stream<Item = Result<Bytes, ClientError>> + Send + Unpin + 'static,
    {
        let (tx, events) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_frame_loop(stream, liveness, thread_hint, tx));
        Self {
            events,
            abort: task.abort_handle(),
            state: SessionState::Open,
        }
    }

    /// Next event of the session, or `None` once the session is over.
    ///
    /// After a terminal event has been yielded (or [`SessionHandle::cancel`]
    /// was called) this returns `None` forever, regardless of what the
    /// server sends afterwards.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        if self.state.is_terminal() {
            return None;
        }
        match self.events.recv().await {
            Some(event) => {
                self.state = match &event {
                    SessionEvent::Thinking(_) => SessionState::Streaming,
                    SessionEvent::Done(result) if result.is_success() => SessionState::Completed,
                    SessionEvent::Done(_) => SessionState::Failed,
                };
                Some(event)
            }
            None => None,
        }
    }

    /// Cancel the session: stops the read loop at its next suspension
    /// point, disarms the watchdog, and suppresses every further event —
    /// including ones already decoded but not yet consumed.
    pub fn cancel(&mut self) {
        self.state = SessionState::Cancelled;
        self.abort.abort();
        self.events.close();
    }

    /// Lifecycle state as observed through this handle.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// A cloneable handle that cancels the underlying session task.
    pub fn canceller(&self) -> SessionCancel {
        SessionCancel {
            abort: self.abort.clone(),
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.abort.abort();
    }
}

/// Open a streaming answer session. Equivalent to
/// [`start_session_with_timeout`] with the default [`LIVENESS_TIMEOUT`].
pub fn start_session(client: &BackendClient, request: AnswerRequest) -> SessionHandle {
    start_session_with_timeout(client, request, LIVENESS_TIMEOUT)
}

/// Open a streaming answer session with an explicit watchdog interval.
///
/// A transport-level failure to open (connect error or non-2xx) yields an
/// immediate error-status terminal event and no thinking events.
pub fn start_session_with_timeout(
    client: &BackendClient,
    request: AnswerRequest,
    liveness: Duration,
) -> SessionHandle {
    let (tx, events) = mpsc::unbounded_channel();
    let client = client.clone();
    let task = tokio::spawn(async move {
        let thread_hint = request.thread_hint();
        // The watchdog covers the open too: a server that never sends
        // response headers is as dead as one that stops mid-stream.
        match tokio::time::timeout(liveness, client.open_answer_stream(&request)).await {
            Ok(Ok(stream)) => run_frame_loop(stream, liveness, thread_hint, tx).await,
            Ok(Err(err)) => {
                let _ = tx.send(SessionEvent::Done(FinalResult::error(
                    format!("Failed to connect to server: {err}"),
                    thread_hint,
                )));
            }
            Err(_) => {
                let _ = tx.send(SessionEvent::Done(FinalResult::error(
                    TIMEOUT_MESSAGE,
                    thread_hint,
                )));
            }
        }
    });
    SessionHandle {
        events,
        abort: task.abort_handle(),
        state: SessionState::Open,
    }
}

/// The session read loop. Frames are processed strictly in arrival order;
/// the watchdog deadline is re-armed on every well-formed frame and only on
/// those. Returns as soon as a terminal event has been sent, so frames
/// after the first terminal condition are never observed.
async fn run_frame_loop<S>(
    mut stream: S,
    liveness: Duration,
    thread_hint: Option<String>,
    tx: mpsc::UnboundedSender<SessionEvent>,
) where
    S: Stream<Item = Result<Bytes, ClientError>> + Unpin,
{
    let mut decoder = FrameDecoder::new();
    let mut thoughts: Vec<ThinkingEntry> = Vec::new();
    let mut deadline = Instant::now() + liveness;

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {
                tracing::warn!("no frame for {:?}, closing connection", liveness);
                let _ = tx.send(SessionEvent::Done(FinalResult::error(
                    TIMEOUT_MESSAGE,
                    thread_hint.clone(),
                )));
                return;
            }
            chunk = stream.next() => match chunk {
                Some(Ok(bytes)) => {
                    for payload in decoder.feed(&bytes) {
                        let frame = match classify(&payload) {
                            Ok(frame) => frame,
                            Err(err) => {
                                decoder.note_dropped();
                                tracing::warn!(%err, payload = %payload,
                                    "dropping unparseable frame payload");
                                continue;
                            }
                        };
                        deadline = Instant::now() + liveness;
                        match frame {
                            Frame::Heartbeat => {}
                            Frame::Thinking { content } => {
                                thoughts.push(ThinkingEntry::thinking(content));
                                let _ = tx.send(SessionEvent::Thinking(thoughts.clone()));
                            }
                            Frame::ToolUse { tool } => {
                                thoughts.push(ThinkingEntry::tool_use(tool));
                                let _ = tx.send(SessionEvent::Thinking(thoughts.clone()));
                            }
                            Frame::Final(frame) => {
                                let result = FinalResult::from_final(frame)
                                    .with_thread_fallback(thread_hint.clone());
                                let _ = tx.send(SessionEvent::Done(result));
                                return;
                            }
                            Frame::Error(frame) => {
                                let result = FinalResult::from_error(frame)
                                    .with_thread_fallback(thread_hint.clone());
                                let _ = tx.send(SessionEvent::Done(result));
                                return;
                            }
                        }
                    }
                }
                Some(Err(err)) => {
                    tracing::warn!(%err, "error reading answer stream");
                    let _ = tx.send(SessionEvent::Done(FinalResult::error(
                        format!("Connection error while streaming response: {err}"),
                        thread_hint.clone(),
                    )));
                    return;
                }
                None => {
                    let _ = tx.send(SessionEvent::Done(FinalResult::error(
                        CLOSED_MESSAGE,
                        thread_hint.clone(),
                    )));
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::frame::ResultStatus;
    use futures::FutureExt;
    use futures_util::stream;

    fn chunk(text: &str) -> Result<Bytes, ClientError> {
        Ok(Bytes::copy_from_slice(text.as_bytes()))
    }

    fn frame_data(json: &str) -> String {
        format!("data: {json}\n\n")
    }

    async fn collect(handle: &mut SessionHandle) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Some(event) = handle.next_event().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn thinking_then_final_yields_snapshots_and_one_done() {
        let body = [
            frame_data(r#"{"type":"heartbeat"}"#),
            frame_data(r#"{"type":"thinking","content":"Looking at sales data. "}"#),
            frame_data(r#"{"type":"tool_use","tool":"sales_analytics_assistant"}"#),
            frame_data(
                r#"{"type":"final","thread_id":"t-1","status":"success",
                    "ui_msgs":[{"ai":"Here is the breakdown",
                    "query_results":"[{\"region\":\"West\",\"revenue\":100}]",
                    "show_graph":true}]}"#,
            ),
        ]
        .concat();

        let frames = stream::iter(vec![chunk(&body)]);
        let mut handle = SessionHandle::over_stream(frames, LIVENESS_TIMEOUT, None);
        let events = collect(&mut handle).await;

        assert_eq!(events.len(), 3);
        match &events[0] {
            SessionEvent::Thinking(snapshot) => assert_eq!(snapshot.len(), 1),
            other => panic!("expected thinking snapshot, got {other:?}"),
        }
        match &events[1] {
            SessionEvent::Thinking(snapshot) => {
                assert_eq!(snapshot.len(), 2);
                assert_eq!(snapshot[1].content, "sales_analytics_assistant");
            }
            other => panic!("expected thinking snapshot, got {other:?}"),
        }
        match &events[2] {
            SessionEvent::Done(result) => {
                assert_eq!(result.status, ResultStatus::Success);
                assert_eq!(result.response, "Here is the breakdown");
                assert_eq!(result.thread_id.as_deref(), Some("t-1"));
                assert_eq!(result.query_results.len(), 1);
                assert!(result.show_graph);
            }
            other => panic!("expected done, got {other:?}"),
        }
        assert_eq!(handle.state(), SessionState::Completed);
    }

    #[tokio::test]
    async fn snapshots_are_prefix_extensions() {
        let body = [
            frame_data(r#"{"type":"thinking","content":"a"}"#),
            frame_data(r#"{"type":"thinking","content":"b"}"#),
            frame_data(r#"{"type":"thinking","content":"c"}"#),
            frame_data(r#"{"type":"final","ui_msgs":[{"ai":"done"}]}"#),
        ]
        .concat();

        // Deliver in awkward 7-byte chunks to also exercise the decoder
        let chunks: Vec<_> = body
            .as_bytes()
            .chunks(7)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        let mut handle =
            SessionHandle::over_stream(stream::iter(chunks), LIVENESS_TIMEOUT, None);

        let mut previous: Vec<ThinkingEntry> = Vec::new();
        while let Some(event) = handle.next_event().await {
            match event {
                SessionEvent::Thinking(snapshot) => {
                    assert_eq!(snapshot.len(), previous.len() + 1);
                    assert_eq!(&snapshot[..previous.len()], &previous[..]);
                    previous = snapshot;
                }
                SessionEvent::Done(result) => {
                    assert!(result.is_success());
                }
            }
        }
        assert_eq!(previous.len(), 3);
    }

    #[tokio::test]
    async fn frames_after_terminal_are_ignored() {
        // Two final frames plus trailing thinking in a single chunk: only
        // the first terminal frame may produce an event.
        let body = [
            frame_data(r#"{"type":"final","ui_msgs":[{"ai":"first"}]}"#),
            frame_data(r#"{"type":"final","ui_msgs":[{"ai":"second"}]}"#),
            frame_data(r#"{"type":"thinking","content":"late"}"#),
        ]
        .concat();

        let mut handle = SessionHandle::over_stream(
            stream::iter(vec![chunk(&body)]),
            LIVENESS_TIMEOUT,
            None,
        );
        let events = collect(&mut handle).await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            SessionEvent::Done(result) => assert_eq!(result.response, "first"),
            other => panic!("expected done, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_frame_wins_and_carries_message() {
        let body = frame_data(r#"{"type":"error","content":"agent exploded"}"#);
        let mut handle = SessionHandle::over_stream(
            stream::iter(vec![chunk(&body)]),
            LIVENESS_TIMEOUT,
            Some("t-7".to_string()),
        );
        let events = collect(&mut handle).await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            SessionEvent::Done(result) => {
                assert_eq!(result.status, ResultStatus::Error);
                assert_eq!(result.error.as_deref(), Some("agent exploded"));
                assert_eq!(result.thread_id.as_deref(), Some("t-7"));
            }
            other => panic!("expected done, got {other:?}"),
        }
        assert_eq!(handle.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn malformed_record_does_not_kill_the_session() {
        let body = [
            frame_data(r#"{"type":"thinking","content":"a"}"#),
            "data: {broken json\n\n".to_string(),
            "rogue record without marker\n\n".to_string(),
            frame_data(r#"{"type":"thinking","content":"b"}"#),
            frame_data(r#"{"type":"final","ui_msgs":[{"ai":"ok"}]}"#),
        ]
        .concat();

        let mut handle = SessionHandle::over_stream(
            stream::iter(vec![chunk(&body)]),
            LIVENESS_TIMEOUT,
            None,
        );
        let events = collect(&mut handle).await;
        assert_eq!(events.len(), 3);
        assert!(matches!(
            &events[2],
            SessionEvent::Done(result) if result.is_success()
        ));
    }

    #[tokio::test]
    async fn stream_end_without_final_is_an_error() {
        let body = frame_data(r#"{"type":"thinking","content":"a"}"#);
        let mut handle = SessionHandle::over_stream(
            stream::iter(vec![chunk(&body)]),
            LIVENESS_TIMEOUT,
            None,
        );
        let events = collect(&mut handle).await;
        assert_eq!(events.len(), 2);
        match &events[1] {
            SessionEvent::Done(result) => {
                assert_eq!(result.status, ResultStatus::Error);
                assert_eq!(result.error.as_deref(), Some(CLOSED_MESSAGE));
            }
            other => panic!("expected done, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_error_mid_stream_is_an_error() {
        let frames = stream::iter(vec![
            chunk(&frame_data(r#"{"type":"heartbeat"}"#)),
            Err(ClientError::Stream("connection reset".to_string())),
        ]);
        let mut handle = SessionHandle::over_stream(frames, LIVENESS_TIMEOUT, None);
        let events = collect(&mut handle).await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            SessionEvent::Done(result) => {
                assert_eq!(result.status, ResultStatus::Error);
                assert!(result
                    .error
                    .as_deref()
                    .unwrap()
                    .contains("Connection error while streaming response"));
            }
            other => panic!("expected done, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn silence_triggers_the_watchdog() {
        let mut handle = SessionHandle::over_stream(
            stream::pending::<Result<Bytes, ClientError>>(),
            LIVENESS_TIMEOUT,
            Some("t-3".to_string()),
        );
        let started = Instant::now();
        let events = collect(&mut handle).await;
        assert!(started.elapsed() >= LIVENESS_TIMEOUT);
        assert_eq!(events.len(), 1);
        match &events[0] {
            SessionEvent::Done(result) => {
                assert_eq!(result.status, ResultStatus::Error);
                assert_eq!(result.error.as_deref(), Some(TIMEOUT_MESSAGE));
                assert_eq!(result.thread_id.as_deref(), Some("t-3"));
            }
            other => panic!("expected done, got {other:?}"),
        }
        assert_eq!(handle.state(), SessionState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeats_rearm_the_watchdog() {
        let (tx, rx) = futures::channel::mpsc::unbounded();
        let mut handle = SessionHandle::over_stream(rx, LIVENESS_TIMEOUT, None);

        // 20s of silence, then a heartbeat: deadline moves to t=50s
        tokio::time::advance(Duration::from_secs(20)).await;
        tx.unbounded_send(chunk(&frame_data(r#"{"type":"heartbeat"}"#)))
            .unwrap();
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        // t=40s: past the original 30s deadline, but re-armed — no event
        tokio::time::advance(Duration::from_secs(20)).await;
        tokio::task::yield_now().await;
        assert!(handle.next_event().now_or_never().is_none());

        // Nothing further arrives: watchdog fires at t=50s
        let started = Instant::now();
        let event = handle.next_event().await;
        assert!(started.elapsed() <= LIVENESS_TIMEOUT);
        match event {
            Some(SessionEvent::Done(result)) => {
                assert_eq!(result.error.as_deref(), Some(TIMEOUT_MESSAGE));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn frames_injected_after_timeout_produce_nothing() {
        let (tx, rx) = futures::channel::mpsc::unbounded();
        let mut handle = SessionHandle::over_stream(rx, LIVENESS_TIMEOUT, None);

        let event = handle.next_event().await;
        assert!(matches!(
            event,
            Some(SessionEvent::Done(ref result))
                if result.error.as_deref() == Some(TIMEOUT_MESSAGE)
        ));

        // The session is over; a late final frame changes nothing.
        let _ = tx.unbounded_send(chunk(&frame_data(
            r#"{"type":"final","ui_msgs":[{"ai":"late"}]}"#,
        )));
        tokio::task::yield_now().await;
        assert!(handle.next_event().await.is_none());
        assert_eq!(handle.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn cancel_suppresses_all_further_events() {
        let (tx, rx) = futures::channel::mpsc::unbounded();
        let mut handle = SessionHandle::over_stream(rx, LIVENESS_TIMEOUT, None);

        tx.unbounded_send(chunk(&frame_data(
            r#"{"type":"thinking","content":"about to be cancelled"}"#,
        )))
        .unwrap();
        tokio::task::yield_now().await;

        handle.cancel();
        assert_eq!(handle.state(), SessionState::Cancelled);

        // Frames delivered after cancellation must never surface — not even
        // the snapshot that was already decoded and queued.
        let _ = tx.unbounded_send(chunk(&frame_data(
            r#"{"type":"final","ui_msgs":[{"ai":"too late"}]}"#,
        )));
        tokio::task::yield_now().await;
        assert!(handle.next_event().await.is_none());
        assert!(handle.next_event().await.is_none());
    }

    #[tokio::test]
    async fn canceller_aborts_the_session_task() {
        let (tx, rx) = futures::channel::mpsc::unbounded();
        let mut handle = SessionHandle::over_stream(rx, LIVENESS_TIMEOUT, None);
        let canceller = handle.canceller();
        canceller.cancel();
        tokio::task::yield_now().await;

        let _ = tx.unbounded_send(chunk(&frame_data(
            r#"{"type":"final","ui_msgs":[{"ai":"ignored"}]}"#,
        )));
        tokio::task::yield_now().await;
        // The producing task is gone; the channel closes without a terminal
        // event ever arriving.
        assert!(handle.next_event().await.is_none());
    }
}
