//! In-memory mock transport shared by unit tests.
//!
//! Sessions and streams are controlled explicitly: tests decide when a
//! session becomes ready, when it closes, which stream handles it hands
//! out, and whether individual writes succeed, fail, or hang.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};

use super::{BroadcastSession, BroadcastStream, SessionTransport};

/// One-shot notification carrying an optional error kind.
///
/// `None` = not fired yet, `Some(None)` = fired cleanly,
/// `Some(Some(kind))` = fired with an error.
type Signal = watch::Sender<Option<Option<io::ErrorKind>>>;

fn new_signal() -> Signal {
    watch::channel(None).0
}

fn fire(signal: &Signal, err: Option<io::ErrorKind>) {
    signal.send_replace(Some(err));
}

async fn wait(signal: &Signal, what: &'static str) -> io::Result<()> {
    let mut rx = signal.subscribe();
    loop {
        let fired = *rx.borrow_and_update();
        if let Some(err) = fired {
            return match err {
                None => Ok(()),
                Some(kind) => Err(io::Error::new(kind, what)),
            };
        }
        if rx.changed().await.is_err() {
            return Ok(());
        }
    }
}

/// Mock bidirectional stream recording every write.
#[derive(Clone)]
pub(crate) struct MockStream {
    inner: Arc<StreamInner>,
}

struct StreamInner {
    written: Mutex<Vec<Bytes>>,
    fail_writes: AtomicBool,
    hang_writes: AtomicBool,
    closed: Signal,
}

impl MockStream {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(StreamInner {
                written: Mutex::new(Vec::new()),
                fail_writes: AtomicBool::new(false),
                hang_writes: AtomicBool::new(false),
                closed: new_signal(),
            }),
        }
    }

    /// All frames successfully written so far.
    pub(crate) fn written(&self) -> Vec<Bytes> {
        self.inner.written.lock().unwrap().clone()
    }

    pub(crate) fn write_count(&self) -> usize {
        self.inner.written.lock().unwrap().len()
    }

    /// Make every subsequent write fail with `BrokenPipe`.
    pub(crate) fn fail_writes(&self) {
        self.inner.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Make every subsequent write pend forever (for timeout tests).
    pub(crate) fn hang_writes(&self) {
        self.inner.hang_writes.store(true, Ordering::SeqCst);
    }

    pub(crate) fn close(&self) {
        fire(&self.inner.closed, None);
    }

    pub(crate) fn close_with_error(&self, kind: io::ErrorKind) {
        fire(&self.inner.closed, Some(kind));
    }
}

impl BroadcastStream for MockStream {
    async fn write(&self, frame: Bytes) -> io::Result<()> {
        if self.inner.hang_writes.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock write failure"));
        }
        self.inner.written.lock().unwrap().push(frame);
        Ok(())
    }

    async fn closed(&self) -> io::Result<()> {
        wait(&self.inner.closed, "mock stream closed").await
    }
}

/// Mock session with explicit ready/closed control.
#[derive(Clone)]
pub(crate) struct MockSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    ready: Signal,
    closed: Signal,
    is_closed: AtomicBool,
    /// Queued outcomes for `create_bidirectional_stream`; an empty queue
    /// hands out a fresh stream.
    stream_queue: Mutex<VecDeque<Result<MockStream, io::ErrorKind>>>,
    created: Mutex<Vec<MockStream>>,
}

impl MockSession {
    /// Session whose `ready()` has not resolved yet.
    pub(crate) fn pending() -> Self {
        Self {
            inner: Arc::new(SessionInner {
                ready: new_signal(),
                closed: new_signal(),
                is_closed: AtomicBool::new(false),
                stream_queue: Mutex::new(VecDeque::new()),
                created: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Session that is ready immediately.
    pub(crate) fn ready_now() -> Self {
        let session = Self::pending();
        session.mark_ready();
        session
    }

    pub(crate) fn mark_ready(&self) {
        fire(&self.inner.ready, None);
    }

    pub(crate) fn fail_ready(&self, kind: io::ErrorKind) {
        fire(&self.inner.ready, Some(kind));
    }

    pub(crate) fn close(&self) {
        self.inner.is_closed.store(true, Ordering::SeqCst);
        fire(&self.inner.closed, None);
    }

    pub(crate) fn close_with_error(&self, kind: io::ErrorKind) {
        self.inner.is_closed.store(true, Ordering::SeqCst);
        fire(&self.inner.closed, Some(kind));
    }

    /// Queue a specific stream handle for the next stream creation.
    pub(crate) fn queue_stream(&self, stream: MockStream) {
        self.inner.stream_queue.lock().unwrap().push_back(Ok(stream));
    }

    /// Queue a stream-creation failure.
    pub(crate) fn queue_stream_error(&self, kind: io::ErrorKind) {
        self.inner.stream_queue.lock().unwrap().push_back(Err(kind));
    }

    /// Every stream this session has handed out.
    pub(crate) fn created_streams(&self) -> Vec<MockStream> {
        self.inner.created.lock().unwrap().clone()
    }
}

impl BroadcastSession for MockSession {
    type Stream = MockStream;

    async fn ready(&self) -> io::Result<()> {
        wait(&self.inner.ready, "mock session ready failure").await
    }

    async fn closed(&self) -> io::Result<()> {
        wait(&self.inner.closed, "mock session closed").await
    }

    async fn create_bidirectional_stream(&self) -> io::Result<MockStream> {
        let queued = self.inner.stream_queue.lock().unwrap().pop_front();
        let stream = match queued {
            Some(Ok(stream)) => stream,
            Some(Err(kind)) => {
                return Err(io::Error::new(kind, "mock stream creation failure"))
            }
            None => MockStream::new(),
        };
        self.inner.created.lock().unwrap().push(stream.clone());
        Ok(stream)
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed.load(Ordering::SeqCst)
    }
}

/// Mock transport fed by a [`MockTransportHandle`].
pub(crate) struct MockTransport {
    rx: AsyncMutex<mpsc::UnboundedReceiver<io::Result<MockSession>>>,
}

/// Test-side handle injecting sessions into a [`MockTransport`].
///
/// Dropping the handle signals transport end-of-stream.
#[derive(Clone)]
pub(crate) struct MockTransportHandle {
    tx: mpsc::UnboundedSender<io::Result<MockSession>>,
}

pub(crate) fn mock_transport() -> (MockTransport, MockTransportHandle) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        MockTransport {
            rx: AsyncMutex::new(rx),
        },
        MockTransportHandle { tx },
    )
}

impl MockTransportHandle {
    pub(crate) fn push(&self, session: MockSession) {
        let _ = self.tx.send(Ok(session));
    }

    pub(crate) fn push_error(&self, kind: io::ErrorKind) {
        let _ = self
            .tx
            .send(Err(io::Error::new(kind, "mock accept failure")));
    }
}

impl SessionTransport for MockTransport {
    type Session = MockSession;

    async fn accept_session(&self) -> io::Result<Option<MockSession>> {
        match self.rx.lock().await.recv().await {
            Some(Ok(session)) => Ok(Some(session)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stream_records_writes() {
        let stream = MockStream::new();
        stream.write(Bytes::from_static(b"one")).await.unwrap();
        stream.write(Bytes::from_static(b"two")).await.unwrap();

        assert_eq!(stream.write_count(), 2);
        assert_eq!(stream.written()[0], Bytes::from_static(b"one"));
    }

    #[tokio::test]
    async fn test_stream_write_failure() {
        let stream = MockStream::new();
        stream.fail_writes();

        let err = stream.write(Bytes::from_static(b"x")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(stream.write_count(), 0);
    }

    #[tokio::test]
    async fn test_session_closed_notification_multiple_waiters() {
        let session = MockSession::ready_now();
        let a = session.clone();
        let b = session.clone();

        let wait_a = tokio::spawn(async move { a.closed().await });
        let wait_b = tokio::spawn(async move { b.closed().await });

        session.close_with_error(io::ErrorKind::ConnectionReset);

        assert!(wait_a.await.unwrap().is_err());
        assert!(wait_b.await.unwrap().is_err());
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn test_transport_end_of_stream() {
        let (transport, handle) = mock_transport();
        handle.push(MockSession::ready_now());
        drop(handle);

        assert!(transport.accept_session().await.unwrap().is_some());
        assert!(transport.accept_session().await.unwrap().is_none());
    }
}
