//! `Deferred<T>` and `Pipe<T>`: the two concurrency primitives the
//! connection core is built from.

use tokio::sync::{mpsc, watch};

use crate::error::{Error, Result};

#[derive(Clone)]
enum DeferredState<T> {
    Pending,
    Fulfilled(T),
}

/// A one-shot latch: inspectable without awaiting, awaitable when you need
/// to block on it. Used for the connection's "is this done, and if so with
/// what error?" state.
pub struct Deferred<T> {
    tx: watch::Sender<DeferredState<T>>,
    rx: watch::Receiver<DeferredState<T>>,
}

impl<T: Clone> Deferred<T> {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(DeferredState::Pending);
        Self { tx, rx }
    }

    /// Resolve the latch. Subsequent calls are no-ops.
    pub fn resolve(&self, value: T) {
        self.tx.send_if_modified(|state| {
            if matches!(state, DeferredState::Pending) {
                *state = DeferredState::Fulfilled(value);
                true
            } else {
                false
            }
        });
    }

    /// Inspect the current value without awaiting.
    pub fn peek(&self) -> Option<T> {
        match &*self.rx.borrow() {
            DeferredState::Pending => None,
            DeferredState::Fulfilled(v) => Some(v.clone()),
        }
    }

    /// Wait until the latch is resolved and return its value.
    pub async fn wait(&self) -> T {
        let mut rx = self.rx.clone();
        loop {
            if let DeferredState::Fulfilled(v) = &*rx.borrow() {
                return v.clone();
            }
            if rx.changed().await.is_err() {
                // Sender dropped without resolving; only happens if the
                // owning Deferred itself was dropped, which should not
                // outlive anything waiting on it.
                continue;
            }
        }
    }
}

impl<T: Clone> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A single in-flight message handed from the background read dispatcher to
/// whichever query currently holds the lock. Bounded to one in-flight write
/// so the dispatcher's push blocks until the query reads it — this is the
/// backpressure mechanism described in the connection core.
pub struct Pipe<T> {
    tx: mpsc::Sender<T>,
    rx: tokio::sync::Mutex<mpsc::Receiver<T>>,
}

impl<T> Pipe<T> {
    pub fn bounded(capacity: usize) -> (PipeWriter<T>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            PipeWriter { tx: tx.clone() },
            Self {
                tx,
                rx: tokio::sync::Mutex::new(rx),
            },
        )
    }

    /// Read the next value, waiting for the dispatcher to push one.
    pub async fn read(&self) -> Result<T> {
        self.rx
            .lock()
            .await
            .recv()
            .await
            .ok_or(Error::ConnectionClosed)
    }
}

/// The write half of a `Pipe`, held by the background dispatcher task.
#[derive(Clone)]
pub struct PipeWriter<T> {
    tx: mpsc::Sender<T>,
}

impl<T> PipeWriter<T> {
    /// Hand a value to the reader, waiting if the channel is full (i.e. the
    /// previous value hasn't been consumed yet).
    pub async fn write(&self, value: T) -> Result<()> {
        self.tx.send(value).await.map_err(|_| Error::ConnectionClosed)
    }
}

/// An unbounded FIFO of lock tokens; it only ever holds zero or one token
/// in flight, but an unbounded channel is a strict superset of that.
pub struct TokenQueue {
    tx: mpsc::UnboundedSender<()>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<()>>,
}

impl TokenQueue {
    /// An empty queue; the connection deposits the single lock token once
    /// startup observes the first `ReadyForQuery`.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    /// FIFO-wait for the lock token.
    pub async fn acquire(&self) -> Result<()> {
        self.rx.lock().await.recv().await.ok_or(Error::ConnectionClosed)?;
        Ok(())
    }

    /// Release the lock token back into the FIFO.
    pub fn release(&self) {
        // The receiver is only ever dropped when the connection itself is
        // torn down, at which point releasing a token is a harmless no-op.
        drop(self.tx.send(()));
    }
}

impl Default for TokenQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deferred_resolves_once() {
        let d: Deferred<i32> = Deferred::new();
        assert_eq!(d.peek(), None);
        d.resolve(1);
        d.resolve(2);
        assert_eq!(d.wait().await, 1);
    }

    #[tokio::test]
    async fn pipe_write_waits_for_read() {
        let (writer, pipe) = Pipe::bounded(1);
        writer.write(42).await.unwrap();
        assert_eq!(pipe.read().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn token_queue_fifo_roundtrip() {
        let queue = TokenQueue::new();
        queue.release();
        queue.acquire().await.unwrap();
        queue.release();
        queue.acquire().await.unwrap();
    }
}
