use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::error::ChatError;
use crate::registry::Notifier;

/// How many lines may be waiting for a slow client before new ones are
/// dropped for it.
pub const OUTBOUND_QUEUE: usize = 256;

/// How long a closing connection may spend flushing its queue before the
/// writer is aborted and the socket dropped.
pub const LINGER: Duration = Duration::from_secs(5);

/// The write side of one client connection.
///
/// Delivery only enqueues; a dedicated writer task owns the socket half
/// and drains the queue in order. When every `Outbound` handle is
/// dropped the queue closes, the writer flushes what is left and shuts
/// the write half down.
///
/// Lines are `Arc<str>` so one broadcast shares a single allocation
/// across every recipient's queue.
pub struct Outbound {
    tx: mpsc::Sender<Arc<str>>,
}

/// Handle to the writer task spawned by `Outbound::spawn`.
pub struct Writer {
    task: JoinHandle<()>,
}

impl Outbound {
    /// Spawn the writer task for `writer` and return the handle that
    /// feeds it.
    pub fn spawn<W>(writer: W) -> (Arc<Outbound>, Writer)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
        let task = tokio::spawn(write_loop(writer, rx));
        (Arc::new(Outbound { tx }), Writer { task })
    }
}

impl Notifier for Outbound {
    fn deliver(&self, text: Arc<str>) -> Result<(), ChatError> {
        self.tx.try_send(text).map_err(|e| match e {
            TrySendError::Full(_) => ChatError::QueueFull,
            TrySendError::Closed(_) => ChatError::Disconnected,
        })
    }
}

impl Writer {
    /// Wait for the writer to flush and shut down, at most `linger`.
    ///
    /// Call once every `Outbound` handle is gone. A peer that stops
    /// reading would otherwise keep the writer (and the socket) alive
    /// forever; past the deadline the task is aborted, which drops the
    /// write half. Returns `true` if the queue drained in time.
    pub async fn close(mut self, linger: Duration) -> bool {
        match tokio::time::timeout(linger, &mut self.task).await {
            Ok(_) => true,
            Err(_) => {
                self.task.abort();
                let _ = self.task.await;
                false
            }
        }
    }
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::Receiver<Arc<str>>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(text) = rx.recv().await {
        if let Err(e) = writer.write_all(text.as_bytes()).await {
            // Dropping `rx` makes further deliveries fail with Disconnected.
            tracing::debug!(error = %e, "write failed, stopping writer");
            return;
        }
    }
    let _ = writer.shutdown().await;
}
