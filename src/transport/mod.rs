//! Renderer transports.
//!
//! A [`TransportChannel`] owns the write direction of a connection to the
//! renderer and knows how to tear the whole connection down. The read
//! direction is always consumed by background readers (see [`reader`]) that
//! feed a [`TransportSession`]'s response queue.
//!
//! Submodules:
//! - `process`: spawned renderer with independent stdin/stdout/stderr pipes.
//! - `stream`: any bidirectional byte stream; used for TCP connections.
//! - `reader`: background line readers.

pub mod process;
pub mod reader;
pub mod stream;

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::Result;

/// Depth of the response queue between a reader and the driver.
pub const RESPONSE_QUEUE_DEPTH: usize = 64;

/// Boxed future returned by [`TransportChannel`] methods.
pub type ChannelFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Which kind of connection a channel wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Locally spawned renderer process.
    Process,
    /// TCP connection to a renderer server.
    Socket,
    /// Caller-supplied byte stream.
    Stream,
}

impl Display for TransportKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Process => f.write_str("process"),
            Self::Socket => f.write_str("socket"),
            Self::Stream => f.write_str("stream"),
        }
    }
}

/// Write side and lifecycle of a renderer connection.
pub trait TransportChannel: Send {
    /// Write `line` plus the newline terminator and flush before returning.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`](crate::AppError::Transport) if the
    /// write or flush fails, or the channel is already closed.
    fn write_line<'a>(&'a mut self, line: &'a str) -> ChannelFuture<'a, Result<()>>;

    /// Shut the write side, then best-effort close the read side.
    ///
    /// Read-side failures are logged, never returned. Closing twice is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`](crate::AppError::Transport) if the
    /// write side could not be shut down cleanly.
    fn close(&mut self) -> ChannelFuture<'_, Result<()>>;

    /// Connection kind, for logging.
    fn kind(&self) -> TransportKind;
}

/// Outcome of waiting for one response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineWait {
    /// A line arrived.
    Line(String),
    /// Nothing arrived within the timeout.
    TimedOut,
    /// The renderer's output ended and the queue is drained.
    Closed,
}

/// One live connection: the channel, its response queue, and its readers'
/// end-of-stream signal.
pub struct TransportSession {
    channel: Box<dyn TransportChannel>,
    responses: mpsc::Receiver<String>,
    disconnected: CancellationToken,
}

impl std::fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSession")
            .field("kind", &self.channel.kind())
            .field("disconnected", &self.disconnected.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl TransportSession {
    /// Assemble a session from its parts.
    ///
    /// `responses` must be fed by a reader that cancels `disconnected` when
    /// it stops.
    #[must_use]
    pub fn new(
        channel: Box<dyn TransportChannel>,
        responses: mpsc::Receiver<String>,
        disconnected: CancellationToken,
    ) -> Self {
        Self {
            channel,
            responses,
            disconnected,
        }
    }

    /// Connection kind.
    #[must_use]
    pub fn kind(&self) -> TransportKind {
        self.channel.kind()
    }

    /// Write one protocol line.
    ///
    /// # Errors
    ///
    /// See [`TransportChannel::write_line`].
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        self.channel.write_line(line).await
    }

    /// Wait up to `timeout` for the next response line.
    pub async fn next_line(&mut self, timeout: Duration) -> LineWait {
        match tokio::time::timeout(timeout, self.responses.recv()).await {
            Ok(Some(line)) => LineWait::Line(line),
            Ok(None) => LineWait::Closed,
            Err(_elapsed) => LineWait::TimedOut,
        }
    }

    /// Remove and return every line already queued.
    pub fn drain_queued(&mut self) -> Vec<String> {
        let mut stale = Vec::new();
        while let Ok(line) = self.responses.try_recv() {
            stale.push(line);
        }
        stale
    }

    /// Close the connection. See [`TransportChannel::close`].
    ///
    /// Also fires the disconnect signal, since aborted readers never get to.
    ///
    /// # Errors
    ///
    /// See [`TransportChannel::close`].
    pub async fn close(&mut self) -> Result<()> {
        let result = self.channel.close().await;
        self.responses.close();
        self.disconnected.cancel();
        result
    }

    /// Whether the renderer's primary output has ended.
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.disconnected.is_cancelled()
    }

    /// Resolves once the renderer's primary output has ended.
    pub fn disconnected(&self) -> impl Future<Output = ()> + Send + 'static {
        let token = self.disconnected.clone();
        async move { token.cancelled().await }
    }
}

/// Build the response queue shared by a reader and a session.
#[must_use]
pub fn response_queue() -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
    mpsc::channel(RESPONSE_QUEUE_DEPTH)
}
