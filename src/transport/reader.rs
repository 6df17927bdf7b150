//! Background line readers.
//!
//! Each reader owns one output stream of the renderer for the life of the
//! transport. The response reader frames lines with [`RendererCodec`] and
//! forwards them to the driver's response queue; the log reader only echoes
//! lines (the renderer's stderr) through `tracing`.
//!
//! Readers never return errors. They stop quietly on end-of-stream, on an
//! unrecoverable I/O error, or when the queue's consumer is gone.

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::protocol::codec::RendererCodec;
use crate::AppError;

/// Response reader: forward every non-blank line from `stream` to `line_tx`.
///
/// Lines are trimmed before forwarding. `disconnected` is cancelled when the
/// reader stops, whatever the reason, so the driver can observe renderer
/// shutdown.
pub async fn run_response_reader<R>(
    label: &'static str,
    stream: R,
    line_tx: mpsc::Sender<String>,
    disconnected: CancellationToken,
) where
    R: AsyncRead + Unpin + Send,
{
    let mut framed = FramedRead::new(stream, RendererCodec::new());
    // FramedRead yields one `None` right after a decode error before reading on.
    let mut resuming = false;

    loop {
        match framed.next().await {
            None if resuming => resuming = false,

            None => {
                debug!(stream = label, "renderer reader: EOF detected");
                break;
            }

            Some(Err(AppError::Protocol(ref msg))) => {
                warn!(stream = label, error = msg.as_str(), "renderer reader: framing error, skipping");
                resuming = true;
            }

            Some(Err(e)) => {
                warn!(stream = label, error = %e, "renderer reader: IO error, stopping");
                break;
            }

            Some(Ok(line)) => {
                resuming = false;
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                debug!(stream = label, line, "renderer reader: line received");
                if line_tx.send(line.to_owned()).await.is_err() {
                    debug!(stream = label, "renderer reader: response queue closed, stopping");
                    break;
                }
            }
        }
    }

    disconnected.cancel();
}

/// Log reader: echo every line from `stream` at `WARN`.
///
/// Used for the renderer's stderr, whose lines never affect protocol state.
pub async fn run_log_reader<R>(label: &'static str, stream: R)
where
    R: AsyncRead + Unpin + Send,
{
    let mut framed = FramedRead::new(stream, RendererCodec::new());
    let mut resuming = false;

    loop {
        match framed.next().await {
            None if resuming => resuming = false,
            None => break,
            Some(Ok(line)) => {
                resuming = false;
                let line = line.trim();
                if !line.is_empty() {
                    warn!(stream = label, line, "renderer");
                }
            }
            Some(Err(AppError::Protocol(msg))) => {
                debug!(stream = label, error = msg.as_str(), "renderer log reader: framing error");
                resuming = true;
            }
            Some(Err(e)) => {
                debug!(stream = label, error = %e, "renderer log reader: IO error, stopping");
                break;
            }
        }
    }

    debug!(stream = label, "renderer log reader: EOF detected");
}

/// Spawn [`run_response_reader`] on the current runtime.
#[must_use]
pub fn spawn_response_reader<R>(
    label: &'static str,
    stream: R,
    line_tx: mpsc::Sender<String>,
    disconnected: CancellationToken,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(run_response_reader(label, stream, line_tx, disconnected))
}

/// Spawn [`run_log_reader`] on the current runtime.
#[must_use]
pub fn spawn_log_reader<R>(label: &'static str, stream: R) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(run_log_reader(label, stream))
}
