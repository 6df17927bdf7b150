//! Bidirectional stream transport.
//!
//! A single byte stream carries both directions, so there is no separate
//! error channel: anything the renderer reports arrives inline as a response
//! line. TCP connections to a renderer started with `--port` use this
//! transport, as does any caller-supplied `AsyncRead + AsyncWrite` stream.

use futures_util::SinkExt;
use tokio::io::{AsyncRead, AsyncWrite, WriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::protocol::codec::RendererCodec;
use crate::transport::reader::spawn_response_reader;
use crate::transport::{
    response_queue, ChannelFuture, TransportChannel, TransportKind, TransportSession,
};
use crate::{AppError, Result};

/// Host the socket transport connects to.
pub const RENDERER_HOST: &str = "localhost";

/// Write half of a split stream plus the reader on the other half.
#[derive(Debug)]
pub struct StreamChannel<S> {
    writer: Option<FramedWrite<WriteHalf<S>, RendererCodec>>,
    reader: Option<JoinHandle<()>>,
    kind: TransportKind,
}

/// Connect to a renderer server on `localhost:port`.
///
/// # Errors
///
/// Returns `AppError::Transport` if the connection cannot be established.
pub async fn connect_tcp(port: u16) -> Result<TransportSession> {
    let stream = TcpStream::connect((RENDERER_HOST, port)).await.map_err(|err| {
        AppError::Transport(format!(
            "failed to connect to renderer at {RENDERER_HOST}:{port}: {err}"
        ))
    })?;
    if let Err(err) = stream.set_nodelay(true) {
        debug!(%err, "failed to set TCP_NODELAY on renderer socket");
    }
    info!(port, "connected to renderer server");
    Ok(open_stream(stream, TransportKind::Socket))
}

/// Wrap an already-open bidirectional stream.
///
/// Must be called from within a tokio runtime; the reader task is spawned
/// immediately.
#[must_use]
pub fn open_stream<S>(stream: S, kind: TransportKind) -> TransportSession
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);

    let (line_tx, line_rx) = response_queue();
    let disconnected = CancellationToken::new();
    let reader = spawn_response_reader("stream", read_half, line_tx, disconnected.clone());

    let channel = StreamChannel {
        writer: Some(FramedWrite::new(write_half, RendererCodec::new())),
        reader: Some(reader),
        kind,
    };

    TransportSession::new(Box::new(channel), line_rx, disconnected)
}

impl<S> StreamChannel<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn shutdown(&mut self) -> Result<()> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };

        let write_result = writer.close().await.map_err(|err| {
            AppError::Transport(format!("failed to shut down renderer stream: {}", err.message()))
        });

        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        debug!(kind = %self.kind, "renderer stream closed");

        write_result
    }
}

impl<S> TransportChannel for StreamChannel<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    fn write_line<'a>(&'a mut self, line: &'a str) -> ChannelFuture<'a, Result<()>> {
        Box::pin(async move {
            let writer = self
                .writer
                .as_mut()
                .ok_or_else(|| AppError::Transport("renderer stream is closed".into()))?;
            writer.send(line.to_owned()).await.map_err(|err| {
                AppError::Transport(format!("write to renderer failed: {}", err.message()))
            })
        })
    }

    fn close(&mut self) -> ChannelFuture<'_, Result<()>> {
        Box::pin(self.shutdown())
    }

    fn kind(&self) -> TransportKind {
        self.kind
    }
}
