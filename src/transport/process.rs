//! Local renderer process transport.
//!
//! Spawns the renderer in CLI server mode with:
//! - piped stdin (commands), stdout (responses), and stderr (diagnostics);
//! - `kill_on_drop(true)` so a dropped driver never leaks the process;
//! - one response reader on stdout and one log reader on stderr.
//!
//! On close, stdin is shut first so the renderer sees end-of-input, the
//! process is given a grace period to exit, and only then is it killed.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use futures_util::SinkExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::protocol::codec::RendererCodec;
use crate::transport::reader::{spawn_log_reader, spawn_response_reader};
use crate::transport::{
    response_queue, ChannelFuture, TransportChannel, TransportKind, TransportSession,
};
use crate::{AppError, Result};

/// Executable looked up on `PATH` when no explicit path is configured.
pub const DEFAULT_RENDERER: &str = "clichart";

/// How to launch the renderer.
#[derive(Debug, Clone)]
pub struct SpawnConfig {
    /// Explicit renderer executable; `None` searches `PATH` for
    /// [`DEFAULT_RENDERER`].
    pub renderer_path: Option<PathBuf>,
    /// Arguments that put the renderer in CLI server mode.
    pub renderer_args: Vec<String>,
    /// How long `close` waits for the process to exit before killing it.
    pub close_grace: Duration,
}

/// Resolve the renderer executable.
///
/// An explicit path containing a directory separator is used as-is; a bare
/// name (explicit or the default) is searched for on `PATH`.
///
/// # Errors
///
/// Returns `AppError::Transport("renderer not found: …")` if the executable
/// does not exist.
pub fn locate_renderer(renderer_path: Option<&PathBuf>) -> Result<PathBuf> {
    let candidate = renderer_path.map_or_else(|| PathBuf::from(DEFAULT_RENDERER), Clone::clone);

    if candidate.components().count() > 1 {
        return if candidate.is_file() {
            Ok(candidate)
        } else {
            Err(AppError::Transport(format!(
                "renderer not found: {}",
                candidate.display()
            )))
        };
    }

    which::which(&candidate).map_err(|err| {
        AppError::Transport(format!(
            "renderer not found: {} ({err})",
            candidate.display()
        ))
    })
}

/// Spawned renderer process.
#[derive(Debug)]
pub struct ProcessChannel {
    child: Child,
    stdin: Option<FramedWrite<ChildStdin, RendererCodec>>,
    readers: Vec<JoinHandle<()>>,
    close_grace: Duration,
}

/// Spawn the renderer and wire its pipes into a [`TransportSession`].
///
/// # Errors
///
/// - `AppError::Transport("renderer not found: …")`: executable missing.
/// - `AppError::Transport("failed to spawn renderer: …")`: OS spawn failure.
/// - `AppError::Transport("failed to capture renderer …")`: a pipe is missing.
pub fn spawn_renderer(config: &SpawnConfig) -> Result<TransportSession> {
    let program = locate_renderer(config.renderer_path.as_ref())?;

    let mut cmd = Command::new(&program);
    cmd.args(&config.renderer_args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|err| AppError::Transport(format!("failed to spawn renderer: {err}")))?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| AppError::Transport("failed to capture renderer stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Transport("failed to capture renderer stdout".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::Transport("failed to capture renderer stderr".into()))?;

    info!(
        program = %program.display(),
        args = ?config.renderer_args,
        pid = ?child.id(),
        "renderer process spawned"
    );

    let (line_tx, line_rx) = response_queue();
    let disconnected = CancellationToken::new();
    let readers = vec![
        spawn_response_reader("stdout", stdout, line_tx, disconnected.clone()),
        spawn_log_reader("stderr", stderr),
    ];

    let channel = ProcessChannel {
        child,
        stdin: Some(FramedWrite::new(stdin, RendererCodec::new())),
        readers,
        close_grace: config.close_grace,
    };

    Ok(TransportSession::new(Box::new(channel), line_rx, disconnected))
}

impl ProcessChannel {
    async fn shutdown(&mut self) -> Result<()> {
        let write_result = match self.stdin.take() {
            Some(mut stdin) => stdin
                .close()
                .await
                .map_err(|err| {
                    AppError::Transport(format!("failed to close renderer stdin: {}", err.message()))
                }),
            None => return Ok(()),
        };

        match tokio::time::timeout(self.close_grace, self.child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "renderer process exited"),
            Ok(Err(err)) => debug!(%err, "error waiting for renderer process"),
            Err(_elapsed) => {
                warn!(grace = ?self.close_grace, "renderer did not exit after close, killing");
                if let Err(err) = self.child.kill().await {
                    debug!(%err, "failed to kill renderer process");
                }
            }
        }

        for reader in self.readers.drain(..) {
            reader.abort();
        }

        write_result
    }
}

impl TransportChannel for ProcessChannel {
    fn write_line<'a>(&'a mut self, line: &'a str) -> ChannelFuture<'a, Result<()>> {
        Box::pin(async move {
            let stdin = self
                .stdin
                .as_mut()
                .ok_or_else(|| AppError::Transport("renderer stdin is closed".into()))?;
            stdin.send(line.to_owned()).await.map_err(|err| {
                AppError::Transport(format!("write to renderer failed: {}", err.message()))
            })
        })
    }

    fn close(&mut self) -> ChannelFuture<'_, Result<()>> {
        Box::pin(self.shutdown())
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Process
    }
}
