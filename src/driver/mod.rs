//! Renderer driver: one command, one response, strictly alternating.
//!
//! [`RendererDriver`] owns a single [`TransportSession`] for its whole life.
//! Each exchange writes one command line, then waits on the session's
//! response queue for at most the configured response timeout:
//!
//! | Outcome                         | Result                                      |
//! |---------------------------------|---------------------------------------------|
//! | line starting with `OK`         | `Ok(())`                                    |
//! | any other line                  | `AppError::Protocol(<line verbatim>)`       |
//! | nothing within the timeout      | `AppError::Protocol("No response received")`|
//! | renderer output ended           | `AppError::Transport(…)`                    |
//!
//! A timed-out exchange is not retried and the session is not repaired; its
//! real outcome is unknown. Lines that show up later are discarded (and
//! logged) before the next command is written, but a response arriving
//! after that point would still be read by the wrong exchange.
//!
//! Every exchange takes `&mut self`, so two exchanges can never be in flight
//! on one driver. Callers sharing a driver must wrap it in a mutex.

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::config::DriverConfig;
use crate::models::options::ChartRequestOptions;
use crate::protocol::command::{Command, Verb};
use crate::protocol::encoder::encode_chart_request;
use crate::protocol::response::{Response, NO_RESPONSE};
use crate::transport::process::spawn_renderer;
use crate::transport::stream::{connect_tcp, open_stream};
use crate::transport::{LineWait, TransportKind, TransportSession};
use crate::{AppError, Result};

/// Where the driver is in the exchange cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    /// No command awaiting a response.
    Idle,
    /// A command was written and its response is awaited.
    ///
    /// Seen outside an exchange only if the caller dropped an exchange
    /// future mid-wait.
    AwaitingResponse,
    /// `close` was called; the session is gone.
    Closed,
}

/// Client for one resident renderer instance.
#[derive(Debug)]
pub struct RendererDriver {
    session: TransportSession,
    response_timeout: Duration,
    state: ExchangeState,
}

impl RendererDriver {
    /// Start a driver as configured: TCP when `config.port` is set, otherwise
    /// a locally spawned renderer.
    ///
    /// # Errors
    ///
    /// - `AppError::Config`: invalid configuration.
    /// - `AppError::Transport`: renderer not found, spawn or connect failure.
    /// - `AppError::Protocol`: greeting or idle-timeout exchange failed.
    pub async fn launch(config: &DriverConfig) -> Result<Self> {
        match config.port {
            Some(port) => Self::connect(port, config).await,
            None => Self::spawn_local(config).await,
        }
    }

    /// Spawn a local renderer and start a driver on its pipes.
    ///
    /// # Errors
    ///
    /// See [`launch`](Self::launch).
    pub async fn spawn_local(config: &DriverConfig) -> Result<Self> {
        config.validate()?;
        let session = spawn_renderer(&config.spawn_config())?;
        Self::from_session(session, config).await
    }

    /// Connect to a renderer server on `localhost:port`.
    ///
    /// # Errors
    ///
    /// See [`launch`](Self::launch).
    pub async fn connect(port: u16, config: &DriverConfig) -> Result<Self> {
        config.validate()?;
        let session = connect_tcp(port).await?;
        Self::from_session(session, config).await
    }

    /// Start a driver over an already-open bidirectional stream.
    ///
    /// # Errors
    ///
    /// See [`launch`](Self::launch).
    pub async fn from_stream<S>(stream: S, config: &DriverConfig) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        config.validate()?;
        Self::from_session(open_stream(stream, TransportKind::Stream), config).await
    }

    /// Start a driver over an assembled session.
    ///
    /// Consumes the renderer's greeting when `config.expect_greeting` is set
    /// and sends `config.server_idle_timeout_seconds` when present. The
    /// session is closed again if either step fails.
    ///
    /// # Errors
    ///
    /// `AppError::Config` for an unusable response timeout, otherwise
    /// `AppError::Protocol` or `AppError::Transport` from the startup
    /// exchanges.
    pub async fn from_session(
        mut session: TransportSession,
        config: &DriverConfig,
    ) -> Result<Self> {
        let response_timeout = match config.response_timeout() {
            Ok(timeout) => timeout,
            Err(err) => {
                if let Err(close_err) = session.close().await {
                    debug!(error = %close_err, "ignoring error while abandoning renderer session");
                }
                return Err(err);
            }
        };
        let mut driver = Self {
            session,
            response_timeout,
            state: ExchangeState::Idle,
        };

        if let Err(err) = driver.startup(config).await {
            driver.abandon().await;
            return Err(err);
        }

        info!(kind = %driver.session.kind(), "renderer driver ready");
        Ok(driver)
    }

    async fn startup(&mut self, config: &DriverConfig) -> Result<()> {
        if config.expect_greeting {
            self.await_response("greeting").await?;
        }
        if let Some(seconds) = config.server_idle_timeout_seconds {
            self.set_server_timeout(seconds).await?;
        }
        Ok(())
    }

    /// Generate one chart.
    ///
    /// The full command sequence is encoded before anything is written, so
    /// an option error leaves the renderer untouched. With `clear_first`,
    /// the renderer's accumulated options are reset before `options` are
    /// applied; without it, `options` are layered over whatever earlier calls
    /// left behind.
    ///
    /// # Errors
    ///
    /// - `AppError::Config`: unknown option, bad value, unsupported chart
    ///   type. Nothing was sent.
    /// - `AppError::Protocol`: the renderer rejected a command or did not
    ///   answer. Commands already acknowledged stay applied.
    /// - `AppError::Transport`: the driver is closed or the connection
    ///   failed.
    pub async fn generate_chart(
        &mut self,
        clear_first: bool,
        options: &ChartRequestOptions,
    ) -> Result<()> {
        self.ensure_open()?;
        let commands = encode_chart_request(clear_first, options)?;

        for command in &commands {
            self.send_command(command, command.verb().expects_response()).await?;
        }

        info!(commands = commands.len(), clear_first, "chart generated");
        Ok(())
    }

    /// Ask the renderer to exit after `seconds` without input.
    ///
    /// The driver does not watch this interval; use
    /// [`disconnected`](Self::disconnected) to observe the renderer leaving.
    ///
    /// # Errors
    ///
    /// As for any single exchange.
    pub async fn set_server_timeout(&mut self, seconds: u32) -> Result<()> {
        let command = Command::with_arg(Verb::Timeout, seconds.to_string())?;
        self.send_command(&command, Verb::Timeout.expects_response()).await
    }

    /// Send `quit` without waiting for an answer and close the transport.
    ///
    /// When the renderer has already gone away, `quit` is skipped and
    /// failures while shutting the dead transport are only logged. Closing
    /// an already-closed driver returns `Ok(())`.
    ///
    /// # Errors
    ///
    /// `AppError::Transport` if `quit` could not be written or the write
    /// side of a live transport could not be shut down.
    pub async fn close(&mut self) -> Result<()> {
        if self.state == ExchangeState::Closed {
            return Ok(());
        }

        let already_gone = self.session.is_disconnected();
        let quit = if already_gone {
            debug!("renderer already disconnected, skipping quit");
            Ok(())
        } else {
            self.send_command(&Command::new(Verb::Quit), Verb::Quit.expects_response())
                .await
        };

        self.state = ExchangeState::Closed;
        let closed = self.session.close().await;

        match (quit, closed) {
            (Ok(()), Ok(())) => {}
            (Ok(()), Err(secondary)) if already_gone => {
                debug!(error = %secondary, "ignoring error while closing disconnected transport");
            }
            (Ok(()), Err(err)) => return Err(err),
            (Err(err), closed) => {
                if let Err(secondary) = closed {
                    debug!(error = %secondary, "ignoring error while closing broken transport");
                }
                return Err(err);
            }
        }

        info!(kind = %self.session.kind(), "renderer driver closed");
        Ok(())
    }

    /// Send one command and, when `expect_response` is set, wait for its
    /// response.
    ///
    /// [`Verb::expects_response`] gives the right flag for every verb; only
    /// `quit` goes unanswered.
    ///
    /// # Errors
    ///
    /// See the outcome table in the module documentation.
    pub async fn send_command(&mut self, command: &Command, expect_response: bool) -> Result<()> {
        self.ensure_open()?;

        if self.state == ExchangeState::AwaitingResponse {
            warn!("previous exchange was abandoned before its response arrived");
            self.state = ExchangeState::Idle;
        }
        for line in self.session.drain_queued() {
            warn!(line = line.as_str(), "discarding unsolicited renderer line");
        }

        let line = command.to_line();
        debug!(command = line.as_str(), "sending command");
        self.session.write_line(&line).await?;

        if !expect_response {
            return Ok(());
        }
        self.await_response(command.verb().as_str()).await
    }

    async fn await_response(&mut self, verb: &str) -> Result<()> {
        self.state = ExchangeState::AwaitingResponse;
        let outcome = self.session.next_line(self.response_timeout).await;
        self.state = ExchangeState::Idle;

        match outcome {
            LineWait::Line(line) => match Response::classify(&line) {
                Response::Success { detail } => {
                    debug!(verb, detail = detail.as_str(), "command acknowledged");
                    Ok(())
                }
                failure @ Response::Failure(_) => {
                    warn!(verb, response = line.as_str(), "renderer rejected command");
                    failure.into_result().map(|_| ())
                }
            },
            LineWait::TimedOut => {
                warn!(verb, timeout = ?self.response_timeout, "no response from renderer");
                Err(AppError::Protocol(NO_RESPONSE.into()))
            }
            LineWait::Closed => {
                warn!(verb, "renderer output closed while awaiting response");
                Err(AppError::Transport("renderer closed its output stream".into()))
            }
        }
    }

    /// Close the session after a failed startup, ignoring every error.
    async fn abandon(&mut self) {
        self.state = ExchangeState::Closed;
        if let Err(err) = self.session.close().await {
            debug!(error = %err, "ignoring error while abandoning renderer session");
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == ExchangeState::Closed {
            Err(AppError::Transport("driver is closed".into()))
        } else {
            Ok(())
        }
    }

    /// Current exchange state.
    #[must_use]
    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Per-exchange response timeout.
    #[must_use]
    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    /// Kind of transport in use.
    #[must_use]
    pub fn transport_kind(&self) -> TransportKind {
        self.session.kind()
    }

    /// Whether the renderer's primary output has ended.
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.session.is_disconnected()
    }

    /// Resolves once the renderer's primary output has ended, for example
    /// after its idle timeout fired.
    pub fn disconnected(&self) -> impl Future<Output = ()> + Send + 'static {
        self.session.disconnected()
    }
}
