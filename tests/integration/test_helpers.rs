//! Shared helpers for driver integration tests.
//!
//! Provides an in-process fake renderer that speaks the CLI server protocol
//! over any byte stream, so tests can exercise the real driver, codec, and
//! transports without a JVM.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use clichart_driver::protocol::command::{Command, Verb};
use clichart_driver::Result;
use clichart_driver::{DriverConfig, RendererDriver};

/// How the fake renderer misbehaves, if at all.
#[derive(Debug, Clone)]
pub struct Behaviour {
    /// Send the initial `OK` greeting.
    pub greet: bool,
    /// Answer this verb with the given line instead of `OK`.
    pub reject: Option<(Verb, String)>,
    /// Never answer this verb.
    pub silent: Option<Verb>,
    /// Answer this verb with the given line, but only after the delay.
    pub late: Option<(Verb, Duration, String)>,
}

impl Default for Behaviour {
    fn default() -> Self {
        Self {
            greet: true,
            reject: None,
            silent: None,
            late: None,
        }
    }
}

/// Everything the fake renderer observed.
#[derive(Debug, Default)]
pub struct RendererLog {
    /// Every line received, in order, verbatim.
    pub lines: Vec<String>,
    /// Accumulated option commands at each successful `go`.
    pub charts: Vec<Vec<String>>,
    /// Idle timeout requested through `timeout`.
    pub idle_timeout: Option<Duration>,
    /// `quit` was received.
    pub quit: bool,
    /// The renderer left because its idle timeout fired.
    pub idled_out: bool,
}

/// Shared handle on a fake renderer's log.
pub type SharedLog = Arc<Mutex<RendererLog>>;

/// Run a fake renderer on `stream` until `quit`, EOF, or idle timeout.
pub fn spawn_fake_renderer<S>(stream: S, behaviour: Behaviour) -> (SharedLog, JoinHandle<()>)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let log = SharedLog::default();
    let handle = tokio::spawn(run_fake_renderer(stream, behaviour, Arc::clone(&log)));
    (log, handle)
}

async fn run_fake_renderer<S>(stream: S, behaviour: Behaviour, log: SharedLog)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut lines = BufReader::new(read_half).lines();
    let mut accumulated: Vec<(Verb, String)> = Vec::new();

    if behaviour.greet && write_half.write_all(b"OK\n").await.is_err() {
        return;
    }

    loop {
        let idle = log.lock().await.idle_timeout;
        let next = match idle {
            Some(idle) => match tokio::time::timeout(idle, lines.next_line()).await {
                Ok(next) => next,
                Err(_elapsed) => {
                    log.lock().await.idled_out = true;
                    return;
                }
            },
            None => lines.next_line().await,
        };
        let Ok(Some(line)) = next else {
            return;
        };

        log.lock().await.lines.push(line.clone());

        let response = match parse_line(&line) {
            Err(err) => Some(err.message().to_owned()),
            Ok(command) => {
                let verb = command.verb();
                if verb == Verb::Quit {
                    log.lock().await.quit = true;
                    return;
                }
                if behaviour.silent == Some(verb) {
                    None
                } else if let Some((_, delay, message)) =
                    behaviour.late.as_ref().filter(|(late, _, _)| *late == verb)
                {
                    tokio::time::sleep(*delay).await;
                    Some(message.clone())
                } else if let Some((_, message)) =
                    behaviour.reject.as_ref().filter(|(rejected, _)| *rejected == verb)
                {
                    Some(message.clone())
                } else {
                    Some(apply(&command, &mut accumulated, &log).await)
                }
            }
        };

        if let Some(response) = response {
            let framed = format!("{response}\n");
            if write_half.write_all(framed.as_bytes()).await.is_err() {
                return;
            }
        }
    }
}

/// Split a received line the way the renderer does: verb, first run of
/// whitespace, argument.
fn parse_line(line: &str) -> Result<Command> {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some((verb, arg)) => Command::with_arg(verb.parse()?, arg.trim_start()),
        None => Ok(Command::new(line.parse()?)),
    }
}

async fn apply(command: &Command, accumulated: &mut Vec<(Verb, String)>, log: &SharedLog) -> String {
    match command.verb() {
        Verb::Clear => accumulated.clear(),
        Verb::Go => {
            let has = |verb| accumulated.iter().any(|(v, _)| *v == verb);
            if !has(Verb::InputPath) || !has(Verb::OutputPath) {
                return "Invalid argument: input and output paths are required".into();
            }
            let snapshot = accumulated.iter().map(|(_, line)| line.clone()).collect();
            log.lock().await.charts.push(snapshot);
        }
        Verb::Timeout => {
            let Some(seconds) = command.arg().and_then(|arg| arg.parse::<u64>().ok()) else {
                return "Invalid argument: Command requires an argument".into();
            };
            log.lock().await.idle_timeout = Some(Duration::from_secs(seconds));
        }
        verb => {
            let line = command.to_line();
            match accumulated.iter_mut().find(|(v, _)| *v == verb) {
                Some(entry) => entry.1 = line,
                None => accumulated.push((verb, line)),
            }
        }
    }
    "OK".into()
}

/// Driver config with a short response timeout suited to tests.
pub fn test_config(response_timeout_seconds: f64) -> DriverConfig {
    DriverConfig {
        response_timeout_seconds,
        ..DriverConfig::default()
    }
}

/// Connect a driver to a fresh fake renderer over an in-memory duplex pipe.
pub async fn driver_with_fake(
    behaviour: Behaviour,
    config: &DriverConfig,
) -> (RendererDriver, SharedLog, JoinHandle<()>) {
    let (driver_side, renderer_side) = tokio::io::duplex(64 * 1024);
    let (log, handle) = spawn_fake_renderer(renderer_side, behaviour);
    let driver = RendererDriver::from_stream(driver_side, config)
        .await
        .expect("driver must start against the fake renderer");
    (driver, log, handle)
}
