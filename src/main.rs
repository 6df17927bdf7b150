#![forbid(unsafe_code)]

//! `clichart-batch`: generate a batch of charts through one resident
//! renderer.
//!
//! Reads a TOML batch file, starts (or connects to) a single renderer, sends
//! every chart in order, and shuts the renderer down again.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::{error, info, info_span, warn, Instrument};
use tracing_subscriber::{fmt, EnvFilter};

use clichart_driver::{AppError, BatchConfig, RendererDriver, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "clichart-batch", about = "Generate charts through a resident clichart renderer", version, long_about = None)]
struct Cli {
    /// Path to the TOML batch file.
    #[arg(long)]
    config: PathBuf,

    /// Connect to a renderer server on this localhost port instead of
    /// spawning one.
    #[arg(long)]
    port: Option<u16>,

    /// Ask the renderer to exit after this many idle seconds.
    #[arg(long)]
    server_timeout: Option<u32>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let mut batch = BatchConfig::load_from_path(&args.config)?;
    if args.port.is_some() {
        batch.driver.port = args.port;
    }
    if args.server_timeout.is_some() {
        batch.driver.server_idle_timeout_seconds = args.server_timeout;
    }
    info!(charts = batch.charts.len(), config = %args.config.display(), "batch loaded");

    let mut driver = RendererDriver::launch(&batch.driver).await?;

    let outcome = tokio::select! {
        result = run_charts(&mut driver, &batch) => result,
        () = shutdown_signal() => {
            warn!("shutdown signal received, abandoning remaining charts");
            Err(AppError::Transport("interrupted".into()))
        }
    };

    if let Err(err) = driver.close().await {
        error!(%err, "failed to close renderer");
        if outcome.is_ok() {
            return Err(err);
        }
    }

    match &outcome {
        Ok(()) => info!("batch complete"),
        Err(err) => error!(%err, "batch failed"),
    }
    outcome
}

async fn run_charts(driver: &mut RendererDriver, batch: &BatchConfig) -> Result<()> {
    for (index, chart) in batch.charts.iter().enumerate() {
        let options = chart.request_options()?;
        driver
            .generate_chart(chart.clear_first, &options)
            .instrument(info_span!("chart", index))
            .await
            .map_err(|err| {
                error!(index, %err, "chart failed");
                err
            })?;
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter).with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
