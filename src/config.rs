//! Driver and batch configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::models::options::ChartRequestOptions;
use crate::transport::process::SpawnConfig;
use crate::{AppError, Result};

fn default_response_timeout_seconds() -> f64 {
    10.0
}

fn default_renderer_args() -> Vec<String> {
    vec!["--cliserver".into()]
}

fn default_true() -> bool {
    true
}

fn default_close_grace_seconds() -> u64 {
    5
}

/// How to reach the renderer and how long to wait for it.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct DriverConfig {
    /// Upper bound on how long each exchange waits for its response.
    #[serde(default = "default_response_timeout_seconds")]
    pub response_timeout_seconds: f64,
    /// Connect to a renderer server on `localhost:port` instead of spawning
    /// one.
    #[serde(default)]
    pub port: Option<u16>,
    /// Renderer executable; `clichart` on `PATH` when unset.
    #[serde(default)]
    pub renderer_path: Option<PathBuf>,
    /// Arguments that start the renderer in CLI server mode.
    #[serde(default = "default_renderer_args")]
    pub renderer_args: Vec<String>,
    /// Consume the renderer's initial `OK` greeting after connecting.
    #[serde(default = "default_true")]
    pub expect_greeting: bool,
    /// How long `close` waits for a spawned renderer to exit before killing
    /// it.
    #[serde(default = "default_close_grace_seconds")]
    pub close_grace_seconds: u64,
    /// Idle self-shutdown interval sent to the renderer right after
    /// connecting.
    #[serde(default)]
    pub server_idle_timeout_seconds: Option<u32>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            response_timeout_seconds: default_response_timeout_seconds(),
            port: None,
            renderer_path: None,
            renderer_args: default_renderer_args(),
            expect_greeting: true,
            close_grace_seconds: default_close_grace_seconds(),
            server_idle_timeout_seconds: None,
        }
    }
}

impl DriverConfig {
    /// Parse and validate a driver configuration from TOML.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Per-exchange response timeout.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` unless `response_timeout_seconds` is a
    /// positive number small enough for a [`Duration`].
    pub fn response_timeout(&self) -> Result<Duration> {
        match Duration::try_from_secs_f64(self.response_timeout_seconds) {
            Ok(timeout) if !timeout.is_zero() => Ok(timeout),
            _ => Err(AppError::Config(format!(
                "response_timeout_seconds must be a positive number of seconds, got {}",
                self.response_timeout_seconds
            ))),
        }
    }

    /// Grace period for a spawned renderer to exit on close.
    #[must_use]
    pub fn close_grace(&self) -> Duration {
        Duration::from_secs(self.close_grace_seconds)
    }

    /// Spawn settings for the local-process transport.
    #[must_use]
    pub fn spawn_config(&self) -> SpawnConfig {
        SpawnConfig {
            renderer_path: self.renderer_path.clone(),
            renderer_args: self.renderer_args.clone(),
            close_grace: self.close_grace(),
        }
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        self.response_timeout()?;

        if self.port == Some(0) {
            return Err(AppError::Config("port must be greater than zero".into()));
        }

        if self.server_idle_timeout_seconds == Some(0) {
            return Err(AppError::Config(
                "server_idle_timeout_seconds must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

fn default_clear_first() -> bool {
    true
}

/// One chart in a batch file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ChartJob {
    /// Reset the renderer's accumulated options before this chart.
    #[serde(default = "default_clear_first")]
    pub clear_first: bool,
    /// Chart options keyed by option name (`inputPath`, `columnList`, …).
    #[serde(default)]
    pub options: toml::Table,
}

impl ChartJob {
    /// Convert the raw options table into request options.
    ///
    /// Names are not checked here; that happens when the chart is encoded.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for option values of an unsupported type.
    pub fn request_options(&self) -> Result<ChartRequestOptions> {
        ChartRequestOptions::from_toml_table(&self.options)
    }
}

/// A batch file: driver settings plus an ordered list of charts.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct BatchConfig {
    /// Driver settings.
    #[serde(default)]
    pub driver: DriverConfig,
    /// Charts to generate, in order.
    #[serde(default)]
    pub charts: Vec<ChartJob>,
}

impl BatchConfig {
    /// Load and validate a batch file.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the file cannot be read, or
    /// `AppError::Config` if it is invalid.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|err| {
            AppError::Io(format!("failed to read {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate a batch file from TOML.
    ///
    /// Every chart's options are converted eagerly so a malformed value is
    /// reported before the renderer is started.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.driver.validate()?;

        if config.charts.is_empty() {
            return Err(AppError::Config("batch must contain at least one [[charts]] entry".into()));
        }

        for (index, chart) in config.charts.iter().enumerate() {
            chart
                .request_options()?
                .resolve()
                .map_err(|err| AppError::Config(format!("chart {index}: {}", err.message())))?;
        }

        Ok(config)
    }
}
