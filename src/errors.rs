//! Error types shared across the driver.

use std::fmt::{Display, Formatter};

/// Shared driver result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Driver error enumeration covering every failure mode of an exchange.
#[derive(Debug)]
pub enum AppError {
    /// Unrecognized option, failed value coercion, or invalid configuration.
    ///
    /// Always raised before anything is written to the renderer.
    Config(String),
    /// The renderer answered with a non-`OK` line, or did not answer in time.
    Protocol(String),
    /// The renderer could not be found, spawned, reached, or written to.
    Transport(String),
    /// File-system or I/O operation failure outside the protocol path.
    Io(String),
}

impl AppError {
    /// The bare message, without the kind prefix used by `Display`.
    ///
    /// For [`AppError::Protocol`] raised by a server-reported failure this is
    /// the renderer's response line verbatim.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Config(msg) | Self::Protocol(msg) | Self::Transport(msg) | Self::Io(msg) => msg,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::Transport(msg) => write!(f, "transport: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}
