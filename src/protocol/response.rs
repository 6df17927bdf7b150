//! Classification of renderer response lines.

use crate::{AppError, Result};

/// Sentinel message for an exchange that saw no response within the timeout.
pub const NO_RESPONSE: &str = "No response received";

/// A classified response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Line began with `OK`; holds whatever followed the token.
    Success {
        /// Text after `OK`, trimmed. Usually empty.
        detail: String,
    },
    /// Any other line; holds it verbatim.
    Failure(String),
}

impl Response {
    /// Classify one response line.
    #[must_use]
    pub fn classify(line: &str) -> Self {
        match line.strip_prefix("OK") {
            Some(rest) => Self::Success {
                detail: rest.trim().to_owned(),
            },
            None => Self::Failure(line.to_owned()),
        }
    }

    /// Convert into the exchange outcome.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Protocol` carrying the failure line verbatim.
    pub fn into_result(self) -> Result<String> {
        match self {
            Self::Success { detail } => Ok(detail),
            Self::Failure(line) => Err(AppError::Protocol(line)),
        }
    }
}
