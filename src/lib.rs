#![forbid(unsafe_code)]

//! Client driver for the clichart renderer's CLI server mode.
//!
//! A single renderer instance is kept resident (spawned locally or reached
//! over TCP) and driven through its line-oriented command/response protocol,
//! one exchange at a time.

pub mod config;
pub mod driver;
pub mod errors;
pub mod models;
pub mod protocol;
pub mod transport;

pub use config::{BatchConfig, ChartJob, DriverConfig};
pub use driver::{ExchangeState, RendererDriver};
pub use errors::{AppError, Result};
pub use models::options::{ChartRequestOptions, ChartType, ColourOverride, OptionName, OptionValue};
