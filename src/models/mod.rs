//! Domain models for chart requests.

pub mod options;
