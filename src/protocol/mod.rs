//! clichart CLI server protocol.
//!
//! One command per line, `<verb>[ <argument>]`, answered by one response
//! line that starts with `OK` on success and carries an error message
//! otherwise. `quit` is never answered.
//!
//! Submodules:
//! - `codec`: [`LinesCodec`](tokio_util::codec::LinesCodec)-based framing for both directions.
//! - `command`: the closed verb vocabulary and command line encoding.
//! - `encoder`: chart request options → ordered command sequence.
//! - `response`: `OK` / failure classification of response lines.

pub mod codec;
pub mod command;
pub mod encoder;
pub mod response;
