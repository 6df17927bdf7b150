//! Line codec for renderer streams.
//!
//! Wraps [`tokio_util::codec::LinesCodec`] with a fixed maximum line length so
//! a renderer that never emits a newline cannot make the reader buffer
//! without bound.
//!
//! Explicit framing matters for the socket transport: a TCP read may return
//! half a response or two responses at once, and only the codec turns that
//! into whole lines before they reach the response queue.

use std::io;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use crate::{AppError, Result};

/// Maximum line length accepted from the renderer: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Newline-delimited UTF-8 codec for both directions of a renderer stream.
///
/// Inbound lines longer than [`MAX_LINE_BYTES`] yield
/// [`AppError::Protocol`]`("line too long: …")`; the codec then discards the
/// rest of that line and resumes at the next newline. A line that is not
/// valid UTF-8 is already consumed when it fails, so it also maps to
/// [`AppError::Protocol`]. Other I/O errors map to [`AppError::Transport`].
#[derive(Debug)]
pub struct RendererCodec(LinesCodec);

impl RendererCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self(LinesCodec::new_with_max_length(MAX_LINE_BYTES))
    }
}

impl Default for RendererCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for RendererCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode(src).map_err(map_codec_error)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode_eof(src).map_err(map_codec_error)
    }
}

impl Encoder<String> for RendererCodec {
    type Error = AppError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<()> {
        self.0.encode(item, dst).map_err(map_codec_error)
    }
}

fn map_codec_error(e: LinesCodecError) -> AppError {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            AppError::Protocol(format!("line too long: exceeded {MAX_LINE_BYTES} bytes"))
        }
        LinesCodecError::Io(io_err) if io_err.kind() == io::ErrorKind::InvalidData => {
            AppError::Protocol(format!("invalid UTF-8 line: {io_err}"))
        }
        LinesCodecError::Io(io_err) => AppError::Transport(io_err.to_string()),
    }
}
