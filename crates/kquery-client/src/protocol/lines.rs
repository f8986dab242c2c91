//! Line framing of a chunked response body

use bytes::BytesMut;
use tokio_util::codec::{Decoder, LinesCodec};

use crate::error::{ClientError, Result};

/// Accumulates body chunks and hands out complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: BytesMut,
    codec: LinesCodec,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Next complete line without its terminator, or `None` until more data
    /// arrives.
    pub fn next_line(&mut self) -> Option<Result<String>> {
        self.codec.decode(&mut self.buffer).map_err(line_error).transpose()
    }

    /// Whatever is left once the body has ended.
    pub fn finish(&mut self) -> Option<Result<String>> {
        self.codec
            .decode_eof(&mut self.buffer)
            .map_err(line_error)
            .transpose()
    }
}

fn line_error(err: tokio_util::codec::LinesCodecError) -> ClientError {
    ClientError::protocol(format!("invalid response line: {}", err))
}

/// Strip the JSON array framing `/query` wraps its frames in.
///
/// The response is `[{header},\n{row},\n…{final}]`, one frame per line.
pub fn strip_array_framing(line: &str) -> &str {
    let mut line = line.trim();
    if let Some(rest) = line.strip_prefix('[') {
        line = rest.trim_start();
    }
    if let Some(rest) = line.strip_suffix(',') {
        line = rest.trim_end();
    }
    if let Some(rest) = line.strip_suffix(']') {
        line = rest.trim_end();
    }
    line
}
