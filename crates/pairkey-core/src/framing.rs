//! End-marker framing for byte links that delimit messages with `00 00`
//!
//! Some serial-style pairing links mark the end of a message with two zero
//! bytes. Envelopes are arbitrary binary, so they are byte-stuffed before
//! sending:
//!
//! - encode: insert `01` before any `00` or `01` that follows a `00`, then
//!   append `00 00`
//! - decode: require the trailing `00 00`, drop every `01` that follows a
//!   `00` in the framed body
//!
//! This is a codec over complete buffers, not a transport.

use thiserror::Error;

/// End-of-message marker
pub const END_MARKER: [u8; 2] = [0x00, 0x00];

const ESCAPE: u8 = 0x01;

/// Errors from [`decode`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    #[error("no end-of-message marker found")]
    MissingEndMarker,
}

/// Stuff `payload` and append the end marker.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + payload.len() / 8 + END_MARKER.len());
    let mut prev_zero = false;
    for &byte in payload {
        if prev_zero && (byte == 0x00 || byte == ESCAPE) {
            out.push(ESCAPE);
        }
        out.push(byte);
        prev_zero = byte == 0x00;
    }
    out.extend_from_slice(&END_MARKER);
    out
}

/// Strip the end marker and undo the stuffing.
pub fn decode(framed: &[u8]) -> Result<Vec<u8>, FramingError> {
    let body = framed
        .strip_suffix(&END_MARKER)
        .ok_or(FramingError::MissingEndMarker)?;

    let mut out = Vec::with_capacity(body.len());
    for (i, &byte) in body.iter().enumerate() {
        if i > 0 && body[i - 1] == 0x00 && byte == ESCAPE {
            continue;
        }
        out.push(byte);
    }
    Ok(out)
}
