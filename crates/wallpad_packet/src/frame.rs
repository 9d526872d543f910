//! Frame delimiting and integrity checks.
//!
//! ```text
//! [STX 0xf7] [LEN] [payload...] [XOR] [ETX 0xee]
//! ```
//!
//! `LEN` counts every byte from STX to ETX inclusive, and `XOR` is the xor of
//! every byte before it.

use crate::error::DecodeError;
use crate::error::FrameError;

pub const STX: u8 = 0xf7;
pub const ETX: u8 = 0xee;

/// STX, LEN, XOR and ETX.
const OVERHEAD: usize = 4;

/// Header byte, device, command, value type, room/channel and two data bytes.
pub const MIN_PAYLOAD_LEN: usize = 7;
pub const MIN_FRAME_LEN: usize = MIN_PAYLOAD_LEN + OVERHEAD;
pub const MAX_FRAME_LEN: usize = 32;

pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Surround a payload with the frame envelope.
pub fn wrap(payload: &[u8]) -> Vec<u8> {
    let len = payload.len() + OVERHEAD;
    debug_assert!(len <= MAX_FRAME_LEN, "payload too long for one frame");

    let mut frame = Vec::with_capacity(len);
    frame.push(STX);
    frame.push(len as u8);
    frame.extend_from_slice(payload);
    frame.push(checksum(&frame));
    frame.push(ETX);
    frame
}

/// Validate the envelope of one complete frame and return its payload.
pub fn unwrap(frame: &[u8]) -> Result<&[u8], DecodeError> {
    let len = frame.len();
    if len < MIN_FRAME_LEN {
        return Err(DecodeError::TooShort { len });
    }
    if frame[0] != STX {
        return Err(DecodeError::BadStart(frame[0]));
    }
    if frame[1] as usize != len {
        return Err(DecodeError::LengthMismatch {
            declared: frame[1] as usize,
            actual: len,
        });
    }
    if frame[len - 1] != ETX {
        return Err(DecodeError::BadEnd(frame[len - 1]));
    }

    let expected = checksum(&frame[..len - 2]);
    let actual = frame[len - 2];
    if expected != actual {
        return Err(DecodeError::Checksum { expected, actual });
    }

    Ok(&frame[2..len - 2])
}

/// Splits a raw bus byte stream into candidate frames.
///
/// A candidate is only yielded once its whole envelope checks out, checksum
/// included; payload contents are left to [`crate::decode`]. Otherwise a
/// single byte is dropped and scanning resumes, so a corrupt run (even one
/// whose length byte reaches into the next frame) never swallows the valid
/// frame that follows it.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the transport.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of bytes waiting for the rest of a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Pull the next candidate frame.
    ///
    /// Returns `None` once more input is needed. Callers should keep calling
    /// until then; errors only report what was dropped.
    pub fn next_frame(&mut self) -> Option<Result<Vec<u8>, FrameError>> {
        if self.buf.is_empty() {
            return None;
        }

        if self.buf[0] != STX {
            let count = self
                .buf
                .iter()
                .position(|&b| b == STX)
                .unwrap_or(self.buf.len());
            self.buf.drain(..count);
            return Some(Err(FrameError::Discarded { count }));
        }

        let declared = *self.buf.get(1)? as usize;
        if !(MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&declared) {
            self.buf.drain(..1);
            return Some(Err(FrameError::InvalidLength { declared }));
        }

        if self.buf.len() < declared {
            return None;
        }

        if let Err(e) = unwrap(&self.buf[..declared]) {
            self.buf.drain(..1);
            return Some(Err(FrameError::Corrupt(e)));
        }

        Some(Ok(self.buf.drain(..declared).collect()))
    }
}
