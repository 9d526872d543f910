use crate::DeviceKind;

/// A frame that could not be turned into a [`crate::Packet`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Frame too short: {len} bytes")]
    TooShort { len: usize },

    #[error("Frame does not start with 0xf7 (got {0:#04x})")]
    BadStart(u8),

    #[error("Declared length {declared} does not match frame length {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("Frame does not end with 0xee (got {0:#04x})")]
    BadEnd(u8),

    #[error("Checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    Checksum { expected: u8, actual: u8 },

    #[error("Unexpected payload header {0:#04x}")]
    BadHeader(u8),

    #[error("Unknown device {0:#04x}")]
    UnknownDevice(u8),

    #[error("Unknown command {0:#04x}")]
    UnknownCommand(u8),

    #[error("Unexpected value type {value_type:#04x} for device {device:#04x}")]
    UnexpectedValueType { device: u8, value_type: u8 },

    #[error("{kind} payload needs {expected} data bytes, got {actual}")]
    MissingData {
        kind: DeviceKind,
        expected: usize,
        actual: usize,
    },

    #[error("{kind} payload takes at most {expected} data bytes, got {actual}")]
    ExtraData {
        kind: DeviceKind,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid {field} value {value:#04x}")]
    InvalidValue { field: &'static str, value: u8 },
}

/// Bytes dropped by [`crate::FrameDecoder`] while re-synchronising on a stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("Discarded {count} bytes before frame start")]
    Discarded { count: usize },

    #[error("Discarded frame start with invalid length {declared}")]
    InvalidLength { declared: usize },

    #[error("Discarded frame start: {0}")]
    Corrupt(DecodeError),
}

/// A requested state change the device cannot accept.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChangeError {
    #[error("{field} {value} out of range {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: u8,
        min: u8,
        max: u8,
    },
}

pub type Result<T> = std::result::Result<T, DecodeError>;
