//! Error types for the raster protocol engine.
//!
//! The taxonomy separates problems that are detected before any byte is
//! transmitted (`ConfigError`), violations of the command ordering contract
//! (`ProtocolError`), I/O level failures (`TransportError`), malformed
//! status telegrams (`DecodeError`) and faults reported by the printer
//! itself (`Error::DeviceFault`). A malformed telegram is a framing bug on
//! the wire; a device fault is a hardware condition. The two must never be
//! conflated.

use thiserror::Error;

use crate::command::State;
use crate::media::MediaCode;
use crate::status::FaultFlags;

/// Top level error type returned by the job orchestrator.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The printer reported a hardware fault in its status telegram.
    ///
    /// These are never retried automatically; the flags tell the caller
    /// which condition needs user intervention.
    #[error("device fault: {0}")]
    DeviceFault(FaultFlags),

    /// The job was cancelled via its abort flag between two frames.
    #[error("job cancelled")]
    Cancelled,
}

/// Problems with the job parameters, detected before transmission.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown printer model '{0}'")]
    UnknownModel(String),

    #[error("unknown label '{0}'")]
    UnknownLabel(String),

    #[error("label '{label}' does not fit the print head of {model}")]
    UnsupportedMedia {
        model: &'static str,
        label: &'static str,
    },

    #[error("image is {width} dots wide but the label prints at most {printable} dots")]
    ImageTooWide { width: u32, printable: u32 },

    #[error("die-cut label expects {expected} raster lines, image has {rows}")]
    ImageLengthMismatch { rows: u32, expected: u32 },

    #[error("label length of {rows} lines is outside the printable range {min}..={max}")]
    LengthOutOfRange { rows: u32, min: u32, max: u32 },

    #[error("bitmap data is {actual} bytes, expected {expected}")]
    BitmapSizeMismatch { expected: usize, actual: usize },

    #[error("black and red planes have different dimensions")]
    PlaneMismatch,

    #[error("model {0} does not support two-color printing")]
    TwoColorUnsupported(&'static str),

    #[error("feed of {feed} dots is outside the supported range {min}..={max}")]
    FeedOutOfRange { feed: u16, min: u16, max: u16 },

    #[error("cut interval must be at least one label")]
    InvalidCutInterval,

    #[error("job contains no pages")]
    EmptyJob,
}

/// Violations of the command stream ordering contract.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid state: expected {expected:?}, builder is {actual:?}")]
    InvalidState { expected: State, actual: State },

    #[error("no media profile configured before raster data")]
    MediaNotConfigured,

    #[error("operation '{0}' is not supported by the bound model")]
    UnsupportedOperation(&'static str),

    #[error("media mismatch: job expects {expected}, printer reports {reported}")]
    MediaMismatch {
        expected: MediaCode,
        reported: MediaCode,
    },

    #[error("raster line is {len} bytes, profile requires {expected}")]
    BadRowLength { len: usize, expected: usize },
}

/// I/O failures on the byte channel to the device.
///
/// `is_transient` splits the variants into those worth a bounded retry
/// (timeout, device busy) and those that must surface immediately.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("operation timed out")]
    Timeout,

    #[error("device busy")]
    Busy,

    #[error("device disconnected")]
    Disconnected,

    #[error("access denied, permission issue ?")]
    AccessDenied,

    #[error("device is missing a bulk endpoint")]
    MissingEndpoint,

    #[error("no device matched the requested id/serial")]
    DeviceNotFound,

    #[error("short write: wrote {wrote} of {expected} bytes")]
    ShortWrite { wrote: usize, expected: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Usb(rusb::Error),
}

impl TransportError {
    /// `true` for failures that a bounded retry with backoff may recover.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Busy)
    }
}

impl From<rusb::Error> for TransportError {
    fn from(err: rusb::Error) -> Self {
        match err {
            rusb::Error::Timeout => Self::Timeout,
            rusb::Error::Busy => Self::Busy,
            rusb::Error::NoDevice | rusb::Error::Pipe => Self::Disconnected,
            rusb::Error::Access => Self::AccessDenied,
            other => Self::Usb(other),
        }
    }
}

/// A status telegram that could not be parsed.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("status telegram is {0} bytes, expected exactly 32")]
    ShortRead(usize),

    #[error("status telegram header is {0:02X?}, expected [80, 20, 42]")]
    BadHeader([u8; 3]),
}

/// A compressed raster line that does not decode cleanly.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("corrupt stream: control byte runs past the end of input")]
    Truncated,

    #[error("corrupt stream: decompressed to {actual} bytes, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },
}
