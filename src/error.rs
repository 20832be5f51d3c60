//! Error types
//!
//! A malformed or truncated trace is not an error: the reader reports it as
//! the end of the trace. Everything here is a contract violation that
//! aborts the run.

use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("arena: {0}")]
    Arena(#[from] ArenaError),

    #[error("rtp: {0}")]
    Rtp(#[from] RtpError),

    #[error("media: {0}")]
    Media(#[from] MediaError),

    #[error("demux: {0}")]
    Demux(#[from] DemuxError),

    #[error("configuration error: {0}")]
    Config(String),

    /// A decoded unit carried status flags no framing policy exists for
    #[error("decoded unit for {encoding} carried unexpected flags 0x{flags:x}")]
    UnexpectedFlags { encoding: String, flags: u32 },
}

/// Packet arena contract violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArenaError {
    #[error("request of {requested} bytes exceeds arena capacity of {capacity} bytes")]
    Oversize { requested: usize, capacity: usize },

    #[error("arena buffer is already checked out")]
    Busy,

    #[error("prefix of {requested} bytes exceeds the {reserved} reserved bytes")]
    PrefixTooLong { requested: usize, reserved: usize },
}

/// RTP header errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RtpError {
    #[error("packet too short: {0} bytes")]
    TooShort(usize),

    #[error("unsupported RTP version {0}")]
    BadVersion(u8),

    #[error("CSRC list or header extension runs past the packet end")]
    HeaderOverrun,

    #[error("invalid padding length {0}")]
    BadPadding(u8),
}

/// Elementary-stream framing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("frame of {size} bytes exceeds the {capacity} byte synthesis buffer")]
    FrameTooLarge { size: usize, capacity: usize },

    #[error("invalid AudioSpecificConfig")]
    InvalidAudioSpecificConfig,
}

/// Program-stream demultiplexer errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DemuxError {
    #[error("truncated {what} at offset {offset}")]
    Truncated { what: &'static str, offset: usize },
}
