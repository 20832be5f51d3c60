//! Round-trip configuration

use std::path::PathBuf;

use crate::arena::DEFAULT_ARENA_CAPACITY;
use crate::error::{Error, Result};
use crate::media::reframe::DEFAULT_FRAME_CAPACITY;
use crate::media::{AdtsParams, Encoding};
use crate::payload::generic::DEFAULT_MAX_PACKET_SIZE;
use crate::payload::rtp::RTP_FIXED_HEADER_LEN;
use crate::trace::DEFAULT_MAX_RECORD_SIZE;

/// Round-trip run options
#[derive(Debug, Clone)]
pub struct RoundTripConfig {
    /// RTP payload type of the stream
    pub payload_type: u8,

    /// Encoding of the stream
    pub encoding: Encoding,

    /// First sequence number of the regenerated stream
    pub initial_sequence: u16,

    /// SSRC of the regenerated stream
    pub ssrc: u32,

    /// Captured trace to replay
    pub input: PathBuf,

    /// Regenerated RTP trace
    pub rtp_output: PathBuf,

    /// Regenerated elementary stream
    pub media_output: PathBuf,

    /// Largest RTP packet the encoder emits, header included
    pub max_packet_size: usize,

    /// Trace record buffer size
    pub max_record_size: usize,

    /// Usable packet arena size
    pub arena_capacity: usize,

    /// Synthesis buffer size
    pub frame_capacity: usize,

    /// ADTS parameters for mpeg4-generic
    pub adts: AdtsParams,
}

impl Default for RoundTripConfig {
    fn default() -> Self {
        Self {
            payload_type: 96,
            encoding: Encoding::Other(String::new()),
            initial_sequence: 0,
            ssrc: 0,
            input: PathBuf::new(),
            rtp_output: PathBuf::from("out.rtp"),
            media_output: PathBuf::from("out.media"),
            max_packet_size: DEFAULT_MAX_PACKET_SIZE, // 1456 (live555)
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
            arena_capacity: DEFAULT_ARENA_CAPACITY,
            frame_capacity: DEFAULT_FRAME_CAPACITY,
            adts: AdtsParams::default(),
        }
    }
}

impl RoundTripConfig {
    /// Create a config for a trace with the given payload type and encoding
    pub fn new(input: impl Into<PathBuf>, payload_type: u8, encoding: &str) -> Self {
        Self {
            input: input.into(),
            payload_type,
            encoding: Encoding::from_name(encoding),
            ..Default::default()
        }
    }

    /// Set the initial sequence number and SSRC of the regenerated stream
    pub fn stream(mut self, initial_sequence: u16, ssrc: u32) -> Self {
        self.initial_sequence = initial_sequence;
        self.ssrc = ssrc;
        self
    }

    /// Set the output paths
    pub fn outputs(mut self, rtp: impl Into<PathBuf>, media: impl Into<PathBuf>) -> Self {
        self.rtp_output = rtp.into();
        self.media_output = media.into();
        self
    }

    /// Set the largest RTP packet size
    pub fn max_packet_size(mut self, size: usize) -> Self {
        self.max_packet_size = size;
        self
    }

    /// Set the trace record buffer size
    pub fn max_record_size(mut self, size: usize) -> Self {
        self.max_record_size = size;
        self
    }

    /// Set the packet arena size
    pub fn arena_capacity(mut self, capacity: usize) -> Self {
        self.arena_capacity = capacity;
        self
    }

    /// Set the synthesis buffer size
    pub fn frame_capacity(mut self, capacity: usize) -> Self {
        self.frame_capacity = capacity;
        self
    }

    /// Set the ADTS parameters
    pub fn adts(mut self, adts: AdtsParams) -> Self {
        self.adts = adts;
        self
    }

    /// Reject values the framing cannot express
    pub fn validate(&self) -> Result<()> {
        if self.payload_type > 127 {
            return Err(Error::Config(format!(
                "payload type {} does not fit 7 bits",
                self.payload_type
            )));
        }
        if self.max_packet_size <= RTP_FIXED_HEADER_LEN || self.max_packet_size > u16::MAX as usize {
            return Err(Error::Config(format!(
                "packet size {} outside {}..={}",
                self.max_packet_size,
                RTP_FIXED_HEADER_LEN + 1,
                u16::MAX
            )));
        }
        if self.max_packet_size > self.arena_capacity {
            return Err(Error::Config(format!(
                "packet size {} exceeds arena capacity {}",
                self.max_packet_size, self.arena_capacity
            )));
        }
        if self.max_record_size == 0 {
            return Err(Error::Config("record size must be non-zero".into()));
        }
        Ok(())
    }
}
