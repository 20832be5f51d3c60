//! Statistics for a round-trip run

use std::time::Duration;

/// Counters collected over one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundTripStats {
    /// Complete trace records read
    pub records_read: u64,
    /// Records classified as RTCP and dropped
    pub rtcp_dropped: u64,
    /// Records forwarded to the decoder
    pub rtp_forwarded: u64,
    /// Forwarded records the decoder rejected as malformed
    pub rtp_malformed: u64,
    /// Access units delivered by the decoder
    pub units_decoded: u64,
    /// Container frames written to the elementary stream
    pub frames_written: u64,
    /// Bytes written to the elementary stream
    pub frame_bytes: u64,
    /// RTP packets written to the regenerated trace
    pub packets_encoded: u64,
    /// RTP bytes written, excluding record prefixes
    pub packet_bytes: u64,
    /// Elementary packets relayed by the demultiplexer bridge
    pub demuxed_packets: u64,
    /// Wall time of the run
    pub duration: Duration,
}

impl RoundTripStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of records that were RTCP
    pub fn rtcp_ratio(&self) -> f64 {
        if self.records_read > 0 {
            self.rtcp_dropped as f64 / self.records_read as f64
        } else {
            0.0
        }
    }

    /// Average synthesized frame size in bytes
    pub fn average_frame_size(&self) -> u64 {
        if self.frames_written > 0 {
            self.frame_bytes / self.frames_written
        } else {
            0
        }
    }
}
