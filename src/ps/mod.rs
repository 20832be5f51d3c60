//! MPEG program stream bridging
//!
//! For the `PS` encoding the decoded units are program-stream packs. They
//! are written through unchanged and also fed to a nested demultiplexer so
//! the elementary streams inside can be checked.
//!
//! ```text
//!  DecodedUnit ──► DemuxBridge::input ──► PsDemuxer::input
//!                                              │ zero or more, synchronous
//!                                              ▼
//!                                  DemuxSink::on_packet(ElementaryPacket)
//! ```

pub mod bridge;
pub mod demuxer;

use crate::error::Result;

pub use bridge::DemuxBridge;
pub use demuxer::ProgramStreamDemuxer;

/// Packet starts a random access point
pub const FLAG_KEYFRAME: u32 = 0x0001;

/// One PES payload recovered by the demultiplexer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementaryPacket<'a> {
    /// PES stream id (0xC0-0xDF audio, 0xE0-0xEF video, 0xBD private)
    pub stream_id: u8,
    /// Stream type from the program stream map, 0 if unknown
    pub codec_id: u8,
    pub flags: u32,
    /// Presentation timestamp, 90kHz
    pub pts: i64,
    /// Decode timestamp, 90kHz
    pub dts: i64,
    pub payload: &'a [u8],
}

/// Receives elementary packets from a demultiplexer
pub trait DemuxSink {
    fn on_packet(&mut self, packet: &ElementaryPacket<'_>) -> Result<()>;
}

impl<F> DemuxSink for F
where
    F: FnMut(&ElementaryPacket<'_>) -> Result<()>,
{
    fn on_packet(&mut self, packet: &ElementaryPacket<'_>) -> Result<()> {
        self(packet)
    }
}

/// Program stream demultiplexer
pub trait PsDemuxer {
    /// Feed program-stream bytes, returning the number of elementary
    /// packets delivered to `sink`
    fn input(&mut self, data: &[u8], sink: &mut dyn DemuxSink) -> Result<usize>;
}

/// Sink that logs every elementary packet
#[derive(Debug, Default)]
pub struct LoggingDemuxSink;

impl DemuxSink for LoggingDemuxSink {
    fn on_packet(&mut self, packet: &ElementaryPacket<'_>) -> Result<()> {
        tracing::info!(
            stream = packet.stream_id,
            codec = packet.codec_id,
            pts_ms = packet.pts / 90,
            dts_ms = packet.dts / 90,
            bytes = packet.payload.len(),
            flags = format_args!("0x{:x}", packet.flags),
            "Elementary packet"
        );
        Ok(())
    }
}
