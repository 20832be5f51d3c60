//! Generic RTP payload codec
//!
//! A codec-agnostic packetizer: an access unit is split into as many RTP
//! packets as the packet size allows, all carrying the unit's timestamp,
//! with the marker bit on the last one. The encoder is fed container
//! frames and removes the framing header first, so the RTP payloads are
//! the bare access units again. The depacketizer concatenates
//! payloads sharing a timestamp and completes the unit on the marker bit or
//! on the next timestamp.
//!
//! This is enough to drive the round-trip harness for any encoding whose
//! payload format is "the access unit, fragmented by MTU". It does not
//! implement codec-specific aggregation or fragmentation units.

use std::rc::Rc;

use super::rtp::{RtpHeader, RtpPacket, RTP_FIXED_HEADER_LEN};
use super::{
    DecodedUnit, EncodedPacket, PacketSink, PayloadDecoder, PayloadEncoder, UnitSink,
    FLAG_PACKET_LOST,
};
use crate::arena::{ArenaLease, PacketArena};
use crate::error::Result;
use crate::media::reframe::header_len;
use crate::media::Framing;

/// Default RTP packet size, header included
pub const DEFAULT_MAX_PACKET_SIZE: usize = 1456;

/// Access-unit packetizer
#[derive(Debug)]
pub struct GenericEncoder {
    payload_type: u8,
    sequence: u16,
    ssrc: u32,
    max_packet_size: usize,
    framing: Framing,
    arena: Rc<PacketArena>,
    packets: u64,
}

impl GenericEncoder {
    pub fn new(payload_type: u8, initial_sequence: u16, ssrc: u32, arena: Rc<PacketArena>) -> Self {
        Self {
            payload_type,
            sequence: initial_sequence,
            ssrc,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            framing: Framing::PassThrough,
            arena,
            packets: 0,
        }
    }

    /// Set the packet size limit, header included
    pub fn max_packet_size(mut self, size: usize) -> Self {
        self.max_packet_size = size.max(RTP_FIXED_HEADER_LEN + 1);
        self
    }

    /// Set the framing of the frames this encoder is fed
    pub fn framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    /// Sequence number of the next packet
    pub fn next_sequence(&self) -> u16 {
        self.sequence
    }

    /// Packets emitted so far
    pub fn packets(&self) -> u64 {
        self.packets
    }
}

impl PayloadEncoder for GenericEncoder {
    fn input(&mut self, frame: &[u8], timestamp: u32, sink: &mut dyn PacketSink) -> Result<()> {
        let unit = frame.get(header_len(self.framing)..).unwrap_or_default();
        let max_payload = self.max_packet_size - RTP_FIXED_HEADER_LEN;
        let chunks = unit.chunks(max_payload);
        let count = chunks.len();

        for (i, chunk) in chunks.enumerate() {
            let header = RtpHeader {
                marker: i + 1 == count,
                payload_type: self.payload_type,
                sequence: self.sequence,
                timestamp,
                ssrc: self.ssrc,
            };

            let mut lease = self.arena.checkout(RTP_FIXED_HEADER_LEN + chunk.len())?;
            lease.extend_from_slice(&header.to_bytes())?;
            lease.extend_from_slice(chunk)?;

            self.sequence = self.sequence.wrapping_add(1);
            self.packets += 1;
            sink.on_packet(EncodedPacket::new(lease, timestamp, 0))?;
        }

        Ok(())
    }
}

/// Unit being reassembled
#[derive(Debug)]
struct Pending {
    lease: ArenaLease,
    timestamp: u32,
}

/// Access-unit depacketizer
#[derive(Debug)]
pub struct GenericDecoder {
    payload_type: u8,
    arena: Rc<PacketArena>,
    pending: Option<Pending>,
    last_sequence: Option<u16>,
    lost: bool,
    units: u64,
}

impl GenericDecoder {
    pub fn new(payload_type: u8, arena: Rc<PacketArena>) -> Self {
        Self {
            payload_type,
            arena,
            pending: None,
            last_sequence: None,
            lost: false,
            units: 0,
        }
    }

    /// Units delivered so far
    pub fn units(&self) -> u64 {
        self.units
    }

    fn flush(&mut self, sink: &mut dyn UnitSink) -> Result<()> {
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        if pending.lease.is_empty() {
            return Ok(());
        }

        let flags = if self.lost { FLAG_PACKET_LOST } else { 0 };
        self.lost = false;
        self.units += 1;
        sink.on_unit(DecodedUnit::new(pending.lease, pending.timestamp, flags))
    }
}

impl PayloadDecoder for GenericDecoder {
    fn input(&mut self, packet: &[u8], sink: &mut dyn UnitSink) -> Result<()> {
        let rtp = RtpPacket::parse(packet)?;
        let header = rtp.header;

        if header.payload_type != self.payload_type {
            tracing::debug!(
                payload_type = header.payload_type,
                expected = self.payload_type,
                "Ignoring packet with foreign payload type"
            );
            return Ok(());
        }

        if let Some(last) = self.last_sequence {
            let expected = last.wrapping_add(1);
            if header.sequence != expected {
                tracing::warn!(
                    expected,
                    sequence = header.sequence,
                    "Sequence gap, dropping partial unit"
                );
                self.pending = None;
                self.lost = true;
            }
        }
        self.last_sequence = Some(header.sequence);

        let boundary = matches!(&self.pending, Some(p) if p.timestamp != header.timestamp);
        if boundary {
            self.flush(sink)?;
        }

        let pending = match self.pending.take() {
            Some(pending) => pending,
            None => Pending {
                lease: self.arena.checkout(rtp.payload.len())?,
                timestamp: header.timestamp,
            },
        };
        let pending = self.pending.insert(pending);
        pending.lease.extend_from_slice(rtp.payload)?;

        if header.marker {
            self.flush(sink)?;
        }

        Ok(())
    }
}
