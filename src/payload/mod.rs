//! RTP payload codec seams
//!
//! The payload encoder and decoder are collaborators of the round-trip
//! harness. Both are synchronous: one `input` call invokes its sink zero or
//! more times before returning, on the caller's stack.
//!
//! ```text
//!  trace record ──► PayloadDecoder::input ──► UnitSink::on_unit(DecodedUnit)
//!                                                   │
//!               PacketSink::on_packet ◄── PayloadEncoder::input
//! ```
//!
//! Units and packets are handed over as owned arena leases. A sink must
//! drop the lease it received before it drives anything else that checks
//! out the arena.

pub mod generic;
pub mod rtp;

use std::ops::{Deref, DerefMut};

use crate::arena::ArenaLease;
use crate::error::Result;

pub use generic::{GenericDecoder, GenericEncoder};
pub use rtp::{RtpHeader, RtpPacket};

/// Packets were lost before this unit
pub const FLAG_PACKET_LOST: u32 = 0x0100;

/// A reassembled access unit
#[derive(Debug)]
pub struct DecodedUnit {
    lease: ArenaLease,
    timestamp: u32,
    flags: u32,
}

impl DecodedUnit {
    pub fn new(lease: ArenaLease, timestamp: u32, flags: u32) -> Self {
        Self {
            lease,
            timestamp,
            flags,
        }
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Status flags; zero for an intact unit
    pub fn flags(&self) -> u32 {
        self.flags
    }
}

impl Deref for DecodedUnit {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.lease
    }
}

/// One RTP packet produced by an encoder
#[derive(Debug)]
pub struct EncodedPacket {
    lease: ArenaLease,
    timestamp: u32,
    flags: u32,
}

impl EncodedPacket {
    pub fn new(lease: ArenaLease, timestamp: u32, flags: u32) -> Self {
        Self {
            lease,
            timestamp,
            flags,
        }
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// The underlying lease, for writing a framing prefix in place
    pub fn lease_mut(&mut self) -> &mut ArenaLease {
        &mut self.lease
    }
}

impl Deref for EncodedPacket {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.lease
    }
}

impl DerefMut for EncodedPacket {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.lease
    }
}

/// Receives decoded access units
pub trait UnitSink {
    fn on_unit(&mut self, unit: DecodedUnit) -> Result<()>;
}

impl<F> UnitSink for F
where
    F: FnMut(DecodedUnit) -> Result<()>,
{
    fn on_unit(&mut self, unit: DecodedUnit) -> Result<()> {
        self(unit)
    }
}

/// Receives encoded RTP packets
pub trait PacketSink {
    fn on_packet(&mut self, packet: EncodedPacket) -> Result<()>;
}

impl<F> PacketSink for F
where
    F: FnMut(EncodedPacket) -> Result<()>,
{
    fn on_packet(&mut self, packet: EncodedPacket) -> Result<()> {
        self(packet)
    }
}

/// RTP packets in, access units out
pub trait PayloadDecoder {
    /// Feed one RTP packet
    ///
    /// A malformed packet is reported as [`crate::Error::Rtp`] and leaves
    /// the decoder usable.
    fn input(&mut self, packet: &[u8], sink: &mut dyn UnitSink) -> Result<()>;
}

/// Access units in, RTP packets out
pub trait PayloadEncoder {
    /// Packetize one access unit stamped with `timestamp`
    fn input(&mut self, unit: &[u8], timestamp: u32, sink: &mut dyn PacketSink) -> Result<()>;
}
