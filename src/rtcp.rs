//! RTP/RTCP discrimination
//!
//! Traces interleave RTP data with a handful of RTCP packets. The second
//! byte of an RTCP packet is its packet type, while in RTP the same byte is
//! the marker bit plus payload type. RTCP types occupy 192..=223 and RTP
//! payload types must stay clear of that range when multiplexed (RFC 5761),
//! so a single range check on that byte routes a record.

/// Full intra-frame request, the lowest reserved RTCP packet type
pub const RTCP_FIR: u8 = 192;
/// Negative acknowledgement
pub const RTCP_NACK: u8 = 193;
/// Sender report
pub const RTCP_SR: u8 = 200;
/// Receiver report
pub const RTCP_RR: u8 = 201;
/// Source description
pub const RTCP_SDES: u8 = 202;
/// Goodbye
pub const RTCP_BYE: u8 = 203;
/// Application defined
pub const RTCP_APP: u8 = 204;
/// Upper bound of the reserved RTCP packet type range
pub const RTCP_LIMIT: u8 = 223;

/// Packet class of a trace record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Rtp,
    Rtcp,
}

/// Classify a record by its second byte
///
/// Records too short to carry a type byte are classified as RTP and left to
/// the decoder to reject.
pub fn classify(packet: &[u8]) -> PacketKind {
    match packet.get(1) {
        Some(&pt) if (RTCP_FIR..=RTCP_LIMIT).contains(&pt) => PacketKind::Rtcp,
        _ => PacketKind::Rtp,
    }
}
