//! RTP fixed header (RFC 3550)
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|X|  CC   |M|     PT      |       sequence number         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           timestamp                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                             SSRC                              |
//! +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
//! |                  CSRC list (CC x 32 bits)                     |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use bytes::{Buf, BufMut};

use crate::error::RtpError;

pub const RTP_VERSION: u8 = 2;

/// Fixed header length without CSRCs or extension
pub const RTP_FIXED_HEADER_LEN: usize = 12;

/// RTP header fields the payload codecs care about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RtpHeader {
    pub marker: bool,
    pub payload_type: u8,
    pub sequence: u16,
    pub timestamp: u32,
    pub ssrc: u32,
}

impl RtpHeader {
    /// Serialize as a 12-byte fixed header (no padding, extension or CSRCs)
    pub fn to_bytes(&self) -> [u8; RTP_FIXED_HEADER_LEN] {
        let mut out = [0u8; RTP_FIXED_HEADER_LEN];
        let mut buf = &mut out[..];
        buf.put_u8(RTP_VERSION << 6);
        buf.put_u8(((self.marker as u8) << 7) | (self.payload_type & 0x7F));
        buf.put_u16(self.sequence);
        buf.put_u32(self.timestamp);
        buf.put_u32(self.ssrc);
        out
    }
}

/// A parsed RTP packet borrowing its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpPacket<'a> {
    pub header: RtpHeader,
    /// Payload with CSRCs, extension and padding removed
    pub payload: &'a [u8],
}

impl<'a> RtpPacket<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self, RtpError> {
        if data.len() < RTP_FIXED_HEADER_LEN {
            return Err(RtpError::TooShort(data.len()));
        }

        let mut buf = data;
        let vpxcc = buf.get_u8();
        let m_pt = buf.get_u8();

        let version = vpxcc >> 6;
        if version != RTP_VERSION {
            return Err(RtpError::BadVersion(version));
        }
        let padding = (vpxcc & 0x20) != 0;
        let extension = (vpxcc & 0x10) != 0;
        let csrc_count = (vpxcc & 0x0F) as usize;

        let header = RtpHeader {
            marker: (m_pt & 0x80) != 0,
            payload_type: m_pt & 0x7F,
            sequence: buf.get_u16(),
            timestamp: buf.get_u32(),
            ssrc: buf.get_u32(),
        };

        if buf.remaining() < csrc_count * 4 {
            return Err(RtpError::HeaderOverrun);
        }
        buf.advance(csrc_count * 4);

        if extension {
            if buf.remaining() < 4 {
                return Err(RtpError::HeaderOverrun);
            }
            let _profile = buf.get_u16();
            let words = buf.get_u16() as usize;
            if buf.remaining() < words * 4 {
                return Err(RtpError::HeaderOverrun);
            }
            buf.advance(words * 4);
        }

        let mut payload = buf;
        if padding {
            let pad = payload.last().copied().unwrap_or(0);
            if pad == 0 || pad as usize > payload.len() {
                return Err(RtpError::BadPadding(pad));
            }
            payload = &payload[..payload.len() - pad as usize];
        }

        Ok(RtpPacket { header, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let header = RtpHeader {
            marker: true,
            payload_type: 96,
            sequence: 12686,
            timestamp: 0x1234_5678,
            ssrc: 1957754144,
        };
        let bytes = header.to_bytes();
        assert_eq!(bytes[0], 0x80);
        assert_eq!(bytes[1], 0xE0);

        let mut packet = bytes.to_vec();
        packet.extend_from_slice(&[0xAA, 0xBB]);
        let parsed = RtpPacket::parse(&packet).unwrap();
        assert_eq!(parsed.header, header);
        assert_eq!(parsed.payload, &[0xAA, 0xBB]);
    }

    #[test]
    fn test_csrc_extension_padding() {
        let mut packet = vec![
            0xB1, 0x60, 0x00, 0x01, // V=2 P=1 X=1 CC=1, PT 96
            0x00, 0x00, 0x00, 0x10, // timestamp
            0x00, 0x00, 0x00, 0x01, // ssrc
            0xDE, 0xAD, 0xBE, 0xEF, // csrc
            0xBE, 0xDE, 0x00, 0x01, // extension, 1 word
            0x10, 0xFF, 0x00, 0x00,
        ];
        packet.extend_from_slice(&[1, 2, 3]);
        packet.extend_from_slice(&[0, 0, 3]); // 3 bytes of padding

        let parsed = RtpPacket::parse(&packet).unwrap();
        assert_eq!(parsed.header.payload_type, 96);
        assert!(!parsed.header.marker);
        assert_eq!(parsed.payload, &[1, 2, 3]);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(RtpPacket::parse(&[0x80; 11]), Err(RtpError::TooShort(11)));

        let mut v1 = RtpHeader::default().to_bytes();
        v1[0] = 0x40;
        assert_eq!(RtpPacket::parse(&v1), Err(RtpError::BadVersion(1)));

        let mut cc = RtpHeader::default().to_bytes();
        cc[0] |= 0x02;
        assert_eq!(RtpPacket::parse(&cc), Err(RtpError::HeaderOverrun));

        let mut pad = RtpHeader::default().to_bytes().to_vec();
        pad[0] |= 0x20;
        pad.push(5);
        assert_eq!(RtpPacket::parse(&pad), Err(RtpError::BadPadding(5)));
    }
}
