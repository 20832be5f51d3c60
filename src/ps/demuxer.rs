//! Minimal program stream demultiplexer
//!
//! Walks the system-level start codes of an MPEG program stream:
//!
//! ```text
//! 00 00 01 BA  pack header (MPEG-2: 14 + stuffing bytes, MPEG-1: 12 bytes)
//! 00 00 01 BB  system header          (length-prefixed, skipped)
//! 00 00 01 BC  program stream map     (stream_id -> stream_type)
//! 00 00 01 BD  private stream 1       (PES)
//! 00 00 01 BE  padding                (length-prefixed, skipped)
//! 00 00 01 C0-DF  audio               (PES)
//! 00 00 01 E0-EF  video               (PES)
//! 00 00 01 B9  program end
//! ```
//!
//! Every `input` call must contain whole PES packets. Data is not carried
//! over between calls.

use std::collections::HashMap;

use super::{DemuxSink, ElementaryPacket, PsDemuxer, FLAG_KEYFRAME};
use crate::error::{DemuxError, Result};

const PROGRAM_END: u8 = 0xB9;
const PACK_START: u8 = 0xBA;
const SYSTEM_HEADER: u8 = 0xBB;
const PROGRAM_STREAM_MAP: u8 = 0xBC;
const PRIVATE_STREAM_1: u8 = 0xBD;

/// ISO/IEC 13818-1 stream types
pub const STREAM_TYPE_AAC: u8 = 0x0F;
pub const STREAM_TYPE_H264: u8 = 0x1B;
pub const STREAM_TYPE_H265: u8 = 0x24;

/// Program stream demultiplexer
#[derive(Debug, Default)]
pub struct ProgramStreamDemuxer {
    /// stream_id -> stream_type from the latest program stream map
    stream_types: HashMap<u8, u8>,
    /// stream_id -> last (pts, dts), reused when a PES carries none
    timestamps: HashMap<u8, (i64, i64)>,
    packets: u64,
}

impl ProgramStreamDemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Elementary packets delivered so far
    pub fn packets(&self) -> u64 {
        self.packets
    }

    /// Stream type recorded for a stream id
    pub fn stream_type(&self, stream_id: u8) -> Option<u8> {
        self.stream_types.get(&stream_id).copied()
    }

    fn parse_psm(&mut self, psm: &[u8], offset: usize) -> Result<()> {
        let truncated = || DemuxError::Truncated {
            what: "program stream map",
            offset,
        };

        // start code (4) + length (2) + flags (2) + info length (2)
        if psm.len() < 10 {
            return Err(truncated().into());
        }
        let info_len = u16::from_be_bytes([psm[8], psm[9]]) as usize;
        let mut pos = 10 + info_len;
        if psm.len() < pos + 2 {
            return Err(truncated().into());
        }
        let map_len = u16::from_be_bytes([psm[pos], psm[pos + 1]]) as usize;
        pos += 2;
        let map_end = pos + map_len;
        if psm.len() < map_end {
            return Err(truncated().into());
        }

        while pos + 4 <= map_end {
            let stream_type = psm[pos];
            let stream_id = psm[pos + 1];
            let es_info_len = u16::from_be_bytes([psm[pos + 2], psm[pos + 3]]) as usize;
            self.stream_types.insert(stream_id, stream_type);
            pos += 4 + es_info_len;
        }
        Ok(())
    }

    fn parse_pes<'a>(&mut self, pes: &'a [u8], offset: usize) -> Result<Option<ElementaryPacket<'a>>> {
        let stream_id = pes[3];
        if pes.len() < 9 || (pes[6] & 0xC0) != 0x80 {
            // MPEG-1 PES headers are not interpreted
            tracing::debug!(stream = stream_id, offset, "Skipping non MPEG-2 PES packet");
            return Ok(None);
        }

        let pts_dts_flags = pes[7] >> 6;
        let header_len = pes[8] as usize;
        let payload_start = 9 + header_len;
        if pes.len() < payload_start {
            return Err(DemuxError::Truncated {
                what: "PES header",
                offset,
            }
            .into());
        }

        let (mut pts, mut dts) = self.timestamps.get(&stream_id).copied().unwrap_or((0, 0));
        if pts_dts_flags & 0x02 != 0 && header_len >= 5 {
            pts = read_timestamp(&pes[9..14]);
            dts = pts;
        }
        if pts_dts_flags == 0x03 && header_len >= 10 {
            dts = read_timestamp(&pes[14..19]);
        }
        self.timestamps.insert(stream_id, (pts, dts));

        let codec_id = self.stream_type(stream_id).unwrap_or(0);
        let payload = &pes[payload_start..];
        let flags = if is_keyframe(codec_id, payload) {
            FLAG_KEYFRAME
        } else {
            0
        };

        Ok(Some(ElementaryPacket {
            stream_id,
            codec_id,
            flags,
            pts,
            dts,
            payload,
        }))
    }
}

impl PsDemuxer for ProgramStreamDemuxer {
    fn input(&mut self, data: &[u8], sink: &mut dyn DemuxSink) -> Result<usize> {
        let mut pos = 0;
        let mut delivered = 0;

        while pos + 4 <= data.len() {
            if data[pos..pos + 3] != [0x00, 0x00, 0x01] {
                pos += 1;
                continue;
            }

            match data[pos + 3] {
                PACK_START => pos += pack_header_len(data, pos)?,
                PROGRAM_END => pos += 4,
                PROGRAM_STREAM_MAP => {
                    let len = unit_len(data, pos)?;
                    self.parse_psm(&data[pos..pos + len], pos)?;
                    pos += len;
                }
                PRIVATE_STREAM_1 | 0xC0..=0xEF => {
                    let len = unit_len(data, pos)?;
                    if let Some(packet) = self.parse_pes(&data[pos..pos + len], pos)? {
                        self.packets += 1;
                        delivered += 1;
                        sink.on_packet(&packet)?;
                    }
                    pos += len;
                }
                SYSTEM_HEADER | 0xBE..=0xBF | 0xF0..=0xFF => pos += unit_len(data, pos)?,
                // Slice or picture start codes inside a payload
                _ => pos += 3,
            }
        }

        Ok(delivered)
    }
}

/// Length of the pack header starting at `pos`
fn pack_header_len(data: &[u8], pos: usize) -> Result<usize> {
    let truncated = DemuxError::Truncated {
        what: "pack header",
        offset: pos,
    };
    let marker = *data.get(pos + 4).ok_or(truncated.clone())?;

    let len = if marker & 0xC0 == 0x40 {
        // MPEG-2
        let stuffing = *data.get(pos + 13).ok_or(truncated.clone())? & 0x07;
        14 + stuffing as usize
    } else {
        // MPEG-1
        12
    };

    if pos + len > data.len() {
        return Err(truncated.into());
    }
    Ok(len)
}

/// Total length of a length-prefixed unit (start code and length included)
///
/// A zero PES length (unbounded video) extends to the end of the input.
fn unit_len(data: &[u8], pos: usize) -> Result<usize> {
    let truncated = DemuxError::Truncated {
        what: "PES packet",
        offset: pos,
    };
    if pos + 6 > data.len() {
        return Err(truncated.into());
    }

    let declared = u16::from_be_bytes([data[pos + 4], data[pos + 5]]) as usize;
    if declared == 0 && (0xE0..=0xEF).contains(&data[pos + 3]) {
        return Ok(data.len() - pos);
    }

    let len = 6 + declared;
    if pos + len > data.len() {
        return Err(truncated.into());
    }
    Ok(len)
}

/// Decode a 33-bit PTS/DTS field
fn read_timestamp(b: &[u8]) -> i64 {
    (((b[0] as i64 >> 1) & 0x07) << 30)
        | ((b[1] as i64) << 22)
        | (((b[2] as i64) >> 1) << 15)
        | ((b[3] as i64) << 7)
        | ((b[4] as i64) >> 1)
}

/// Whether an H.264/H.265 payload contains a random access NAL unit
fn is_keyframe(codec_id: u8, payload: &[u8]) -> bool {
    let mut i = 0;
    while i + 3 < payload.len() {
        if payload[i..i + 3] == [0x00, 0x00, 0x01] {
            let nal = payload[i + 3];
            match codec_id {
                STREAM_TYPE_H264 if nal & 0x1F == 5 => return true,
                STREAM_TYPE_H265 if (16..=21).contains(&((nal >> 1) & 0x3F)) => return true,
                _ => {}
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    false
}
