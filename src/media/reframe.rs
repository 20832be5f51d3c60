//! Elementary-stream re-framing
//!
//! Decoded access units are bare codec payloads. The [`Reframer`] turns
//! each one into a self-describing container frame for the active
//! encoding by prepending a fixed, deterministically computed header:
//!
//! | Framing              | Header                              |
//! |----------------------|-------------------------------------|
//! | Annex-B (H264/H265)  | `00 00 00 01`                       |
//! | ADTS (mpeg4-generic) | 7-byte ADTS header, no CRC          |
//! | AV1                  | temporal delimiter OBU `12 00`      |
//! | PS / other           | none                                |
//!
//! The payload is never altered or truncated. Frames are built in one
//! reusable buffer; the returned [`ContainerFrame`] borrows it until the
//! next call.

use bytes::{BufMut, BytesMut};

use super::aac::{fits_adts, generate_adts_header, AdtsParams, ADTS_HEADER_LEN};
use super::av1::TEMPORAL_DELIMITER;
use super::encoding::{Encoding, Framing};
use super::h264::START_CODE;
use crate::error::MediaError;

/// Default synthesis buffer capacity (2MB)
pub const DEFAULT_FRAME_CAPACITY: usize = 2 * 1024 * 1024;

/// A synthesized frame: header followed by the untouched access unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerFrame<'a> {
    bytes: &'a [u8],
    header_len: usize,
}

impl<'a> ContainerFrame<'a> {
    /// Header and payload
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Synthesized header only
    pub fn header(&self) -> &'a [u8] {
        &self.bytes[..self.header_len]
    }

    /// The access unit as delivered by the decoder
    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[self.header_len..]
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Header length a framing adds to every unit
pub fn header_len(framing: Framing) -> usize {
    match framing {
        Framing::AnnexB => START_CODE.len(),
        Framing::Adts => ADTS_HEADER_LEN,
        Framing::Av1TemporalDelimiter => TEMPORAL_DELIMITER.len(),
        Framing::ProgramStream | Framing::PassThrough => 0,
    }
}

/// Access-unit to container-frame synthesizer
#[derive(Debug)]
pub struct Reframer {
    framing: Framing,
    adts: AdtsParams,
    frame: BytesMut,
    capacity: usize,
    frames: u64,
}

impl Reframer {
    /// Create a reframer with the default buffer capacity
    pub fn new(encoding: Encoding, adts: AdtsParams) -> Self {
        Self::with_capacity(encoding, adts, DEFAULT_FRAME_CAPACITY)
    }

    /// Create a reframer whose frames may be at most `capacity` bytes
    pub fn with_capacity(encoding: Encoding, adts: AdtsParams, capacity: usize) -> Self {
        Self {
            framing: encoding.framing(),
            adts,
            frame: BytesMut::with_capacity(capacity),
            capacity,
            frames: 0,
        }
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Frames synthesized so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Build the container frame for one access unit
    pub fn synthesize(&mut self, unit: &[u8]) -> Result<ContainerFrame<'_>, MediaError> {
        let header_len = header_len(self.framing);
        let size = header_len + unit.len();
        if size > self.capacity {
            return Err(MediaError::FrameTooLarge {
                size,
                capacity: self.capacity,
            });
        }

        self.frame.clear();
        match self.framing {
            Framing::AnnexB => self.frame.put_slice(&START_CODE),
            Framing::Adts => {
                if !fits_adts(unit.len()) {
                    tracing::warn!(
                        bytes = unit.len(),
                        "AAC unit overflows the ADTS frame length field"
                    );
                }
                self.frame.put_slice(&generate_adts_header(&self.adts, unit.len()));
            }
            Framing::Av1TemporalDelimiter => self.frame.put_slice(&TEMPORAL_DELIMITER),
            Framing::ProgramStream | Framing::PassThrough => {}
        }
        self.frame.put_slice(unit);
        self.frames += 1;

        Ok(ContainerFrame {
            bytes: &self.frame[..],
            header_len,
        })
    }
}
