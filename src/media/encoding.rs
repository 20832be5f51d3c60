//! Encoding identifiers
//!
//! The encoding name (as it would appear in an SDP `rtpmap`) is resolved
//! once when the codec context is built. Everything downstream matches on
//! the variant.

use std::fmt;

/// Media encoding carried by the RTP stream
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// H.264/AVC (RFC 6184)
    H264,
    /// H.265/HEVC (RFC 7798)
    H265,
    /// AAC in mpeg4-generic (RFC 3640)
    Mpeg4Generic,
    /// AV1
    Av1,
    /// AV1 with the extended payload descriptor
    Av1X,
    /// MPEG program stream
    Ps,
    /// Anything else, written through unchanged
    Other(String),
}

/// How decoded units are turned into a self-describing elementary stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Prefix each unit with an Annex-B start code
    AnnexB,
    /// Prefix each unit with a 7-byte ADTS header
    Adts,
    /// Prefix each temporal unit with a temporal delimiter OBU
    Av1TemporalDelimiter,
    /// Write through and feed the program-stream demultiplexer
    ProgramStream,
    /// Write through
    PassThrough,
}

impl Encoding {
    /// Resolve an encoding name
    ///
    /// `mpeg4-generic` is matched case-insensitively; the other names are
    /// matched exactly.
    pub fn from_name(name: &str) -> Self {
        match name {
            "H264" => Encoding::H264,
            "H265" => Encoding::H265,
            "AV1" => Encoding::Av1,
            "AV1X" => Encoding::Av1X,
            "PS" => Encoding::Ps,
            _ if name.eq_ignore_ascii_case("mpeg4-generic") => Encoding::Mpeg4Generic,
            _ => Encoding::Other(name.to_string()),
        }
    }

    /// Canonical encoding name
    pub fn name(&self) -> &str {
        match self {
            Encoding::H264 => "H264",
            Encoding::H265 => "H265",
            Encoding::Mpeg4Generic => "mpeg4-generic",
            Encoding::Av1 => "AV1",
            Encoding::Av1X => "AV1X",
            Encoding::Ps => "PS",
            Encoding::Other(name) => name,
        }
    }

    pub fn framing(&self) -> Framing {
        match self {
            Encoding::H264 | Encoding::H265 => Framing::AnnexB,
            Encoding::Mpeg4Generic => Framing::Adts,
            Encoding::Av1 | Encoding::Av1X => Framing::Av1TemporalDelimiter,
            Encoding::Ps => Framing::ProgramStream,
            Encoding::Other(_) => Framing::PassThrough,
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&str> for Encoding {
    fn from(name: &str) -> Self {
        Encoding::from_name(name)
    }
}
