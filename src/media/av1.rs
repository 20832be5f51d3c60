//! AV1 low-overhead bitstream framing
//!
//! The AV1 RTP payload format drops temporal delimiters. A `.obu` file
//! expects every temporal unit to start with one:
//!
//! ```text
//! obu_header: forbidden(1) | obu_type(4) | extension_flag(1) | has_size_field(1) | reserved(1)
//! ```

/// OBU type of a temporal delimiter
pub const OBU_TEMPORAL_DELIMITER: u8 = 2;

const OBU_HAS_SIZE_FIELD: u8 = 0x02;

/// Temporal delimiter OBU with an explicit zero size
pub const TEMPORAL_DELIMITER: [u8; 2] = [obu_header(OBU_TEMPORAL_DELIMITER, true), 0x00];

/// Build a one-byte OBU header without extension
pub const fn obu_header(obu_type: u8, has_size_field: bool) -> u8 {
    let size_flag = if has_size_field { OBU_HAS_SIZE_FIELD } else { 0 };
    ((obu_type & 0x0F) << 3) | size_flag
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporal_delimiter_bytes() {
        assert_eq!(TEMPORAL_DELIMITER, [0x12, 0x00]);
        assert_eq!((TEMPORAL_DELIMITER[0] >> 3) & 0x0F, OBU_TEMPORAL_DELIMITER);
    }

    #[test]
    fn test_obu_header() {
        // Sequence header OBU with size field
        assert_eq!(obu_header(1, true), 0x0A);
        assert_eq!(obu_header(6, false), 0x30);
    }
}
