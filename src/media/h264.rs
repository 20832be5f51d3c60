//! H.264/H.265 Annex-B framing
//!
//! RTP carries NAL units without start codes. Byte-stream files need each
//! NAL unit delimited by `00 00 00 01`.

/// Annex-B start code
pub const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// Count Annex-B start codes (4-byte form) in a byte stream
#[cfg(test)]
pub(crate) fn count_start_codes(stream: &[u8]) -> usize {
    stream.windows(START_CODE.len()).filter(|w| *w == START_CODE).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_start_codes() {
        let stream = [0, 0, 0, 1, 0x67, 0, 0, 0, 1, 0x68, 0xCE];
        assert_eq!(count_start_codes(&stream), 2);
        assert_eq!(count_start_codes(&[0, 0, 1, 0x67]), 0);
    }
}
