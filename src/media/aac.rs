//! AAC framing
//!
//! RTP (mpeg4-generic) carries raw AAC access units without any framing.
//! To make them playable as a standalone `.aac` file each unit gets a
//! 7-byte ADTS header (no CRC):
//!
//! ```text
//! byte 0   1        2        3        4        5        6
//!      SSSSSSSS SSSSIAAP PPFFFFXC CCOHCCLL LLLLLLLL LLLBBBBB BBBBBBNN
//!
//! S syncword 0xFFF     I id (0 = MPEG-4)    A layer (0)
//! P protection_absent  PP profile (object type - 1)
//! FFFF sampling_frequency_index           X private bit
//! CCC channel_configuration  O/H/C/C originality, home, copyright bits
//! L frame_length (13 bits, header included)
//! B buffer fullness (0x7FF = VBR)          NN raw data blocks - 1
//! ```

use crate::error::MediaError;

/// ADTS header length without CRC
pub const ADTS_HEADER_LEN: usize = 7;

/// Largest value of the 13-bit frame_length field
pub const ADTS_MAX_FRAME_LEN: usize = 0x1FFF;

/// Standard sampling frequencies by index
pub const SAMPLING_FREQUENCIES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// Stream parameters written into every ADTS header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsParams {
    /// MPEG-4 audio object type (2 = AAC LC)
    pub profile: u8,
    /// Index into [`SAMPLING_FREQUENCIES`]
    pub sampling_frequency_index: u8,
    /// Channel configuration (1 = mono, 2 = stereo, ...)
    pub channel_configuration: u8,
}

impl Default for AdtsParams {
    /// AAC LC, 44.1kHz, stereo
    fn default() -> Self {
        Self {
            profile: 2,
            sampling_frequency_index: 4,
            channel_configuration: 2,
        }
    }
}

impl AdtsParams {
    pub fn new(profile: u8, sampling_frequency_index: u8, channel_configuration: u8) -> Self {
        Self {
            profile,
            sampling_frequency_index,
            channel_configuration,
        }
    }
}

/// Generate the ADTS header for a raw AAC frame of `payload_len` bytes
///
/// The 13-bit frame_length field holds the framed length modulo 0x2000.
/// Use [`fits_adts`] to detect units that overflow it.
pub fn generate_adts_header(params: &AdtsParams, payload_len: usize) -> [u8; ADTS_HEADER_LEN] {
    let frame_len = (payload_len + ADTS_HEADER_LEN) & ADTS_MAX_FRAME_LEN;

    let profile = params.profile.saturating_sub(1);
    let freq_idx = params.sampling_frequency_index;
    let channels = params.channel_configuration;

    let mut header = [0u8; ADTS_HEADER_LEN];

    header[0] = 0xFF;
    // Syncword low nibble, MPEG-4, layer 0, no CRC
    header[1] = 0xF1;
    header[2] = ((profile & 0x03) << 6) | ((freq_idx & 0x0F) << 2) | ((channels >> 2) & 0x01);
    header[3] = ((channels & 0x03) << 6) | ((frame_len >> 11) & 0x03) as u8;
    header[4] = ((frame_len >> 3) & 0xFF) as u8;
    header[5] = (((frame_len & 0x07) << 5) | 0x1F) as u8;
    header[6] = 0xFC;

    header
}

/// Whether a raw frame of `payload_len` bytes fits the frame_length field
pub fn fits_adts(payload_len: usize) -> bool {
    payload_len + ADTS_HEADER_LEN <= ADTS_MAX_FRAME_LEN
}

/// MPEG-4 AudioSpecificConfig (the SDP `config=` fmtp parameter)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSpecificConfig {
    /// Audio object type (profile)
    pub audio_object_type: u8,
    /// Sampling frequency index
    pub sampling_frequency_index: u8,
    /// Channel configuration
    pub channel_configuration: u8,
    /// Frame length flag (960 or 1024 samples)
    pub frame_length_flag: bool,
}

impl AudioSpecificConfig {
    /// Parse the leading fields of an AudioSpecificConfig
    ///
    /// Only configurations ADTS can express are accepted: a 5-bit object
    /// type and an indexed sampling frequency.
    pub fn parse(data: &[u8]) -> Result<Self, MediaError> {
        if data.len() < 2 {
            return Err(MediaError::InvalidAudioSpecificConfig);
        }

        // audioObjectType: 5 bits
        // samplingFrequencyIndex: 4 bits
        // channelConfiguration: 4 bits
        // frameLengthFlag: 1 bit
        let b0 = data[0];
        let b1 = data[1];

        let audio_object_type = (b0 >> 3) & 0x1F;
        let sampling_frequency_index = ((b0 & 0x07) << 1) | ((b1 >> 7) & 0x01);

        if audio_object_type == 0 || audio_object_type == 31 {
            return Err(MediaError::InvalidAudioSpecificConfig);
        }
        if sampling_frequency_index as usize >= SAMPLING_FREQUENCIES.len() {
            return Err(MediaError::InvalidAudioSpecificConfig);
        }

        Ok(AudioSpecificConfig {
            audio_object_type,
            sampling_frequency_index,
            channel_configuration: (b1 >> 3) & 0x0F,
            frame_length_flag: (b1 & 0x04) != 0,
        })
    }

    /// Parse from a hex string such as `1210`
    pub fn from_hex(config: &str) -> Result<Self, MediaError> {
        let bytes =
            hex::decode(config.trim()).map_err(|_| MediaError::InvalidAudioSpecificConfig)?;
        Self::parse(&bytes)
    }

    pub fn adts_params(&self) -> AdtsParams {
        AdtsParams::new(
            self.audio_object_type,
            self.sampling_frequency_index,
            self.channel_configuration,
        )
    }
}
