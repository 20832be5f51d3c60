//! Elementary-stream media handling
//!
//! This module provides:
//! - Encoding identifiers and their framing policy
//! - ADTS header synthesis for AAC
//! - Annex-B start codes for H.264/H.265
//! - Temporal delimiters for AV1
//! - The re-framing synthesizer tying them together

pub mod aac;
pub mod av1;
pub mod encoding;
pub mod h264;
pub mod reframe;

pub use aac::{generate_adts_header, AdtsParams, AudioSpecificConfig};
pub use encoding::{Encoding, Framing};
pub use reframe::{ContainerFrame, Reframer};
