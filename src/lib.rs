//! RTP payload round-trip harness
//!
//! Replays a captured RTP trace through a payload decoder and encoder,
//! writing the regenerated RTP stream and the reassembled elementary
//! stream so both sides of a payload codec can be checked against each
//! other.
//!
//! ```text
//!  trace.rtp ──► TraceReader ──► rtcp::classify ──► PayloadDecoder
//!                                     │                  │ DecodedUnit
//!                                RTCP dropped            ▼
//!                                               ┌── Reframer ──► Recorder ──► out.media
//!                                               ├── DemuxBridge (PS only)
//!                                               └── PayloadEncoder ──► Recorder ──► out.rtp
//! ```
//!
//! # Example
//!
//! ```no_run
//! use rtp_reframe::{CodecContext, RoundTripConfig};
//!
//! let config = RoundTripConfig::new("live555-test.h264.rtp", 96, "H264")
//!     .stream(12686, 1957754144)
//!     .outputs("out.rtp", "out.h264");
//!
//! let mut ctx = CodecContext::open(&config)?;
//! let stats = ctx.run()?;
//! println!("{} frames", stats.frames_written);
//! # Ok::<(), rtp_reframe::Error>(())
//! ```

pub mod arena;
pub mod config;
pub mod context;
pub mod error;
pub mod media;
pub mod payload;
pub mod ps;
pub mod recorder;
pub mod rtcp;
pub mod stats;
pub mod trace;

pub use arena::{ArenaLease, PacketArena};
pub use config::RoundTripConfig;
pub use context::CodecContext;
pub use error::{Error, Result};
pub use media::{Encoding, Framing, Reframer};
pub use payload::{PayloadDecoder, PayloadEncoder};
pub use ps::DemuxBridge;
pub use recorder::Recorder;
pub use stats::RoundTripStats;
pub use trace::{TraceReader, TraceWriter};
