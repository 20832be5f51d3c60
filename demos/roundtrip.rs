//! RTP Round Trip - Replays a captured RTP trace through the payload codec
//!
//! Run with:
//!   cargo run --example roundtrip -- <trace.rtp> <payload-type> <encoding> [seq] [ssrc] [aac-config-hex]
//!
//! For example:
//!   cargo run --example roundtrip -- live555-test.h264.rtp 96 H264 12686 1957754144
//!   cargo run --example roundtrip -- live555-test.aac.rtp 97 mpeg4-generic 13353 1082077255 1190
//!
//! Writes `out.rtp` (the regenerated RTP trace, same record framing as the
//! input) and `out.media` (the re-framed elementary stream).
//!
//! # Trace Format
//!
//! ```text
//! +================+==============+================+==============+
//! | Length (u16 BE)| RTP/RTCP pkt | Length (u16 BE)| RTP/RTCP pkt | ...
//! +================+==============+================+==============+
//! ```

use std::process::ExitCode;

use rtp_reframe::media::AudioSpecificConfig;
use rtp_reframe::{CodecContext, RoundTripConfig};

fn usage() -> ExitCode {
    eprintln!(
        "usage: roundtrip <trace.rtp> <payload-type> <encoding> [seq] [ssrc] [aac-config-hex]"
    );
    ExitCode::from(2)
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rtp_reframe=info".parse()?)
                .add_directive("roundtrip=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 3 {
        return Ok(usage());
    }

    let payload_type: u8 = args[1].parse()?;
    let sequence: u16 = args.get(3).map(|s| s.parse::<u16>()).transpose()?.unwrap_or(0);
    let ssrc: u32 = args.get(4).map(|s| s.parse::<u32>()).transpose()?.unwrap_or(0);

    let mut config = RoundTripConfig::new(&args[0], payload_type, &args[2]).stream(sequence, ssrc);

    if let Some(hex) = args.get(5) {
        let asc = AudioSpecificConfig::from_hex(hex)?;
        tracing::info!(
            object_type = asc.audio_object_type,
            frequency_index = asc.sampling_frequency_index,
            channels = asc.channel_configuration,
            "AudioSpecificConfig"
        );
        config = config.adts(asc.adts_params());
    }

    println!("RTP Round Trip");
    println!("==============");
    println!("Input:        {}", config.input.display());
    println!("Encoding:     {} (pt {})", config.encoding, config.payload_type);
    println!("RTP output:   {}", config.rtp_output.display());
    println!("Media output: {}", config.media_output.display());
    println!();

    let mut ctx = CodecContext::open(&config)?;
    let stats = ctx.run()?;
    ctx.into_outputs()?;

    println!("Records:      {}", stats.records_read);
    println!(
        "RTCP dropped: {} ({:.1}%)",
        stats.rtcp_dropped,
        stats.rtcp_ratio() * 100.0
    );
    println!("Malformed:    {}", stats.rtp_malformed);
    println!("Units:        {}", stats.units_decoded);
    println!(
        "Frames:       {} ({} bytes, avg {})",
        stats.frames_written,
        stats.frame_bytes,
        stats.average_frame_size()
    );
    println!("Packets:      {} ({} bytes)", stats.packets_encoded, stats.packet_bytes);
    if stats.demuxed_packets > 0 {
        println!("Demuxed:      {}", stats.demuxed_packets);
    }
    println!("Elapsed:      {:?}", stats.duration);

    Ok(ExitCode::SUCCESS)
}
