//! Codec context
//!
//! The context owns everything a round-trip run touches: the trace reader,
//! one payload decoder, one payload encoder, the re-framer, the demux
//! bridge and the recorder. The run is a single synchronous pass:
//!
//! ```text
//!  TraceReader ─► classify ─RTP─► decoder.input ─► on_unit ─┬─► Reframer ─► media output
//!                    │                                      ├─► DemuxBridge (PS only)
//!                  RTCP                                     └─► encoder.input ─► RTP output
//!                  (dropped)
//! ```
//!
//! The encoder runs inside the decoder's unit callback, on the same stack.
//! The decoded unit's arena lease is released before the encoder checks
//! the arena out again.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::rc::Rc;
use std::time::Instant;

use crate::arena::PacketArena;
use crate::config::RoundTripConfig;
use crate::error::{Error, Result};
use crate::media::{Encoding, Framing, Reframer};
use crate::payload::{
    DecodedUnit, GenericDecoder, GenericEncoder, PayloadDecoder, PayloadEncoder, UnitSink,
};
use crate::ps::DemuxBridge;
use crate::recorder::Recorder;
use crate::rtcp::{self, PacketKind};
use crate::stats::RoundTripStats;
use crate::trace::TraceReader;

/// State of one round-trip run
pub struct CodecContext<R, W: Write> {
    payload_type: u8,
    encoding: Encoding,
    arena: Rc<PacketArena>,
    reader: TraceReader<R>,
    encoder: Box<dyn PayloadEncoder>,
    decoder: Box<dyn PayloadDecoder>,
    reframer: Reframer,
    bridge: DemuxBridge,
    recorder: Recorder<W>,
    stats: RoundTripStats,
}

impl CodecContext<BufReader<File>, BufWriter<File>> {
    /// Open the input trace and create both output files
    pub fn open(config: &RoundTripConfig) -> Result<Self> {
        config.validate()?;
        let input = File::open(&config.input)?;
        let rtp = File::create(&config.rtp_output)?;
        let media = File::create(&config.media_output)?;

        tracing::debug!(
            input = %config.input.display(),
            rtp_output = %config.rtp_output.display(),
            media_output = %config.media_output.display(),
            "Opened trace files"
        );

        Self::new(
            config,
            BufReader::new(input),
            BufWriter::new(rtp),
            BufWriter::new(media),
        )
    }
}

impl<R: Read, W: Write> CodecContext<R, W> {
    /// Build a context over arbitrary reader and writers, using the generic
    /// payload codec
    pub fn new(config: &RoundTripConfig, input: R, rtp_output: W, media_output: W) -> Result<Self> {
        config.validate()?;

        let arena = PacketArena::new(config.arena_capacity);
        let encoder = GenericEncoder::new(
            config.payload_type,
            config.initial_sequence,
            config.ssrc,
            Rc::clone(&arena),
        )
        .max_packet_size(config.max_packet_size)
        .framing(config.encoding.framing());
        let decoder = GenericDecoder::new(config.payload_type, Rc::clone(&arena));

        Ok(Self {
            payload_type: config.payload_type,
            encoding: config.encoding.clone(),
            reader: TraceReader::with_capacity(input, config.max_record_size),
            encoder: Box::new(encoder),
            decoder: Box::new(decoder),
            reframer: Reframer::with_capacity(
                config.encoding.clone(),
                config.adts,
                config.frame_capacity,
            ),
            bridge: DemuxBridge::new(),
            recorder: Recorder::new(rtp_output, media_output),
            stats: RoundTripStats::new(),
            arena,
        })
    }

    /// Replace the payload encoder
    pub fn with_encoder(mut self, encoder: Box<dyn PayloadEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Replace the payload decoder
    pub fn with_decoder(mut self, decoder: Box<dyn PayloadDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Replace the demux bridge used for program streams
    pub fn with_demux_bridge(mut self, bridge: DemuxBridge) -> Self {
        self.bridge = bridge;
        self
    }

    /// Arena shared by the encoder and decoder
    pub fn arena(&self) -> &Rc<PacketArena> {
        &self.arena
    }

    pub fn encoding(&self) -> &Encoding {
        &self.encoding
    }

    pub fn stats(&self) -> &RoundTripStats {
        &self.stats
    }

    /// Replay the whole trace
    ///
    /// A malformed or truncated trace ends the run normally. Contract
    /// violations (arena overflow, flagged units, output errors) abort it.
    pub fn run(&mut self) -> Result<RoundTripStats> {
        tracing::info!(
            payload_type = self.payload_type,
            encoding = %self.encoding,
            "Starting round trip"
        );
        let started = Instant::now();

        while let Some(record) = self.reader.next_record() {
            self.stats.records_read += 1;

            if rtcp::classify(record.as_bytes()) == PacketKind::Rtcp {
                tracing::debug!(
                    packet_type = record.as_bytes()[1],
                    bytes = record.len(),
                    "Dropping RTCP record"
                );
                self.stats.rtcp_dropped += 1;
                continue;
            }
            self.stats.rtp_forwarded += 1;

            let mut sink = UnitForwarder {
                encoding: &self.encoding,
                reframer: &mut self.reframer,
                bridge: &mut self.bridge,
                encoder: &mut self.encoder,
                recorder: &mut self.recorder,
                stats: &mut self.stats,
            };

            match self.decoder.input(record.as_bytes(), &mut sink) {
                Ok(()) => {}
                Err(Error::Rtp(e)) => {
                    tracing::warn!(error = %e, bytes = record.len(), "Malformed RTP packet");
                    self.stats.rtp_malformed += 1;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Round trip aborted");
                    return Err(e);
                }
            }
        }

        self.recorder.flush()?;
        self.stats.packets_encoded = self.recorder.packets();
        self.stats.packet_bytes = self.recorder.packet_bytes();
        self.stats.demuxed_packets = self.bridge.packets();
        self.stats.duration = started.elapsed();

        tracing::info!(
            records = self.stats.records_read,
            rtcp = self.stats.rtcp_dropped,
            units = self.stats.units_decoded,
            frames = self.stats.frames_written,
            packets = self.stats.packets_encoded,
            "Round trip complete"
        );

        Ok(self.stats.clone())
    }

    /// Flush and hand back the RTP and media writers
    pub fn into_outputs(self) -> Result<(W, W)> {
        self.recorder.into_inner()
    }
}

/// Decode callback: synthesize, record, re-encode
struct UnitForwarder<'a, W: Write> {
    encoding: &'a Encoding,
    reframer: &'a mut Reframer,
    bridge: &'a mut DemuxBridge,
    encoder: &'a mut Box<dyn PayloadEncoder>,
    recorder: &'a mut Recorder<W>,
    stats: &'a mut RoundTripStats,
}

impl<W: Write> UnitSink for UnitForwarder<'_, W> {
    fn on_unit(&mut self, unit: DecodedUnit) -> Result<()> {
        if unit.flags() != 0 {
            return Err(Error::UnexpectedFlags {
                encoding: self.encoding.name().to_string(),
                flags: unit.flags(),
            });
        }
        self.stats.units_decoded += 1;

        let timestamp = unit.timestamp();
        if self.reframer.framing() == Framing::ProgramStream {
            self.bridge.input(&unit)?;
        }

        let frame = self.reframer.synthesize(&unit)?;
        // Return the lease before the encoder checks the arena out
        drop(unit);

        tracing::debug!(
            timestamp,
            header = frame.header().len(),
            bytes = frame.len(),
            "Synthesized frame"
        );

        self.recorder.write_frame(frame.as_bytes())?;
        self.stats.frames_written += 1;
        self.stats.frame_bytes += frame.len() as u64;

        self.encoder.input(frame.as_bytes(), timestamp, &mut *self.recorder)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::io::Cursor;

    use super::*;
    use crate::media::h264::{count_start_codes, START_CODE};
    use crate::payload::{RtpHeader, RtpPacket, FLAG_PACKET_LOST};
    use crate::ps::demuxer::tests::{pack_header, pes, psm};
    use crate::ps::demuxer::STREAM_TYPE_H264;
    use crate::ps::ElementaryPacket;
    use crate::trace::TraceWriter;

    fn rtp(pt: u8, seq: u16, ts: u32, marker: bool, payload: &[u8]) -> Vec<u8> {
        let header = RtpHeader {
            marker,
            payload_type: pt,
            sequence: seq,
            timestamp: ts,
            ssrc: 0xCAFE,
        };
        let mut packet = header.to_bytes().to_vec();
        packet.extend_from_slice(payload);
        packet
    }

    fn rtcp_sr() -> Vec<u8> {
        let mut packet = vec![0x80, 200, 0x00, 0x06];
        packet.extend_from_slice(&[0u8; 24]);
        packet
    }

    fn trace(records: &[Vec<u8>]) -> Vec<u8> {
        let mut writer = TraceWriter::new(Vec::new());
        for record in records {
            writer.write_record(record).unwrap();
        }
        writer.into_inner()
    }

    fn context(
        config: &RoundTripConfig,
        records: &[Vec<u8>],
    ) -> CodecContext<Cursor<Vec<u8>>, Vec<u8>> {
        CodecContext::new(config, Cursor::new(trace(records)), Vec::new(), Vec::new()).unwrap()
    }

    fn run(config: &RoundTripConfig, records: &[Vec<u8>]) -> (RoundTripStats, Vec<u8>, Vec<u8>) {
        let mut ctx = context(config, records);
        let stats = ctx.run().unwrap();
        let (rtp, media) = ctx.into_outputs().unwrap();
        (stats, rtp, media)
    }

    fn read_trace(data: Vec<u8>) -> Vec<Vec<u8>> {
        let mut reader = TraceReader::new(Cursor::new(data));
        let mut out = Vec::new();
        while let Some(record) = reader.next_record() {
            out.push(record.as_bytes().to_vec());
        }
        out
    }

    /// Decoder that counts its inputs and decodes nothing
    struct CountingDecoder {
        calls: Rc<Cell<u32>>,
        second_bytes: Rc<RefCell<Vec<u8>>>,
    }

    impl PayloadDecoder for CountingDecoder {
        fn input(&mut self, packet: &[u8], _sink: &mut dyn UnitSink) -> Result<()> {
            self.calls.set(self.calls.get() + 1);
            self.second_bytes.borrow_mut().push(packet[1]);
            Ok(())
        }
    }

    #[test]
    fn test_h264_start_codes() {
        let config = RoundTripConfig::new("", 96, "H264").stream(12686, 1957754144);
        let records = vec![
            rtp(96, 1, 0, true, &[0x67, 0x42, 0x00, 0x1F]),
            rtp(96, 2, 0, true, &[0x68, 0xCE, 0x3C, 0x80]),
            rtp(96, 3, 3000, true, &[0x65, 0x88, 0x84]),
        ];
        let (stats, _rtp, media) = run(&config, &records);

        assert_eq!(stats.units_decoded, 3);
        assert_eq!(stats.frames_written, 3);
        assert_eq!(count_start_codes(&media), 3);
        assert_eq!(&media[..4], &START_CODE);
        assert_eq!(
            media,
            [
                &START_CODE[..],
                &[0x67, 0x42, 0x00, 0x1F],
                &START_CODE[..],
                &[0x68, 0xCE, 0x3C, 0x80],
                &START_CODE[..],
                &[0x65, 0x88, 0x84],
            ]
            .concat()
        );
    }

    #[test]
    fn test_regenerated_rtp_stream() {
        let config = RoundTripConfig::new("", 96, "H264").stream(100, 42);
        let records = vec![
            rtp(96, 7, 1000, true, &[0x65, 1, 2]),
            rtp(96, 8, 4000, true, &[0x41, 3]),
        ];
        let (stats, out, _media) = run(&config, &records);
        assert_eq!(stats.packets_encoded, 2);

        let packets = read_trace(out);
        assert_eq!(packets.len(), 2);

        let first = RtpPacket::parse(&packets[0]).unwrap();
        assert_eq!(first.header.sequence, 100);
        assert_eq!(first.header.ssrc, 42);
        assert_eq!(first.header.timestamp, 1000);
        assert!(first.header.marker);
        // Start code stripped again before packetizing
        assert_eq!(first.payload, &[0x65, 1, 2]);

        let second = RtpPacket::parse(&packets[1]).unwrap();
        assert_eq!(second.header.sequence, 101);
        assert_eq!(second.header.timestamp, 4000);
    }

    #[test]
    fn test_aac_adts_frames() {
        let config = RoundTripConfig::new("", 97, "mpeg4-generic");
        let unit = vec![0x21; 100];
        let (_, _, media) = run(&config, &[rtp(97, 1, 1024, true, &unit)]);

        assert_eq!(media.len(), 107);
        assert_eq!(&media[..7], &[0xFF, 0xF1, 0x50, 0x80, 0x0D, 0x7F, 0xFC]);
        assert_eq!(&media[7..], &unit[..]);
    }

    #[test]
    fn test_av1_temporal_delimiters() {
        let config = RoundTripConfig::new("", 98, "AV1");
        let records = vec![rtp(98, 1, 0, true, &[0x32, 0x00]), rtp(98, 2, 3000, true, &[0x32, 0x01])];
        let (_, _, media) = run(&config, &records);
        assert_eq!(media, vec![0x12, 0x00, 0x32, 0x00, 0x12, 0x00, 0x32, 0x01]);
    }

    #[test]
    fn test_pass_through_reassembles_fragments() {
        let config = RoundTripConfig::new("", 33, "MP2T").max_packet_size(200);
        let records = vec![
            rtp(33, 1, 90, false, &[0x47; 188]),
            rtp(33, 2, 90, true, &[0x47; 188]),
        ];
        let (stats, out, media) = run(&config, &records);

        assert_eq!(stats.units_decoded, 1);
        assert_eq!(media, vec![0x47; 376]);
        // Re-packetized at 188 payload bytes per packet
        assert_eq!(read_trace(out).len(), 2);
    }

    #[test]
    fn test_rtcp_never_reaches_decoder() {
        let calls = Rc::new(Cell::new(0));
        let second_bytes = Rc::new(RefCell::new(Vec::new()));
        let decoder = CountingDecoder {
            calls: Rc::clone(&calls),
            second_bytes: Rc::clone(&second_bytes),
        };

        let config = RoundTripConfig::new("", 96, "H264");
        let mut nack = rtcp_sr();
        nack[1] = 193;
        let mut xr = rtcp_sr();
        xr[1] = 207;
        let records = vec![
            rtcp_sr(),
            rtp(96, 1, 0, true, &[0x65]),
            nack,
            rtp(96, 2, 10, true, &[0x41]),
            xr,
        ];

        let mut ctx = context(&config, &records).with_decoder(Box::new(decoder));
        let stats = ctx.run().unwrap();

        assert_eq!(calls.get(), 2);
        assert!(second_bytes
            .borrow()
            .iter()
            .all(|pt| !(rtcp::RTCP_FIR..=rtcp::RTCP_LIMIT).contains(pt)));
        assert_eq!(stats.records_read, 5);
        assert_eq!(stats.rtcp_dropped, 3);
        assert_eq!(stats.rtp_forwarded, 2);
    }

    #[test]
    fn test_replay_is_deterministic() {
        let config = RoundTripConfig::new("", 96, "H265").stream(5, 6).max_packet_size(64);
        let records: Vec<Vec<u8>> = (0..20u16)
            .map(|i| {
                let payload: Vec<u8> = (0..(50 + i * 7)).map(|b| (b ^ i) as u8).collect();
                rtp(96, i, i as u32 * 3000, true, &payload)
            })
            .chain(std::iter::once(rtcp_sr()))
            .collect();

        let (_, rtp_a, media_a) = run(&config, &records);
        let (_, rtp_b, media_b) = run(&config, &records);
        assert_eq!(rtp_a, rtp_b);
        assert_eq!(media_a, media_b);
        assert!(!rtp_a.is_empty());
    }

    #[test]
    fn test_output_trace_replays() {
        // Regenerated output fed back in yields the same frames again
        let cases: [(&str, u8, Vec<Vec<u8>>); 4] = [
            (
                "VP8",
                96,
                vec![rtp(96, 1, 0, true, &[1, 2, 3]), rtp(96, 2, 90, true, &[4, 5])],
            ),
            (
                "H264",
                96,
                vec![
                    rtp(96, 1, 0, true, &[0x67, 0x42, 0x00, 0x1F]),
                    rtp(96, 2, 0, true, &[0x68, 0xCE]),
                    rtp(96, 3, 3000, true, &[0x65, 0x88]),
                ],
            ),
            (
                "mpeg4-generic",
                97,
                vec![rtp(97, 1, 0, true, &[0x21; 100]), rtp(97, 2, 1024, true, &[0x21; 40])],
            ),
            (
                "AV1",
                98,
                vec![rtp(98, 1, 0, true, &[0x32, 0x00]), rtp(98, 2, 3000, true, &[0x32, 0x01])],
            ),
        ];

        for (encoding, pt, records) in cases {
            let config = RoundTripConfig::new("", pt, encoding).stream(1, 0xCAFE);
            let (_, out, media) = run(&config, &records);

            let replayed = read_trace(out.clone());
            let (_, out_again, media_again) = run(&config, &replayed);
            assert_eq!(media, media_again, "{}", encoding);
            assert_eq!(out, out_again, "{}", encoding);

            // RTP payloads are the decoded units, without framing
            let payloads: Vec<Vec<u8>> = replayed
                .iter()
                .map(|p| RtpPacket::parse(p).unwrap().payload.to_vec())
                .collect();
            let original: Vec<Vec<u8>> = records
                .iter()
                .map(|p| RtpPacket::parse(p).unwrap().payload.to_vec())
                .collect();
            assert_eq!(payloads, original, "{}", encoding);
        }
    }

    #[test]
    fn test_fragmented_h264_one_start_code_per_unit() {
        let config = RoundTripConfig::new("", 96, "H264");
        let idr: Vec<u8> = std::iter::once(0x65).chain((1..40u8).map(|b| b | 0x80)).collect();
        let slice: Vec<u8> = std::iter::once(0x41).chain((1..30u8).map(|b| b | 0x80)).collect();
        let records = vec![
            rtp(96, 1, 0, false, &idr[..15]),
            rtp(96, 2, 0, false, &idr[15..30]),
            rtp(96, 3, 0, true, &idr[30..]),
            rtp(96, 4, 3000, false, &slice[..10]),
            rtp(96, 5, 3000, true, &slice[10..]),
        ];
        let (stats, _, media) = run(&config, &records);

        assert_eq!(stats.units_decoded, 2);
        assert_eq!(count_start_codes(&media), 2);
        assert_eq!(media, [&START_CODE[..], &idr[..], &START_CODE[..], &slice[..]].concat());
    }

    #[test]
    fn test_truncated_trace_ends_cleanly() {
        let config = RoundTripConfig::new("", 96, "H264");
        let mut data = trace(&[rtp(96, 1, 0, true, &[0x65, 0x01])]);
        data.extend_from_slice(&[0x00, 0x40, 0x80]);

        let mut ctx =
            CodecContext::new(&config, Cursor::new(data), Vec::new(), Vec::new()).unwrap();
        let stats = ctx.run().unwrap();
        assert_eq!(stats.records_read, 1);

        let (_, media) = ctx.into_outputs().unwrap();
        assert_eq!(media, vec![0, 0, 0, 1, 0x65, 0x01]);
    }

    #[test]
    fn test_malformed_rtp_is_skipped() {
        let config = RoundTripConfig::new("", 96, "H264");
        let records = vec![vec![0x80, 0x60, 0x00], rtp(96, 1, 0, true, &[0x65])];
        let (stats, _, media) = run(&config, &records);

        assert_eq!(stats.rtp_malformed, 1);
        assert_eq!(stats.frames_written, 1);
        assert_eq!(media, vec![0, 0, 0, 1, 0x65]);
    }

    #[test]
    fn test_flagged_unit_aborts() {
        let config = RoundTripConfig::new("", 96, "H264");
        let records = vec![
            rtp(96, 1, 0, true, &[0x65]),
            rtp(96, 5, 10, true, &[0x41]),
            rtp(96, 6, 20, true, &[0x41]),
        ];
        let mut ctx = context(&config, &records);

        match ctx.run() {
            Err(Error::UnexpectedFlags { encoding, flags }) => {
                assert_eq!(encoding, "H264");
                assert_eq!(flags, FLAG_PACKET_LOST);
            }
            other => panic!("expected UnexpectedFlags, got {:?}", other),
        }
        assert_eq!(ctx.stats().frames_written, 1);
    }

    #[test]
    fn test_arena_overflow_aborts() {
        let config = RoundTripConfig::new("", 96, "H264")
            .arena_capacity(32)
            .max_packet_size(32);
        let records = vec![rtp(96, 1, 0, false, &[0; 20]), rtp(96, 2, 0, true, &[0; 20])];
        let mut ctx = context(&config, &records);

        assert!(matches!(ctx.run(), Err(Error::Arena(_))));
    }

    #[test]
    fn test_arena_released_after_run() {
        let config = RoundTripConfig::new("", 96, "H264");
        let mut ctx = context(&config, &[rtp(96, 1, 0, true, &[0x65; 3000])]);
        ctx.run().unwrap();

        assert!(!ctx.arena().is_checked_out());
        // One decoder lease plus three encoder packets
        assert_eq!(ctx.arena().checkouts(), 4);
    }

    #[test]
    fn test_ps_units_reach_demuxer() {
        let log: Rc<RefCell<Vec<(u8, i64)>>> = Rc::new(RefCell::new(Vec::new()));
        let sink_log = Rc::clone(&log);
        let bridge = DemuxBridge::new().with_sink(Box::new(
            move |p: &ElementaryPacket<'_>| -> Result<()> {
                sink_log.borrow_mut().push((p.stream_id, p.dts));
                Ok(())
            },
        ));

        let mut first = pack_header();
        first.extend(psm(&[(STREAM_TYPE_H264, 0xE0)]));
        first.extend(pes(0xE0, 3600, Some(0), &[0, 0, 0, 1, 0x65]));
        first.extend(pes(0xC0, 0, None, &[0x21]));
        let mut second = pack_header();
        second.extend(pes(0xE0, 7200, Some(3600), &[0, 0, 0, 1, 0x41]));
        second.extend(pes(0xC0, 1920, None, &[0x21]));

        let config = RoundTripConfig::new("", 96, "PS");
        let records = vec![rtp(96, 1, 0, true, &first), rtp(96, 2, 3600, true, &second)];
        let mut ctx = context(&config, &records).with_demux_bridge(bridge);
        let stats = ctx.run().unwrap();

        assert_eq!(stats.demuxed_packets, 4);
        let mut last: HashMap<u8, i64> = HashMap::new();
        for (stream, dts) in log.borrow().iter() {
            if let Some(prev) = last.insert(*stream, *dts) {
                assert!(*dts >= prev);
            }
        }

        // PS is written through unchanged
        let (_, media) = ctx.into_outputs().unwrap();
        assert_eq!(media, [first, second].concat());
    }

    #[test]
    fn test_non_ps_does_not_create_demuxer() {
        let config = RoundTripConfig::new("", 96, "H264");
        let (stats, _, _) = run(&config, &[rtp(96, 1, 0, true, &[0, 0, 1, 0xBA])]);
        assert_eq!(stats.demuxed_packets, 0);
    }

    #[test]
    fn test_open_missing_input() {
        let config = RoundTripConfig::new("/nonexistent/trace.rtp", 96, "H264")
            .outputs("/nonexistent/out.rtp", "/nonexistent/out.media");
        assert!(matches!(CodecContext::open(&config), Err(Error::Io(_))));
    }
}
