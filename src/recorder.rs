//! Round-trip recorder
//!
//! Two independent outputs:
//! - the regenerated RTP stream, in trace framing so it can be replayed
//! - the regenerated elementary stream, frames concatenated with no
//!   delimiters

use std::io::Write;

use crate::error::Result;
use crate::payload::{EncodedPacket, PacketSink};
use crate::trace::{record_len, TraceWriter};

/// Writes encoder packets and synthesized frames
#[derive(Debug)]
pub struct Recorder<W: Write> {
    rtp: TraceWriter<W>,
    media: W,
    frames: u64,
    frame_bytes: u64,
}

impl<W: Write> Recorder<W> {
    pub fn new(rtp: W, media: W) -> Self {
        Self {
            rtp: TraceWriter::new(rtp),
            media,
            frames: 0,
            frame_bytes: 0,
        }
    }

    /// Append one container frame to the elementary stream
    pub fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.media.write_all(frame)?;
        self.frames += 1;
        self.frame_bytes += frame.len() as u64;
        Ok(())
    }

    /// Append one RTP packet to the regenerated trace
    ///
    /// The record length goes into the packet buffer's reserved prefix so
    /// the record is written in one piece.
    pub fn write_packet(&mut self, packet: &mut EncodedPacket) -> Result<()> {
        let len = record_len(packet.len())?;
        let framed = packet.lease_mut().prefixed(&len)?;
        self.rtp.write_framed(framed)?;
        Ok(())
    }

    /// Frames written so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn frame_bytes(&self) -> u64 {
        self.frame_bytes
    }

    /// RTP packets written so far
    pub fn packets(&self) -> u64 {
        self.rtp.records()
    }

    pub fn packet_bytes(&self) -> u64 {
        self.rtp.bytes()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.rtp.flush()?;
        self.media.flush()?;
        Ok(())
    }

    /// Flush and return the RTP and media writers
    pub fn into_inner(mut self) -> Result<(W, W)> {
        self.flush()?;
        Ok((self.rtp.into_inner(), self.media))
    }
}

impl<W: Write> PacketSink for Recorder<W> {
    fn on_packet(&mut self, mut packet: EncodedPacket) -> Result<()> {
        self.write_packet(&mut packet)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::arena::PacketArena;
    use crate::trace::TraceReader;

    #[test]
    fn test_packets_replay_as_trace() {
        let arena = PacketArena::new(1024);
        let mut recorder = Recorder::new(Vec::new(), Vec::new());

        for payload in [&[0x80u8, 0x60, 0x00, 0x01][..], &[0x80, 0xE0, 0x00, 0x02, 0xAA]] {
            let mut lease = arena.checkout(payload.len()).unwrap();
            lease.extend_from_slice(payload).unwrap();
            recorder.on_packet(EncodedPacket::new(lease, 0, 0)).unwrap();
        }
        assert_eq!(recorder.packets(), 2);
        assert_eq!(recorder.packet_bytes(), 9);
        assert!(!arena.is_checked_out());

        let (rtp, media) = recorder.into_inner().unwrap();
        assert!(media.is_empty());

        let mut reader = TraceReader::new(Cursor::new(rtp));
        assert_eq!(reader.next_record().unwrap().as_bytes(), &[0x80, 0x60, 0x00, 0x01]);
        assert_eq!(
            reader.next_record().unwrap().as_bytes(),
            &[0x80, 0xE0, 0x00, 0x02, 0xAA]
        );
        assert!(reader.next_record().is_none());
    }

    #[test]
    fn test_frames_concatenated() {
        let mut recorder = Recorder::new(Vec::new(), Vec::new());
        recorder.write_frame(&[0, 0, 0, 1, 0x67]).unwrap();
        recorder.write_frame(&[0, 0, 0, 1, 0x68]).unwrap();

        assert_eq!(recorder.frames(), 2);
        assert_eq!(recorder.frame_bytes(), 10);

        let (rtp, media) = recorder.into_inner().unwrap();
        assert!(rtp.is_empty());
        assert_eq!(media, vec![0, 0, 0, 1, 0x67, 0, 0, 0, 1, 0x68]);
    }
}
