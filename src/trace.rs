//! Packet trace files
//!
//! A trace is a plain sequence of length-prefixed packet records. The same
//! framing is used for captured input and for the regenerated RTP output,
//! so a run's output can be replayed as input.
//!
//! ```text
//! +-----------------+-------------------+-----------------+-----
//! | Length (2, BE)  | RTP/RTCP packet   | Length (2, BE)  | ...
//! +-----------------+-------------------+-----------------+-----
//! ```
//!
//! There is no header, footer or checksum. End of file right after a
//! complete record is the normal end of a trace.

use std::io::{self, Read, Write};

/// Size of the record length prefix
pub const RECORD_PREFIX_LEN: usize = 2;

/// Default record buffer capacity (64KB)
pub const DEFAULT_MAX_RECORD_SIZE: usize = 64 * 1024;

/// One packet record, borrowed from the reader until the next read
#[derive(Debug, Clone, Copy)]
pub struct PacketRecord<'a> {
    data: &'a [u8],
}

impl<'a> PacketRecord<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Raw packet bytes
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Length declared by the trace
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Reads length-prefixed packet records
///
/// A short read of either the length or the payload, or a declared length
/// larger than the record buffer, ends the trace. The caller sees
/// corruption and exhaustion the same way.
#[derive(Debug)]
pub struct TraceReader<R> {
    inner: R,
    record: Vec<u8>,
    records_read: u64,
}

impl<R: Read> TraceReader<R> {
    /// Create a reader with the default record capacity
    pub fn new(inner: R) -> Self {
        Self::with_capacity(inner, DEFAULT_MAX_RECORD_SIZE)
    }

    /// Create a reader with a fixed record buffer of `max_record_size` bytes
    pub fn with_capacity(inner: R, max_record_size: usize) -> Self {
        Self {
            inner,
            record: vec![0u8; max_record_size],
            records_read: 0,
        }
    }

    /// Number of complete records returned so far
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Read the next record, or `None` at the end of the trace
    pub fn next_record(&mut self) -> Option<PacketRecord<'_>> {
        let mut prefix = [0u8; RECORD_PREFIX_LEN];
        match read_full(&mut self.inner, &mut prefix) {
            Ok(0) => {
                tracing::debug!(records = self.records_read, "Trace exhausted");
                return None;
            }
            Ok(n) if n < RECORD_PREFIX_LEN => {
                tracing::warn!(
                    records = self.records_read,
                    "Truncated record length, ending trace"
                );
                return None;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Trace read failed, ending trace");
                return None;
            }
        }

        let size = u16::from_be_bytes(prefix) as usize;
        if size > self.record.len() {
            tracing::warn!(
                size,
                capacity = self.record.len(),
                "Record exceeds buffer capacity, ending trace"
            );
            return None;
        }

        match read_full(&mut self.inner, &mut self.record[..size]) {
            Ok(n) if n == size => {}
            Ok(n) => {
                tracing::warn!(declared = size, read = n, "Truncated record, ending trace");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Trace read failed, ending trace");
                return None;
            }
        }

        self.records_read += 1;
        Some(PacketRecord::new(&self.record[..size]))
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Read until `buf` is full or the source is exhausted
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Writes length-prefixed packet records
#[derive(Debug)]
pub struct TraceWriter<W: Write> {
    inner: W,
    records: u64,
    bytes: u64,
}

impl<W: Write> TraceWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            records: 0,
            bytes: 0,
        }
    }

    /// Write one record, prefixing it with its length
    pub fn write_record(&mut self, packet: &[u8]) -> io::Result<()> {
        let len = record_len(packet.len())?;
        self.inner.write_all(&len)?;
        self.inner.write_all(packet)?;
        self.records += 1;
        self.bytes += packet.len() as u64;
        Ok(())
    }

    /// Write a record whose length prefix is already in front of the packet
    pub fn write_framed(&mut self, framed: &[u8]) -> io::Result<()> {
        if framed.len() < RECORD_PREFIX_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "framed record shorter than its prefix",
            ));
        }
        self.inner.write_all(framed)?;
        self.records += 1;
        self.bytes += (framed.len() - RECORD_PREFIX_LEN) as u64;
        Ok(())
    }

    /// Records written so far
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Packet bytes written so far, excluding prefixes
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Big-endian length prefix for a packet of `len` bytes
pub fn record_len(len: usize) -> io::Result<[u8; RECORD_PREFIX_LEN]> {
    u16::try_from(len)
        .map(u16::to_be_bytes)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "packet too large for trace record"))
}
