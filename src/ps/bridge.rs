//! Nested demultiplexer bridge
//!
//! The bridge owns the demultiplexer for the run. It is created on the
//! first program-stream unit, then fed every unit's raw bytes. Elementary
//! packets are relayed to the sink as they arrive; nothing is buffered or
//! reordered here.

use super::{DemuxSink, LoggingDemuxSink, ProgramStreamDemuxer, PsDemuxer};
use crate::error::{Error, Result};

/// Builds the demultiplexer on first use
pub type DemuxerFactory = Box<dyn Fn() -> Box<dyn PsDemuxer>>;

/// Lazily created demultiplexer plus its sink
pub struct DemuxBridge {
    factory: DemuxerFactory,
    demuxer: Option<Box<dyn PsDemuxer>>,
    sink: Box<dyn DemuxSink>,
    inputs: u64,
    packets: u64,
}

impl DemuxBridge {
    /// Bridge to a [`ProgramStreamDemuxer`] that logs every packet
    pub fn new() -> Self {
        Self::with_parts(
            Box::new(|| Box::new(ProgramStreamDemuxer::new()) as Box<dyn PsDemuxer>),
            Box::new(LoggingDemuxSink),
        )
    }

    pub fn with_parts(factory: DemuxerFactory, sink: Box<dyn DemuxSink>) -> Self {
        Self {
            factory,
            demuxer: None,
            sink,
            inputs: 0,
            packets: 0,
        }
    }

    /// Replace the sink receiving elementary packets
    pub fn with_sink(mut self, sink: Box<dyn DemuxSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the demultiplexer factory
    pub fn with_factory(mut self, factory: DemuxerFactory) -> Self {
        self.factory = factory;
        self
    }

    /// Whether the demultiplexer has been created
    pub fn is_active(&self) -> bool {
        self.demuxer.is_some()
    }

    /// Units fed so far
    pub fn inputs(&self) -> u64 {
        self.inputs
    }

    /// Elementary packets relayed so far
    pub fn packets(&self) -> u64 {
        self.packets
    }

    /// Feed one decoded unit
    ///
    /// Malformed program-stream data is logged and skipped; errors raised
    /// by the sink abort.
    pub fn input(&mut self, data: &[u8]) -> Result<()> {
        let factory = &self.factory;
        let demuxer = self.demuxer.get_or_insert_with(|| {
            tracing::debug!("Creating program stream demuxer");
            factory()
        });

        self.inputs += 1;
        match demuxer.input(data, self.sink.as_mut()) {
            Ok(n) => {
                self.packets += n as u64;
                Ok(())
            }
            Err(Error::Demux(e)) => {
                tracing::warn!(error = %e, bytes = data.len(), "Program stream parse failed");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

impl Default for DemuxBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DemuxBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DemuxBridge")
            .field("active", &self.is_active())
            .field("inputs", &self.inputs)
            .field("packets", &self.packets)
            .finish()
    }
}
