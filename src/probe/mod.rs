//! The address validators behind live traces.

mod fault;
mod pipe;

pub use fault::FaultProbe;
pub use pipe::PipeProbe;

use crate::config::ProbeStrategy;
use crate::error::TraceError;
use crate::memory::{Memory, Unreadable};

/// The memory of the running process, read through one of the probes.
///
/// Acquired at the start of a trace and released when dropped, on whatever
/// path the trace leaves through.
#[derive(Debug)]
pub enum LiveMemory {
    Pipe(PipeProbe),
    Fault(FaultProbe),
}

impl LiveMemory {
    pub fn open(strategy: ProbeStrategy) -> Result<Self, TraceError> {
        match strategy {
            ProbeStrategy::Pipe => PipeProbe::open().map(Self::Pipe),
            ProbeStrategy::Fault => FaultProbe::install().map(Self::Fault),
        }
    }
}

impl Memory for LiveMemory {
    fn read_bytes(&self, addr: usize, buf: &mut [u8]) -> Result<(), Unreadable> {
        match self {
            Self::Pipe(probe) => probe.read_bytes(addr, buf),
            Self::Fault(probe) => probe.read_bytes(addr, buf),
        }
    }
}
