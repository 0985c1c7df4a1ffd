//! Knobs for a trace.

use core::str::FromStr;

/// Most characters of a string argument that are printed before `...`.
pub const DEFAULT_MAX_STRING_LEN: usize = 25;
/// Most elements of a string array argument that are printed before `...`.
pub const DEFAULT_MAX_ARRAY_LEN: usize = 3;
/// Frames visited before the walk gives up.
pub const DEFAULT_MAX_DEPTH: usize = 1024;
/// Symbol of the process entry point. The walk stops when it gets there.
pub const DEFAULT_ENTRY_SYMBOL: &str = "_start";

/// How the tracer finds out whether an address may be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProbeStrategy {
    /// Let the kernel copy the bytes through a pipe. `EFAULT` means the
    /// address is bad. Works from inside signal handlers and leaves signal
    /// dispositions alone.
    #[default]
    Pipe,
    /// Read directly and recover from `SIGSEGV`/`SIGBUS` with a temporary
    /// handler. Cheaper per read, but only one trace can hold the handler.
    Fault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown probe strategy, expected `pipe` or `fault`")]
pub struct UnknownProbeStrategy;

impl FromStr for ProbeStrategy {
    type Err = UnknownProbeStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            s if s.eq_ignore_ascii_case("pipe") => Ok(Self::Pipe),
            s if s.eq_ignore_ascii_case("fault") => Ok(Self::Fault),
            _ => Err(UnknownProbeStrategy),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceConfig<'a> {
    pub probe: ProbeStrategy,
    pub max_string_len: usize,
    pub max_array_len: usize,
    pub max_depth: usize,
    /// When a frame resolves to this symbol, the walk ends without printing
    /// it.
    pub entry_symbol: Option<&'a str>,
}

impl Default for TraceConfig<'_> {
    fn default() -> Self {
        Self {
            probe: ProbeStrategy::default(),
            max_string_len: DEFAULT_MAX_STRING_LEN,
            max_array_len: DEFAULT_MAX_ARRAY_LEN,
            max_depth: DEFAULT_MAX_DEPTH,
            entry_symbol: Some(DEFAULT_ENTRY_SYMBOL),
        }
    }
}

impl<'a> TraceConfig<'a> {
    pub fn probe(mut self, probe: ProbeStrategy) -> Self {
        self.probe = probe;
        self
    }

    /// Clamped to [`MAX_STRING_CAPACITY`](crate::render::MAX_STRING_CAPACITY).
    pub fn max_string_len(mut self, len: usize) -> Self {
        self.max_string_len = len.min(crate::render::MAX_STRING_CAPACITY);
        self
    }

    /// Clamped to [`MAX_ARRAY_CAPACITY`](crate::render::MAX_ARRAY_CAPACITY).
    pub fn max_array_len(mut self, len: usize) -> Self {
        self.max_array_len = len.min(crate::render::MAX_ARRAY_CAPACITY);
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn entry_symbol(mut self, symbol: Option<&'a str>) -> Self {
        self.entry_symbol = symbol;
        self
    }
}
