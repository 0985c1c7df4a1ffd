use core::fmt::Write;

use tracing::instrument;

use crate::arch::get_rbp;
use crate::config::TraceConfig;
use crate::error::TraceError;
use crate::memory::Memory;
use crate::probe::LiveMemory;
use crate::render::ArgRenderer;
use crate::symbols::SymbolTable;
use crate::walk::{FrameWalker, WalkEnd, WalkState};

/// How the last trace ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEnd {
    Done(WalkEnd),
    /// The frame chain was broken, `FATAL: Stack Wrong!` was printed.
    Corrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceSummary {
    /// Number of `Function ...` lines written.
    pub frames: usize,
    pub end: TraceEnd,
}

/// Prints stack traces against one symbol table.
#[derive(Debug, Clone, Copy)]
pub struct Tracer<'a> {
    table: &'a SymbolTable<'a>,
    config: TraceConfig<'a>,
}

impl<'a> Tracer<'a> {
    pub fn new(table: &'a SymbolTable<'a>) -> Self {
        Self {
            table,
            config: TraceConfig::default(),
        }
    }

    pub fn with_config(mut self, config: TraceConfig<'a>) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &TraceConfig<'a> {
        &self.config
    }

    /// Prints the call stack leading up to this call, innermost frame first.
    #[inline(never)]
    pub fn traceback<W: Write>(&self, out: &mut W) -> Result<TraceSummary, TraceError> {
        let fp = get_rbp();
        self.live(fp, out)
    }

    fn live<W: Write>(&self, fp: usize, out: &mut W) -> Result<TraceSummary, TraceError> {
        let memory = LiveMemory::open(self.config.probe)?;
        self.trace_from(fp, &memory, out)
    }

    /// Walks the frame chain starting at the frame record `fp`, reading
    /// through `memory`. The first line printed is for the function the
    /// return address in that record points into.
    #[instrument(level = "debug", skip_all, fields(fp = fp))]
    pub fn trace_from<M: Memory, W: Write>(
        &self,
        fp: usize,
        memory: &M,
        out: &mut W,
    ) -> Result<TraceSummary, TraceError> {
        let renderer = ArgRenderer::new(memory, &self.config);
        let mut walker = FrameWalker::new(memory, fp, self.config.max_depth);
        let mut frames = 0;

        while let Some(frame) = walker.next() {
            let Some(function) = self.table.lookup(frame.return_addr) else {
                writeln!(out, "Function {:#x}(...), in", frame.return_addr)?;
                frames += 1;
                continue;
            };

            if self.config.entry_symbol == Some(function.name) {
                debug!(symbol = function.name, "reached the entry symbol");
                walker.finish(WalkEnd::EntrySymbol);
                break;
            }

            write!(out, "Function {}(", function.name)?;
            renderer.render(out, function, frame.saved_fp)?;
            writeln!(out, "), in")?;
            frames += 1;
        }

        let end = match walker.state() {
            WalkState::Done(end) => TraceEnd::Done(end),
            WalkState::Fatal => {
                warn!(frames, "frame pointer chain is corrupted");
                writeln!(out, "FATAL: Stack Wrong!")?;
                TraceEnd::Corrupted
            }
            // `finish` was called before every break
            WalkState::Walking => TraceEnd::Done(WalkEnd::EntrySymbol),
        };
        debug!(frames, ?end, "trace finished");

        Ok(TraceSummary { frames, end })
    }
}

/// Prints the call stack leading up to this call to `out`, with the default
/// [`TraceConfig`].
#[inline(never)]
pub fn traceback<W: Write>(table: &SymbolTable<'_>, out: &mut W) -> Result<TraceSummary, TraceError> {
    let fp = get_rbp();
    Tracer::new(table).live(fp, out)
}
