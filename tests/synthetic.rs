//! Whole traces over hand-built stacks.

use std::fmt;

use pretty_assertions::assert_eq;
use uwutrace::{
    ArgSymbol, ArgType, FunctionSymbol, Region, SnapshotMemory, SymbolTable, TraceConfig,
    TraceEnd, TraceError, Tracer, WalkEnd,
};

const STACK: usize = 0x7ffd_1000;
const HEAP: usize = 0x5566_0000;

const START: usize = 0x40_1000;
const MAIN: usize = 0x40_1100;
const PARSE: usize = 0x40_1400;
const COMPUTE: usize = 0x40_1800;

const MAIN_ARGS: &[ArgSymbol<'static>] = &[
    ArgSymbol::new("argc", ArgType::Int, 16),
    ArgSymbol::new("argv", ArgType::StrArray, 24),
];
const PARSE_ARGS: &[ArgSymbol<'static>] = &[
    ArgSymbol::new("input", ArgType::Str, 16),
    ArgSymbol::new("sep", ArgType::Char, 24),
];
const COMPUTE_ARGS: &[ArgSymbol<'static>] = &[
    ArgSymbol::new("x", ArgType::Double, 16),
    ArgSymbol::new("ctx", ArgType::VoidPtr, 24),
];

const FUNCTIONS: &[FunctionSymbol<'static>] = &[
    FunctionSymbol::new("_start", START, &[]),
    FunctionSymbol::new("main", MAIN, MAIN_ARGS),
    FunctionSymbol::new("parse", PARSE, PARSE_ARGS),
    FunctionSymbol::new("compute", COMPUTE, COMPUTE_ARGS),
];

/// Frame pointers of the chain, innermost (the tracer's own frame) first.
const TRACER_FP: usize = STACK + 0x20;
const COMPUTE_FP: usize = STACK + 0x60;
const PARSE_FP: usize = STACK + 0xc0;
const MAIN_FP: usize = STACK + 0x140;
const START_FP: usize = STACK + 0x1c0;

struct Process {
    stack: Vec<u8>,
    heap: Vec<u8>,
}

impl Process {
    fn new() -> Self {
        Self {
            stack: vec![0; 0x200],
            heap: Vec::new(),
        }
    }

    fn put(&mut self, addr: usize, bytes: &[u8]) {
        let offset = addr - STACK;
        self.stack[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    fn frame(&mut self, fp: usize, saved_fp: usize, return_addr: usize) {
        self.put(fp, &saved_fp.to_ne_bytes());
        self.put(fp + 8, &return_addr.to_ne_bytes());
    }

    fn cstr(&mut self, s: &str) -> usize {
        let addr = HEAP + self.heap.len();
        self.heap.extend_from_slice(s.as_bytes());
        self.heap.push(0);
        addr
    }

    fn words(&mut self, words: &[usize]) -> usize {
        while self.heap.len() % 8 != 0 {
            self.heap.push(0);
        }
        let addr = HEAP + self.heap.len();
        for word in words {
            self.heap.extend_from_slice(&word.to_ne_bytes());
        }
        addr
    }

    /// `_start -> main -> parse -> compute -> tracer`
    fn sample() -> Self {
        let mut process = Process::new();
        process.frame(TRACER_FP, COMPUTE_FP, COMPUTE + 0x24);
        process.frame(COMPUTE_FP, PARSE_FP, PARSE + 0x51);
        process.frame(PARSE_FP, MAIN_FP, MAIN + 0x9a);
        process.frame(MAIN_FP, START_FP, START + 0x2e);
        process.frame(START_FP, 0, 0);

        process.put(COMPUTE_FP + 16, &1.25f64.to_ne_bytes());
        process.put(COMPUTE_FP + 24, &0xbeef_usize.to_ne_bytes());

        let input = process.cstr("key=value");
        process.put(PARSE_FP + 16, &input.to_ne_bytes());
        process.put(PARSE_FP + 24, b"=");

        let prog = process.cstr("./app");
        let flag = process.cstr("--verbose");
        let argv = process.words(&[prog, flag, 0]);
        process.put(MAIN_FP + 16, &2i32.to_ne_bytes());
        process.put(MAIN_FP + 24, &argv.to_ne_bytes());

        process
    }

    fn trace(&self, config: TraceConfig<'_>) -> (String, uwutrace::TraceSummary) {
        let table = SymbolTable::new(FUNCTIONS).unwrap();
        self.trace_with(&table, config)
    }

    fn trace_with(
        &self,
        table: &SymbolTable<'_>,
        config: TraceConfig<'_>,
    ) -> (String, uwutrace::TraceSummary) {
        let regions = [
            Region::new(STACK, &self.stack),
            Region::new(HEAP, &self.heap),
        ];
        let memory = SnapshotMemory::new(&regions);
        let mut out = String::new();
        let summary = Tracer::new(table)
            .with_config(config)
            .trace_from(TRACER_FP, &memory, &mut out)
            .unwrap();
        (out, summary)
    }
}

#[test]
fn traces_the_chain_up_to_the_entry_symbol() {
    let (out, summary) = Process::sample().trace(TraceConfig::default());

    assert_eq!(
        out,
        "Function compute(double x=1.250000, void *ctx=0vbeef), in\n\
         Function parse(char *input=\"key=value\", char sep='='), in\n\
         Function main(int argc=2, char **argv={\"./app\", \"--verbose\"}), in\n"
    );
    assert_eq!(summary.frames, 3);
    assert_eq!(summary.end, TraceEnd::Done(WalkEnd::EntrySymbol));
}

#[test]
fn without_an_entry_symbol_the_null_frame_ends_the_walk() {
    let config = TraceConfig::default().entry_symbol(None);
    let (out, summary) = Process::sample().trace(config);

    assert_eq!(out.lines().count(), 4);
    assert_eq!(out.lines().last(), Some("Function _start(void), in"));
    assert_eq!(summary.end, TraceEnd::Done(WalkEnd::RootFrame));
}

#[test]
fn null_frame_before_the_entry_symbol_ends_the_walk() {
    let mut process = Process::sample();
    process.frame(MAIN_FP, 0, START + 0x2e);

    let (out, summary) = process.trace(TraceConfig::default());

    assert_eq!(out.lines().count(), 3);
    assert_eq!(summary.end, TraceEnd::Done(WalkEnd::RootFrame));
}

#[test]
fn unknown_return_addresses_are_printed_raw() {
    let mut process = Process::sample();
    process.frame(COMPUTE_FP, PARSE_FP, 0x7f00_dead_beef);

    let (out, summary) = process.trace(TraceConfig::default());
    let lines: Vec<_> = out.lines().collect();

    assert_eq!(lines[1], "Function 0x7f00deadbeef(...), in");
    assert_eq!(lines.len(), 3);
    assert_eq!(summary.frames, 3);
}

#[test]
fn addresses_past_the_function_size_bound_are_unknown() {
    let table = SymbolTable::new(FUNCTIONS)
        .unwrap()
        .with_max_function_size(0x30);
    let (out, _) = Process::sample().trace_with(&table, TraceConfig::default());
    let lines: Vec<_> = out.lines().collect();

    assert!(lines[0].starts_with("Function compute("));
    assert_eq!(lines[1], format!("Function {:#x}(...), in", PARSE + 0x51));
    assert_eq!(lines[2], format!("Function {:#x}(...), in", MAIN + 0x9a));
}

#[test]
fn corrupted_chain_is_fatal() {
    let mut process = Process::sample();
    // parse's record points back down the stack
    process.frame(PARSE_FP, COMPUTE_FP, MAIN + 0x9a);

    let (out, summary) = process.trace(TraceConfig::default());

    assert_eq!(
        out,
        "Function compute(double x=1.250000, void *ctx=0vbeef), in\n\
         Function parse(char *input=\"key=value\", char sep='='), in\n\
         FATAL: Stack Wrong!\n"
    );
    assert_eq!(summary.end, TraceEnd::Corrupted);
}

#[test]
fn unreadable_records_end_the_walk_quietly() {
    let mut process = Process::sample();
    process.frame(PARSE_FP, 0x1000_0000_0000, MAIN + 0x9a);

    let (out, summary) = process.trace(TraceConfig::default());

    // main's line still comes from parse's record
    assert_eq!(out.lines().count(), 3);
    assert_eq!(summary.end, TraceEnd::Done(WalkEnd::Unreadable));
}

#[test]
fn depth_limit() {
    let config = TraceConfig::default().max_depth(1);
    let (out, summary) = Process::sample().trace(config);

    assert_eq!(out.lines().count(), 1);
    assert_eq!(summary.end, TraceEnd::Done(WalkEnd::DepthLimit));
}

#[test]
fn tracing_twice_gives_the_same_output() {
    let process = Process::sample();
    let (first, _) = process.trace(TraceConfig::default());
    let (second, _) = process.trace(TraceConfig::default());
    assert_eq!(first, second);
}

#[test]
fn frames_strictly_grow_towards_callers() {
    let mut process = Process::sample();
    process.frame(TRACER_FP, TRACER_FP, COMPUTE + 0x24);

    let (out, summary) = process.trace(TraceConfig::default());
    assert_eq!(out, "FATAL: Stack Wrong!\n");
    assert_eq!(summary.frames, 0);
}

struct Broken;

impl fmt::Write for Broken {
    fn write_str(&mut self, _: &str) -> fmt::Result {
        Err(fmt::Error)
    }
}

#[test]
fn output_errors_are_reported() {
    let process = Process::sample();
    let regions = [Region::new(STACK, &process.stack)];
    let memory = SnapshotMemory::new(&regions);
    let table = SymbolTable::new(FUNCTIONS).unwrap();

    let err = Tracer::new(&table)
        .trace_from(TRACER_FP, &memory, &mut Broken)
        .unwrap_err();
    assert_eq!(err, TraceError::Output);
}
