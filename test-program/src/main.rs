use std::ffi::c_char;
use std::hint::black_box;
use std::ptr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uwutrace::{
    ArgSymbol, ArgType, FdWriter, FunctionSymbol, ProbeStrategy, SymbolTable, TraceConfig, Tracer,
};

const GREET_ARGS: &[ArgSymbol<'static>] = &[
    ArgSymbol::new("name", ArgType::Str, 16),
    ArgSymbol::new("argv", ArgType::StrArray, 24),
    ArgSymbol::new("times", ArgType::Int, 32),
    ArgSymbol::new("cookie", ArgType::VoidPtr, 40),
];

// Six register arguments, so everything after them is passed on the stack
// where the tracer can find it.
#[inline(never)]
#[allow(clippy::too_many_arguments, improper_ctypes_definitions)]
extern "C" fn greet(
    tracer: *const Tracer<'_>,
    _a: i64,
    _b: i64,
    _c: i64,
    _d: i64,
    _e: i64,
    name: *const c_char,
    argv: *const *const c_char,
    times: i32,
    cookie: *const u8,
) {
    let tracer = unsafe { &*tracer };
    let mut stdout = FdWriter::STDOUT;
    if let Err(err) = tracer.traceback(&mut stdout) {
        eprintln!("traceback failed: {err}");
    }
    black_box((name, argv, times, cookie));
}

#[inline(never)]
fn run(tracer: &Tracer<'_>) {
    let argv = [
        c"uwu".as_ptr(),
        c"owo".as_ptr(),
        c"nya".as_ptr(),
        c"mrrp".as_ptr(),
        ptr::null(),
    ];
    let cookie = 0xc0ffee as *const u8;
    greet(
        tracer,
        1,
        2,
        3,
        4,
        5,
        c"a string that is too long to print in full".as_ptr(),
        argv.as_ptr(),
        3,
        cookie,
    );
    black_box(argv);
}

fn main() {
    let registry = tracing_subscriber::Registry::default().with(
        EnvFilter::builder()
            .with_default_directive(tracing::Level::INFO.into())
            .from_env()
            .unwrap(),
    );

    let tree_layer = tracing_tree::HierarchicalLayer::new(2)
        .with_targets(true)
        .with_bracketed_fields(true);

    registry.with(tree_layer).init();

    let probe = match std::env::var("UWUTRACE_PROBE") {
        Ok(probe) => probe.parse().unwrap_or_else(|err| {
            eprintln!("UWUTRACE_PROBE: {err}");
            std::process::exit(2);
        }),
        Err(_) => ProbeStrategy::default(),
    };

    let mut functions = vec![
        FunctionSymbol::new("greet", greet as usize, GREET_ARGS),
        FunctionSymbol::new("run", run as usize, &[]),
        FunctionSymbol::new("main", main as usize, &[]),
    ];
    functions.sort_by_key(|f| f.addr);
    let table = SymbolTable::new(&functions).unwrap();

    let tracer = Tracer::new(&table).with_config(
        TraceConfig::default()
            .probe(probe)
            // std's runtime frames are not in the table
            .entry_symbol(Some("main")),
    );
    run(&tracer);
}
