//! A frame pointer stack tracer for x86_64 linux.
//!
//! Starting at its own frame, the tracer follows the `rbp` chain outwards,
//! resolves every return address against a hand-built [`SymbolTable`] and
//! prints each frame together with its typed arguments:
//!
//! ```text
//! Function leaf(char *name="uwu", int n=3), in
//! Function middle(void), in
//! Function 0x55d0c0ffee42(...), in
//! ```
//!
//! Every address the tracer dereferences goes through a [`Memory`], and the
//! live one ([`probe::LiveMemory`]) validates each read first, so a garbage
//! pointer shows up as a raw address instead of taking the process down.
#![cfg_attr(not(test), no_std)]

#[cfg(not(all(target_arch = "x86_64", target_os = "linux")))]
compile_error!("uwutrace only knows how to walk x86_64 linux frame pointer chains");

#[macro_use]
extern crate tracing;

mod arch;
mod stdext;

pub mod config;
pub mod error;
pub mod memory;
pub mod probe;
pub mod render;
pub mod symbols;
mod trace;
pub mod walk;

pub use config::{ProbeStrategy, TraceConfig};
pub use error::{TableError, TraceError};
pub use memory::{Memory, Region, SnapshotMemory, Unreadable};
pub use stdext::FdWriter;
pub use symbols::{ArgSymbol, ArgType, FunctionSymbol, SymbolTable};
pub use trace::{traceback, TraceEnd, TraceSummary, Tracer};
pub use walk::{RawFrame, WalkEnd};
