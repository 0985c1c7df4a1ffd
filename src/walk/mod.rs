//! Following the chain of saved frame pointers.

mod fp;

pub use fp::FrameWalker;

/// One activation record, seen from the frame pointer that points at it.
///
/// ```text
///              |       ...        |  higher addresses, callers
///  fp + 16  -> | stack arguments  |
///  fp + 8   -> | return_addr      |  into the function that owns saved_fp
///  fp       -> | saved_fp         |
///              |       ...        |  lower addresses, callees
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame {
    pub fp: usize,
    /// Frame pointer of the caller. Its arguments are found relative to this.
    pub saved_fp: usize,
    /// Where the caller continues, so somewhere inside the caller.
    pub return_addr: usize,
}

/// Why a walk ended normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkEnd {
    /// The saved frame pointer was null, the outermost frame was reached.
    RootFrame,
    /// The frame record couldn't be read.
    Unreadable,
    /// A frame belonged to the configured entry symbol.
    EntrySymbol,
    /// The configured maximum depth was reached.
    DepthLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    Walking,
    Done(WalkEnd),
    /// The chain doesn't move strictly towards higher addresses, it can't be
    /// trusted any further.
    Fatal,
}
