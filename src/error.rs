use core::fmt;

/// Why a trace could not be carried out.
///
/// Bad memory and broken frame chains are not errors, they end up in the
/// trace output. These are the conditions that stop a trace before (or while)
/// anything is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TraceError {
    /// Setting up the address validator failed.
    #[error("failed to set up the address probe: {call} failed with errno {errno}")]
    ProbeSetup { call: &'static str, errno: i32 },
    /// Another trace is currently using the process wide fault handler.
    #[error("another trace is already running with the fault probe installed")]
    Busy,
    /// The output stream refused a write.
    #[error("failed to write the trace output")]
    Output,
}

impl From<fmt::Error> for TraceError {
    fn from(_: fmt::Error) -> Self {
        TraceError::Output
    }
}

/// The function descriptors handed to [`SymbolTable::new`](crate::SymbolTable::new)
/// can't be used for lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    /// Descriptors must be sorted by strictly ascending start address.
    #[error("function #{index} does not start after its predecessor")]
    Unsorted { index: usize },
    /// Two descriptors share a name.
    #[error("function #{index} reuses the name of an earlier function")]
    DuplicateName { index: usize },
}
