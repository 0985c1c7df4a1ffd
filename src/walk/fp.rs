//! Frame pointer walker.
//!
//! Every frame made with `push rbp; mov rbp, rsp` stores the caller's `rbp`
//! at `[rbp]` and the return address at `[rbp + 8]`. Starting from one frame
//! pointer, the whole chain can be followed up to the outermost frame, whose
//! saved frame pointer is null.

use super::{RawFrame, WalkEnd, WalkState};
use crate::arch::WORD;
use crate::memory::Memory;

pub struct FrameWalker<'m, M> {
    memory: &'m M,
    current_fp: usize,
    depth: usize,
    max_depth: usize,
    state: WalkState,
}

impl<'m, M: Memory> FrameWalker<'m, M> {
    pub fn new(memory: &'m M, fp: usize, max_depth: usize) -> Self {
        Self {
            memory,
            current_fp: fp,
            depth: 0,
            max_depth,
            state: WalkState::Walking,
        }
    }

    pub fn state(&self) -> WalkState {
        self.state
    }

    /// Ends the walk from the outside, for example when the caller recognised
    /// the outermost frame by its symbol.
    pub fn finish(&mut self, end: WalkEnd) {
        if self.state == WalkState::Walking {
            self.state = WalkState::Done(end);
        }
    }

    fn step(&mut self) -> Result<RawFrame, WalkState> {
        if self.depth >= self.max_depth {
            return Err(WalkState::Done(WalkEnd::DepthLimit));
        }

        let fp = self.current_fp;
        let record = |offset| {
            fp.checked_add(offset)
                .ok_or(crate::memory::Unreadable)
                .and_then(|addr| self.memory.read::<usize>(addr))
        };
        let (Ok(saved_fp), Ok(return_addr)) = (record(0), record(WORD)) else {
            return Err(WalkState::Done(WalkEnd::Unreadable));
        };

        if saved_fp == 0 {
            return Err(WalkState::Done(WalkEnd::RootFrame));
        }
        // callers live at higher addresses
        if fp >= saved_fp {
            return Err(WalkState::Fatal);
        }

        Ok(RawFrame {
            fp,
            saved_fp,
            return_addr,
        })
    }
}

impl<M: Memory> Iterator for FrameWalker<'_, M> {
    type Item = RawFrame;

    fn next(&mut self) -> Option<RawFrame> {
        if self.state != WalkState::Walking {
            return None;
        }

        match self.step() {
            Ok(frame) => {
                trace!(
                    fp = format_args!("{:#x}", frame.fp),
                    saved_fp = format_args!("{:#x}", frame.saved_fp),
                    return_addr = format_args!("{:#x}", frame.return_addr),
                    "walk..."
                );
                self.current_fp = frame.saved_fp;
                self.depth += 1;
                Some(frame)
            }
            Err(state) => {
                trace!(?state, depth = self.depth, "walk ended");
                self.state = state;
                None
            }
        }
    }
}
