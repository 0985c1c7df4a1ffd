//! Printing a frame's arguments according to their descriptors.
//!
//! Pointers are followed only through [`Memory`], anything that can't be read
//! or doesn't look like text is printed as its raw address instead.


use core::fmt::{self, Write};

use crate::arch::WORD;
use crate::config::TraceConfig;
use crate::memory::{Memory, Plain, Unreadable};
use crate::symbols::{ArgSymbol, ArgType, FunctionSymbol};

/// Size of the buffer holding the printed part of a string argument.
pub const MAX_STRING_CAPACITY: usize = 64;
/// Most string array elements that can be printed.
pub const MAX_ARRAY_CAPACITY: usize = 16;

fn is_printable(byte: u8) -> bool {
    (0x20..=0x7e).contains(&byte)
}

fn write_raw<W: Write>(out: &mut W, addr: usize) -> fmt::Result {
    write!(out, "{addr:#x}")
}

pub struct ArgRenderer<'m, M> {
    memory: &'m M,
    max_string_len: usize,
    max_array_len: usize,
}

impl<'m, M: Memory> ArgRenderer<'m, M> {
    pub fn new(memory: &'m M, config: &TraceConfig<'_>) -> Self {
        Self {
            memory,
            max_string_len: config.max_string_len.min(MAX_STRING_CAPACITY),
            max_array_len: config.max_array_len.min(MAX_ARRAY_CAPACITY),
        }
    }

    /// Writes the comma separated argument list of `function`, whose frame
    /// pointer is `fp`, or `void` if it takes none.
    pub fn render<W: Write>(
        &self,
        out: &mut W,
        function: &FunctionSymbol<'_>,
        fp: usize,
    ) -> fmt::Result {
        let args = function.args();
        if args.is_empty() {
            return out.write_str("void");
        }

        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                out.write_str(", ")?;
            }
            self.render_arg(out, arg, fp.wrapping_add_signed(arg.offset))?;
        }
        Ok(())
    }

    fn render_arg<W: Write>(&self, out: &mut W, arg: &ArgSymbol<'_>, addr: usize) -> fmt::Result {
        let name = arg.name;
        match arg.ty {
            ArgType::Char => {
                write!(out, "char {name}=")?;
                self.with_value(out, addr, |out, c: u8| {
                    if is_printable(c) {
                        write!(out, "'{}'", c as char)
                    } else {
                        write!(out, "'\\{c:o}'")
                    }
                })
            }
            ArgType::Int => {
                write!(out, "int {name}=")?;
                self.with_value(out, addr, |out, v: i32| write!(out, "{v}"))
            }
            ArgType::Float => {
                write!(out, "float {name}=")?;
                self.with_value(out, addr, |out, v: f32| write!(out, "{v:.6}"))
            }
            ArgType::Double => {
                write!(out, "double {name}=")?;
                self.with_value(out, addr, |out, v: f64| write!(out, "{v:.6}"))
            }
            ArgType::Str => {
                write!(out, "char *{name}=")?;
                self.with_value(out, addr, |out, ptr: usize| self.render_string(out, ptr))
            }
            ArgType::StrArray => {
                write!(out, "char **{name}=")?;
                self.with_value(out, addr, |out, ptr: usize| {
                    self.render_string_array(out, ptr)
                })
            }
            ArgType::VoidPtr => {
                write!(out, "void *{name}=")?;
                self.with_value(out, addr, |out, ptr: usize| write!(out, "0v{ptr:x}"))
            }
            ArgType::Unknown => {
                write!(out, "UNKNOWN {name}=")?;
                self.with_value(out, addr, |out, word: usize| write_raw(out, word))
            }
        }
    }

    /// Reads the argument slot and hands the value to `f`, or prints the
    /// slot's address if it can't be read.
    fn with_value<T: Plain, W: Write>(
        &self,
        out: &mut W,
        addr: usize,
        f: impl FnOnce(&mut W, T) -> fmt::Result,
    ) -> fmt::Result {
        match self.memory.read::<T>(addr) {
            Ok(value) => f(out, value),
            Err(Unreadable) => write_raw(out, addr),
        }
    }

    fn render_string<W: Write>(&self, out: &mut W, ptr: usize) -> fmt::Result {
        let mut prefix = [0u8; MAX_STRING_CAPACITY];
        let Some(len) = self.scan_string(ptr, &mut prefix) else {
            return write_raw(out, ptr);
        };

        let shown = len.min(self.max_string_len);
        out.write_char('"')?;
        for &byte in &prefix[..shown] {
            out.write_char(byte as char)?;
        }
        if len > shown {
            out.write_str("...")?;
        }
        out.write_char('"')
    }

    /// Length of the NUL terminated string at `ptr` if every byte of it can be
    /// read and is printable. The first bytes are copied into `prefix`.
    fn scan_string(&self, ptr: usize, prefix: &mut [u8]) -> Option<usize> {
        if ptr == 0 {
            return None;
        }

        let mut len = 0;
        loop {
            let byte = self.memory.read::<u8>(ptr.checked_add(len)?).ok()?;
            if byte == 0 {
                return Some(len);
            }
            if !is_printable(byte) {
                return None;
            }
            if let Some(slot) = prefix.get_mut(len) {
                *slot = byte;
            }
            len += 1;
        }
    }

    fn render_string_array<W: Write>(&self, out: &mut W, array: usize) -> fmt::Result {
        if array == 0 {
            return write_raw(out, 0);
        }

        // one more slot than we print, to know whether there is more
        let mut elements = [0usize; MAX_ARRAY_CAPACITY + 1];
        let mut count = 0;
        for (i, element) in elements[..=self.max_array_len].iter_mut().enumerate() {
            let slot = match array.checked_add(i * WORD) {
                Some(slot) => self.memory.read::<usize>(slot),
                None => Err(Unreadable),
            };
            match slot {
                Ok(0) => break,
                Ok(ptr) => {
                    *element = ptr;
                    count += 1;
                }
                Err(Unreadable) => return write_raw(out, array),
            }
        }

        let shown = count.min(self.max_array_len);
        out.write_char('{')?;
        for (i, &ptr) in elements[..shown].iter().enumerate() {
            if i > 0 {
                out.write_str(", ")?;
            }
            self.render_string(out, ptr)?;
        }
        if count > shown {
            if shown > 0 {
                out.write_str(", ")?;
            }
            out.write_str("...")?;
        }
        out.write_char('}')
    }
}
