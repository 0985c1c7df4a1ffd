//! The hand-built table return addresses are resolved against.

use crate::error::TableError;

/// Return addresses further than this past the start of the closest function
/// are treated as belonging to code that isn't in the table.
pub const DEFAULT_MAX_FUNCTION_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    Char,
    Int,
    Float,
    Double,
    /// `char *`
    Str,
    /// `char **`, terminated by a null pointer.
    StrArray,
    /// `void *`
    VoidPtr,
    Unknown,
}

/// One formal parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgSymbol<'a> {
    pub name: &'a str,
    pub ty: ArgType,
    /// Byte offset of the argument from the frame pointer of the function.
    pub offset: isize,
}

impl<'a> ArgSymbol<'a> {
    pub const fn new(name: &'a str, ty: ArgType, offset: isize) -> Self {
        Self { name, ty, offset }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionSymbol<'a> {
    pub name: &'a str,
    /// First code address of the function.
    pub addr: usize,
    pub args: &'a [ArgSymbol<'a>],
}

impl<'a> FunctionSymbol<'a> {
    pub const fn new(name: &'a str, addr: usize, args: &'a [ArgSymbol<'a>]) -> Self {
        Self { name, addr, args }
    }

    /// The arguments in declaration order. A fixed size argument array can end
    /// early with an empty-named slot, nothing after it counts.
    pub fn args(&self) -> &'a [ArgSymbol<'a>] {
        let len = self
            .args
            .iter()
            .position(|arg| arg.name.is_empty())
            .unwrap_or(self.args.len());
        &self.args[..len]
    }
}

/// Functions sorted by start address.
#[derive(Debug, Clone, Copy)]
pub struct SymbolTable<'a> {
    functions: &'a [FunctionSymbol<'a>],
    max_function_size: usize,
}

impl<'a> SymbolTable<'a> {
    /// Takes the functions up to the first one with an empty name. They must
    /// be sorted by strictly ascending address and have distinct names.
    pub fn new(functions: &'a [FunctionSymbol<'a>]) -> Result<Self, TableError> {
        let len = functions
            .iter()
            .position(|f| f.name.is_empty())
            .unwrap_or(functions.len());
        let functions = &functions[..len];

        for (index, pair) in functions.windows(2).enumerate() {
            if pair[0].addr >= pair[1].addr {
                return Err(TableError::Unsorted { index: index + 1 });
            }
        }
        for (index, f) in functions.iter().enumerate() {
            if functions[..index].iter().any(|other| other.name == f.name) {
                return Err(TableError::DuplicateName { index });
            }
        }

        Ok(Self {
            functions,
            max_function_size: DEFAULT_MAX_FUNCTION_SIZE,
        })
    }

    pub fn with_max_function_size(mut self, size: usize) -> Self {
        self.max_function_size = size;
        self
    }

    pub fn max_function_size(&self) -> usize {
        self.max_function_size
    }

    /// Index of the function `addr` points into: the one with the greatest
    /// start address not above `addr`, as long as `addr` isn't implausibly
    /// far past that start.
    pub fn resolve(&self, addr: usize) -> Option<usize> {
        let index = self
            .functions
            .partition_point(|f| f.addr <= addr)
            .checked_sub(1)?;
        let start = self.functions[index].addr;
        (addr - start <= self.max_function_size).then_some(index)
    }

    pub fn lookup(&self, addr: usize) -> Option<&'a FunctionSymbol<'a>> {
        self.resolve(addr).map(|index| &self.functions[index])
    }

    pub fn get(&self, index: usize) -> Option<&'a FunctionSymbol<'a>> {
        self.functions.get(index)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a FunctionSymbol<'a>> {
        self.functions.iter()
    }
}
