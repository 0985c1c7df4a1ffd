//! Typed reads from addresses that may or may not be mapped.

use core::mem::{size_of, MaybeUninit};

/// The address (or part of the range behind it) can't be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("address is not readable")]
pub struct Unreadable;

/// Types that can be produced from any sequence of bytes.
///
/// # Safety
/// Every bit pattern of `size_of::<Self>()` bytes must be a valid `Self`.
pub unsafe trait Plain: Copy {}

macro_rules! plain {
    ($($ty:ty),*) => {
        $(unsafe impl Plain for $ty {})*
    };
}

plain!(u8, i8, u16, i16, u32, i32, u64, i64, usize, isize, f32, f64);

/// A view of some address space.
///
/// This is the only place where foreign addresses are turned into values.
/// Implementations must never fault, whatever address they are handed.
pub trait Memory {
    /// Fills `buf` with the bytes starting at `addr`.
    fn read_bytes(&self, addr: usize, buf: &mut [u8]) -> Result<(), Unreadable>;

    fn read<T: Plain>(&self, addr: usize) -> Result<T, Unreadable>
    where
        Self: Sized,
    {
        let mut value = MaybeUninit::<T>::zeroed();
        // SAFETY: the buffer covers exactly the (zeroed) storage of `value`.
        let buf = unsafe {
            core::slice::from_raw_parts_mut(value.as_mut_ptr().cast::<u8>(), size_of::<T>())
        };
        self.read_bytes(addr, buf)?;
        // SAFETY: T is Plain, any bytes are a valid T.
        Ok(unsafe { value.assume_init() })
    }

    fn is_readable(&self, addr: usize) -> bool
    where
        Self: Sized,
    {
        self.read::<u8>(addr).is_ok()
    }
}

impl<M: Memory> Memory for &M {
    fn read_bytes(&self, addr: usize, buf: &mut [u8]) -> Result<(), Unreadable> {
        (**self).read_bytes(addr, buf)
    }
}

/// Bytes that were captured from `base` onwards.
#[derive(Debug, Clone, Copy)]
pub struct Region<'a> {
    pub base: usize,
    pub bytes: &'a [u8],
}

impl<'a> Region<'a> {
    pub const fn new(base: usize, bytes: &'a [u8]) -> Self {
        Self { base, bytes }
    }

    fn get(&self, addr: usize, len: usize) -> Option<&'a [u8]> {
        let start = addr.checked_sub(self.base)?;
        let end = start.checked_add(len)?;
        self.bytes.get(start..end)
    }
}

/// [`Memory`] over captured regions, for example a copy of a stack and the
/// strings it points to. Everything outside the regions is unreadable.
///
/// A read has to fit into a single region.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotMemory<'a> {
    regions: &'a [Region<'a>],
}

impl<'a> SnapshotMemory<'a> {
    pub const fn new(regions: &'a [Region<'a>]) -> Self {
        Self { regions }
    }
}

impl Memory for SnapshotMemory<'_> {
    fn read_bytes(&self, addr: usize, buf: &mut [u8]) -> Result<(), Unreadable> {
        let bytes = self
            .regions
            .iter()
            .find_map(|region| region.get(addr, buf.len()))
            .ok_or(Unreadable)?;
        buf.copy_from_slice(bytes);
        Ok(())
    }
}
