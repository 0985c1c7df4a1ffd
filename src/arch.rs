use core::arch::{asm, global_asm};

/// Size of one stack slot. The return address sits one word above the saved
/// frame pointer.
pub(crate) const WORD: usize = core::mem::size_of::<usize>();

/// Reads `rbp`. Must be inlined so the value is the frame of the function
/// that calls this, not a frame of its own.
#[inline(always)]
pub(crate) fn get_rbp() -> usize {
    let mut out: usize;
    unsafe {
        asm!(
            "mov {out}, rbp",
            out = out(reg) out,
            options(nomem, nostack, preserves_flags)
        );
    }
    out
}

// Byte probe used by the fault recovering probe.
//
// `uwutrace_probe_byte(addr, out)` loads one byte from `addr` into `out` and
// returns 0. The load is the only instruction that may fault. When it does,
// the signal handler moves the saved rip to `uwutrace_probe_byte_fixup`,
// which returns 1 without having touched `out`.
global_asm!(
    ".pushsection .text.uwutrace_probe_byte,\"ax\",@progbits",
    ".globl uwutrace_probe_byte",
    ".globl uwutrace_probe_byte_load",
    ".globl uwutrace_probe_byte_fixup",
    ".hidden uwutrace_probe_byte",
    ".hidden uwutrace_probe_byte_load",
    ".hidden uwutrace_probe_byte_fixup",
    ".p2align 4",
    "uwutrace_probe_byte:",
    "    xor eax, eax",
    "uwutrace_probe_byte_load:",
    "    movzx ecx, byte ptr [rdi]",
    "    mov byte ptr [rsi], cl",
    "    ret",
    "uwutrace_probe_byte_fixup:",
    "    mov eax, 1",
    "    ret",
    ".popsection",
);

extern "C" {
    fn uwutrace_probe_byte(addr: *const u8, out: *mut u8) -> u32;
    fn uwutrace_probe_byte_load();
    fn uwutrace_probe_byte_fixup();
}

/// Address of the faulting load inside the byte probe.
pub(crate) fn probe_load_addr() -> usize {
    uwutrace_probe_byte_load as usize
}

/// Address execution resumes at when the probe load faulted.
pub(crate) fn probe_fixup_addr() -> usize {
    uwutrace_probe_byte_fixup as usize
}

/// Loads the byte at `addr`.
///
/// # Safety
/// A fault recovering signal handler must be installed and armed, otherwise
/// an invalid `addr` kills the process.
pub(crate) unsafe fn probe_byte(addr: usize) -> Option<u8> {
    let mut out = 0u8;
    let failed = uwutrace_probe_byte(addr as *const u8, &mut out);
    (failed == 0).then_some(out)
}
