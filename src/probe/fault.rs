//! Validating reads by surviving the fault.
//!
//! While a [`FaultProbe`] exists, `SIGSEGV` and `SIGBUS` go to [`on_fault`].
//! Bytes are loaded by one known instruction in [`arch::probe_byte`]. If that
//! instruction faults while the checkpoint is armed, the handler moves the
//! saved instruction pointer onto the probe's fixup path and returns, so the
//! read reports failure as an ordinary return value. Every other fault is
//! handed to whatever handled it before.

use core::cell::UnsafeCell;
use core::ffi;
use core::marker::PhantomData;
use core::mem::{self, MaybeUninit};
use core::ptr;
use core::sync::atomic::{compiler_fence, AtomicBool, Ordering};

use crate::arch;
use crate::error::TraceError;
use crate::memory::{Memory, Unreadable};
use crate::stdext::{errno, with_os_error_str};

const SIGNALS: [ffi::c_int; 2] = [libc::SIGSEGV, libc::SIGBUS];

/// Set while a probe is installed. There is only one handler slot per
/// process.
static INSTALLED: AtomicBool = AtomicBool::new(false);
/// The checkpoint: set right before a probe load and cleared right after.
static ARMED: AtomicBool = AtomicBool::new(false);

struct SavedActions(UnsafeCell<MaybeUninit<[libc::sigaction; 2]>>);

// SAFETY: only written by the owner of INSTALLED before the handler is
// installed, only read by the handler while it is installed.
unsafe impl Sync for SavedActions {}

static SAVED: SavedActions = SavedActions(UnsafeCell::new(MaybeUninit::uninit()));

fn saved_action(index: usize) -> *mut libc::sigaction {
    // SAFETY: index is always < SIGNALS.len()
    unsafe { (*SAVED.0.get()).as_mut_ptr().cast::<libc::sigaction>().add(index) }
}

#[derive(Debug)]
pub struct FaultProbe {
    /// How many of `SIGNALS` currently point at our handler.
    installed: usize,
    /// The thread's signal mask before we unblocked the fault signals.
    old_mask: Option<libc::sigset_t>,
    // the signal mask is per thread, so restoring has to happen on this one
    _not_send: PhantomData<*const ()>,
}

impl FaultProbe {
    pub fn install() -> Result<Self, TraceError> {
        if INSTALLED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("fault probe is already installed by another trace");
            return Err(TraceError::Busy);
        }

        // from here on, dropping `probe` undoes whatever got done
        let mut probe = FaultProbe {
            installed: 0,
            old_mask: None,
            _not_send: PhantomData,
        };

        unsafe {
            for (i, &sig) in SIGNALS.iter().enumerate() {
                if libc::sigaction(sig, ptr::null(), saved_action(i)) != 0 {
                    return Err(setup_error("sigaction"));
                }
            }

            let mut action: libc::sigaction = mem::zeroed();
            action.sa_sigaction = on_fault as usize;
            action.sa_flags = libc::SA_SIGINFO | libc::SA_ONSTACK;
            // nothing else is blocked while the handler runs
            libc::sigemptyset(&mut action.sa_mask);

            for &sig in &SIGNALS {
                if libc::sigaction(sig, &action, ptr::null_mut()) != 0 {
                    return Err(setup_error("sigaction"));
                }
                probe.installed += 1;
            }

            let mut unblock: libc::sigset_t = mem::zeroed();
            libc::sigemptyset(&mut unblock);
            for &sig in &SIGNALS {
                libc::sigaddset(&mut unblock, sig);
            }
            let mut old_mask: libc::sigset_t = mem::zeroed();
            let ret = libc::pthread_sigmask(libc::SIG_UNBLOCK, &unblock, &mut old_mask);
            if ret != 0 {
                with_os_error_str(ret, |err| error!("pthread_sigmask failed: {err}"));
                return Err(TraceError::ProbeSetup {
                    call: "pthread_sigmask",
                    errno: ret,
                });
            }
            probe.old_mask = Some(old_mask);
        }

        debug!("installed fault probe handler");
        Ok(probe)
    }
}

fn setup_error(call: &'static str) -> TraceError {
    let errno = errno();
    with_os_error_str(errno, |err| error!("{call} failed: {err}"));
    TraceError::ProbeSetup { call, errno }
}

impl Memory for FaultProbe {
    fn read_bytes(&self, addr: usize, buf: &mut [u8]) -> Result<(), Unreadable> {
        if addr.checked_add(buf.len()).is_none() {
            return Err(Unreadable);
        }
        for (i, byte) in buf.iter_mut().enumerate() {
            ARMED.store(true, Ordering::Relaxed);
            compiler_fence(Ordering::SeqCst);
            // SAFETY: our handler is installed (we exist) and armed.
            let value = unsafe { arch::probe_byte(addr + i) };
            compiler_fence(Ordering::SeqCst);
            ARMED.store(false, Ordering::Relaxed);

            *byte = value.ok_or(Unreadable)?;
        }
        Ok(())
    }
}

impl Drop for FaultProbe {
    fn drop(&mut self) {
        unsafe {
            if let Some(old_mask) = self.old_mask.take() {
                libc::pthread_sigmask(libc::SIG_SETMASK, &old_mask, ptr::null_mut());
            }
            for (i, &sig) in SIGNALS.iter().enumerate().take(self.installed) {
                libc::sigaction(sig, saved_action(i), ptr::null_mut());
            }
        }
        ARMED.store(false, Ordering::Relaxed);
        INSTALLED.store(false, Ordering::Release);
        debug!("restored previous fault handlers");
    }
}

extern "C" fn on_fault(sig: ffi::c_int, info: *mut libc::siginfo_t, ctx: *mut ffi::c_void) {
    // SAFETY: SA_SIGINFO handlers get a ucontext_t as their third argument.
    unsafe {
        let uc = &mut *ctx.cast::<libc::ucontext_t>();
        let rip = &mut uc.uc_mcontext.gregs[libc::REG_RIP as usize];
        if ARMED.load(Ordering::Relaxed) && *rip as usize == arch::probe_load_addr() {
            *rip = arch::probe_fixup_addr() as libc::greg_t;
            return;
        }
        chain(sig, info, ctx);
    }
}

/// Not our fault, give it to the previous disposition.
unsafe fn chain(sig: ffi::c_int, info: *mut libc::siginfo_t, ctx: *mut ffi::c_void) {
    let Some(index) = SIGNALS.iter().position(|&s| s == sig) else {
        return;
    };
    let previous = &*saved_action(index);
    let handler = previous.sa_sigaction;

    if handler == libc::SIG_DFL || handler == libc::SIG_IGN {
        // The faulting instruction runs again after we return and this time
        // the kernel applies the default action. A synchronous fault can't be
        // ignored anyway.
        let mut default: libc::sigaction = mem::zeroed();
        default.sa_sigaction = libc::SIG_DFL;
        libc::sigaction(sig, &default, ptr::null_mut());
    } else if previous.sa_flags & libc::SA_SIGINFO != 0 {
        let handler: extern "C" fn(ffi::c_int, *mut libc::siginfo_t, *mut ffi::c_void) =
            mem::transmute(handler);
        handler(sig, info, ctx);
    } else {
        let handler: extern "C" fn(ffi::c_int) = mem::transmute(handler);
        handler(sig);
    }
}
