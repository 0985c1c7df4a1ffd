//! Validating reads by letting the kernel do them.
//!
//! `write(2)` copies the source buffer out of our address space. If any of it
//! isn't mapped, the kernel doesn't fault us, it returns `EFAULT`. So every
//! read goes into a pipe first and is drained back out into the caller's
//! buffer. `/dev/null` would be cheaper, but its write never looks at the
//! buffer and would call everything readable.

use core::ffi;

use crate::error::TraceError;
use crate::memory::{Memory, Unreadable};
use crate::stdext::{errno, with_os_error_str};

/// Largest read done with a single write. Well below `PIPE_BUF`, so every
/// write is all or nothing and the pipe never fills up.
const CHUNK: usize = 64;

#[derive(Debug)]
pub struct PipeProbe {
    read_fd: ffi::c_int,
    write_fd: ffi::c_int,
}

impl PipeProbe {
    pub fn open() -> Result<Self, TraceError> {
        let mut fds = [-1; 2];
        let ret = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC | libc::O_NONBLOCK) };
        if ret != 0 {
            let errno = errno();
            with_os_error_str(errno, |err| error!("pipe2 failed: {err}"));
            return Err(TraceError::ProbeSetup {
                call: "pipe2",
                errno,
            });
        }
        debug!(read_fd = fds[0], write_fd = fds[1], "opened probe pipe");
        Ok(Self {
            read_fd: fds[0],
            write_fd: fds[1],
        })
    }

    fn copy_chunk(&self, addr: usize, buf: &mut [u8]) -> Result<(), Unreadable> {
        let written = loop {
            let r = unsafe { libc::write(self.write_fd, addr as *const ffi::c_void, buf.len()) };
            if r < 0 && errno() == libc::EINTR {
                continue;
            }
            break r;
        };
        if written <= 0 {
            return Err(Unreadable);
        }

        let written = written as usize;
        let mut drained = 0;
        while drained < written {
            let r = unsafe {
                libc::read(
                    self.read_fd,
                    buf[drained..written].as_mut_ptr().cast(),
                    written - drained,
                )
            };
            if r < 0 && errno() == libc::EINTR {
                continue;
            }
            if r <= 0 {
                return Err(Unreadable);
            }
            drained += r as usize;
        }

        // a short write means the range ran into something unmapped
        if written < buf.len() {
            return Err(Unreadable);
        }
        Ok(())
    }
}

impl Memory for PipeProbe {
    fn read_bytes(&self, addr: usize, buf: &mut [u8]) -> Result<(), Unreadable> {
        if addr.checked_add(buf.len()).is_none() {
            return Err(Unreadable);
        }
        for (i, chunk) in buf.chunks_mut(CHUNK).enumerate() {
            self.copy_chunk(addr + i * CHUNK, chunk)?;
        }
        Ok(())
    }
}

impl Drop for PipeProbe {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.read_fd);
            libc::close(self.write_fd);
        }
        debug!("closed probe pipe");
    }
}
