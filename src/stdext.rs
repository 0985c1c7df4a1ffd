use core::{ffi, fmt};

/// A [`fmt::Write`] straight onto a file descriptor.
///
/// Nothing is buffered or allocated, so this can be handed to the tracer from
/// inside a signal handler.
#[derive(Debug, Clone, Copy)]
pub struct FdWriter(pub ffi::c_int);

impl FdWriter {
    pub const STDOUT: Self = Self(libc::STDOUT_FILENO);
    pub const STDERR: Self = Self(libc::STDERR_FILENO);
}

impl fmt::Write for FdWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut s = s.as_bytes();
        while !s.is_empty() {
            let r = unsafe { libc::write(self.0, s.as_ptr().cast(), s.len()) };
            if r < 0 {
                if errno() == libc::EINTR {
                    continue;
                }
                return Err(fmt::Error);
            }
            if r == 0 {
                return Err(fmt::Error);
            }
            s = &s[(r as usize)..];
        }
        Ok(())
    }
}

pub(crate) fn errno() -> i32 {
    // SAFETY: Surely errno_location would be valid, right?
    unsafe { *libc::__errno_location() }
}

pub(crate) fn with_os_error_str<R>(errno: i32, f: impl FnOnce(&str) -> R) -> R {
    let mut buf: [u8; 512] = [0; 512];

    // SAFETY: Our buffer length is passed correctly
    let error = unsafe { libc::strerror_r(errno, buf.as_mut_ptr().cast(), buf.len()) };
    let msg = if error != 0 {
        "<strerror_r returned an error>"
    } else {
        // SAFETY: strerror_r writes the string to buf, even if it didnt write anything, we did zero init it.
        unsafe { ffi::CStr::from_ptr(buf.as_ptr().cast()) }
            .to_str()
            .unwrap_or("<error message contained invalid utf8>")
    };
    f(msg)
}
