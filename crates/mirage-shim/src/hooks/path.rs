//! Symbolic-link resolution interception: `readlink`, `readlinkat`.
//!
//! Only the process self-links are substituted. Following libc
//! semantics, the copied target is truncated to the caller's capacity
//! and never NUL-terminated.

use libc::{c_char, c_int, size_t, ssize_t};
use mirage_synth::classify::link_target;

use crate::reals;
use crate::state::{path_str, ShimContext};

/// `None` means delegate.
unsafe fn readlink_common(path: *const c_char, buf: *mut c_char, bufsiz: size_t) -> Option<ssize_t> {
    let ctx = ShimContext::get()?;
    let p = path_str(path)?;
    let target = link_target(&ctx.synth.profile.process, p)?;
    if buf.is_null() {
        return None;
    }
    let bytes = target.as_bytes();
    let n = bytes.len().min(bufsiz);
    std::ptr::copy_nonoverlapping(bytes.as_ptr(), buf as *mut u8, n);
    Some(n as ssize_t)
}

#[no_mangle]
pub unsafe extern "C" fn readlink(path: *const c_char, buf: *mut c_char, bufsiz: size_t) -> ssize_t {
    match readlink_common(path, buf, bufsiz) {
        Some(n) => n,
        None => reals::real_readlink(path, buf, bufsiz),
    }
}

#[no_mangle]
pub unsafe extern "C" fn readlinkat(
    dirfd: c_int,
    path: *const c_char,
    buf: *mut c_char,
    bufsiz: size_t,
) -> ssize_t {
    let absolute = path_str(path).map(|p| p.starts_with('/')).unwrap_or(false);
    if absolute {
        if let Some(n) = readlink_common(path, buf, bufsiz) {
            return n;
        }
    }
    reals::real_readlinkat(dirfd, path, buf, bufsiz)
}
