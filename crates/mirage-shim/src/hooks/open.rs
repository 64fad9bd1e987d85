//! Open-by-path interception: `open`, `open64`, `openat`, `fopen`,
//! `fopen64`.
//!
//! Classification decides the route: blocked paths fail ENOENT, virtual
//! entities get a synthesized payload behind a tracked handle, filtered
//! paths get the real content read and sanitized first, everything else
//! delegates untouched.

use libc::{c_char, c_int, mode_t};
use mirage_synth::classify::classify;
use mirage_synth::{filter, PathClass};

use crate::reals;
use crate::set_errno;
use crate::state::{path_str, ShimContext};

/// Produce the payload for a classified virtual open, or the errno the
/// open must fail with. `Ok(None)` means passthrough.
unsafe fn route(
    ctx: &ShimContext,
    path: *const c_char,
    readable_only: bool,
) -> Result<Option<Vec<u8>>, Option<c_int>> {
    let Some(p) = path_str(path) else {
        return Ok(None);
    };
    match classify(&ctx.synth.profile.rules, p) {
        PathClass::Passthrough => Ok(None),
        PathClass::Blocked => {
            shim_log!("blocked open: {}", p);
            Err(Some(libc::ENOENT))
        }
        _ if !readable_only => Err(Some(libc::EACCES)),
        PathClass::Static(entity) | PathClass::Dynamic(entity) => {
            Ok(Some(ctx.synth.generate(entity, ctx.synth.elapsed())))
        }
        PathClass::LineFiltered(kind) => {
            // A failed real open short-circuits, its errno propagates
            let Some(content) = reals::read_real_file(path) else {
                return Err(None);
            };
            let pid = libc::getpid() as u32;
            let filtered = filter::apply(
                kind,
                &ctx.synth.profile.rules,
                &content,
                pid,
                ctx.synth.session.ppid,
            );
            Ok(Some(filtered))
        }
    }
}

/// Shared fd-returning open logic. `None` means delegate.
unsafe fn open_common(path: *const c_char, flags: c_int) -> Option<c_int> {
    let ctx = ShimContext::get()?;
    let readable_only = flags & libc::O_ACCMODE == libc::O_RDONLY;
    match route(ctx, path, readable_only) {
        Ok(None) => None,
        Ok(Some(payload)) => match ctx.register_fd(payload) {
            Some(fd) => Some(fd),
            None => {
                set_errno(libc::ENFILE);
                Some(-1)
            }
        },
        Err(Some(errno)) => {
            set_errno(errno);
            Some(-1)
        }
        Err(None) => Some(-1),
    }
}

/// Shared stream-returning open logic. `None` means delegate.
unsafe fn fopen_common(path: *const c_char, mode: *const c_char) -> Option<*mut libc::FILE> {
    let ctx = ShimContext::get()?;
    let mode_str = path_str(mode)?;
    let readable_only = mode_str.starts_with('r') && !mode_str.contains('+');
    match route(ctx, path, readable_only) {
        Ok(None) => None,
        Ok(Some(payload)) => {
            let stream = ctx.register_stream(payload);
            if stream.is_null() {
                set_errno(libc::ENFILE);
            }
            Some(stream)
        }
        Err(Some(errno)) => {
            set_errno(errno);
            Some(std::ptr::null_mut())
        }
        Err(None) => Some(std::ptr::null_mut()),
    }
}

#[no_mangle]
pub unsafe extern "C" fn open(path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    match open_common(path, flags) {
        Some(result) => result,
        None => reals::real_open(path, flags, mode),
    }
}

#[no_mangle]
pub unsafe extern "C" fn open64(path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    match open_common(path, flags) {
        Some(result) => result,
        None => reals::real_open64(path, flags, mode),
    }
}

#[no_mangle]
pub unsafe extern "C" fn openat(
    dirfd: c_int,
    path: *const c_char,
    flags: c_int,
    mode: mode_t,
) -> c_int {
    // Only absolute paths can name virtual entities; dirfd-relative ones
    // delegate
    let absolute = path_str(path).map(|p| p.starts_with('/')).unwrap_or(false);
    if absolute {
        if let Some(result) = open_common(path, flags) {
            return result;
        }
    }
    reals::real_openat(dirfd, path, flags, mode)
}

#[no_mangle]
pub unsafe extern "C" fn fopen(path: *const c_char, mode: *const c_char) -> *mut libc::FILE {
    match fopen_common(path, mode) {
        Some(stream) => stream,
        None => reals::real_fopen(path, mode),
    }
}

#[no_mangle]
pub unsafe extern "C" fn fopen64(path: *const c_char, mode: *const c_char) -> *mut libc::FILE {
    match fopen_common(path, mode) {
        Some(stream) => stream,
        None => reals::real_fopen64(path, mode),
    }
}
