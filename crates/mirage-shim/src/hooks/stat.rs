//! Metadata query interception: the `stat` family, glibc's versioned
//! `__xstat` aliases, and `statx`.
//!
//! Virtual paths try the real query first so genuine backing files keep
//! their real timestamps; only when that fails is a plausible record
//! synthesized. Tracked handles always report virtual characteristics.

use libc::{c_char, c_int, c_uint};
use mirage_synth::classify::classify;
use mirage_synth::PathClass;

use crate::reals;
use crate::set_errno;
use crate::state::{fill_virtual_stat, path_str, ShimContext};

/// Synthesized size for an entity category: process/kernel entries look
/// like procfs (zero), configuration-like entries look like sysfs.
fn category_size(class: &PathClass) -> Option<i64> {
    match class {
        PathClass::Static(_) => Some(4096),
        PathClass::Dynamic(_) | PathClass::LineFiltered(_) => Some(0),
        PathClass::Blocked | PathClass::Passthrough => None,
    }
}

/// Shared by-path logic. `real` performs the follow/nofollow real query.
/// `None` means delegate.
unsafe fn stat_common(
    path: *const c_char,
    buf: *mut libc::stat,
    real: unsafe fn(*const c_char, *mut libc::stat) -> c_int,
) -> Option<c_int> {
    let ctx = ShimContext::get()?;
    let p = path_str(path)?;
    let class = classify(&ctx.synth.profile.rules, p);
    if class == PathClass::Blocked {
        set_errno(libc::ENOENT);
        return Some(-1);
    }
    let size = category_size(&class)?;
    if real(path, buf) == 0 {
        // Keep the genuine record, overriding only the size the caller
        // would compare against what a read returns
        (*buf).st_size = size;
        return Some(0);
    }
    fill_virtual_stat(ctx, buf, size);
    Some(0)
}

unsafe fn stat64_common(
    path: *const c_char,
    buf: *mut libc::stat64,
    real: unsafe fn(*const c_char, *mut libc::stat64) -> c_int,
) -> Option<c_int> {
    let ctx = ShimContext::get()?;
    let p = path_str(path)?;
    let class = classify(&ctx.synth.profile.rules, p);
    if class == PathClass::Blocked {
        set_errno(libc::ENOENT);
        return Some(-1);
    }
    let size = category_size(&class)?;
    if real(path, buf) == 0 {
        (*buf).st_size = size;
        return Some(0);
    }
    fill_virtual_stat64(ctx, buf, size);
    Some(0)
}

unsafe fn fill_virtual_stat64(ctx: &ShimContext, buf: *mut libc::stat64, size: i64) {
    let meta = ctx.synth.virtual_meta(size);
    let record: &mut libc::stat64 = &mut *buf;
    *record = std::mem::zeroed();
    record.st_mode = meta.mode;
    record.st_nlink = meta.nlink as libc::nlink_t;
    record.st_size = meta.size;
    record.st_blksize = meta.blksize;
    record.st_dev = meta.dev as libc::dev_t;
    record.st_atime = meta.time_unix;
    record.st_mtime = meta.time_unix;
    record.st_ctime = meta.time_unix;
}

#[no_mangle]
pub unsafe extern "C" fn stat(path: *const c_char, buf: *mut libc::stat) -> c_int {
    match stat_common(path, buf, reals::real_stat) {
        Some(result) => result,
        None => reals::real_stat(path, buf),
    }
}

#[no_mangle]
pub unsafe extern "C" fn lstat(path: *const c_char, buf: *mut libc::stat) -> c_int {
    match stat_common(path, buf, reals::real_lstat) {
        Some(result) => result,
        None => reals::real_lstat(path, buf),
    }
}

#[no_mangle]
pub unsafe extern "C" fn stat64(path: *const c_char, buf: *mut libc::stat64) -> c_int {
    match stat64_common(path, buf, reals::real_stat64) {
        Some(result) => result,
        None => reals::real_stat64(path, buf),
    }
}

#[no_mangle]
pub unsafe extern "C" fn lstat64(path: *const c_char, buf: *mut libc::stat64) -> c_int {
    match stat64_common(path, buf, reals::real_lstat64) {
        Some(result) => result,
        None => reals::real_lstat64(path, buf),
    }
}

#[no_mangle]
pub unsafe extern "C" fn fstat(fd: c_int, buf: *mut libc::stat) -> c_int {
    if let Some(ctx) = ShimContext::get() {
        if ctx.is_tracked_fd(fd) {
            fill_virtual_stat(ctx, buf, 0);
            return 0;
        }
    }
    reals::real_fstat(fd, buf)
}

#[no_mangle]
pub unsafe extern "C" fn fstat64(fd: c_int, buf: *mut libc::stat64) -> c_int {
    if let Some(ctx) = ShimContext::get() {
        if ctx.is_tracked_fd(fd) {
            fill_virtual_stat64(ctx, buf, 0);
            return 0;
        }
    }
    reals::real_fstat64(fd, buf)
}

#[no_mangle]
pub unsafe extern "C" fn statx(
    dirfd: c_int,
    path: *const c_char,
    flags: c_int,
    mask: c_uint,
    buf: *mut libc::statx,
) -> c_int {
    if let Some(ctx) = ShimContext::get() {
        let p = path_str(path);
        // An empty path (or AT_EMPTY_PATH) queries dirfd itself; a tracked
        // handle reports virtual characteristics no matter how it is asked.
        let handle_query = flags & libc::AT_EMPTY_PATH != 0 || matches!(p, Some(""));
        if handle_query && ctx.is_tracked_fd(dirfd) {
            fill_virtual_statx(ctx, buf, 0);
            return 0;
        }
        if let Some(p) = p {
            if p.starts_with('/') {
                let class = classify(&ctx.synth.profile.rules, p);
                if class == PathClass::Blocked {
                    set_errno(libc::ENOENT);
                    return -1;
                }
                if let Some(size) = category_size(&class) {
                    if reals::real_statx(dirfd, path, flags, mask, buf) == 0 {
                        (*buf).stx_size = size as u64;
                        return 0;
                    }
                    fill_virtual_statx(ctx, buf, size as u64);
                    return 0;
                }
            }
        }
    }
    reals::real_statx(dirfd, path, flags, mask, buf)
}

unsafe fn fill_virtual_statx(ctx: &ShimContext, buf: *mut libc::statx, size: u64) {
    let meta = ctx.synth.virtual_meta(size as i64);
    let record: &mut libc::statx = &mut *buf;
    *record = std::mem::zeroed();
    record.stx_mask = libc::STATX_BASIC_STATS;
    record.stx_blksize = meta.blksize as u32;
    record.stx_nlink = meta.nlink as u32;
    record.stx_mode = meta.mode as u16;
    record.stx_size = meta.size as u64;
    record.stx_dev_minor = meta.dev as u32;
    record.stx_atime.tv_sec = meta.time_unix;
    record.stx_mtime.tv_sec = meta.time_unix;
    record.stx_ctime.tv_sec = meta.time_unix;
}

// glibc versioned aliases; older binaries reach stat through these

#[no_mangle]
pub unsafe extern "C" fn __xstat(ver: c_int, path: *const c_char, buf: *mut libc::stat) -> c_int {
    match stat_common(path, buf, reals::real_stat) {
        Some(result) => result,
        None => reals::real_xstat(ver, path, buf),
    }
}

#[no_mangle]
pub unsafe extern "C" fn __lxstat(ver: c_int, path: *const c_char, buf: *mut libc::stat) -> c_int {
    match stat_common(path, buf, reals::real_lstat) {
        Some(result) => result,
        None => reals::real_lxstat(ver, path, buf),
    }
}

#[no_mangle]
pub unsafe extern "C" fn __fxstat(ver: c_int, fd: c_int, buf: *mut libc::stat) -> c_int {
    if let Some(ctx) = ShimContext::get() {
        if ctx.is_tracked_fd(fd) {
            fill_virtual_stat(ctx, buf, 0);
            return 0;
        }
    }
    reals::real_fxstat(ver, fd, buf)
}
