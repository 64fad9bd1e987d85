//! Lazily resolved real libc entry points.
//!
//! Each intercepted symbol keeps the underlying libc function in an
//! `AtomicPtr`, resolved through `dlsym(RTLD_NEXT)` on first use. The
//! atomic one-time store is race-free without serializing the hot path:
//! two threads racing the first call both resolve the same pointer.

use libc::{c_char, c_int, c_uint, c_void, mode_t, size_t, ssize_t};
use std::sync::atomic::{AtomicPtr, Ordering};

pub struct RealSymbol {
    ptr: AtomicPtr<c_void>,
    name: &'static str,
}

impl RealSymbol {
    pub const fn new(name: &'static str) -> Self {
        Self {
            ptr: AtomicPtr::new(std::ptr::null_mut()),
            name,
        }
    }

    /// Resolve the next occurrence of this symbol in link order.
    pub unsafe fn get(&self) -> *mut c_void {
        let p = self.ptr.load(Ordering::Acquire);
        if !p.is_null() {
            return p;
        }
        let f = libc::dlsym(libc::RTLD_NEXT, self.name.as_ptr() as *const c_char);
        self.ptr.store(f, Ordering::Release);
        f
    }
}

static REAL_OPEN: RealSymbol = RealSymbol::new("open\0");
static REAL_OPEN64: RealSymbol = RealSymbol::new("open64\0");
static REAL_OPENAT: RealSymbol = RealSymbol::new("openat\0");
static REAL_FOPEN: RealSymbol = RealSymbol::new("fopen\0");
static REAL_FOPEN64: RealSymbol = RealSymbol::new("fopen64\0");
static REAL_READ: RealSymbol = RealSymbol::new("read\0");
static REAL_CLOSE: RealSymbol = RealSymbol::new("close\0");
static REAL_FCLOSE: RealSymbol = RealSymbol::new("fclose\0");
static REAL_READLINK: RealSymbol = RealSymbol::new("readlink\0");
static REAL_READLINKAT: RealSymbol = RealSymbol::new("readlinkat\0");
static REAL_STAT: RealSymbol = RealSymbol::new("stat\0");
static REAL_LSTAT: RealSymbol = RealSymbol::new("lstat\0");
static REAL_FSTAT: RealSymbol = RealSymbol::new("fstat\0");
static REAL_STAT64: RealSymbol = RealSymbol::new("stat64\0");
static REAL_LSTAT64: RealSymbol = RealSymbol::new("lstat64\0");
static REAL_FSTAT64: RealSymbol = RealSymbol::new("fstat64\0");
static REAL_STATX: RealSymbol = RealSymbol::new("statx\0");
static REAL_XSTAT: RealSymbol = RealSymbol::new("__xstat\0");
static REAL_LXSTAT: RealSymbol = RealSymbol::new("__lxstat\0");
static REAL_FXSTAT: RealSymbol = RealSymbol::new("__fxstat\0");
static REAL_OPENDIR: RealSymbol = RealSymbol::new("opendir\0");
static REAL_CLOSEDIR: RealSymbol = RealSymbol::new("closedir\0");
static REAL_READDIR: RealSymbol = RealSymbol::new("readdir\0");
static REAL_READDIR64: RealSymbol = RealSymbol::new("readdir64\0");
static REAL_GETDENTS64: RealSymbol = RealSymbol::new("getdents64\0");
static REAL_GETENV: RealSymbol = RealSymbol::new("getenv\0");
static REAL_SECURE_GETENV: RealSymbol = RealSymbol::new("secure_getenv\0");
static REAL_IOCTL: RealSymbol = RealSymbol::new("ioctl\0");
static REAL_UNAME: RealSymbol = RealSymbol::new("uname\0");

macro_rules! real_fn {
    ($fn_name:ident, $storage:ident, fn($($arg:ident: $ty:ty),*) -> $ret:ty) => {
        pub unsafe fn $fn_name($($arg: $ty),*) -> $ret {
            let f = std::mem::transmute::<
                *mut c_void,
                unsafe extern "C" fn($($ty),*) -> $ret,
            >($storage.get());
            f($($arg),*)
        }
    };
}

real_fn!(real_open, REAL_OPEN, fn(path: *const c_char, flags: c_int, mode: mode_t) -> c_int);
real_fn!(real_open64, REAL_OPEN64, fn(path: *const c_char, flags: c_int, mode: mode_t) -> c_int);
real_fn!(
    real_openat,
    REAL_OPENAT,
    fn(dirfd: c_int, path: *const c_char, flags: c_int, mode: mode_t) -> c_int
);
real_fn!(
    real_fopen,
    REAL_FOPEN,
    fn(path: *const c_char, mode: *const c_char) -> *mut libc::FILE
);
real_fn!(
    real_fopen64,
    REAL_FOPEN64,
    fn(path: *const c_char, mode: *const c_char) -> *mut libc::FILE
);
real_fn!(real_read, REAL_READ, fn(fd: c_int, buf: *mut c_void, count: size_t) -> ssize_t);
real_fn!(real_close, REAL_CLOSE, fn(fd: c_int) -> c_int);
real_fn!(real_fclose, REAL_FCLOSE, fn(stream: *mut libc::FILE) -> c_int);
real_fn!(
    real_readlink,
    REAL_READLINK,
    fn(path: *const c_char, buf: *mut c_char, bufsiz: size_t) -> ssize_t
);
real_fn!(
    real_readlinkat,
    REAL_READLINKAT,
    fn(dirfd: c_int, path: *const c_char, buf: *mut c_char, bufsiz: size_t) -> ssize_t
);
real_fn!(real_stat, REAL_STAT, fn(path: *const c_char, buf: *mut libc::stat) -> c_int);
real_fn!(real_lstat, REAL_LSTAT, fn(path: *const c_char, buf: *mut libc::stat) -> c_int);
real_fn!(real_fstat, REAL_FSTAT, fn(fd: c_int, buf: *mut libc::stat) -> c_int);
real_fn!(real_stat64, REAL_STAT64, fn(path: *const c_char, buf: *mut libc::stat64) -> c_int);
real_fn!(real_lstat64, REAL_LSTAT64, fn(path: *const c_char, buf: *mut libc::stat64) -> c_int);
real_fn!(real_fstat64, REAL_FSTAT64, fn(fd: c_int, buf: *mut libc::stat64) -> c_int);
real_fn!(
    real_statx,
    REAL_STATX,
    fn(
        dirfd: c_int,
        path: *const c_char,
        flags: c_int,
        mask: c_uint,
        buf: *mut libc::statx
    ) -> c_int
);
real_fn!(
    real_xstat,
    REAL_XSTAT,
    fn(ver: c_int, path: *const c_char, buf: *mut libc::stat) -> c_int
);
real_fn!(
    real_lxstat,
    REAL_LXSTAT,
    fn(ver: c_int, path: *const c_char, buf: *mut libc::stat) -> c_int
);
real_fn!(
    real_fxstat,
    REAL_FXSTAT,
    fn(ver: c_int, fd: c_int, buf: *mut libc::stat) -> c_int
);
real_fn!(real_opendir, REAL_OPENDIR, fn(path: *const c_char) -> *mut libc::DIR);
real_fn!(real_closedir, REAL_CLOSEDIR, fn(dirp: *mut libc::DIR) -> c_int);
real_fn!(real_readdir, REAL_READDIR, fn(dirp: *mut libc::DIR) -> *mut libc::dirent);
real_fn!(
    real_readdir64,
    REAL_READDIR64,
    fn(dirp: *mut libc::DIR) -> *mut libc::dirent64
);
real_fn!(
    real_getdents64,
    REAL_GETDENTS64,
    fn(fd: c_int, dirp: *mut c_void, count: size_t) -> ssize_t
);
real_fn!(real_getenv, REAL_GETENV, fn(name: *const c_char) -> *mut c_char);
real_fn!(
    real_secure_getenv,
    REAL_SECURE_GETENV,
    fn(name: *const c_char) -> *mut c_char
);
real_fn!(
    real_ioctl,
    REAL_IOCTL,
    fn(fd: c_int, request: libc::c_ulong, arg: *mut c_void) -> c_int
);
real_fn!(real_uname, REAL_UNAME, fn(buf: *mut libc::utsname) -> c_int);

/// Read a whole file through the real symbols, bypassing our own hooks.
/// Returns `None` with the real call's errno left in place on failure.
pub unsafe fn read_real_file(path: *const c_char) -> Option<Vec<u8>> {
    let fd = real_open(path, libc::O_RDONLY, 0);
    if fd < 0 {
        return None;
    }
    let mut out = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = real_read(fd, chunk.as_mut_ptr() as *mut c_void, chunk.len());
        if n <= 0 {
            break;
        }
        out.extend_from_slice(&chunk[..n as usize]);
    }
    real_close(fd);
    Some(out)
}
