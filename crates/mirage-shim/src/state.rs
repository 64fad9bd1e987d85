//! Interposition context and descriptor lifecycle tracking.
//!
//! One `ShimContext` per process, built lazily on the first intercepted
//! call (or by the constructor) behind an atomic one-time guard. While
//! construction is in flight every hook delegates to the real call, so
//! the profile/seed loading below may use ordinary std I/O without
//! recursing into our own hooks.

use std::collections::HashMap;
use std::ffi::CStr;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};
use std::sync::Mutex;

use libc::{c_int, c_void};
use mirage_synth::{PayloadTable, SynthContext};

use crate::reals;

/// Capacity of each descriptor table
pub const MAX_TRACKED: usize = 64;

static SHIM_CONTEXT: AtomicPtr<ShimContext> = AtomicPtr::new(ptr::null_mut());
/// True while ShimContext::get is constructing the context; all hooks
/// passthrough during this phase to avoid re-entering ourselves.
static INITIALIZING: AtomicBool = AtomicBool::new(false);
pub(crate) static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

pub struct ShimContext {
    pub synth: SynthContext,
    /// Raw descriptors: fd -> payload + cursor, fd numbers backed by real
    /// `/dev/null` handles
    pub fds: Mutex<PayloadTable<c_int>>,
    /// Buffered streams: FILE* address -> the buffer fmemopen reads from.
    /// The buffer must outlive the stream; it is dropped after the real
    /// fclose.
    pub streams: Mutex<HashMap<usize, Box<[u8]>>>,
    /// Open directory streams: DIR* address -> whether this is the
    /// process-list directory
    pub dirs: Mutex<HashMap<usize, bool>>,
}

impl ShimContext {
    fn init() -> Self {
        if std::env::var("MIRAGE_DEBUG").is_ok() {
            DEBUG_ENABLED.store(true, Ordering::Relaxed);
        }
        Self {
            synth: SynthContext::initialize(),
            fds: Mutex::new(PayloadTable::bounded(MAX_TRACKED)),
            streams: Mutex::new(HashMap::new()),
            dirs: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide context. Returns `None` while construction is in
    /// flight (callers delegate to the real call) and never thereafter.
    pub fn get() -> Option<&'static Self> {
        let p = SHIM_CONTEXT.load(Ordering::Acquire);
        if !p.is_null() {
            return Some(unsafe { &*p });
        }
        if INITIALIZING.swap(true, Ordering::SeqCst) {
            return None;
        }
        let raw = Box::into_raw(Box::new(Self::init()));
        let installed = match SHIM_CONTEXT.compare_exchange(
            ptr::null_mut(),
            raw,
            Ordering::SeqCst,
            Ordering::Acquire,
        ) {
            Ok(_) => raw,
            Err(existing) => {
                // Lost the install race; free ours and use the winner's
                drop(unsafe { Box::from_raw(raw) });
                existing
            }
        };
        INITIALIZING.store(false, Ordering::SeqCst);
        Some(unsafe { &*installed })
    }

    /// Register a synthesized payload behind a fresh real handle. The
    /// `/dev/null` backing guarantees the number is unique in the
    /// process's fd space and stays pollable.
    ///
    /// On a full table the scaffold fd is closed and `None` returned; the
    /// caller surfaces ENFILE.
    pub unsafe fn register_fd(&self, payload: Vec<u8>) -> Option<c_int> {
        let fd = reals::real_open(c"/dev/null".as_ptr(), libc::O_RDONLY, 0);
        if fd < 0 {
            return None;
        }
        let mut table = match self.fds.lock() {
            Ok(t) => t,
            Err(_) => {
                reals::real_close(fd);
                return None;
            }
        };
        if !table.insert(fd, payload) {
            reals::real_close(fd);
            return None;
        }
        Some(fd)
    }

    /// Serve a read from a tracked fd: min(count, remaining) bytes, zero
    /// at end of payload. `None` when the fd is not ours.
    pub fn read_fd(&self, fd: c_int, buf: *mut c_void, count: usize) -> Option<isize> {
        let mut table = self.fds.lock().ok()?;
        if count == 0 || buf.is_null() {
            return table.contains(&fd).then_some(0);
        }
        let dst = unsafe { std::slice::from_raw_parts_mut(buf as *mut u8, count) };
        table.read(&fd, dst).map(|n| n as isize)
    }

    /// Drop tracking for a closing fd. The handle itself is closed by the
    /// caller's delegation to the real close, tracked or not.
    pub fn release_fd(&self, fd: c_int) -> bool {
        self.fds
            .lock()
            .map(|mut table| table.release(&fd))
            .unwrap_or(false)
    }

    pub fn is_tracked_fd(&self, fd: c_int) -> bool {
        self.fds
            .lock()
            .map(|table| table.contains(&fd))
            .unwrap_or(false)
    }

    /// Open a buffered stream over a synthesized payload via fmemopen.
    /// The buffer lives in the stream table until the matching fclose.
    pub unsafe fn register_stream(&self, payload: Vec<u8>) -> *mut libc::FILE {
        let mut table = match self.streams.lock() {
            Ok(t) => t,
            Err(_) => return ptr::null_mut(),
        };
        if table.len() >= MAX_TRACKED {
            return ptr::null_mut();
        }
        let buf: Box<[u8]> = payload.into_boxed_slice();
        let stream = libc::fmemopen(
            buf.as_ptr() as *mut c_void,
            buf.len(),
            c"r".as_ptr(),
        );
        if stream.is_null() {
            return ptr::null_mut();
        }
        table.insert(stream as usize, buf);
        stream
    }

    /// Remove a stream's buffer after its real fclose. Returns whether
    /// the stream was ours.
    pub fn release_stream(&self, stream: *mut libc::FILE) -> bool {
        self.streams
            .lock()
            .map(|mut table| table.remove(&(stream as usize)).is_some())
            .unwrap_or(false)
    }

    pub fn is_tracked_stream(&self, stream: *mut libc::FILE) -> bool {
        self.streams
            .lock()
            .map(|table| table.contains_key(&(stream as usize)))
            .unwrap_or(false)
    }

    pub fn track_dir(&self, dirp: *mut libc::DIR, is_proc: bool) {
        if let Ok(mut dirs) = self.dirs.lock() {
            if dirs.len() < MAX_TRACKED * 4 {
                dirs.insert(dirp as usize, is_proc);
            }
        }
    }

    pub fn dir_is_proc(&self, dirp: *mut libc::DIR) -> bool {
        self.dirs
            .lock()
            .map(|dirs| dirs.get(&(dirp as usize)).copied().unwrap_or(false))
            .unwrap_or(false)
    }

    pub fn untrack_dir(&self, dirp: *mut libc::DIR) {
        if let Ok(mut dirs) = self.dirs.lock() {
            dirs.remove(&(dirp as usize));
        }
    }
}

/// Fill a stat record for a virtual entity: read-only regular file owned
/// by root on the low-numbered pseudo-device, sized per entity category.
/// Every stat flavor fills from the same metadata record so handle-based
/// and path-based queries can never disagree.
pub unsafe fn fill_virtual_stat(ctx: &ShimContext, buf: *mut libc::stat, size: i64) {
    let meta = ctx.synth.virtual_meta(size);
    let record: &mut libc::stat = &mut *buf;
    *record = std::mem::zeroed();
    record.st_mode = meta.mode;
    record.st_nlink = meta.nlink as libc::nlink_t;
    record.st_uid = 0;
    record.st_gid = 0;
    record.st_size = meta.size;
    record.st_blksize = meta.blksize;
    record.st_dev = meta.dev as libc::dev_t;
    record.st_atime = meta.time_unix;
    record.st_mtime = meta.time_unix;
    record.st_ctime = meta.time_unix;
}

/// Name of a pid's executable, looked up through the real symbols so the
/// query never re-enters our own hooks.
pub unsafe fn comm_of(pid_name: &[u8]) -> Option<Vec<u8>> {
    let mut path = [0u8; 64];
    let prefix = b"/proc/";
    let suffix = b"/comm\0";
    if prefix.len() + pid_name.len() + suffix.len() > path.len() {
        return None;
    }
    path[..prefix.len()].copy_from_slice(prefix);
    path[prefix.len()..prefix.len() + pid_name.len()].copy_from_slice(pid_name);
    path[prefix.len() + pid_name.len()..prefix.len() + pid_name.len() + suffix.len()]
        .copy_from_slice(suffix);
    let mut comm = reals::read_real_file(path.as_ptr() as *const libc::c_char)?;
    if comm.last() == Some(&b'\n') {
        comm.pop();
    }
    Some(comm)
}

/// Convert a caller-supplied C path to &str, rejecting null and non-UTF-8.
pub unsafe fn path_str<'a>(path: *const libc::c_char) -> Option<&'a str> {
    if path.is_null() {
        return None;
    }
    CStr::from_ptr(path).to_str().ok()
}

// ---- ring-buffer logger, heap-free and safe inside intercepted calls ----

pub(crate) const LOG_BUF_SIZE: usize = 64 * 1024;

pub struct Logger {
    buffer: std::cell::UnsafeCell<[u8; LOG_BUF_SIZE]>,
    head: std::sync::atomic::AtomicUsize,
}

// The byte writes below may tear under contention; the log is a best
// effort diagnostic, never read back by the shim itself.
unsafe impl Sync for Logger {}

impl Logger {
    pub const fn new() -> Self {
        Self {
            buffer: std::cell::UnsafeCell::new([0u8; LOG_BUF_SIZE]),
            head: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub(crate) fn log(&self, msg: &str) {
        let len = msg.len();
        if len > LOG_BUF_SIZE {
            return;
        }
        let start = self.head.fetch_add(len, Ordering::SeqCst);
        let base = self.buffer.get() as *mut u8;
        for (i, &b) in msg.as_bytes().iter().enumerate() {
            unsafe {
                *base.add((start + i) % LOG_BUF_SIZE) = b;
            }
        }
        if DEBUG_ENABLED.load(Ordering::Relaxed) {
            unsafe {
                libc::write(2, msg.as_ptr() as *const c_void, len);
            }
        }
    }
}

pub static LOGGER: Logger = Logger::new();
