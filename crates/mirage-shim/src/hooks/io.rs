//! Descriptor I/O interception: `read`, `close`, `fclose`.

use libc::{c_int, c_void, size_t, ssize_t};

use crate::reals;
use crate::state::ShimContext;

#[no_mangle]
pub unsafe extern "C" fn read(fd: c_int, buf: *mut c_void, count: size_t) -> ssize_t {
    if !buf.is_null() {
        if let Some(ctx) = ShimContext::get() {
            if let Some(n) = ctx.read_fd(fd, buf, count) {
                return n;
            }
        }
    }
    reals::real_read(fd, buf, count)
}

#[no_mangle]
pub unsafe extern "C" fn close(fd: c_int) -> c_int {
    // Untrack first so a reused fd number never inherits stale payload;
    // the real close always runs, making a double close on an already
    // released entry an ordinary close
    if let Some(ctx) = ShimContext::get() {
        ctx.release_fd(fd);
    }
    reals::real_close(fd)
}

#[no_mangle]
pub unsafe extern "C" fn fclose(stream: *mut libc::FILE) -> c_int {
    if let Some(ctx) = ShimContext::get() {
        if ctx.is_tracked_stream(stream) {
            // The backing buffer must outlive the FILE*: real fclose
            // first, then drop the buffer
            let result = reals::real_fclose(stream);
            ctx.release_stream(stream);
            return result;
        }
    }
    reals::real_fclose(stream)
}
