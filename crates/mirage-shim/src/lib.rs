//! # mirage-shim
//!
//! LD_PRELOAD interception layer presenting a synthetic device identity.
//!
//! The library interposes the introspection surface of libc (`open`,
//! `read`, `stat`, `readdir`, `readlink`, `getenv`, `ioctl`, `uname` and
//! friends). Paths that resolve to virtual entities are served from the
//! synthesis engine in `mirage-synth`; everything else is delegated to
//! the real implementation unchanged.
//!
//! ## Usage
//!
//! ```bash
//! LD_PRELOAD=/path/to/libmirage_shim.so cat /proc/cpuinfo
//! ```
//!
//! ## Environment Variables
//!
//! - `MIRAGE_PROFILE`: TOML device profile overriding the built-in one
//! - `MIRAGE_DEBUG`: mirror the ring-buffer log to stderr if set

#![allow(clippy::missing_safety_doc)]

#[macro_use]
pub mod macros;
pub mod hooks;
pub mod reals;
pub mod state;

use libc::c_int;

/// Set errno the way libc reports it to the caller
pub(crate) unsafe fn set_errno(errno: c_int) {
    *libc::__errno_location() = errno;
}

/// Construct the interposition context before the host program's main
/// runs, so no intercepted call pays the lazy-init cost.
#[cfg_attr(target_os = "linux", link_section = ".init_array")]
#[used]
static INIT: extern "C" fn() = {
    extern "C" fn init() {
        let _ = state::ShimContext::get();
    }
    init
};
