//! Environment lookup interception: `getenv`, `secure_getenv`.
//!
//! Hidden variables report "not found" regardless of the real
//! environment. During context construction the lookup passes through,
//! which is what the construction path itself relies on.

use std::ptr;

use libc::c_char;

use crate::reals;
use crate::state::{path_str, ShimContext};

unsafe fn is_hidden(name: *const c_char) -> bool {
    let Some(ctx) = ShimContext::get() else {
        return false;
    };
    let Some(n) = path_str(name) else {
        return false;
    };
    let rules = &ctx.synth.profile.rules;
    rules.hidden_env.iter().any(|h| h == n)
        || rules
            .hidden_env_prefixes
            .iter()
            .any(|p| n.starts_with(p.trim_end_matches('=')))
}

#[no_mangle]
pub unsafe extern "C" fn getenv(name: *const c_char) -> *mut c_char {
    if is_hidden(name) {
        return ptr::null_mut();
    }
    reals::real_getenv(name)
}

#[no_mangle]
pub unsafe extern "C" fn secure_getenv(name: *const c_char) -> *mut c_char {
    if is_hidden(name) {
        return ptr::null_mut();
    }
    reals::real_secure_getenv(name)
}
