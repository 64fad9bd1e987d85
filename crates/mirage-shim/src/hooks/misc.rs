//! Device-control and kernel-identity interception: `ioctl`
//! (hardware-address sub-request) and `uname`.
//!
//! Both run the real call first and rewrite only identity fields of the
//! successful result, leaving everything else the kernel reported
//! untouched.

use libc::{c_char, c_int, c_ulong, c_void};

use crate::reals;
use crate::state::ShimContext;

/// Copy a string into a fixed utsname field, truncated, NUL-terminated.
unsafe fn set_uts_field(field: &mut [c_char; 65], value: &str) {
    let bytes = value.as_bytes();
    let n = bytes.len().min(field.len() - 1);
    for (i, &b) in bytes[..n].iter().enumerate() {
        field[i] = b as c_char;
    }
    field[n] = 0;
}

#[no_mangle]
pub unsafe extern "C" fn ioctl(fd: c_int, request: c_ulong, arg: *mut c_void) -> c_int {
    let result = reals::real_ioctl(fd, request, arg);
    if result == 0 && request == libc::SIOCGIFHWADDR && !arg.is_null() {
        if let Some(ctx) = ShimContext::get() {
            // Overwrite only the address bytes; interface name, family
            // and the rest of the real reply stay as the kernel filled
            // them
            let req = &mut *(arg as *mut libc::ifreq);
            let mac = ctx.synth.mac_bytes();
            for (slot, &b) in req.ifr_ifru.ifru_hwaddr.sa_data[..6].iter_mut().zip(mac.iter()) {
                *slot = b as c_char;
            }
            shim_log!("rewrote hardware address on ioctl fd {}", fd);
        }
    }
    result
}

#[no_mangle]
pub unsafe extern "C" fn uname(buf: *mut libc::utsname) -> c_int {
    let result = reals::real_uname(buf);
    if result == 0 && !buf.is_null() {
        if let Some(ctx) = ShimContext::get() {
            let kernel = ctx.synth.kernel_version();
            let uts = &mut *buf;
            set_uts_field(&mut uts.release, &kernel.release);
            set_uts_field(&mut uts.version, &kernel.version);
            set_uts_field(&mut uts.nodename, &kernel.nodename);
            // machine is left untouched
        }
    }
    result
}
