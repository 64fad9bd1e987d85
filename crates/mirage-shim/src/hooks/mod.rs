//! Intercepted libc entry points, one module per call family.

pub mod dir;
pub mod env;
pub mod io;
pub mod misc;
pub mod open;
pub mod path;
pub mod stat;
