//! # mirage-synth
//!
//! Identity derivation and content synthesis for Mirage.
//!
//! Everything here is ordinary safe Rust with no interposition concerns:
//! the shim crate calls into this one to decide what a path means and what
//! bytes to serve for it. All synthesized values are functions of the
//! identity seed, elapsed session time, and the per-session draws in
//! [`session::Session`], never of the call site.

pub mod classify;
pub mod dirent;
pub mod engine;
pub mod filter;
pub mod path;
pub mod seed;
pub mod session;
pub mod stackbuf;
pub mod tracker;

pub use classify::{Entity, FilterKind, PathClass};
pub use engine::SynthContext;
pub use tracker::{PayloadTable, TrackedPayload};
pub use seed::IdentitySeed;
pub use session::Session;
