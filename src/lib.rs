//! opsdeck - an incident-response terminal for on-call engineers
//!
//! The core of this crate is the embedded terminal multiplexer: multiple
//! interactive sessions (a shell, a cluster-login tool, read-only
//! documentation viewers) run as switchable tabs inside one single-threaded
//! text UI.
//!
//! # Modules
//!
//! - [`app`]: Page host and event loop; owns all shared state
//! - [`registry`]: Tab collection, region ids, dedup, capacity
//! - [`session`]: Child processes on ptys and their lifecycle
//! - [`screen`]: Virtual screen buffer decoding pty byte streams
//! - [`input`]: Keyboard routing, command-mode grammar, exit detection
//! - [`navbar`]: Navigation bar and status footer
//! - [`config`]: Configuration management and serialization

pub mod app;
pub mod config;
pub mod input;
pub mod navbar;
pub mod registry;
pub mod screen;
pub mod session;
