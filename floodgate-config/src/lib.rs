//! Static configuration for the Floodgate CLI and server.
//!
//! Configuration is read from a YAML file once at process start and is immutable
//! afterwards. Every section has complete defaults, so a missing field never fails;
//! only a missing or unreadable file does. Values are consumed through typed getters
//! and flow into component constructors at the composition root; there is no global
//! configuration state.

#![warn(missing_docs)]

mod config;

pub use config::*;
