//! Logging facade for Floodgate.
//!
//! # Setup
//!
//! To enable logging, invoke the [`init`] function with a [`LogConfig`]. The
//! configuration implements `serde` traits, so it can be obtained from configuration
//! files.
//!
//! ```
//! use floodgate_log::LogConfig;
//!
//! let config = LogConfig::default();
//! floodgate_log::init(&config);
//! ```
//!
//! # Logging
//!
//! The basic use is through the five logging macros: [`error!`], [`warn!`], [`info!`],
//! [`debug!`] and [`trace!`] where `error!` represents the highest-priority messages
//! and `trace!` the lowest.
//!
//! ## Conventions
//!
//! Log messages should start lowercase and end without punctuation. Prefer short and
//! precise log messages over verbose text. Choose the log level according to these
//! rules:
//!
//! - [`error!`] for bugs and faults in the persistence path.
//! - [`warn!`] for undesirable behavior, including anything induced by a client
//!   (malformed payloads, skewed timestamps).
//! - [`info!`] for messages relevant to the average operator.
//! - [`debug!`] for messages usually relevant to debugging.
//! - [`trace!`] for full auxiliary information.

#![warn(missing_docs)]

mod setup;
pub use setup::*;

// Expose the minimal tracing facade.
#[doc(inline)]
pub use tracing::{debug, error, info, trace, warn};
