//! Parley Telemetry - logging for the Parley agent hub.
//!
//! Wraps `tracing-subscriber` so every binary configures logging the same
//! way: a level plus per-target directives, one of four output formats, and
//! stdout, stderr or a rolling log file as the destination.
//!
//! # Example
//!
//! ```rust,no_run
//! use parley_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), parley_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("parley_hml=debug");
//!
//! setup_logging(&config)?;
//! tracing::info!("hub started");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging,
    setup_logging,
};
