//! Ember Telemetry - logging setup for the Ember plugin host.
//!
//! This crate provides:
//! - Configurable logging with multiple formats and targets
//! - A bridge from the `[logging]` config section (feature `config`)
//!
//! # Example
//!
//! ```rust,no_run
//! use ember_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), ember_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("ember_plugins=trace");
//!
//! // Keep the guard alive for file targets.
//! let _guard = setup_logging(&config)?;
//! tracing::info!("host starting");
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
pub use logging::{LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging};
pub use tracing_appender::non_blocking::WorkerGuard;
