#![cfg_attr(not(test), no_std)]

extern crate alloc;

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

#[cfg(test)]
#[macro_use]
mod test_helpers;

pub mod asynch;
pub mod client;
pub mod command;
pub mod config;
pub mod csv;
pub mod error;
pub mod line;
pub mod module_timing;
pub mod queue;
pub mod status;
pub mod telemetry;

pub use asynch::control::Control;
pub use asynch::runner::Runner;
pub use asynch::state::UplinkState;
pub use asynch::{new, State};
pub use config::{CellularConfig, LogConfig, SystemReset, Uart, UplinkConfig};
pub use error::Error;
pub use status::UplinkStatus;
pub use telemetry::Telemetry;
