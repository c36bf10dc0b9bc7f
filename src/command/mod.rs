//! AT command templates of the SIMCom SIM7000 family
//!
//! Every template runs one or more transactions on an [`AtHandle`] against
//! `OK` with the default command deadline, unless noted otherwise. The first
//! failing transaction aborts the template.
//!
//! [`AtHandle`]: crate::client::AtHandle

mod gnss;
mod mqtt;
mod network;
mod sms;
pub mod types;

pub use types::*;
