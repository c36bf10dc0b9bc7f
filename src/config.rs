use core::cell::Cell;
use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};
use heapless::String;
use serde::Deserialize;

use crate::error::Error;

/// Stands in for a modem line that is not wired, e.g. boards without a reset
/// connection.
pub struct NoPin;

impl ErrorType for NoPin {
    type Error = Infallible;
}

impl OutputPin for NoPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A UART that can be brought up and torn down once per lifecycle attempt.
///
/// `open` hands out independent read and write halves so that the line
/// multiplexer can keep reading while commands are written.
pub trait Uart {
    type Error: core::fmt::Debug;
    type Rx: embedded_io_async::Read;
    type Tx: embedded_io_async::Write;

    fn open(
        &mut self,
        pins: &PinAssignment,
        baudrate: u32,
    ) -> Result<(Self::Rx, Self::Tx), Self::Error>;

    /// Release the hardware. Any half that is still around is handed back.
    fn close(&mut self, rx: Option<Self::Rx>, tx: Option<Self::Tx>);
}

/// Hard reset of the whole device, bypassing any teardown. On real hardware
/// this does not return.
pub trait SystemReset {
    fn reset(&mut self);
}

impl<F: FnMut()> SystemReset for F {
    fn reset(&mut self) {
        self()
    }
}

pub trait CellularConfig {
    type ResetPin: OutputPin;
    type PowerPin: OutputPin;
    type Uart: Uart;

    const BAUDRATE: u32 = 9600;

    fn reset_pin(&mut self) -> &mut Self::ResetPin;
    fn power_pin(&mut self) -> &mut Self::PowerPin;
    fn uart(&mut self) -> &mut Self::Uart;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Apn {
    pub name: String<64>,
    #[serde(default)]
    pub username: Option<String<64>>,
    #[serde(default)]
    pub password: Option<String<64>>,
}

impl Apn {
    /// Fails with [`Error::Encode`] if `name` is longer than 64 bytes.
    pub fn new(name: &str) -> Result<Self, Error> {
        Ok(Self {
            name: String::try_from(name).map_err(|_| Error::Encode)?,
            username: None,
            password: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Broker {
    pub host: String<64>,
    #[serde(default = "default_broker_port")]
    pub port: u16,
    pub username: String<64>,
    pub password: String<64>,
}

fn default_broker_port() -> u16 {
    1883
}

/// Board pin numbers, as wired to the modem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PinAssignment {
    pub power: u8,
    pub reset: u8,
    pub rx: u8,
    pub tx: u8,
}

impl Default for PinAssignment {
    fn default() -> Self {
        Self {
            power: 4,
            reset: 5,
            rx: 26,
            tx: 27,
        }
    }
}

/// Static configuration of the uplink.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UplinkConfig {
    pub apn: Apn,
    pub broker: Broker,
    pub client_id: String<32>,
    pub device_name: String<32>,
    pub ntp_server: String<64>,
    /// Offset to GMT in hours (-12..12)
    #[serde(default)]
    pub tz_offset: i8,
    #[serde(default)]
    pub pins: PinAssignment,
    #[serde(default)]
    pub enable_gnss: bool,
    #[serde(default = "default_pub_interval")]
    pub pub_interval_secs: u32,
    #[serde(default = "default_restart_interval")]
    pub restart_interval_secs: u32,
}

fn default_pub_interval() -> u32 {
    600
}

fn default_restart_interval() -> u32 {
    120
}

/// Logging setup of one driver instance.
///
/// All records are emitted under `target`. Protocol traces are only emitted
/// while verbose output is on, which can be toggled at runtime.
#[derive(Debug, Clone)]
pub struct LogConfig {
    target: &'static str,
    verbose: Cell<bool>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new("sim7000")
    }
}

impl LogConfig {
    pub const fn new(target: &'static str) -> Self {
        Self {
            target,
            verbose: Cell::new(false),
        }
    }

    #[must_use]
    pub fn verbose(self, on: bool) -> Self {
        self.verbose.set(on);
        self
    }

    pub fn set_verbose(&self, on: bool) {
        self.verbose.set(on);
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose.get()
    }

    pub fn target(&self) -> &'static str {
        self.target
    }
}
