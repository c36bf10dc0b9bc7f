use alloc::vec::Vec;

use embassy_time::Duration;
use embedded_io_async::Write;

use super::state::{self, UplinkState};
use crate::client::{AtHandle, Terminator};
use crate::csv::CsvRecord;
use crate::error::Error;
use crate::line::Line;
use crate::status::UplinkStatus;
use crate::telemetry::Telemetry;

/// Application handle of the uplink.
pub struct Control<'a, W> {
    ch: state::Runner<'a>,
    at: AtHandle<'a, W>,
}

impl<'a, W: Write> Control<'a, W> {
    pub(crate) fn new(ch: state::Runner<'a>, at: AtHandle<'a, W>) -> Self {
        Self { ch, at }
    }

    /// Start the uplink, publishing the fields of `data`. Returns at once, the
    /// lifecycle runs in [`Runner::run`](super::runner::Runner::run).
    pub fn start(&self, data: &'a Telemetry) {
        self.ch.set_data(data);
        self.ch.set_running(true);
        if self.ch.uplink_state() == UplinkState::Stopped {
            self.ch.set_uplink_state(UplinkState::Attempting);
        }
    }

    /// Stop the uplink and wait until the modem link that was up has been torn
    /// down. A [`start`](Self::start) issued meanwhile begins a fresh attempt
    /// afterwards instead of cancelling the stop.
    pub async fn stop(&self) {
        let request = self.ch.request_stop();
        self.ch.wait_for_stop_served(request).await
    }

    pub fn is_running(&self) -> bool {
        self.ch.is_running()
    }

    pub fn uplink_state(&self) -> UplinkState {
        self.ch.uplink_state()
    }

    pub async fn wait_for_uplink_state(&self, state: UplinkState) {
        self.ch.wait_for_uplink_state(state).await
    }

    /// Completed lifecycle attempts
    pub fn restarts(&self) -> u32 {
        self.ch.restarts()
    }

    pub async fn get_status(&self) -> UplinkStatus {
        UplinkStatus::collect(self.ch.is_running(), self.ch.restarts(), &self.at).await
    }

    /// Toggle protocol traces at runtime
    pub fn set_verbose(&self, on: bool) {
        self.at.log().set_verbose(on);
    }

    pub async fn list_sms(&self) -> Result<Vec<CsvRecord>, Error> {
        self.at.get_sms().await
    }

    pub async fn delete_sms(&self, index: u32) -> Result<(), Error> {
        self.at.del_sms(index).await
    }

    pub async fn send_sms(&self, number: &str, msg: &str) -> Result<(), Error> {
        self.at.send_sms(number, msg).await
    }

    /// Send a raw AT command to the modem and return every reply line up to
    /// the final `OK` or `ERROR`. This is useful for debugging but might break
    /// the uplink if the modem settings interfere with the ones it uses.
    pub async fn send(&self, cmd: &str, timeout: Duration) -> Result<Vec<Line>, Error> {
        self.at
            .execute(cmd, Terminator::AnyOf(&["OK", "ERROR"]), timeout)
            .await
    }
}
