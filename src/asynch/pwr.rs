use embassy_time::Timer;
use embedded_hal::digital::OutputPin as _;

use crate::config::CellularConfig;
use crate::error::Error;
use crate::module_timing::{pwr_toggle_time, reset_time};

pub(crate) struct PwrCtrl<'b, C> {
    config: &'b mut C,
}

impl<'b, C: CellularConfig> PwrCtrl<'b, C> {
    pub(crate) fn new(config: &'b mut C) -> Self {
        Self { config }
    }

    /// Drive `RESET` high for [`reset_time`]
    pub(crate) async fn pulse_reset(&mut self) -> Result<(), Error> {
        let pin = self.config.reset_pin();
        pin.set_high().map_err(|_| Error::IoPin)?;
        Timer::after(reset_time()).await;
        pin.set_low().map_err(|_| Error::IoPin)?;
        Ok(())
    }

    /// Drive `PWRKEY` high for [`pwr_toggle_time`], toggling the power state
    /// of the modem.
    pub(crate) async fn pulse_power(&mut self) -> Result<(), Error> {
        let pin = self.config.power_pin();
        pin.set_high().map_err(|_| Error::IoPin)?;
        Timer::after(pwr_toggle_time()).await;
        pin.set_low().map_err(|_| Error::IoPin)?;
        Ok(())
    }
}
