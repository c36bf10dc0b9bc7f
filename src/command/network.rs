//! Network attach, registration and diagnostics
use alloc::string::{String, ToString};

use embassy_time::Timer;
use embedded_io_async::Write;

use super::types::RegistrationStat;
use crate::client::{format_cmd, AtHandle, Terminator};
use crate::config::Apn;
use crate::csv::{unquote, CsvRecord};
use crate::error::Error;
use crate::module_timing::{cmd_timeout, netreg_poll_interval, NETREG_POLLS};

impl<W: Write> AtHandle<'_, W> {
    /// Select the radio mode and open bearer profile 1 on `apn`.
    pub async fn connect_apn(&self, apn: &Apn) -> Result<(), Error> {
        // Automatic GSM / LTE selection
        self.execute_ok("AT+CNMP=2").await?;
        // CAT-M and NB-IoT
        self.execute_ok("AT+CMNB=3").await?;
        self.execute_ok(format_cmd(format_args!("AT+SAPBR=3,1,\"APN\",\"{}\"", apn.name))?.as_str())
            .await?;
        if let Some(ref user) = apn.username {
            self.execute_ok(format_cmd(format_args!("AT+SAPBR=3,1,\"USER\",\"{}\"", user))?.as_str())
                .await?;
        }
        if let Some(ref password) = apn.password {
            self.execute_ok(format_cmd(format_args!("AT+SAPBR=3,1,\"PWD\",\"{}\"", password))?.as_str())
                .await?;
        }
        self.execute_ok("AT+SAPBR=1,1").await?;
        Ok(())
    }

    /// Synchronise the modem clock against `server`. `tz_offset` is in hours.
    pub async fn get_ntp(&self, server: &str, tz_offset: i8) -> Result<CsvRecord, Error> {
        self.execute_ok("AT+CNTPCID=1").await?;
        let cmd = format_cmd(format_args!(
            "AT+CNTP=\"{}\",{},1",
            server,
            i16::from(tz_offset) * 4
        ))?;
        self.execute_ok(cmd.as_str()).await?;

        self.query_all("AT+CNTP", Terminator::Contains("+CNTP:"), "+CNTP", cmd_timeout())
            .await?
            .into_iter()
            .next()
            .ok_or(Error::ProtocolParse)
    }

    /// Serving cell information, `+CPSI`
    pub async fn get_netinfo(&self) -> Result<CsvRecord, Error> {
        self.query("AT+CPSI?", "+CPSI").await
    }

    /// Signal quality, `+CSQ: <rssi>,<ber>`
    pub async fn get_signalinfo(&self) -> Result<CsvRecord, Error> {
        self.query("AT+CSQ", "+CSQ").await
    }

    /// Registration status, `+CREG: <n>,<stat>[,<lac>,<ci>,<netact>]`
    pub async fn get_netreg(&self) -> Result<CsvRecord, Error> {
        self.query("AT+CREG?", "+CREG").await
    }

    /// Modem clock, as in `21/05/10,22:10:39+08`
    pub async fn get_time(&self) -> Result<String, Error> {
        let record = self.query("AT+CCLK?", "+CCLK").await?;
        let time = record.first().ok_or(Error::ProtocolParse)?;
        Ok(unquote(time.trim()).to_string())
    }

    /// Poll the registration status until the modem is registered to its home
    /// network.
    pub async fn wait_for_netreg(&self) -> Result<(), Error> {
        for _ in 0..NETREG_POLLS {
            let stat: u8 = self.get_netreg().await?.parse(1)?;
            if RegistrationStat::from(stat) == RegistrationStat::Registered {
                return Ok(());
            }
            Timer::after(netreg_poll_interval()).await;
        }

        warn!(
            target: self.log().target(),
            "Not registered to the network after {} polls",
            NETREG_POLLS
        );
        Err(Error::RegistrationTimeout)
    }
}
