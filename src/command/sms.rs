//! Text mode SMS
use alloc::vec::Vec;

use embedded_io_async::Write;

use crate::client::{format_cmd, AtHandle, Terminator};
use crate::csv::CsvRecord;
use crate::error::Error;
use crate::module_timing::cmd_timeout;

/// Ends the message body of `AT+CMGS`
const CTRL_Z: u8 = 0x1A;

impl<W: Write> AtHandle<'_, W> {
    /// List headers of all stored messages,
    /// `+CMGL: <index>,<stat>,<oa/da>,[<alpha>],[<scts>]`
    pub async fn get_sms(&self) -> Result<Vec<CsvRecord>, Error> {
        self.query_all("AT+CMGL=\"ALL\"", Terminator::OK, "+CMGL:", cmd_timeout())
            .await
    }

    pub async fn del_sms(&self, index: u32) -> Result<(), Error> {
        self.execute_ok(format_cmd(format_args!("AT+CMGD={}", index))?.as_str())
            .await?;
        Ok(())
    }

    pub async fn send_sms(&self, number: &str, msg: &str) -> Result<(), Error> {
        let header = format_cmd(format_args!("AT+CMGS=\"{}\"", number))?;

        let mut body = Vec::with_capacity(msg.len() + 1);
        body.extend_from_slice(msg.as_bytes());
        body.push(CTRL_Z);

        self.execute_with_payload(header.as_str(), &body).await
    }
}
