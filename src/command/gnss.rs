use embedded_io_async::Write;

use crate::client::AtHandle;
use crate::csv::CsvRecord;
use crate::error::Error;

impl<W: Write> AtHandle<'_, W> {
    pub async fn enable_gnss(&self) -> Result<(), Error> {
        self.execute_ok("AT+CGNSPWR=1").await?;
        // GNSS antenna power on GPIO4
        self.execute_ok("AT+SGPIO=0,4,1,1").await?;
        Ok(())
    }

    pub async fn disable_gnss(&self) -> Result<(), Error> {
        self.execute_ok("AT+CGNSPWR=0").await?;
        self.execute_ok("AT+SGPIO=0,4,1,0").await?;
        Ok(())
    }

    /// `+CGNSINF: <run status>,<fix status>,<UTC date & time>,<latitude>,<longitude>,...`
    pub async fn get_gnss(&self) -> Result<CsvRecord, Error> {
        self.query("AT+CGNSINF", "+CGNSINF").await
    }
}
