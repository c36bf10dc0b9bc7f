use alloc::vec::Vec;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{with_timeout, Duration, Timer};
use embedded_io_async::Write;

use crate::config::LogConfig;
use crate::csv::{keyed_records, CsvRecord};
use crate::error::Error;
use crate::fmt::LossyStr;
use crate::line::Line;
use crate::module_timing::{cmd_timeout, payload_settle_time};
use crate::queue::Queues;

/// Capacity of a formatted command line.
pub const CMD_LEN: usize = 256;

/// Data written to the modem by a transaction.
#[derive(Debug, Clone, Copy)]
pub enum Command<'c> {
    /// A command line, `\r\n` is appended on write.
    Text(&'c str),
    /// Written verbatim.
    Raw(&'c [u8]),
}

impl<'c> From<&'c str> for Command<'c> {
    fn from(cmd: &'c str) -> Self {
        Self::Text(cmd)
    }
}

impl<'c> From<&'c [u8]> for Command<'c> {
    fn from(cmd: &'c [u8]) -> Self {
        Self::Raw(cmd)
    }
}

/// Line that completes a transaction, compared against the trimmed text.
#[derive(Debug, Clone, Copy)]
pub enum Terminator<'t> {
    Exact(&'t str),
    AnyOf(&'t [&'t str]),
    Contains(&'t str),
}

impl Terminator<'_> {
    pub const OK: Terminator<'static> = Terminator::Exact("OK");

    pub fn matches(&self, text: &str) -> bool {
        match self {
            Self::Exact(t) => text == *t,
            Self::AnyOf(set) => set.iter().any(|t| text == *t),
            Self::Contains(t) => text.contains(t),
        }
    }
}

/// Shared access to the modem command channel.
///
/// The writer half sits behind an async mutex that a transaction holds from
/// the write until the terminator line, so concurrent users are serialised.
/// While no writer is attached every transaction fails with
/// [`Error::Uninitialized`].
pub struct AtHandle<'a, W> {
    tx: &'a Mutex<NoopRawMutex, Option<W>>,
    queues: &'a Queues,
    log: &'a LogConfig,
}

impl<W> Clone for AtHandle<'_, W> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<W> Copy for AtHandle<'_, W> {}

impl<'a, W: Write> AtHandle<'a, W> {
    pub fn new(
        tx: &'a Mutex<NoopRawMutex, Option<W>>,
        queues: &'a Queues,
        log: &'a LogConfig,
    ) -> Self {
        Self { tx, queues, log }
    }

    pub fn queues(&self) -> &'a Queues {
        self.queues
    }

    pub fn log(&self) -> &'a LogConfig {
        self.log
    }

    pub async fn attach(&self, tx: W) {
        self.tx.lock().await.replace(tx);
    }

    pub async fn detach(&self) -> Option<W> {
        self.tx.lock().await.take()
    }

    pub async fn is_attached(&self) -> bool {
        self.tx.lock().await.is_some()
    }

    pub async fn flush(&self) -> Result<(), Error> {
        match self.tx.lock().await.as_mut() {
            Some(tx) => tx.flush().await.map_err(|_| Error::Write),
            None => Ok(()),
        }
    }

    /// Write `cmd` and collect response lines up to and including the first
    /// one matching `terminator`. Lines already taken from the response queue
    /// are lost if the deadline expires.
    pub async fn execute<'c>(
        &self,
        cmd: impl Into<Command<'c>>,
        terminator: Terminator<'_>,
        timeout: Duration,
    ) -> Result<Vec<Line>, Error> {
        let cmd = cmd.into();
        let mut tx = self.tx.lock().await;
        let tx = tx.as_mut().ok_or(Error::Uninitialized)?;

        match with_timeout(timeout, self.transact(tx, cmd, terminator)).await {
            Ok(res) => res,
            Err(_) => {
                warn!(
                    target: self.log.target(),
                    "Received timeout after {}ms on {:?}",
                    timeout.as_millis(),
                    cmd
                );
                Err(Error::Timeout)
            }
        }
    }

    /// [`execute`](Self::execute) against `OK` with the default deadline.
    pub async fn execute_ok<'c>(&self, cmd: impl Into<Command<'c>>) -> Result<Vec<Line>, Error> {
        self.execute(cmd, Terminator::OK, cmd_timeout()).await
    }

    /// Run a transaction and extract every reply line starting with `key`.
    pub async fn query_all(
        &self,
        cmd: &str,
        terminator: Terminator<'_>,
        key: &str,
        timeout: Duration,
    ) -> Result<Vec<CsvRecord>, Error> {
        let lines = self.execute(cmd, terminator, timeout).await?;
        keyed_records(&lines, key)
    }

    /// First keyed record of an `OK` terminated query.
    pub async fn query(&self, cmd: &str, key: &str) -> Result<CsvRecord, Error> {
        self.query_all(cmd, Terminator::OK, key, cmd_timeout())
            .await?
            .into_iter()
            .next()
            .ok_or(Error::ProtocolParse)
    }

    /// Write `header`, give the modem time to open its input prompt, then write
    /// `payload` verbatim and wait for `OK`, with the default deadline applied
    /// per line.
    pub async fn execute_with_payload(&self, header: &str, payload: &[u8]) -> Result<(), Error> {
        let mut tx = self.tx.lock().await;
        let tx = tx.as_mut().ok_or(Error::Uninitialized)?;

        self.write(tx, Command::Text(header)).await?;
        Timer::after(payload_settle_time()).await;
        self.write(tx, Command::Raw(payload)).await?;

        loop {
            let line = with_timeout(cmd_timeout(), self.queues.response.get())
                .await
                .map_err(|_| {
                    warn!(target: self.log.target(), "Received timeout on {:?}", header);
                    Error::Timeout
                })?;
            verbose!(self.log, "gsm< {:?}", line);
            if Terminator::OK.matches(line.text().trim()) {
                return Ok(());
            }
        }
    }

    /// Next unsolicited line, waiting for one to arrive.
    pub async fn next_unsolicited(&self) -> Line {
        self.queues.unsolicited.get().await
    }

    async fn transact(
        &self,
        tx: &mut W,
        cmd: Command<'_>,
        terminator: Terminator<'_>,
    ) -> Result<Vec<Line>, Error> {
        self.write(tx, cmd).await?;

        let mut lines = Vec::new();
        loop {
            let line = self.queues.response.get().await;
            verbose!(self.log, "gsm< {:?}", line);
            let done = terminator.matches(line.text().trim());
            lines.push(line);
            if done {
                return Ok(lines);
            }
        }
    }

    async fn write(&self, tx: &mut W, cmd: Command<'_>) -> Result<(), Error> {
        match cmd {
            Command::Text(text) => {
                verbose!(self.log, "gsm> {:?}", text);
                tx.write_all(text.as_bytes()).await.map_err(|_| Error::Write)?;
                tx.write_all(b"\r\n").await.map_err(|_| Error::Write)?;
            }
            Command::Raw(bytes) => {
                if bytes.len() < 50 {
                    verbose!(self.log, "gsm> {:?}", LossyStr(bytes));
                } else {
                    verbose!(self.log, "gsm> raw payload ({} bytes)", bytes.len());
                }
                tx.write_all(bytes).await.map_err(|_| Error::Write)?;
            }
        }
        tx.flush().await.map_err(|_| Error::Write)
    }
}

/// Format a command line into a bounded buffer.
pub(crate) fn format_cmd(args: core::fmt::Arguments<'_>) -> Result<heapless::String<CMD_LEN>, Error> {
    let mut cmd = heapless::String::new();
    core::fmt::write(&mut cmd, args).map_err(|_| Error::Encode)?;
    Ok(cmd)
}
