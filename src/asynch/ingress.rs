use embassy_futures::select::select;
use embassy_time::{Duration, Timer};
use embedded_io_async::Read;

use super::task::TaskHandle;
use crate::config::LogConfig;
use crate::line::{Line, LineReader};
use crate::queue::Queues;

/// Inbound MQTT message
pub(crate) const SMSUB_PREFIX: &str = "+SMSUB:";
/// Network registration event
const CREG_PREFIX: &str = "+CREG:";
/// Network time event
const PSUTTZ_PREFIX: &str = "*PSUTTZ:";

/// Route one modem line to its queues.
///
/// MQTT messages go to the unsolicited queue and, like registration events,
/// are also passed on to the response queue. Network time events are only
/// logged.
pub(crate) fn route(queues: &Queues, line: Line, log: &LogConfig) {
    if line.starts_with(SMSUB_PREFIX.as_bytes()) {
        queues.unsolicited.put(line.clone());
    }
    if line.starts_with(CREG_PREFIX.as_bytes()) {
        verbose!(log, "Unsolicited CREG: {:?}", line);
    }
    if line.starts_with(PSUTTZ_PREFIX.as_bytes()) {
        verbose!(log, "Unsolicited PSUTTZ: {:?}", line);
    } else {
        queues.response.put(line);
    }
}

/// Reads modem output line by line while spawned and routes it to the queues.
pub struct LineMultiplexer<'a, R> {
    handle: &'a TaskHandle<LineReader<R>>,
    queues: &'a Queues,
    log: &'a LogConfig,
}

impl<'a, R: Read> LineMultiplexer<'a, R> {
    pub(crate) fn new(
        handle: &'a TaskHandle<LineReader<R>>,
        queues: &'a Queues,
        log: &'a LogConfig,
    ) -> Self {
        Self {
            handle,
            queues,
            log,
        }
    }

    pub async fn run(&mut self) -> ! {
        loop {
            let mut reader = self.handle.started().await;
            debug!(target: self.log.target(), "Line multiplexer started");
            select(self.handle.cancelled(), self.pump(&mut reader)).await;
            debug!(target: self.log.target(), "Line multiplexer stopped");
            self.handle.finish(reader);
        }
    }

    async fn pump(&self, reader: &mut LineReader<R>) -> ! {
        loop {
            match reader.read_line().await {
                Ok(line) => route(self.queues, line, self.log),
                Err(e) => {
                    error!(target: self.log.target(), "Failed to read modem output: {:?}", e);
                    Timer::after(Duration::from_millis(100)).await;
                }
            }
        }
    }
}
