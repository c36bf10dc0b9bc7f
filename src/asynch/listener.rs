use alloc::string::{String, ToString};

use embassy_futures::select::select;
use embedded_io_async::Write;

use super::ingress::SMSUB_PREFIX;
use super::state;
use super::task::TaskHandle;
use crate::client::AtHandle;
use crate::config::SystemReset;
use crate::csv::{split_csv, unquote};
use crate::line::Line;

/// Hard reset of the device
const CMD_RESET: &str = "reset";
/// Stop the uplink
const CMD_UPLINK_STOP: &str = "uplinkstop";

/// Split `+SMSUB: "<topic>","<payload>"` into topic and payload.
pub(crate) fn parse_message(line: &Line) -> Option<(String, String)> {
    let text = line.text();
    let rest = text.trim().strip_prefix(SMSUB_PREFIX)?;
    let mut fields = split_csv(rest.trim_start());
    let topic = unquote(fields.next()?.trim());
    let payload = unquote(fields.next()?.trim());
    Some((topic.to_string(), payload.to_string()))
}

/// Acts on messages received on the command topic while spawned.
pub struct CommandListener<'a, W, R> {
    handle: &'a TaskHandle<()>,
    ch: state::Runner<'a>,
    at: AtHandle<'a, W>,
    reset: R,
    topic: String,
}

impl<'a, W: Write, R: SystemReset> CommandListener<'a, W, R> {
    pub(crate) fn new(
        handle: &'a TaskHandle<()>,
        ch: state::Runner<'a>,
        at: AtHandle<'a, W>,
        reset: R,
        topic: String,
    ) -> Self {
        Self {
            handle,
            ch,
            at,
            reset,
            topic,
        }
    }

    pub async fn run(&mut self) -> ! {
        let handle = self.handle;
        loop {
            handle.started().await;
            debug!(target: self.at.log().target(), "Listening on {}", self.topic);
            select(handle.cancelled(), self.listen()).await;
            handle.finish(());
        }
    }

    async fn listen(&mut self) -> ! {
        let target = self.at.log().target();
        loop {
            let line = self.at.mqtt_getmsg().await;
            let Some((topic, payload)) = parse_message(&line) else {
                warn!(target: target, "Malformed message {:?}", line);
                continue;
            };
            if topic != self.topic {
                debug!(target: target, "Ignoring message on {}", topic);
                continue;
            }

            info!(target: target, "Received command: {}", payload);
            match payload.as_str() {
                CMD_RESET => {
                    warn!(target: target, "Resetting device");
                    self.reset.reset();
                }
                CMD_UPLINK_STOP => {
                    self.ch.request_stop();
                }
                _ => debug!(target: target, "Unknown command {:?}", payload),
            }
        }
    }
}
