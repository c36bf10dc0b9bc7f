use alloc::format;
use alloc::string::String;

use embassy_futures::select::{select, select3, Either, Either3};
use embassy_time::{Duration, Timer};

use super::ingress::LineMultiplexer;
use super::listener::CommandListener;
use super::modem::ModemLink;
use super::state::{self, UplinkState};
use super::task::TaskHandle;
use super::{UartRx, UartTx};
use crate::client::AtHandle;
use crate::command::QoS;
use crate::config::{CellularConfig, SystemReset, UplinkConfig};
use crate::error::Error;
use crate::line::LineReader;
use crate::module_timing::MAX_PUBLISH_FAILURES;
use crate::status::UplinkStatus;

/// Background runner of the uplink.
///
/// You must call `.run()` in a background task for the uplink to operate. It
/// drives the line multiplexer, the command listener and the lifecycle
/// supervisor.
pub struct Runner<'a, C: CellularConfig, R> {
    ingress: LineMultiplexer<'a, UartRx<C>>,
    listener: CommandListener<'a, UartTx<C>, R>,
    supervisor: Supervisor<'a, C>,
}

impl<'a, C: CellularConfig, R: SystemReset> Runner<'a, C, R> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        ch: state::Runner<'a>,
        at: AtHandle<'a, UartTx<C>>,
        ingress: &'a TaskHandle<LineReader<UartRx<C>>>,
        listener: &'a TaskHandle<()>,
        config: C,
        settings: UplinkConfig,
        reset: R,
    ) -> Self {
        let cmd_topic = format!("{}/cmd", settings.device_name);
        Self {
            ingress: LineMultiplexer::new(ingress, at.queues(), at.log()),
            listener: CommandListener::new(listener, ch, at, reset, cmd_topic),
            supervisor: Supervisor {
                ch,
                at,
                ingress,
                listener,
                config,
                settings,
            },
        }
    }

    pub async fn run(&mut self) -> ! {
        let Self {
            ingress,
            listener,
            supervisor,
        } = self;

        match select3(ingress.run(), listener.run(), supervisor.run()).await {
            Either3::First(never) => never,
            Either3::Second(never) => never,
            Either3::Third(never) => never,
        }
    }
}

struct Supervisor<'a, C: CellularConfig> {
    ch: state::Runner<'a>,
    at: AtHandle<'a, UartTx<C>>,
    ingress: &'a TaskHandle<LineReader<UartRx<C>>>,
    listener: &'a TaskHandle<()>,
    config: C,
    settings: UplinkConfig,
}

impl<'a, C: CellularConfig> Supervisor<'a, C> {
    async fn run(&mut self) -> ! {
        let target = self.at.log().target();
        loop {
            self.ch.wait_for_start().await;
            info!(target: target, "Uplink starting");

            while self.ch.is_running() {
                // No link is up, earlier stop requests are already honoured
                self.ch.serve_stop();
                self.attempt().await;

                if self.ch.stop_pending() {
                    self.ch.serve_stop();
                    continue;
                }

                if self.ch.is_running() {
                    info!(
                        target: target,
                        "Uplink will be restarted after {} s", self.settings.restart_interval_secs
                    );
                    let backoff = Duration::from_secs(self.settings.restart_interval_secs.into());
                    select(Timer::after(backoff), self.ch.wait_for_stop_request()).await;
                }
            }

            self.ch.set_uplink_state(UplinkState::Stopped);
            self.ch.serve_stop();
            info!(target: target, "Uplink stopped");
        }
    }

    /// One lifecycle attempt on a fresh modem link, always torn down.
    async fn attempt(&mut self) {
        let target = self.at.log().target();
        self.ch.set_uplink_state(UplinkState::Attempting);

        let session = Session {
            ch: self.ch,
            at: self.at,
            listener: self.listener,
            settings: &self.settings,
        };
        let mut link = ModemLink::new(&mut self.config, &self.settings.pins, self.at, self.ingress);

        if let Err(e) = session.run(&mut link).await {
            error!(target: target, "Uplink attempt failed: {:?}", e);
        }

        debug!(target: target, "Uplink cleanup");
        self.ch.set_uplink_state(UplinkState::TearingDown);
        self.listener.cancel().await;
        link.deinit().await;
        let restarts = self.ch.increment_restarts();
        debug!(target: target, "Uplink cleaned up, {} restarts", restarts);
    }
}

/// Protocol steps of one attempt.
struct Session<'s, 'a, C: CellularConfig> {
    ch: state::Runner<'a>,
    at: AtHandle<'a, UartTx<C>>,
    listener: &'a TaskHandle<()>,
    settings: &'s UplinkConfig,
}

impl<C: CellularConfig> Session<'_, '_, C> {
    async fn run(&self, link: &mut ModemLink<'_, '_, C>) -> Result<(), Error> {
        let target = self.at.log().target();

        match select(self.establish(link), self.ch.wait_for_stop_request()).await {
            Either::First(res) => res?,
            Either::Second(()) => {
                info!(target: target, "Uplink stopped during setup");
                return Ok(());
            }
        }

        self.listener.spawn(());
        self.ch.set_uplink_state(UplinkState::Running);
        info!(target: target, "Uplink established");

        self.publish_loop().await?;

        debug!(target: target, "Unsubscribing from {}/cmd", self.settings.device_name);
        self.at.mqtt_unsub(&self.topic("cmd")).await?;
        self.at.mqtt_disconnect().await
    }

    async fn establish(&self, link: &mut ModemLink<'_, '_, C>) -> Result<(), Error> {
        let settings = self.settings;

        link.init().await?;
        self.at.wait_for_netreg().await?;
        self.ch.set_uplink_state(UplinkState::Registered);

        self.at.connect_apn(&settings.apn).await?;
        self.ch.set_uplink_state(UplinkState::ApnAttached);

        self.diagnostics().await;

        if settings.enable_gnss {
            self.at.enable_gnss().await?;
        }

        self.at.mqtt_connect(settings).await?;
        self.at.wait_for_mqtt_online().await?;
        self.ch.set_uplink_state(UplinkState::MqttConnected);

        self.at.mqtt_sub(&self.topic("cmd"), QoS::AtLeastOnce).await
    }

    /// Log network details. Failures do not abort the attempt.
    async fn diagnostics(&self) {
        let target = self.at.log().target();

        match self.at.get_netinfo().await {
            Ok(info) => info!(target: target, "Network: {:?}", &info[..]),
            Err(e) => warn!(target: target, "Failed to get network info: {:?}", e),
        }
        match self.at.get_signalinfo().await {
            Ok(info) => info!(target: target, "Signal: {:?}", &info[..]),
            Err(e) => warn!(target: target, "Failed to get signal info: {:?}", e),
        }
        match self.at.get_netreg().await {
            Ok(info) => info!(target: target, "Registration: {:?}", &info[..]),
            Err(e) => warn!(target: target, "Failed to get registration: {:?}", e),
        }
        match self
            .at
            .get_ntp(&self.settings.ntp_server, self.settings.tz_offset)
            .await
        {
            Ok(info) => info!(target: target, "NTP: {:?}", &info[..]),
            Err(e) => warn!(target: target, "Failed to sync time: {:?}", e),
        }
    }

    /// Publish on a fixed period until the uplink is stopped.
    async fn publish_loop(&self) -> Result<(), Error> {
        let target = self.at.log().target();
        let interval = Duration::from_secs(self.settings.pub_interval_secs.into());
        let mut failures = 0;

        while !self.ch.stop_pending() {
            match self.publish_cycle().await {
                Ok(()) => {
                    failures = 0;
                    if let Either::Second(()) =
                        select(Timer::after(interval), self.ch.wait_for_stop_request()).await
                    {
                        break;
                    }
                }
                Err(e) => {
                    failures += 1;
                    error!(
                        target: target,
                        "Publish cycle failed ({}/{}): {:?}", failures, MAX_PUBLISH_FAILURES, e
                    );
                    if failures > MAX_PUBLISH_FAILURES {
                        return Err(Error::PublishCycle);
                    }
                }
            }
        }
        Ok(())
    }

    async fn publish_cycle(&self) -> Result<(), Error> {
        let ts = self.at.get_time().await?;

        if self.settings.enable_gnss {
            let loc = self.at.get_gnss().await?;
            self.publish("loc", &serde_json::to_string(&loc)?).await?;
        }

        if let Some(data) = self.ch.data() {
            for key in data.keys() {
                if let Some(value) = data.encoded(&key)? {
                    self.publish(&key, &value).await?;
                }
            }
        }

        let status = UplinkStatus::collect(self.ch.is_running(), self.ch.restarts(), &self.at).await;
        self.publish("status", &serde_json::to_string(&(ts, status))?)
            .await
    }

    async fn publish(&self, field: &str, msg: &str) -> Result<(), Error> {
        self.at
            .mqtt_pub(&self.topic(field), msg, QoS::AtLeastOnce, true)
            .await
    }

    fn topic(&self, field: &str) -> String {
        format!("{}/{}", self.settings.device_name, field)
    }
}
