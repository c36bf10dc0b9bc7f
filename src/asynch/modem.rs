use embassy_time::{with_timeout, Timer};

use super::pwr::PwrCtrl;
use super::task::TaskHandle;
use super::{UartRx, UartTx};
use crate::client::{AtHandle, Terminator};
use crate::config::{CellularConfig, PinAssignment, Uart};
use crate::error::Error;
use crate::line::LineReader;
use crate::module_timing::{
    boot_time, cmd_timeout, drain_idle_time, liveness_interval, liveness_timeout, teardown_gap,
    LIVENESS_ATTEMPTS, LIVENESS_ROUNDS,
};

/// Power, reset and serial link of the modem for one lifecycle attempt.
pub(crate) struct ModemLink<'r, 'a, C: CellularConfig> {
    config: &'r mut C,
    pins: &'r PinAssignment,
    at: AtHandle<'a, UartTx<C>>,
    ingress: &'a TaskHandle<LineReader<UartRx<C>>>,
    /// Reader half until it is handed to the line multiplexer
    rx: Option<LineReader<UartRx<C>>>,
    opened: bool,
}

impl<'r, 'a, C: CellularConfig> ModemLink<'r, 'a, C> {
    pub(crate) fn new(
        config: &'r mut C,
        pins: &'r PinAssignment,
        at: AtHandle<'a, UartTx<C>>,
        ingress: &'a TaskHandle<LineReader<UartRx<C>>>,
    ) -> Self {
        at.queues().clear();
        Self {
            config,
            pins,
            at,
            ingress,
            rx: None,
            opened: false,
        }
    }

    /// Power the modem up and bring it to a responsive state.
    pub(crate) async fn init(&mut self) -> Result<(), Error> {
        let target = self.at.log().target();
        debug!(target: target, "Initializing modem");

        PwrCtrl::new(&mut *self.config).pulse_reset().await?;

        let (rx, tx) = self
            .config
            .uart()
            .open(self.pins, C::BAUDRATE)
            .map_err(|e| {
                error!(target: target, "Failed to open UART: {:?}", e);
                Error::Serial
            })?;
        self.opened = true;
        self.rx = Some(LineReader::new(rx));
        self.at.attach(tx).await;

        PwrCtrl::new(&mut *self.config).pulse_power().await?;
        Timer::after(boot_time()).await;
        info!(target: target, "Modem enabled");

        self.drain().await;
        if let Some(reader) = self.rx.take() {
            self.ingress.spawn(reader);
        }

        self.check_alive().await?;

        // Text mode SMS
        self.at.execute_ok("AT+CMGF=1").await?;
        Ok(())
    }

    /// Discard boot messages until the line stays quiet.
    async fn drain(&mut self) {
        let Some(reader) = self.rx.as_mut() else {
            return;
        };

        loop {
            match with_timeout(drain_idle_time(), reader.read_line()).await {
                Ok(Ok(line)) => verbose!(self.at.log(), "Drained {:?}", line),
                Ok(Err(e)) => {
                    warn!(target: self.at.log().target(), "Failed to drain input: {:?}", e);
                    break;
                }
                Err(_) => break,
            }
        }
    }

    /// Wait for the modem to answer `AT`, toggling its power if it does not.
    async fn check_alive(&mut self) -> Result<(), Error> {
        let target = self.at.log().target();

        for round in 1..=LIVENESS_ROUNDS {
            for _ in 0..LIVENESS_ATTEMPTS {
                match self.at.execute("AT", Terminator::OK, liveness_timeout()).await {
                    Ok(_) => break,
                    Err(Error::Timeout) => {}
                    Err(e) => return Err(e),
                }
                Timer::after(liveness_interval()).await;
            }

            match self.at.execute("AT", Terminator::OK, cmd_timeout()).await {
                Ok(_) => return Ok(()),
                Err(Error::Timeout) => {
                    warn!(
                        target: target,
                        "Modem not responding, toggling power ({}/{})", round, LIVENESS_ROUNDS
                    );
                    PwrCtrl::new(&mut *self.config).pulse_power().await?;
                }
                Err(e) => return Err(e),
            }
        }

        error!(target: target, "Modem did not respond to AT");
        Err(Error::Timeout)
    }

    /// Close the serial link and power the modem off. Failures are logged and
    /// ignored.
    pub(crate) async fn deinit(mut self) {
        let target = self.at.log().target();

        if let Err(e) = self.at.flush().await {
            warn!(target: target, "Failed to flush UART: {:?}", e);
        }
        let reader = match self.ingress.cancel().await {
            Some(reader) => Some(reader),
            None => self.rx.take(),
        };
        let tx = self.at.detach().await;

        if !self.opened {
            let mut pwr = PwrCtrl::new(&mut *self.config);
            if let Err(e) = pwr.pulse_reset().await {
                warn!(target: target, "Failed to reset modem: {:?}", e);
            }
            return;
        }

        self.config
            .uart()
            .close(reader.map(LineReader::into_inner), tx);

        let mut pwr = PwrCtrl::new(&mut *self.config);
        Timer::after(teardown_gap()).await;
        if let Err(e) = pwr.pulse_reset().await {
            warn!(target: target, "Failed to reset modem: {:?}", e);
        }
        Timer::after(teardown_gap()).await;
        if let Err(e) = pwr.pulse_power().await {
            warn!(target: target, "Failed to power modem off: {:?}", e);
        }
        info!(target: target, "Modem disabled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogConfig;
    use crate::queue::Queues;
    use crate::test_helpers::{board, power_only_board, run_with_clock, time_lock, MockTx, ModemSim};
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use embassy_sync::mutex::Mutex;

    #[tokio::test]
    async fn init_and_deinit() {
        let _time = time_lock();
        let sim = ModemSim::new();
        sim.borrow_mut().boot_lines(&["RDY", "+CFUN: 1", "+CPIN: READY"]);
        let mut board = board(&sim);

        let log = LogConfig::default();
        let queues = Queues::new();
        let tx: Mutex<NoopRawMutex, Option<MockTx>> = Mutex::new(None);
        let ingress = TaskHandle::new();
        let mut mux = crate::asynch::ingress::LineMultiplexer::new(&ingress, &queues, &log);
        let at = AtHandle::new(&tx, &queues, &log);
        let pins = PinAssignment::default();

        let body = async {
            let mut link = ModemLink::new(&mut board, &pins, at, &ingress);
            link.init().await.unwrap();
            assert!(at.is_attached().await);
            assert!(queues.response.is_empty());
            link.deinit().await;
            assert!(!at.is_attached().await);
        };
        run_with_clock(embassy_futures::select::select(body, mux.run())).await;

        let sim = sim.borrow();
        assert_eq!(sim.opens, 1);
        assert_eq!(sim.closes, 1);
        assert_eq!(sim.commands, ["AT", "AT", "AT+CMGF=1"]);
        assert_eq!(
            sim.pin_levels(),
            [
                ("reset", true),
                ("reset", false),
                ("power", true),
                ("power", false),
                ("reset", true),
                ("reset", false),
                ("power", true),
                ("power", false),
            ]
        );
    }

    #[tokio::test]
    async fn silent_modem_fails_init() {
        let _time = time_lock();
        let sim = ModemSim::new();
        sim.borrow_mut().mute = true;
        let mut board = board(&sim);

        let log = LogConfig::default();
        let queues = Queues::new();
        let tx: Mutex<NoopRawMutex, Option<MockTx>> = Mutex::new(None);
        let ingress = TaskHandle::new();
        let mut mux = crate::asynch::ingress::LineMultiplexer::new(&ingress, &queues, &log);
        let at = AtHandle::new(&tx, &queues, &log);
        let pins = PinAssignment::default();

        let body = async {
            let mut link = ModemLink::new(&mut board, &pins, at, &ingress);
            let res = link.init().await;
            link.deinit().await;
            res
        };
        let res = run_with_clock(embassy_futures::select::select(body, mux.run())).await;
        assert!(matches!(res, embassy_futures::select::Either::First(Err(Error::Timeout))));

        let sim = sim.borrow();
        assert_eq!(sim.commands.len(), 2 * (LIVENESS_ATTEMPTS + 1));
        // Power on, one toggle per failed round, power off
        assert_eq!(sim.pin_levels().iter().filter(|p| **p == ("power", true)).count(), 4);
        assert_eq!(sim.closes, 1);
    }

    #[tokio::test]
    async fn board_without_reset_line() {
        let _time = time_lock();
        let sim = ModemSim::new();
        let mut board = power_only_board(&sim);

        let log = LogConfig::default();
        let queues = Queues::new();
        let tx: Mutex<NoopRawMutex, Option<MockTx>> = Mutex::new(None);
        let ingress = TaskHandle::new();
        let mut mux = crate::asynch::ingress::LineMultiplexer::new(&ingress, &queues, &log);
        let at = AtHandle::new(&tx, &queues, &log);
        let pins = PinAssignment::default();

        let body = async {
            let mut link = ModemLink::new(&mut board, &pins, at, &ingress);
            link.init().await.unwrap();
            link.deinit().await;
        };
        run_with_clock(embassy_futures::select::select(body, mux.run())).await;

        let sim = sim.borrow();
        assert_eq!(sim.commands, ["AT", "AT", "AT+CMGF=1"]);
        assert_eq!(
            sim.pin_levels(),
            [("power", true), ("power", false), ("power", true), ("power", false)]
        );
        assert_eq!((sim.opens, sim.closes), (1, 1));
    }
}
