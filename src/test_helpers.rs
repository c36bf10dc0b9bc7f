//! Scripted SIM7000 modem for driving the uplink in tests.
extern crate std;

/// Open a serial link to `$sim` with a running line multiplexer. Binds the
/// command handle to `$at` and the multiplexer, which must be polled, to
/// `$mux`.
macro_rules! modem_link {
    ($sim:expr => $at:ident, $mux:ident) => {
        let mut board = $crate::test_helpers::board(&$sim);
        let (rx, tx) = $crate::config::Uart::open(
            $crate::config::CellularConfig::uart(&mut board),
            &$crate::config::PinAssignment::default(),
            9600,
        )
        .unwrap();
        let log = $crate::config::LogConfig::default().verbose(true);
        let queues = $crate::queue::Queues::new();
        let tx = embassy_sync::mutex::Mutex::<
            embassy_sync::blocking_mutex::raw::NoopRawMutex,
            _,
        >::new(Some(tx));
        let ingress = $crate::asynch::task::TaskHandle::new();
        ingress.spawn($crate::line::LineReader::new(rx));
        #[allow(unused_mut)]
        let mut $mux = $crate::asynch::ingress::LineMultiplexer::new(&ingress, &queues, &log);
        let $at = $crate::client::AtHandle::new(&tx, &queues, &log);
    };
}

use std::cell::RefCell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::future::{poll_fn, Future};
use std::rc::Rc;
use std::string::{String, ToString};
use std::sync::{Mutex, MutexGuard};
use std::task::{Poll, Waker};
use std::vec::Vec;

use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Instant, MockDriver};
use embedded_hal::digital::{ErrorType, OutputPin};

use crate::config::{CellularConfig, NoPin, PinAssignment, Uart, UplinkConfig};

pub type Sim = Rc<RefCell<ModemSim>>;

enum Payload {
    Publish { topic: String, len: usize },
    Sms { number: String },
}

pub struct ModemSim {
    rx: VecDeque<u8>,
    rx_waker: Option<Waker>,
    input: Vec<u8>,
    payload: Option<(Payload, Vec<u8>)>,
    boot: Vec<&'static str>,

    /// Never answer anything
    pub mute: bool,
    /// Fail to open the UART
    pub fail_open: bool,
    /// Commands starting with one of these get no answer
    pub silent: Vec<&'static str>,
    /// `+CREG` status answered per poll, `1` once exhausted
    pub creg: VecDeque<u8>,
    /// `+SMSTATE` status
    pub mqtt_state: u8,
    /// Stored messages listed by `+CMGL`
    pub inbox: u32,

    pub commands: Vec<String>,
    pub published: Vec<(String, String)>,
    pub sms_sent: Vec<(String, String)>,
    pub pins: Vec<(&'static str, bool, Instant)>,
    pub opens: usize,
    pub closes: usize,
}

impl ModemSim {
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> Sim {
        Rc::new(RefCell::new(Self {
            rx: VecDeque::new(),
            rx_waker: None,
            input: Vec::new(),
            payload: None,
            boot: Vec::new(),
            mute: false,
            fail_open: false,
            silent: Vec::new(),
            creg: VecDeque::new(),
            mqtt_state: 1,
            inbox: 2,
            commands: Vec::new(),
            published: Vec::new(),
            sms_sent: Vec::new(),
            pins: Vec::new(),
            opens: 0,
            closes: 0,
        }))
    }

    /// Lines emitted as soon as the UART is opened
    pub fn boot_lines(&mut self, lines: &[&'static str]) {
        self.boot.extend_from_slice(lines);
    }

    /// Emit one line of modem output.
    pub fn inject(&mut self, line: &str) {
        self.rx.extend(line.as_bytes());
        self.rx.extend(b"\r\n");
        if let Some(w) = self.rx_waker.take() {
            w.wake();
        }
    }

    pub fn pin_levels(&self) -> Vec<(&'static str, bool)> {
        self.pins.iter().map(|(name, level, _)| (*name, *level)).collect()
    }

    pub fn topics(&self) -> Vec<&str> {
        self.published.iter().map(|(t, _)| t.as_str()).collect()
    }

    fn respond(&mut self, lines: &[&str]) {
        for line in lines {
            self.inject("");
            self.inject(line);
        }
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if let Some((payload, mut buf)) = self.payload.take() {
                match payload {
                    Payload::Publish { topic, len } => {
                        buf.push(b);
                        if buf.len() == len {
                            let msg = String::from_utf8_lossy(&buf).to_string();
                            self.published.push((topic, msg));
                            self.respond(&["OK"]);
                        } else {
                            self.payload = Some((Payload::Publish { topic, len }, buf));
                        }
                    }
                    Payload::Sms { number } => {
                        if b == 0x1A {
                            let msg = String::from_utf8_lossy(&buf).to_string();
                            self.sms_sent.push((number, msg));
                            self.respond(&["+CMGS: 1", "OK"]);
                        } else {
                            buf.push(b);
                            self.payload = Some((Payload::Sms { number }, buf));
                        }
                    }
                }
                continue;
            }

            if b == b'\n' {
                let line = String::from_utf8_lossy(&self.input).trim().to_string();
                self.input.clear();
                if !line.is_empty() {
                    self.command(line);
                }
            } else {
                self.input.push(b);
            }
        }
    }

    fn command(&mut self, cmd: String) {
        self.commands.push(cmd.clone());
        if self.mute || self.silent.iter().any(|s| cmd.starts_with(s)) {
            return;
        }

        if let Some(args) = cmd.strip_prefix("AT+SMPUB=") {
            let mut fields = args.split(',');
            let topic = fields.next().unwrap_or_default().trim_matches('"').to_string();
            let len = fields.next().and_then(|l| l.parse().ok()).unwrap_or(0);
            self.payload = Some((Payload::Publish { topic, len }, Vec::new()));
            return;
        }
        if let Some(number) = cmd.strip_prefix("AT+CMGS=") {
            let number = number.trim_matches('"').to_string();
            self.payload = Some((Payload::Sms { number }, Vec::new()));
            return;
        }

        match cmd.as_str() {
            "AT+CREG?" => {
                let stat = self.creg.pop_front().unwrap_or(1);
                let line = std::format!("+CREG: 0,{}", stat);
                self.respond(&[&line, "OK"]);
            }
            "AT+CSQ" => self.respond(&["+CSQ: 15,2", "OK"]),
            "AT+CPSI?" => self.respond(&[
                "+CPSI: LTE CAT-M1,Online,230-03,0x1A2B,12345,301,EUTRAN-BAND20,6300,3,3,-10,-95,-65,12",
                "OK",
            ]),
            "AT+SMSTATE?" => {
                let line = std::format!("+SMSTATE: {}", self.mqtt_state);
                self.respond(&[&line, "OK"]);
            }
            "AT+CNACT?" => self.respond(&["+CNACT: 1,\"10.64.12.7\"", "OK"]),
            "AT+CCLK?" => self.respond(&["+CCLK: \"21/05/10,22:10:39+08\"", "OK"]),
            "AT+CNTP" => self.respond(&["OK", "+CNTP: 1"]),
            "AT+CGNSINF" => self.respond(&[
                "+CGNSINF: 1,1,20210510221039.000,50.087,14.421,235.4,0.00,0.0,1,,1.1,1.4,0.9,,11,7,,,38,,",
                "OK",
            ]),
            "AT+CMGL=\"ALL\"" => {
                let mut lines = Vec::new();
                for i in 1..=self.inbox {
                    lines.push(std::format!(
                        "+CMGL: {},\"REC READ\",\"+420777000{}\",\"\",\"21/05/10,20:01:12+08\"",
                        i,
                        i * 111
                    ));
                    lines.push(std::format!("message {}", i));
                }
                lines.push("OK".to_string());
                let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
                self.respond(&lines);
            }
            _ if cmd.starts_with("AT") => self.respond(&["OK"]),
            _ => self.respond(&["ERROR"]),
        }
    }
}

pub struct MockRx(Sim);

impl embedded_io_async::ErrorType for MockRx {
    type Error = Infallible;
}

impl embedded_io_async::Read for MockRx {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        poll_fn(|cx| {
            let mut sim = self.0.borrow_mut();
            if sim.rx.is_empty() {
                sim.rx_waker = Some(cx.waker().clone());
                return Poll::Pending;
            }
            let n = sim.rx.len().min(buf.len());
            for (dst, src) in buf.iter_mut().zip(sim.rx.drain(..n)) {
                *dst = src;
            }
            Poll::Ready(Ok(n))
        })
        .await
    }
}

pub struct MockTx(Sim);

impl embedded_io_async::ErrorType for MockTx {
    type Error = Infallible;
}

impl embedded_io_async::Write for MockTx {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.0.borrow_mut().write(buf);
        Ok(buf.len())
    }
}

/// Records everything written to it.
#[derive(Clone, Default)]
pub struct SinkTx(Rc<RefCell<Vec<u8>>>);

impl SinkTx {
    pub fn written(&self) -> Vec<u8> {
        self.0.borrow().clone()
    }
}

impl embedded_io_async::ErrorType for SinkTx {
    type Error = Infallible;
}

impl embedded_io_async::Write for SinkTx {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }
}

pub struct MockUart(Sim);

impl Uart for MockUart {
    type Error = ();
    type Rx = MockRx;
    type Tx = MockTx;

    fn open(&mut self, _pins: &PinAssignment, baudrate: u32) -> Result<(MockRx, MockTx), ()> {
        assert_eq!(baudrate, 9600);
        let mut sim = self.0.borrow_mut();
        if sim.fail_open {
            return Err(());
        }
        sim.opens += 1;
        sim.rx.clear();
        sim.input.clear();
        sim.payload = None;
        let boot = sim.boot.clone();
        for line in boot {
            sim.inject(line);
        }
        Ok((MockRx(self.0.clone()), MockTx(self.0.clone())))
    }

    fn close(&mut self, _rx: Option<MockRx>, _tx: Option<MockTx>) {
        self.0.borrow_mut().closes += 1;
    }
}

pub struct MockPin {
    name: &'static str,
    sim: Sim,
}

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.sim.borrow_mut().pins.push((self.name, false, Instant::now()));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.sim.borrow_mut().pins.push((self.name, true, Instant::now()));
        Ok(())
    }
}

pub struct MockBoard {
    reset: MockPin,
    power: MockPin,
    uart: MockUart,
}

impl CellularConfig for MockBoard {
    type ResetPin = MockPin;
    type PowerPin = MockPin;
    type Uart = MockUart;

    fn reset_pin(&mut self) -> &mut MockPin {
        &mut self.reset
    }

    fn power_pin(&mut self) -> &mut MockPin {
        &mut self.power
    }

    fn uart(&mut self) -> &mut MockUart {
        &mut self.uart
    }
}

pub fn board(sim: &Sim) -> MockBoard {
    MockBoard {
        reset: MockPin {
            name: "reset",
            sim: sim.clone(),
        },
        power: MockPin {
            name: "power",
            sim: sim.clone(),
        },
        uart: MockUart(sim.clone()),
    }
}

/// Board with the modem reset line left unconnected.
pub struct PowerOnlyBoard {
    reset: NoPin,
    power: MockPin,
    uart: MockUart,
}

impl CellularConfig for PowerOnlyBoard {
    type ResetPin = NoPin;
    type PowerPin = MockPin;
    type Uart = MockUart;

    fn reset_pin(&mut self) -> &mut NoPin {
        &mut self.reset
    }

    fn power_pin(&mut self) -> &mut MockPin {
        &mut self.power
    }

    fn uart(&mut self) -> &mut MockUart {
        &mut self.uart
    }
}

pub fn power_only_board(sim: &Sim) -> PowerOnlyBoard {
    PowerOnlyBoard {
        reset: NoPin,
        power: MockPin {
            name: "power",
            sim: sim.clone(),
        },
        uart: MockUart(sim.clone()),
    }
}

pub fn config() -> UplinkConfig {
    serde_json::from_str(
        r#"{
            "apn": { "name": "internet" },
            "broker": {
                "host": "mqtt.example.com",
                "username": "username",
                "password": "xyzabcdefgh"
            },
            "client_id": "clientid",
            "device_name": "beetle",
            "ntp_server": "ntp.nic.cz",
            "pub_interval_secs": 60,
            "restart_interval_secs": 30
        }"#,
    )
    .unwrap()
}

/// Serialises tests that move the shared mock clock.
pub fn time_lock() -> MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    let _ = env_logger::builder().is_test(true).try_init();
    LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

/// Advance the mock clock in small steps, forever.
pub async fn tick() -> ! {
    loop {
        MockDriver::get().advance(Duration::from_millis(10));
        tokio::task::yield_now().await;
    }
}

/// Poll `cond` every 50 ms of mock time until it holds.
pub async fn wait_until(cond: impl Fn() -> bool) {
    while !cond() {
        embassy_time::Timer::after(Duration::from_millis(50)).await;
    }
}

/// Run `fut` while the mock clock advances.
pub async fn run_with_clock<F: Future>(fut: F) -> F::Output {
    match select(fut, tick()).await {
        Either::First(out) => out,
        Either::Second(never) => never,
    }
}
