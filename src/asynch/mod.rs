pub mod control;
pub(crate) mod ingress;
pub mod listener;
pub(crate) mod modem;
mod pwr;
pub mod runner;
pub mod state;
pub mod task;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::mutex::Mutex;

use crate::client::AtHandle;
use crate::config::{CellularConfig, LogConfig, SystemReset, Uart, UplinkConfig};
use crate::line::LineReader;
use crate::queue::Queues;
use control::Control;
use runner::Runner;
use task::TaskHandle;

pub(crate) type UartRx<C> = <<C as CellularConfig>::Uart as Uart>::Rx;
pub(crate) type UartTx<C> = <<C as CellularConfig>::Uart as Uart>::Tx;

/// Storage shared by the [`Control`] and [`Runner`] of one modem.
pub struct State<'a, U: Uart> {
    ch: state::State<'a>,
    queues: Queues,
    tx: Mutex<NoopRawMutex, Option<U::Tx>>,
    ingress: TaskHandle<LineReader<U::Rx>>,
    listener: TaskHandle<()>,
    log: LogConfig,
}

impl<U: Uart> Default for State<'_, U> {
    fn default() -> Self {
        Self::new(LogConfig::default())
    }
}

impl<'a, U: Uart> State<'a, U> {
    pub fn new(log: LogConfig) -> Self {
        Self {
            ch: state::State::new(),
            queues: Queues::new(),
            tx: Mutex::new(None),
            ingress: TaskHandle::new(),
            listener: TaskHandle::new(),
            log,
        }
    }
}

pub fn new<'a, C: CellularConfig, R: SystemReset>(
    state: &'a mut State<'a, C::Uart>,
    config: C,
    settings: UplinkConfig,
    reset: R,
) -> (Control<'a, UartTx<C>>, Runner<'a, C, R>) {
    let state: &'a State<'a, C::Uart> = state;
    let ch = state::Runner::new(&state.ch);
    let at = AtHandle::new(&state.tx, &state.queues, &state.log);

    let runner = Runner::new(
        ch,
        at,
        &state.ingress,
        &state.listener,
        config,
        settings,
        reset,
    );
    let control = Control::new(ch, at);

    (control, runner)
}
