use core::cell::RefCell;
use core::future::poll_fn;
use core::task::Poll;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::waitqueue::MultiWakerRegistration;

use crate::telemetry::Telemetry;

/// Tasks that may wait on one state change at the same time.
const WAKERS: usize = 4;

/// Lifecycle of the uplink.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UplinkState {
    /// No attempt in progress and none scheduled.
    Stopped,
    /// Powering up and probing the modem.
    Attempting,
    /// Registered to the home network.
    Registered,
    /// Bearer opened on the configured APN.
    ApnAttached,
    /// Broker session online.
    MqttConnected,
    /// Publishing, command listener active.
    Running,
    /// Cancelling the command listener and powering the modem down.
    TearingDown,
}

pub struct State<'a> {
    shared: Mutex<NoopRawMutex, RefCell<Shared<'a>>>,
}

impl Default for State<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> State<'a> {
    pub const fn new() -> Self {
        Self {
            shared: Mutex::new(RefCell::new(Shared {
                running: false,
                uplink_state: UplinkState::Stopped,
                restarts: 0,
                stop_requested: 0,
                stop_served: 0,
                data: None,
                state_waker: MultiWakerRegistration::new(),
                stop_waker: MultiWakerRegistration::new(),
            })),
        }
    }
}

/// State of the uplink supervisor
pub struct Shared<'a> {
    running: bool,
    uplink_state: UplinkState,
    restarts: u32,
    /// Stop requests issued so far
    stop_requested: u32,
    /// Stop requests the supervisor has acted on
    stop_served: u32,
    data: Option<&'a Telemetry>,
    state_waker: MultiWakerRegistration<WAKERS>,
    stop_waker: MultiWakerRegistration<WAKERS>,
}

#[derive(Clone, Copy)]
pub struct Runner<'a> {
    shared: &'a Mutex<NoopRawMutex, RefCell<Shared<'a>>>,
}

impl<'a> Runner<'a> {
    pub fn new(state: &'a State<'a>) -> Self {
        Self {
            shared: &state.shared,
        }
    }

    pub fn set_running(&self, running: bool) {
        self.shared.lock(|s| {
            s.borrow_mut().running = running;
        })
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock(|s| s.borrow().running)
    }

    /// Clear the running flag and file a stop request. Returns the request
    /// number to wait on with [`wait_for_stop_served`](Self::wait_for_stop_served).
    /// A request made while stopped is served at once.
    pub fn request_stop(&self) -> u32 {
        self.shared.lock(|s| {
            let s = &mut *s.borrow_mut();
            s.running = false;
            s.stop_requested += 1;
            if s.uplink_state == UplinkState::Stopped {
                s.stop_served = s.stop_requested;
            }
            s.stop_waker.wake();
            s.stop_requested
        })
    }

    pub fn stop_pending(&self) -> bool {
        self.shared.lock(|s| {
            let s = s.borrow();
            s.stop_requested != s.stop_served
        })
    }

    /// Wait until a stop request is pending.
    pub async fn wait_for_stop_request(&self) {
        poll_fn(|cx| {
            self.shared.lock(|s| {
                let s = &mut *s.borrow_mut();
                if s.stop_requested != s.stop_served {
                    return Poll::Ready(());
                }
                s.stop_waker.register(cx.waker());
                Poll::Pending
            })
        })
        .await
    }

    /// Mark every stop request so far as served. Called by the supervisor once
    /// no modem link is up any more.
    pub fn serve_stop(&self) {
        self.shared.lock(|s| {
            let s = &mut *s.borrow_mut();
            if s.stop_served != s.stop_requested {
                s.stop_served = s.stop_requested;
                s.state_waker.wake();
            }
        })
    }

    /// Wait until stop request `request` has been served.
    pub async fn wait_for_stop_served(&self, request: u32) {
        poll_fn(|cx| {
            self.shared.lock(|s| {
                let s = &mut *s.borrow_mut();
                if s.stop_served >= request {
                    return Poll::Ready(());
                }
                s.state_waker.register(cx.waker());
                Poll::Pending
            })
        })
        .await
    }

    pub fn set_uplink_state(&self, state: UplinkState) {
        self.shared.lock(|s| {
            let s = &mut *s.borrow_mut();
            if s.uplink_state != state {
                debug!("Uplink state {:?} -> {:?}", s.uplink_state, state);
            }
            s.uplink_state = state;
            s.state_waker.wake();
        })
    }

    pub fn uplink_state(&self) -> UplinkState {
        self.shared.lock(|s| s.borrow().uplink_state)
    }

    pub async fn wait_for_uplink_state(&self, state: UplinkState) {
        poll_fn(|cx| {
            self.shared.lock(|s| {
                let s = &mut *s.borrow_mut();
                if s.uplink_state == state {
                    return Poll::Ready(());
                }
                s.state_waker.register(cx.waker());
                Poll::Pending
            })
        })
        .await
    }

    /// Wait until the uplink leaves [`UplinkState::Stopped`].
    pub async fn wait_for_start(&self) {
        poll_fn(|cx| {
            self.shared.lock(|s| {
                let s = &mut *s.borrow_mut();
                if s.uplink_state != UplinkState::Stopped {
                    return Poll::Ready(());
                }
                s.state_waker.register(cx.waker());
                Poll::Pending
            })
        })
        .await
    }

    pub fn restarts(&self) -> u32 {
        self.shared.lock(|s| s.borrow().restarts)
    }

    pub fn increment_restarts(&self) -> u32 {
        self.shared.lock(|s| {
            let s = &mut *s.borrow_mut();
            s.restarts = s.restarts.saturating_add(1);
            s.restarts
        })
    }

    pub fn set_data(&self, data: &'a Telemetry) {
        self.shared.lock(|s| s.borrow_mut().data = Some(data))
    }

    pub fn data(&self) -> Option<&'a Telemetry> {
        self.shared.lock(|s| s.borrow().data)
    }
}
