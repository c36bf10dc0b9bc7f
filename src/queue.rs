use alloc::collections::VecDeque;
use core::cell::RefCell;
use core::future::poll_fn;
use core::task::Poll;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::waitqueue::WakerRegistration;

use crate::line::Line;

struct Inner {
    lines: VecDeque<Line>,
    waker: WakerRegistration,
}

/// FIFO of modem lines with a single asynchronous consumer. Every line put is
/// handed out exactly once, in arrival order.
pub struct Queue {
    name: &'static str,
    inner: Mutex<NoopRawMutex, RefCell<Inner>>,
}

impl Queue {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Mutex::new(RefCell::new(Inner {
                lines: VecDeque::new(),
                waker: WakerRegistration::new(),
            })),
        }
    }

    /// Append a line and wake the consumer.
    pub fn put(&self, line: Line) {
        self.inner.lock(|i| {
            let i = &mut *i.borrow_mut();
            trace!("[{}] {:?}", self.name, line);
            i.lines.push_back(line);
            i.waker.wake();
        })
    }

    /// Pop the oldest line, waiting until one is available.
    pub async fn get(&self) -> Line {
        poll_fn(|cx| {
            self.inner.lock(|i| {
                let i = &mut *i.borrow_mut();
                match i.lines.pop_front() {
                    Some(line) => Poll::Ready(line),
                    None => {
                        i.waker.register(cx.waker());
                        Poll::Pending
                    }
                }
            })
        })
        .await
    }

    pub fn try_get(&self) -> Option<Line> {
        self.inner.lock(|i| i.borrow_mut().lines.pop_front())
    }

    pub fn len(&self) -> usize {
        self.inner.lock(|i| i.borrow().lines.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock(|i| i.borrow_mut().lines.clear())
    }
}

/// The two channels modem output is routed to.
pub struct Queues {
    /// Asynchronous events, currently inbound MQTT messages.
    pub unsolicited: Queue,
    /// Everything a command transaction may be waiting for.
    pub response: Queue,
}

impl Default for Queues {
    fn default() -> Self {
        Self::new()
    }
}

impl Queues {
    pub const fn new() -> Self {
        Self {
            unsolicited: Queue::new("unsolicited"),
            response: Queue::new("response"),
        }
    }

    pub fn clear(&self) {
        self.unsolicited.clear();
        self.response.clear();
    }
}
