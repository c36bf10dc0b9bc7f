use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::signal::Signal;

/// Start and cancel a background loop that is polled as part of
/// [`Runner::run`](super::runner::Runner::run).
///
/// The loop receives an `S` when spawned and hands back a `T` once it has
/// observed cancellation, so [`cancel`](Self::cancel) returning means the loop
/// no longer touches what it was given.
pub struct TaskHandle<S, T = S> {
    start: Signal<NoopRawMutex, S>,
    cancel: Signal<NoopRawMutex, ()>,
    done: Signal<NoopRawMutex, T>,
    active: Cell<bool>,
}

impl<S, T> Default for TaskHandle<S, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, T> TaskHandle<S, T> {
    pub const fn new() -> Self {
        Self {
            start: Signal::new(),
            cancel: Signal::new(),
            done: Signal::new(),
            active: Cell::new(false),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    pub fn spawn(&self, arg: S) {
        self.cancel.reset();
        self.done.reset();
        self.active.set(true);
        self.start.signal(arg);
    }

    /// Request cancellation and wait for the loop to hand back its resources.
    /// Returns `None` if the loop was not spawned.
    pub async fn cancel(&self) -> Option<T> {
        if !self.active.replace(false) {
            return None;
        }
        self.cancel.signal(());
        Some(self.done.wait().await)
    }

    // Loop side

    pub(crate) async fn started(&self) -> S {
        self.start.wait().await
    }

    pub(crate) async fn cancelled(&self) {
        self.cancel.wait().await
    }

    pub(crate) fn finish(&self, out: T) {
        self.done.signal(out);
    }
}
