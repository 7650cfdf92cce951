use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};
use tracing::{debug, error};

use crate::errors::panic_message;

type Event = Box<dyn FnOnce() + Send + 'static>;

/// The consumer side of task events.
///
/// Tasks never call user callbacks on their own threads. They post closures here, and the
/// thread that owns the queue runs them when it calls one of the `dispatch` methods. The
/// queue is `Send` but not `Sync`, so exactly one thread can be the consumer at a time.
///
/// A callback that panics is logged and dropped; the following events still run.
pub struct ConsumerQueue {
    sender: Sender<Event>,
    receiver: Receiver<Event>,
}

impl ConsumerQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self { sender, receiver }
    }

    /// A handle worker threads use to enqueue events
    pub fn poster(&self) -> EventPoster {
        EventPoster {
            sender: self.sender.clone(),
        }
    }

    /// Runs every event that is already queued, without blocking. Returns how many ran.
    pub fn dispatch_pending(&self) -> usize {
        let mut count = 0;
        while let Ok(event) = self.receiver.try_recv() {
            dispatch(event);
            count += 1;
        }
        count
    }

    /// Waits up to `timeout` for one event and runs it. Returns false on timeout.
    pub fn dispatch_next(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => {
                dispatch(event);
                true
            }
            // The queue holds a sender itself, so disconnection cannot happen while it lives.
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Dispatches events until `done` returns true or `timeout` elapses.
    ///
    /// Returns the final value of `done`.
    pub fn run_until(&self, mut done: impl FnMut() -> bool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !done() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.dispatch_next(deadline - now);
        }
        true
    }
}

impl Default for ConsumerQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConsumerQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerQueue").finish_non_exhaustive()
    }
}

fn dispatch(event: Event) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(event)) {
        error!(
            "Task callback panicked: {}",
            panic_message(payload.as_ref())
        );
    }
}

/// Cloneable, thread-safe handle for posting events to a [`ConsumerQueue`]
#[derive(Clone)]
pub struct EventPoster {
    sender: Sender<Event>,
}

impl EventPoster {
    /// Enqueues `event` for the consumer thread.
    ///
    /// Returns false if the queue is gone; the event is dropped in that case.
    pub fn post<F>(&self, event: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if self.sender.send(Box::new(event)).is_err() {
            debug!("Consumer queue closed, dropping event");
            return false;
        }
        true
    }
}

impl fmt::Debug for EventPoster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventPoster").finish_non_exhaustive()
    }
}
