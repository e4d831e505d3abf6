//! FIFO handoff of rotated log paths from any number of producers to the single compression
//! task. Unbounded, pushing never blocks.

use std::{
    collections::VecDeque,
    path::PathBuf,
    sync::{Mutex, MutexGuard, PoisonError},
};

use tokio::{pin, sync::Notify};
use tracing::debug;

use crate::error::NotRunning;

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<PathBuf>,
    closed: bool,
    // An item has been handed out and its processing has not been reported done yet.
    in_flight: bool,
}

#[derive(Debug, Default)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    item_notify: Notify,
    settled_notify: Notify,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, path: PathBuf) -> Result<(), NotRunning> {
        {
            let mut state = self.lock();
            if state.closed {
                return Err(NotRunning);
            }
            state.items.push_back(path);
        }
        self.item_notify.notify_one();
        Ok(())
    }

    /// Waits for the next path. Returns `None` once the queue is closed.
    pub async fn pop(&self) -> Option<PathBuf> {
        loop {
            let notified = self.item_notify.notified();
            pin!(notified);
            // Register interest before checking, so a push between the check and the await is
            // not missed.
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.closed {
                    return None;
                }
                if let Some(path) = state.items.pop_front() {
                    state.in_flight = true;
                    return Some(path);
                }
            }

            notified.await;
        }
    }

    /// Marks the most recently popped path as fully processed.
    pub fn task_done(&self) {
        let mut state = self.lock();
        state.in_flight = false;
        if state.items.is_empty() {
            self.settled_notify.notify_waiters();
        }
    }

    /// Closes the queue, discarding pending paths and waking every waiter. Returns the number of
    /// paths discarded.
    pub fn close(&self) -> usize {
        let discarded = {
            let mut state = self.lock();
            if state.closed {
                return 0;
            }
            state.closed = true;
            let discarded = state.items.len();
            state.items.clear();
            discarded
        };
        debug!(discarded, "closed work queue");
        self.item_notify.notify_waiters();
        self.settled_notify.notify_waiters();
        discarded
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Resolves once nothing is queued and nothing is being processed, or the queue is closed.
    pub async fn settled(&self) {
        loop {
            let notified = self.settled_notify.notified();
            pin!(notified);
            notified.as_mut().enable();

            {
                let state = self.lock();
                if state.closed || (state.items.is_empty() && !state.in_flight) {
                    return;
                }
            }

            notified.await;
        }
    }
}
