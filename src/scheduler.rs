//! Single-threaded timer queue driven by the router's event loop.
//!
//! Every scheduled event is owned by a [`TimerHandle`]; dropping the handle
//! cancels the event, so replacing a stored handle is enough to cancel the
//! previous timer.

use log::trace;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tokio::time::Instant;

use crate::lsa::LsaKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Expiration or refresh of the LSA stored under `key`, armed when it
    /// carried `seq_no`.
    ExpireLsa { key: LsaKey, seq_no: u64 },
    BuildAdjLsa,
    CalculateRoutes,
}

#[derive(Debug, Default)]
struct Queue {
    next_id: u64,
    // (deadline, insertion id) keeps equal deadlines in FIFO order.
    entries: BTreeMap<(Instant, u64), Event>,
}

#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    queue: Rc<RefCell<Queue>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&self, delay: Duration, event: Event) -> TimerHandle {
        self.schedule_at(Instant::now() + delay, event)
    }

    pub fn schedule_at(&self, deadline: Instant, event: Event) -> TimerHandle {
        let mut queue = self.queue.borrow_mut();
        let id = queue.next_id;
        queue.next_id += 1;
        trace!("Scheduling {:?} (timer {})", event, id);
        queue.entries.insert((deadline, id), event);
        TimerHandle {
            queue: Rc::downgrade(&self.queue),
            slot: (deadline, id),
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue.borrow().entries.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Removes and returns the earliest event due at or before `now`.
    pub fn pop_next_due(&self, now: Instant) -> Option<Event> {
        let mut queue = self.queue.borrow_mut();
        let slot = *queue.entries.keys().next()?;
        if slot.0 > now {
            return None;
        }
        queue.entries.remove(&slot)
    }

    /// Removes every event due at or before `now`, in deadline order.
    pub fn pop_due(&self, now: Instant) -> Vec<Event> {
        let mut due = Vec::new();
        while let Some(event) = self.pop_next_due(now) {
            due.push(event);
        }
        due
    }

    pub fn pending_count(&self) -> usize {
        self.queue.borrow().entries.len()
    }
}

/// Cancels its event when dropped.
#[derive(Debug)]
pub struct TimerHandle {
    queue: Weak<RefCell<Queue>>,
    slot: (Instant, u64),
}

impl TimerHandle {
    pub fn deadline(&self) -> Instant {
        self.slot.0
    }

    /// False once the event has fired or been cancelled.
    pub fn is_pending(&self) -> bool {
        self.queue
            .upgrade()
            .is_some_and(|queue| queue.borrow().entries.contains_key(&self.slot))
    }

    pub fn cancel(self) {}
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        if let Some(queue) = self.queue.upgrade() {
            if queue.borrow_mut().entries.remove(&self.slot).is_some() {
                trace!("Cancelled timer {}", self.slot.1);
            }
        }
    }
}
