/*!
# Discrete-event scheduler

The [`Scheduler`] owns the virtual clock. Events are submitted for a future
instant and come back out strictly ordered by time; two events due at the
same instant come out in the order they were submitted.

Submitting an event returns an [`EventId`]. As long as the event has not
been dispatched it can be [cancelled], after which it will never come out
of the scheduler. Cancelling an event that already fired, was already
cancelled, or was never issued by this scheduler is a harmless no-op.

```
use alertsim_core::{scheduler::Scheduler, SimTime};
use std::time::Duration;

let mut scheduler = Scheduler::new();
let tick = scheduler.schedule(Duration::from_millis(10), "tick");
scheduler.schedule(Duration::from_millis(20), "tock");
scheduler.cancel(tick);

let mut fired = Vec::new();
scheduler.run(SimTime::from_secs(1), |_, event| fired.push(event));

assert_eq!(fired, ["tock"]);
assert_eq!(scheduler.now(), SimTime::from_secs(1));
```

[cancelled]: Scheduler::cancel
*/

mod queue;

use self::queue::EventQueue;
use crate::SimTime;
use std::{collections::HashSet, fmt, time::Duration};
use thiserror::Error;
use tracing::trace;

/// Handle on an event submitted to the [`Scheduler`].
///
/// Handles order the same way their events are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId {
    time: SimTime,
    seq: u64,
}

impl EventId {
    pub(crate) const fn new(time: SimTime, seq: u64) -> Self {
        Self { time, seq }
    }

    /// the instant the event is (or was) due
    #[inline]
    pub fn time(&self) -> SimTime {
        self.time
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.seq, self.time)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Cannot schedule an event at {requested}, the clock is already at {now}")]
    InThePast { requested: SimTime, now: SimTime },
}

pub struct Scheduler<E> {
    now: SimTime,

    /// sequence number of the next submitted event, breaks ties between
    /// events due at the same time
    next_seq: u64,

    queue: EventQueue<E>,

    /// sequence numbers of the events still due to fire
    ///
    /// Cancellation only removes the entry from here, the event itself is
    /// discarded when it reaches the top of the queue.
    pending: HashSet<u64>,
}

impl<E> Scheduler<E> {
    pub fn new() -> Self {
        Self {
            now: SimTime::ZERO,
            next_seq: 0,
            queue: EventQueue::new(),
            pending: HashSet::new(),
        }
    }

    /// current virtual time
    #[inline]
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// number of events still due to fire
    #[inline]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Submit `event` to fire `delay` after the current time.
    ///
    /// A zero delay is valid: the event fires at the current instant, after
    /// every event already due at that instant.
    pub fn schedule(&mut self, delay: Duration, event: E) -> EventId {
        let time = self.now + delay;
        self.insert(time, event)
    }

    /// Submit `event` to fire at the absolute instant `time`.
    ///
    /// # Errors
    ///
    /// [`ScheduleError::InThePast`] if `time` is before the current time.
    pub fn schedule_at(&mut self, time: SimTime, event: E) -> Result<EventId, ScheduleError> {
        if time < self.now {
            return Err(ScheduleError::InThePast {
                requested: time,
                now: self.now,
            });
        }
        Ok(self.insert(time, event))
    }

    fn insert(&mut self, time: SimTime, event: E) -> EventId {
        let id = EventId::new(time, self.next_seq);
        self.next_seq += 1;

        self.pending.insert(id.seq);
        self.queue.push(id, event);

        trace!(%id, "scheduled");
        id
    }

    /// Prevent the event from ever firing.
    ///
    /// Returns `true` if the event was still pending. Fired, already
    /// cancelled or unknown handles are ignored and return `false`.
    pub fn cancel(&mut self, id: EventId) -> bool {
        let cancelled = self.pending.remove(&id.seq);
        if cancelled {
            trace!(%id, "cancelled");
        }
        cancelled
    }

    /// `true` if the event has neither fired nor been cancelled
    #[inline]
    pub fn is_pending(&self, id: EventId) -> bool {
        self.pending.contains(&id.seq)
    }

    /// the instant of the next event due to fire, if any
    pub fn next_event_time(&mut self) -> Option<SimTime> {
        self.discard_cancelled();
        self.queue.peek_time()
    }

    /// Pop the next pending event and move the clock to its instant.
    pub fn step(&mut self) -> Option<(SimTime, E)> {
        self.discard_cancelled();

        let (id, event) = self.queue.pop()?;
        self.pending.remove(&id.seq);

        debug_assert!(id.time >= self.now, "the clock never goes backward");
        self.now = id.time;

        Some((id.time, event))
    }

    /// Dispatch every event due up to and including `until`, in order, then
    /// move the clock to `until`.
    ///
    /// The `handler` receives the scheduler back so that it can submit or
    /// cancel events while processing one. Events it submits at or before
    /// `until` are dispatched within the same call.
    pub fn run<F>(&mut self, until: SimTime, mut handler: F)
    where
        F: FnMut(&mut Self, E),
    {
        while let Some(time) = self.next_event_time() {
            if time > until {
                break;
            }
            let Some((_, event)) = self.step() else {
                break;
            };
            handler(self, event);
        }

        if self.now < until {
            self.now = until;
        }
    }

    fn discard_cancelled(&mut self) {
        while let Some(id) = self.queue.peek() {
            if self.pending.contains(&id.seq) {
                break;
            }
            self.queue.pop();
        }
    }
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}
