use super::EventId;
use crate::SimTime;
use core::cmp::Reverse;
use std::collections::BinaryHeap;

/// min-heap of events, ordered by [`EventId`] (time first, then
/// submission sequence).
pub(super) struct EventQueue<E> {
    heap: BinaryHeap<Reverse<Entry<E>>>,
}

struct Entry<E> {
    id: EventId,
    event: E,
}

impl<E> PartialEq for Entry<E> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<E> Eq for Entry<E> {}

impl<E> PartialOrd for Entry<E> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Entry<E> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl<E> EventQueue<E> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }

    #[inline]
    pub fn peek(&self) -> Option<EventId> {
        self.heap.peek().map(|entry| entry.0.id)
    }

    #[inline]
    pub fn peek_time(&self) -> Option<SimTime> {
        self.peek().map(|id| id.time())
    }

    pub fn pop(&mut self) -> Option<(EventId, E)> {
        self.heap
            .pop()
            .map(|Reverse(Entry { id, event })| (id, event))
    }

    pub fn push(&mut self, id: EventId, event: E) {
        self.heap.push(Reverse(Entry { id, event }))
    }
}
