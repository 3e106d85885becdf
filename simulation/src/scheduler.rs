//! Discrete-event scheduler
//!
//! Events fire in increasing simulated time. Events scheduled for the same
//! instant fire in the order they were scheduled.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

/// Handle to a scheduled event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub u64);

/// Time-ordered event queue
#[derive(Debug)]
pub struct Scheduler<E> {
    now: Duration,
    next_seq: u64,
    /// (fire time, sequence) keys; payloads live in `pending`
    queue: BinaryHeap<Reverse<(Duration, u64)>>,
    pending: HashMap<u64, E>,
}

impl<E> Scheduler<E> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_seq: 0,
            queue: BinaryHeap::new(),
            pending: HashMap::new(),
        }
    }

    /// Current simulated time
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Schedule `event` after `delay`
    pub fn schedule(&mut self, delay: Duration, event: E) -> EventId {
        self.schedule_at(self.now.saturating_add(delay), event)
    }

    /// Schedule `event` at an absolute time, never earlier than now
    pub fn schedule_at(&mut self, at: Duration, event: E) -> EventId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse((at.max(self.now), seq)));
        self.pending.insert(seq, event);
        EventId(seq)
    }

    /// Cancel a scheduled event
    ///
    /// Returns true if the event was still pending. Cancelling a fired or
    /// cancelled event does nothing.
    pub fn cancel(&mut self, id: EventId) -> bool {
        self.pending.remove(&id.0).is_some()
    }

    pub fn is_pending(&self, id: EventId) -> bool {
        self.pending.contains_key(&id.0)
    }

    /// Time of the next live event
    pub fn peek_time(&mut self) -> Option<Duration> {
        while let Some(Reverse((at, seq))) = self.queue.peek().copied() {
            if self.pending.contains_key(&seq) {
                return Some(at);
            }
            self.queue.pop();
        }
        None
    }

    /// Advance to the next live event and return it
    pub fn pop(&mut self) -> Option<(Duration, EventId, E)> {
        while let Some(Reverse((at, seq))) = self.queue.pop() {
            if let Some(event) = self.pending.remove(&seq) {
                self.now = at;
                return Some((at, EventId(seq), event));
            }
        }
        None
    }

    /// Number of live events
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(Duration::from_millis(30), "c");
        scheduler.schedule(Duration::from_millis(10), "a");
        scheduler.schedule(Duration::from_millis(20), "b");

        let order: Vec<_> = std::iter::from_fn(|| scheduler.pop().map(|(_, _, e)| e)).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert_eq!(scheduler.now(), Duration::from_millis(30));
    }

    #[test]
    fn test_ties_are_fifo() {
        let mut scheduler = Scheduler::new();
        for i in 0..5 {
            scheduler.schedule(Duration::from_millis(1), i);
        }
        let order: Vec<_> = std::iter::from_fn(|| scheduler.pop().map(|(_, _, e)| e)).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.schedule(Duration::from_millis(5), 1);
        scheduler.schedule(Duration::from_millis(6), 2);

        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.pop().map(|(_, _, e)| e), Some(2));

        // Fired events cannot be cancelled
        let id = scheduler.schedule(Duration::ZERO, 3);
        assert!(scheduler.pop().is_some());
        assert!(!scheduler.cancel(id));
    }

    #[test]
    fn test_peek_skips_cancelled() {
        let mut scheduler = Scheduler::new();
        let first = scheduler.schedule(Duration::from_millis(1), ());
        scheduler.schedule(Duration::from_millis(4), ());
        scheduler.cancel(first);
        assert_eq!(scheduler.peek_time(), Some(Duration::from_millis(4)));
    }

    #[test]
    fn test_past_events_clamp_to_now() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(Duration::from_millis(10), 0);
        scheduler.pop();
        scheduler.schedule_at(Duration::from_millis(2), 1);
        let (at, _, _) = scheduler.pop().unwrap();
        assert_eq!(at, Duration::from_millis(10));
    }
}
