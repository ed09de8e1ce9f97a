/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Virtual-time event queue.
//!
//! Pending events live in a [`Slab`]; the min-heap only stores
//! `(time, sequence, slot, generation)` keys.  Cancelling removes the slab
//! entry and leaves the heap key behind, which [`EventQueue::pop`] skips
//! lazily.  Every [`TimerHandle`] carries the generation it was issued with,
//! so a handle can never cancel (or be confused with) a newer event that
//! happens to reuse its slot.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use slab::Slab;

use crate::net::{Address, Datagram};
use crate::task::TaskSnapshot;

/// Simulation time in seconds.
pub type SimTime = f64;

// ── Event payloads ────────────────────────────────────────────────────────────

/// What an event means to the module it is delivered to.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Module lifecycle: start of the run.
    Start,
    /// Generator send tick.
    Send,
    /// Module lifecycle: stop producing work.
    Stop,
    /// Dispatcher trigger: hand one queued task to a compute node.
    Dispatch,
    /// Compute node check for the task described by the snapshot.
    TaskCompletion(TaskSnapshot),
    /// Network delivery of a datagram.
    Deliver(Datagram),
}

/// Generation-checked reference to a scheduled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    key: usize,
    generation: u64,
}

/// An event taken off the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct FiredEvent {
    pub time: SimTime,
    pub target: Address,
    pub kind: EventKind,
    pub handle: TimerHandle,
}

// ── Internal types ────────────────────────────────────────────────────────────

struct Pending {
    generation: u64,
    target: Address,
    kind: EventKind,
}

struct QueueEntry {
    time: SimTime,
    seq: u64,
    key: usize,
    generation: u64,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

// ── EventQueue ────────────────────────────────────────────────────────────────

/// Discrete-event scheduler with cancellable timers.
pub struct EventQueue {
    now: SimTime,
    // Reverse turns the max-heap into a min-heap.
    heap: BinaryHeap<Reverse<QueueEntry>>,
    pending: Slab<Pending>,
    next_generation: u64,
    next_seq: u64,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            now: 0.0,
            heap: BinaryHeap::new(),
            pending: Slab::new(),
            next_generation: 0,
            next_seq: 0,
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Number of events still scheduled (cancelled ones excluded).
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Schedule `kind` for `target` at absolute `time`.  Times in the past are
    /// clamped to `now`.
    pub fn schedule_at(&mut self, time: SimTime, target: Address, kind: EventKind) -> TimerHandle {
        let time = if time < self.now { self.now } else { time };
        self.next_generation += 1;
        let generation = self.next_generation;
        let key = self.pending.insert(Pending {
            generation,
            target,
            kind,
        });
        self.next_seq += 1;
        self.heap.push(Reverse(QueueEntry {
            time,
            seq: self.next_seq,
            key,
            generation,
        }));
        TimerHandle { key, generation }
    }

    /// Cancel a scheduled event.  Returns `false` if it already fired or was
    /// cancelled before.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        if !self.is_pending(handle) {
            return false;
        }
        self.pending.remove(handle.key);
        true
    }

    /// `true` while the event behind `handle` is still scheduled.
    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.pending
            .get(handle.key)
            .is_some_and(|p| p.generation == handle.generation)
    }

    /// Time of the next live event, if any.
    pub fn peek_time(&mut self) -> Option<SimTime> {
        self.discard_cancelled();
        self.heap.peek().map(|Reverse(e)| e.time)
    }

    /// Take the next live event and advance the clock to its time.
    pub fn pop(&mut self) -> Option<FiredEvent> {
        self.discard_cancelled();
        let Reverse(entry) = self.heap.pop()?;
        let pending = self.pending.remove(entry.key);
        self.now = entry.time;
        Some(FiredEvent {
            time: entry.time,
            target: pending.target,
            kind: pending.kind,
            handle: TimerHandle {
                key: entry.key,
                generation: entry.generation,
            },
        })
    }

    /// Move the clock forward without firing anything.
    ///
    /// Used to close a run at its end time and by drivers that step modules
    /// by hand.  An earlier `time` is ignored.
    pub fn advance_to(&mut self, time: SimTime) {
        if time > self.now {
            self.now = time;
        }
    }

    fn discard_cancelled(&mut self) {
        while let Some(Reverse(entry)) = self.heap.peek() {
            let live = self
                .pending
                .get(entry.key)
                .is_some_and(|p| p.generation == entry.generation);
            if live {
                break;
            }
            self.heap.pop();
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const A: Address = Address::new(10, 0, 0, 1);

    #[test]
    fn events_fire_in_time_order() {
        let mut q = EventQueue::new();
        q.schedule_at(3.0, A, EventKind::Stop);
        q.schedule_at(1.0, A, EventKind::Start);
        q.schedule_at(2.0, A, EventKind::Send);

        let kinds: Vec<EventKind> = std::iter::from_fn(|| q.pop()).map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::Start, EventKind::Send, EventKind::Stop]);
        assert_eq!(q.now(), 3.0);
    }

    #[test]
    fn equal_times_fire_in_scheduling_order() {
        let mut q = EventQueue::new();
        q.schedule_at(1.0, A, EventKind::Dispatch);
        q.schedule_at(1.0, A, EventKind::Send);
        assert_eq!(q.pop().unwrap().kind, EventKind::Dispatch);
        assert_eq!(q.pop().unwrap().kind, EventKind::Send);
    }

    #[test]
    fn cancelled_event_never_fires() {
        let mut q = EventQueue::new();
        let h = q.schedule_at(1.0, A, EventKind::Dispatch);
        q.schedule_at(2.0, A, EventKind::Send);
        assert!(q.is_pending(h));
        assert!(q.cancel(h));
        assert!(!q.is_pending(h));
        assert!(!q.cancel(h), "second cancel is a no-op");

        let fired = q.pop().unwrap();
        assert_eq!(fired.kind, EventKind::Send);
        assert!(q.pop().is_none());
    }

    #[test]
    fn stale_handle_cannot_cancel_slot_reuse() {
        let mut q = EventQueue::new();
        let old = q.schedule_at(1.0, A, EventKind::Dispatch);
        assert!(q.cancel(old));
        // the slab hands the same slot out again
        let new = q.schedule_at(1.0, A, EventKind::Send);
        assert!(!q.cancel(old));
        assert!(q.is_pending(new));
        assert_eq!(q.pop().unwrap().kind, EventKind::Send);
    }

    #[test]
    fn fired_handle_is_no_longer_pending() {
        let mut q = EventQueue::new();
        let h = q.schedule_at(0.5, A, EventKind::Start);
        let fired = q.pop().unwrap();
        assert_eq!(fired.handle, h);
        assert!(!q.is_pending(h));
        assert!(!q.cancel(h));
    }

    #[test]
    fn past_times_are_clamped_to_now() {
        let mut q = EventQueue::new();
        q.advance_to(5.0);
        q.schedule_at(1.0, A, EventKind::Start);
        assert_eq!(q.pop().unwrap().time, 5.0);
    }

    #[test]
    fn peek_time_skips_cancelled_entries() {
        let mut q = EventQueue::new();
        let h = q.schedule_at(1.0, A, EventKind::Start);
        q.schedule_at(4.0, A, EventKind::Stop);
        q.cancel(h);
        assert_eq!(q.peek_time(), Some(4.0));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn advance_to_never_moves_back() {
        let mut q = EventQueue::new();
        q.advance_to(2.0);
        q.advance_to(1.0);
        assert_eq!(q.now(), 2.0);
    }
}
