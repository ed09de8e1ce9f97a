/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! The seam between simulated modules and the event kernel.
//!
//! A module only ever sees the kernel through a [`SimContext`]: it can read
//! the clock, schedule and cancel its own timers, send datagrams and update
//! the run statistics.  Modules never hold references to each other.

use crate::error::SimError;
use crate::event::{EventKind, EventQueue, SimTime, TimerHandle};
use crate::net::{Address, Datagram};
use crate::stats::RunStats;

// ── Component ─────────────────────────────────────────────────────────────────

/// A simulated module (dispatcher, compute node, generator).
pub trait Component {
    /// Module name, unique within a run.
    fn name(&self) -> &str;

    /// Address this module receives datagrams on.
    fn address(&self) -> Address;

    /// Port this module listens on.
    fn port(&self) -> u16;

    /// Handle a timer or lifecycle event addressed to this module.
    fn handle_event(&mut self, kind: EventKind, ctx: &mut SimContext<'_>) -> Result<(), SimError>;

    /// Handle a datagram delivered to this module.
    fn handle_datagram(
        &mut self,
        datagram: Datagram,
        ctx: &mut SimContext<'_>,
    ) -> Result<(), SimError>;

    /// Called once when the run ends.  Cancels outstanding timers and
    /// reports final figures.
    fn shutdown(&mut self, ctx: &mut SimContext<'_>);
}

// ── SimContext ────────────────────────────────────────────────────────────────

/// Kernel services lent to a module for the duration of one handler call.
pub struct SimContext<'a> {
    queue: &'a mut EventQueue,
    stats: &'a mut RunStats,
    self_address: Address,
    link_delay: SimTime,
}

impl<'a> SimContext<'a> {
    pub fn new(
        queue: &'a mut EventQueue,
        stats: &'a mut RunStats,
        self_address: Address,
        link_delay: SimTime,
    ) -> Self {
        Self {
            queue,
            stats,
            self_address,
            link_delay,
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> SimTime {
        self.queue.now()
    }

    /// Schedule an event for this module at absolute time `at`.
    pub fn schedule_self_at(&mut self, at: SimTime, kind: EventKind) -> TimerHandle {
        self.queue.schedule_at(at, self.self_address, kind)
    }

    /// Cancel one of this module's timers.  Returns `false` if it is no
    /// longer pending.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.queue.cancel(handle)
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.queue.is_pending(handle)
    }

    /// Hand `payload` to the network.  Fire-and-forget: delivery happens
    /// `link_delay` seconds later, or the datagram is dropped at the far end.
    pub fn send_to(&mut self, payload: Vec<u8>, destination: Address, port: u16) {
        let datagram = Datagram {
            source: self.self_address,
            destination,
            port,
            payload,
        };
        let at = self.queue.now() + self.link_delay;
        self.queue
            .schedule_at(at, destination, EventKind::Deliver(datagram));
    }

    pub fn stats(&mut self) -> &mut RunStats {
        &mut *self.stats
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
