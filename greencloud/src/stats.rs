/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Run-wide statistics.
//!
//! One [`RunStats`] exists per simulation run and is lent to every handler
//! through [`SimContext`](crate::component::SimContext).  It owns the packet
//! id sequence, so ids are unique across all modules of a run.

use std::collections::BTreeMap;

use crate::task::TaskId;

/// Counters and aggregates collected during one run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunStats {
    last_packet_id: TaskId,
    pub tasks_generated: u64,
    pub tasks_received: u64,
    pub tasks_dispatched: u64,
    pub tasks_admitted: u64,
    pub tasks_completed: u64,
    pub replies_received: u64,
    pub datagrams_dropped: u64,
    pub stale_events_discarded: u64,
    /// Energy per compute node in Wh, filled in at shutdown.
    pub node_energy_wh: BTreeMap<String, f64>,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next packet id.  Ids start at 1; 0 means "no task".
    pub fn next_packet_id(&mut self) -> TaskId {
        self.last_packet_id += 1;
        self.last_packet_id
    }

    /// Record the final energy figure of one node.
    pub fn add_node_energy(&mut self, node: &str, wh: f64) {
        *self.node_energy_wh.entry(node.to_string()).or_insert(0.0) += wh;
    }

    /// Sum of all recorded node energy, in Wh.
    pub fn total_energy_wh(&self) -> f64 {
        self.node_energy_wh.values().sum()
    }
}
