/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! The dispatcher's view of compute-node availability.
//!
//! One [`NodeAvailabilityEntry`] per known compute node, in configuration
//! order.  Entries are created once at start-up and never removed; only the
//! assignment fields change.

use serde::Deserialize;
use tracing::debug;

use crate::net::Address;
use crate::task::TaskId;

/// How the dispatcher picks a target node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeSelection {
    /// Cycle through the table regardless of assignment.
    #[default]
    RoundRobin,
    /// First entry with no task assigned.
    FirstIdle,
}

/// One row of the dispatch table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAvailabilityEntry {
    pub compute_node_address: Address,
    pub last_requester_address: Address,
    /// Task currently assigned to the node; `0` = idle.
    pub assigned_task_id: TaskId,
}

impl NodeAvailabilityEntry {
    pub fn idle(compute_node_address: Address) -> Self {
        Self {
            compute_node_address,
            last_requester_address: compute_node_address,
            assigned_task_id: 0,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.assigned_task_id == 0
    }
}

/// Ordered availability table plus the round-robin cursor.
#[derive(Debug, Clone, Default)]
pub struct NodeTable {
    entries: Vec<NodeAvailabilityEntry>,
    next_round_robin_index: usize,
}

impl NodeTable {
    /// One idle entry per peer, skipping `self_address`.
    pub fn from_peers(peers: &[Address], self_address: Address) -> Self {
        let entries = peers
            .iter()
            .filter(|&&a| a != self_address)
            .map(|&a| NodeAvailabilityEntry::idle(a))
            .collect();
        Self {
            entries,
            next_round_robin_index: 0,
        }
    }

    pub fn entries(&self) -> &[NodeAvailabilityEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Address of the first idle entry, or [`Address::UNSPECIFIED`].
    pub fn first_idle(&self) -> Address {
        self.entries
            .iter()
            .find(|e| e.is_idle())
            .map(|e| e.compute_node_address)
            .unwrap_or(Address::UNSPECIFIED)
    }

    /// Address at the round-robin cursor, advancing it; unspecified when the
    /// table is empty.
    pub fn next_round_robin(&mut self) -> Address {
        if self.entries.is_empty() {
            return Address::UNSPECIFIED;
        }
        let idx = self.next_round_robin_index;
        self.next_round_robin_index = (idx + 1) % self.entries.len();
        self.entries[idx].compute_node_address
    }

    /// Record that `task_id`, submitted by `requester`, went to `node`.
    /// Returns `false` if `node` is not in the table.
    pub fn assign(&mut self, node: Address, task_id: TaskId, requester: Address) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|e| e.compute_node_address == node)
        {
            Some(entry) => {
                entry.assigned_task_id = task_id;
                entry.last_requester_address = requester;
                debug!(node = %node, task_id, requester = %requester, "node table entry assigned");
                true
            }
            None => false,
        }
    }

    /// Mark `node` idle again if it is still assigned `task_id`.
    ///
    /// A mismatch means the entry was re-assigned since (round-robin mode), in
    /// which case it is left alone.
    pub fn release(&mut self, node: Address, task_id: TaskId) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|e| e.compute_node_address == node && e.assigned_task_id == task_id)
        {
            Some(entry) => {
                entry.assigned_task_id = 0;
                debug!(node = %node, task_id, "node table entry released");
                true
            }
            None => false,
        }
    }

    /// Set every entry idle.
    pub fn reset(&mut self) {
        for entry in &mut self.entries {
            entry.assigned_task_id = 0;
        }
        debug!(entries = self.entries.len(), "node table reset");
    }

    pub fn idle_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_idle()).count()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
