/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Task dispatcher.
//!
//! [`Dispatcher`] accepts [`CloudTask`]s from generators, holds them in a wait
//! queue and hands them, one per trigger, to compute nodes.  The next task is
//! chosen by a [`Discipline`]; the target node by a [`NodeSelection`] over
//! the [`NodeTable`].
//!
//! ```text
//! Generator ──task──► wait_queue ──(Dispatch timer)──► select task ──► select node ──► ComputeNode
//!                                                                          ▲
//! ComputeNode ──ack──► release node table entry ──► forward ack to Generator
//! ```
//!
//! # Invariants
//! * At most one `Dispatch` timer is pending.
//! * A `Dispatch` timer is pending whenever the wait queue is non-empty.
//! * Failing to find a usable compute node aborts the run
//!   ([`SimError::NoComputeCapacity`]); there is no backpressure path.

pub mod discipline;
pub mod node_table;

pub use discipline::Discipline;
pub use node_table::{NodeAvailabilityEntry, NodeSelection, NodeTable};

use std::collections::HashMap;

use tracing::{debug, error, info, warn};

use crate::component::{Component, SimContext};
use crate::config::SchedulerConfig;
use crate::error::SimError;
use crate::event::{EventKind, SimTime, TimerHandle};
use crate::net::{Address, Datagram};
use crate::task::{CloudTask, TaskId};

// ── Wait queue entry ──────────────────────────────────────────────────────────

/// A submitted task waiting for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedTask {
    pub task: CloudTask,
    /// Module that submitted the task; receives the completion ack.
    pub requester: Address,
    pub arrived_at: SimTime,
}

impl AsRef<CloudTask> for QueuedTask {
    fn as_ref(&self) -> &CloudTask {
        &self.task
    }
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

pub struct Dispatcher {
    name: String,
    address: Address,
    port: u16,
    config: SchedulerConfig,
    peers: Vec<Address>,
    node_table: NodeTable,
    wait_queue: Vec<QueuedTask>,
    dispatch_timer: Option<TimerHandle>,
    /// Dispatched packet id → submitting module.  Only kept while compute
    /// nodes send completion acks.
    in_flight: HashMap<TaskId, Address>,
    completion_acks: bool,
    num_received: u64,
    num_sent: u64,
}

impl Dispatcher {
    /// Create a dispatcher that will dispatch to `peers`.  The node table is
    /// built when the module starts.
    pub fn new(
        name: impl Into<String>,
        address: Address,
        port: u16,
        config: SchedulerConfig,
        peers: Vec<Address>,
    ) -> Self {
        Self {
            name: name.into(),
            address,
            port,
            config,
            peers,
            node_table: NodeTable::default(),
            wait_queue: Vec::new(),
            dispatch_timer: None,
            in_flight: HashMap::new(),
            completion_acks: true,
            num_received: 0,
            num_sent: 0,
        }
    }

    /// Whether compute nodes answer with completion acks.  When they do not,
    /// dispatched tasks are not tracked for forwarding.
    pub fn with_completion_acks(mut self, enabled: bool) -> Self {
        self.completion_acks = enabled;
        self
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn node_table(&self) -> &NodeTable {
        &self.node_table
    }

    pub fn wait_queue(&self) -> &[QueuedTask] {
        &self.wait_queue
    }

    pub fn dispatch_timer(&self) -> Option<TimerHandle> {
        self.dispatch_timer
    }

    /// Dispatched tasks still waiting for their completion ack.
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Build the node table from the configured peers, excluding ourselves.
    pub fn start(&mut self) -> Result<(), SimError> {
        self.node_table = NodeTable::from_peers(&self.peers, self.address);
        if self.node_table.is_empty() {
            return Err(SimError::NoComputeNodes {
                module: self.name.clone(),
            });
        }
        info!(
            module = %self.name,
            address = %self.address,
            discipline = %self.config.discipline,
            selection = ?self.config.node_selection,
            nodes = self.node_table.len(),
            "dispatcher started"
        );
        for entry in self.node_table.entries() {
            debug!(module = %self.name, node = %entry.compute_node_address, "  destination");
        }
        Ok(())
    }

    // ── Task intake ───────────────────────────────────────────────────────────

    /// Queue a submitted task, arming the dispatch trigger if the queue was
    /// empty.
    pub fn on_task_received(&mut self, task: CloudTask, requester: Address, ctx: &mut SimContext<'_>) {
        if self.wait_queue.is_empty() && self.dispatch_timer.is_none() {
            let at = ctx.now() + self.config.schedule_delay;
            self.dispatch_timer = Some(ctx.schedule_self_at(at, EventKind::Dispatch));
            debug!(module = %self.name, at, "dispatch trigger armed");
        }
        debug!(
            module = %self.name,
            packet_id = task.packet_id,
            mips = task.mips,
            queue_len = self.wait_queue.len() + 1,
            "task queued"
        );
        self.wait_queue.push(QueuedTask {
            task,
            requester,
            arrived_at: ctx.now(),
        });
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    /// Hand one task to a compute node and re-arm the trigger if more are
    /// waiting.
    pub fn dispatch_trigger(&mut self, ctx: &mut SimContext<'_>) -> Result<(), SimError> {
        self.dispatch_timer = None;

        let Some(index) = self.config.discipline.select(&self.wait_queue) else {
            debug!(module = %self.name, "dispatch trigger with empty queue");
            return Ok(());
        };

        let packet_id = ctx.stats().next_packet_id();
        let outgoing = self.wait_queue[index]
            .task
            .to_fresh_admission(packet_id, self.address.to_string());

        let node = self.select_compute_node();
        if node.is_unspecified() || node.is_loopback() {
            error!(
                module = %self.name,
                packet_id,
                selected = %node,
                queue_len = self.wait_queue.len(),
                "no compute node available"
            );
            return Err(SimError::NoComputeCapacity {
                module: self.name.clone(),
                task_id: packet_id,
                selected: node,
            });
        }

        let queued = self.wait_queue.remove(index);
        self.node_table.assign(node, packet_id, queued.requester);
        if self.completion_acks {
            self.in_flight.insert(packet_id, queued.requester);
        }

        info!(
            module = %self.name,
            discipline = %self.config.discipline,
            original_id = queued.task.packet_id,
            packet_id,
            mips = outgoing.mips,
            node = %node,
            waited = ctx.now() - queued.arrived_at,
            queue_len = self.wait_queue.len(),
            "task dispatched"
        );
        ctx.send_to(outgoing.encode_payload(), node, self.port);
        self.num_sent += 1;
        ctx.stats().tasks_dispatched += 1;

        if !self.wait_queue.is_empty() {
            let delay = self
                .config
                .discipline
                .reschedule_delay(self.config.schedule_delay, self.config.lifo_delay);
            self.dispatch_timer = Some(ctx.schedule_self_at(ctx.now() + delay, EventKind::Dispatch));
        }
        Ok(())
    }

    /// Pick the target node for the next dispatch.
    ///
    /// Returns [`Address::UNSPECIFIED`] when nothing is available; the caller
    /// treats that as fatal.
    pub fn select_compute_node(&mut self) -> Address {
        match self.config.node_selection {
            NodeSelection::RoundRobin => self.node_table.next_round_robin(),
            NodeSelection::FirstIdle => {
                let node = self.node_table.first_idle();
                if node.is_unspecified() && self.config.reset_table_when_exhausted {
                    warn!(module = %self.name, "all compute nodes busy, resetting node table");
                    self.reset_virtual_table();
                    self.node_table.first_idle()
                } else {
                    node
                }
            }
        }
    }

    /// Mark every compute node idle.
    pub fn reset_virtual_table(&mut self) {
        self.node_table.reset();
    }

    // ── Completion acks ───────────────────────────────────────────────────────

    /// A compute node finished a task: free its table entry and tell the
    /// submitter.
    pub fn on_completion_ack(&mut self, ack: CloudTask, from: Address, ctx: &mut SimContext<'_>) {
        let node = ack.source_address.parse::<Address>().unwrap_or(from);
        let released = self.node_table.release(node, ack.packet_id);

        match self.in_flight.remove(&ack.packet_id) {
            Some(requester) => {
                debug!(
                    module = %self.name,
                    packet_id = ack.packet_id,
                    node = %node,
                    released,
                    requester = %requester,
                    "completion ack forwarded"
                );
                ctx.send_to(ack.encode_payload(), requester, self.port);
                self.num_sent += 1;
            }
            None => {
                warn!(
                    module = %self.name,
                    packet_id = ack.packet_id,
                    node = %node,
                    "completion ack for a task this dispatcher did not send"
                );
            }
        }
    }
}

impl Component for Dispatcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn address(&self) -> Address {
        self.address
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn handle_event(&mut self, kind: EventKind, ctx: &mut SimContext<'_>) -> Result<(), SimError> {
        match kind {
            EventKind::Start => self.start(),
            EventKind::Dispatch => self.dispatch_trigger(ctx),
            EventKind::Stop => {
                debug!(module = %self.name, "stop ignored, dispatcher drains its queue");
                Ok(())
            }
            other => {
                warn!(module = %self.name, event = ?other, "unexpected event ignored");
                Ok(())
            }
        }
    }

    fn handle_datagram(&mut self, datagram: Datagram, ctx: &mut SimContext<'_>) -> Result<(), SimError> {
        let task = CloudTask::decode_payload(&datagram.payload).map_err(|defect| {
            SimError::MalformedPayload {
                module: self.name.clone(),
                source_addr: datagram.source,
                defect,
            }
        })?;
        self.num_received += 1;

        if task.is_user_originated {
            ctx.stats().tasks_received += 1;
            self.on_task_received(task, datagram.source, ctx);
        } else {
            self.on_completion_ack(task, datagram.source, ctx);
        }
        Ok(())
    }

    fn shutdown(&mut self, ctx: &mut SimContext<'_>) {
        if let Some(handle) = self.dispatch_timer.take() {
            ctx.cancel(handle);
        }
        info!(
            module = %self.name,
            received = self.num_received,
            sent = self.num_sent,
            still_queued = self.wait_queue.len(),
            in_flight = self.in_flight.len(),
            "dispatcher finished"
        );
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
