/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Energy-aware compute node.
//!
//! A [`ComputeNode`] admits dispatched tasks into its execution list and
//! shares a node-wide compute rate equally between them.  With DVFS the rate
//! is just enough for the most urgent task (`remaining / deadline`) times
//! the number of tasks; without it the node runs at its nominal rate while
//! it has work.
//!
//! Every state change goes through [`ComputeNode::update_execution_list`]:
//!
//! 1. bring every task up to date and re-share the rate,
//! 2. remove tasks with `remaining_mips <= 1` (acking each one),
//! 3. re-share the rate among the survivors,
//! 4. arm a single completion check for the smallest-deadline task,
//! 5. integrate energy and recompute the power draw.
//!
//! The completion check carries a [`TaskSnapshot`]; if that task is gone by
//! the time it fires, the event is discarded without touching any state.

pub mod energy;

pub use energy::{EnergyMeter, EnergyModel};

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::component::{Component, SimContext};
use crate::config::ComputeNodeConfig;
use crate::error::SimError;
use crate::event::{EventKind, SimTime, TimerHandle};
use crate::net::{Address, Datagram};
use crate::task::{CloudTask, RuntimeTask, TaskId, TaskSnapshot};

// ── Types ─────────────────────────────────────────────────────────────────────

/// Queueing tag of a node.  Reported in logs only; completion scheduling does
/// not depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeQueueing {
    Fcfs,
    Priority,
    #[default]
    Sjf,
}

impl fmt::Display for NodeQueueing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NodeQueueing::Fcfs => "FCFS",
            NodeQueueing::Priority => "PRIORITY",
            NodeQueueing::Sjf => "SJF",
        })
    }
}

/// Whether a completion check is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    Idle,
    Pending,
}

// ── ComputeNode ───────────────────────────────────────────────────────────────

pub struct ComputeNode {
    name: String,
    address: Address,
    port: u16,
    config: ComputeNodeConfig,
    energy_model: EnergyModel,
    meter: EnergyMeter,
    execution_list: Vec<RuntimeTask>,
    /// Where the completion ack for each admitted task goes.
    reply_to: HashMap<TaskId, Address>,
    current_compute_rate: f64,
    pending: Option<TimerHandle>,
    num_arrived: u64,
    num_completed: u64,
}

impl ComputeNode {
    pub fn new(name: impl Into<String>, address: Address, port: u16, config: ComputeNodeConfig) -> Self {
        let energy_model = EnergyModel {
            nominal_power: config.nominal_power,
            dvfs: config.dvfs,
            dns: config.dns,
        };
        let meter = EnergyMeter::new(0.0, energy_model.power_draw(0.0));
        Self {
            name: name.into(),
            address,
            port,
            config,
            energy_model,
            meter,
            execution_list: Vec::new(),
            reply_to: HashMap::new(),
            current_compute_rate: 0.0,
            pending: None,
            num_arrived: 0,
            num_completed: 0,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn execution_list(&self) -> &[RuntimeTask] {
        &self.execution_list
    }

    /// Node-wide rate currently shared between tasks (MIPS).
    pub fn current_compute_rate(&self) -> f64 {
        self.current_compute_rate
    }

    pub fn utilization(&self) -> f64 {
        self.current_compute_rate / self.config.nominal_mips
    }

    /// Current draw in W.
    pub fn current_power_draw(&self) -> f64 {
        self.meter.current_draw()
    }

    pub fn energy_consumed_wh(&self) -> f64 {
        self.meter.consumed_wh()
    }

    pub fn energy_model(&self) -> EnergyModel {
        self.energy_model
    }

    pub fn dispatch_status(&self) -> DispatchStatus {
        if self.pending.is_some() {
            DispatchStatus::Pending
        } else {
            DispatchStatus::Idle
        }
    }

    pub fn pending_timer(&self) -> Option<TimerHandle> {
        self.pending
    }

    pub fn num_completed(&self) -> u64 {
        self.num_completed
    }

    // ── Admission ─────────────────────────────────────────────────────────────

    /// Admit a dispatched task and re-evaluate the execution list.
    pub fn on_task_arrived(&mut self, task: CloudTask, from: Address, ctx: &mut SimContext<'_>) {
        let now = ctx.now();
        let runtime = RuntimeTask::from_cloud_task(&task, now);

        if self.execution_list.is_empty() {
            self.schedule_completion(runtime.snapshot(), now + runtime.deadline, ctx);
        }

        let reply = task.source_address.parse::<Address>().unwrap_or(from);
        self.reply_to.insert(runtime.id, reply);

        debug!(
            node = %self.name,
            task_id = runtime.id,
            mips = runtime.remaining_mips,
            deadline = runtime.deadline,
            queueing = %self.config.queueing,
            active = self.execution_list.len() + 1,
            "task admitted"
        );
        self.execution_list.push(runtime);
        self.num_arrived += 1;
        ctx.stats().tasks_admitted += 1;

        self.update_execution_list(ctx);
    }

    // ── Re-evaluation ─────────────────────────────────────────────────────────

    /// Full re-evaluation cycle; see the module docs for the order.
    pub fn update_execution_list(&mut self, ctx: &mut SimContext<'_>) {
        let now = ctx.now();
        self.recompute_shared_rate(now);

        let (done, running): (Vec<RuntimeTask>, Vec<RuntimeTask>) =
            std::mem::take(&mut self.execution_list)
                .into_iter()
                .partition(RuntimeTask::is_complete);
        self.execution_list = running;

        if !done.is_empty() {
            for task in &done {
                self.complete(task, ctx);
            }
            self.recompute_shared_rate(now);
        }

        let next = self
            .next_to_finish()
            .map(|t| (t.snapshot(), t.projected_remaining_time()));
        match next {
            Some((snapshot, remaining)) => {
                if remaining < f64::MAX {
                    self.schedule_completion(snapshot, now + remaining, ctx);
                } else {
                    warn!(
                        node = %self.name,
                        task_id = snapshot.id,
                        "task is not progressing, no completion check armed"
                    );
                    self.cancel_pending(ctx);
                }
            }
            None => self.cancel_pending(ctx),
        }

        self.meter.integrate(now);
        self.meter
            .set_draw(self.energy_model.power_draw(self.utilization()));
    }

    /// Re-share the node rate among the current tasks.
    ///
    /// Every task is first advanced to `now` at its old rate, so urgency is
    /// computed from up-to-date remaining work.
    pub fn recompute_shared_rate(&mut self, now: SimTime) {
        for task in &mut self.execution_list {
            let rate = task.current_processing_rate;
            task.advance_and_set_rate(rate, now);
        }

        let n = self.execution_list.len();
        self.current_compute_rate = if n == 0 {
            0.0
        } else if self.config.dvfs {
            self.most_urgent_rate() * n as f64
        } else {
            self.config.nominal_mips
        };

        let share = if n == 0 {
            0.0
        } else {
            self.current_compute_rate / n as f64
        };
        for task in &mut self.execution_list {
            task.advance_and_set_rate(share, now);
        }
        debug!(
            node = %self.name,
            rate = self.current_compute_rate,
            share,
            tasks = n,
            "compute rate updated"
        );
    }

    /// Highest `remaining / deadline` over the execution list, `0` if empty.
    pub fn most_urgent_rate(&self) -> f64 {
        self.execution_list
            .iter()
            .map(RuntimeTask::urgency)
            .fold(0.0, f64::max)
    }

    /// Smallest-deadline task; the first one found wins ties.
    fn next_to_finish(&self) -> Option<&RuntimeTask> {
        let mut best: Option<&RuntimeTask> = None;
        for task in &self.execution_list {
            if best.map_or(true, |b| task.deadline < b.deadline) {
                best = Some(task);
            }
        }
        best
    }

    fn complete(&mut self, task: &RuntimeTask, ctx: &mut SimContext<'_>) {
        self.num_completed += 1;
        ctx.stats().tasks_completed += 1;
        info!(
            node = %self.name,
            task_id = task.id,
            remaining = task.remaining_mips,
            elapsed = ctx.now() - task.admitted_at,
            "task completed"
        );

        let reply = self.reply_to.remove(&task.id);
        if !self.config.reply_on_completion {
            return;
        }
        if let Some(dest) = reply {
            let ack = CloudTask::completion_ack(task, self.address.to_string());
            ctx.send_to(ack.encode_payload(), dest, self.port);
        }
    }

    // ── Completion timer ──────────────────────────────────────────────────────

    fn schedule_completion(&mut self, snapshot: TaskSnapshot, at: SimTime, ctx: &mut SimContext<'_>) {
        self.cancel_pending(ctx);
        self.pending = Some(ctx.schedule_self_at(at, EventKind::TaskCompletion(snapshot)));
        debug!(node = %self.name, task_id = snapshot.id, at, "completion check armed");
    }

    fn cancel_pending(&mut self, ctx: &mut SimContext<'_>) {
        if let Some(handle) = self.pending.take() {
            ctx.cancel(handle);
        }
    }

    /// A completion check fired.
    pub fn on_completion_event(&mut self, snapshot: TaskSnapshot, ctx: &mut SimContext<'_>) {
        if let Some(handle) = self.pending {
            if !ctx.is_pending(handle) {
                self.pending = None;
            }
        }

        if !self.execution_list.iter().any(|t| t.id == snapshot.id) {
            ctx.stats().stale_events_discarded += 1;
            debug!(node = %self.name, task_id = snapshot.id, "stale completion check discarded");
            return;
        }
        self.update_execution_list(ctx);
    }
}

impl Component for ComputeNode {
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
            EventKind::Start => {
                self.meter = EnergyMeter::new(ctx.now(), self.energy_model.power_draw(0.0));
                info!(
                    node = %self.name,
                    address = %self.address,
                    nominal_mips = self.config.nominal_mips,
                    nominal_power = self.config.nominal_power,
                    dvfs = self.config.dvfs,
                    dns = self.config.dns,
                    queueing = %self.config.queueing,
                    "compute node started"
                );
            }
            EventKind::TaskCompletion(snapshot) => self.on_completion_event(snapshot, ctx),
            other => {
                warn!(node = %self.name, event = ?other, "unexpected event ignored");
            }
        }
        Ok(())
    }

    fn handle_datagram(&mut self, datagram: Datagram, ctx: &mut SimContext<'_>) -> Result<(), SimError> {
        let task = CloudTask::decode_payload(&datagram.payload).map_err(|defect| {
            SimError::MalformedPayload {
                module: self.name.clone(),
                source_addr: datagram.source,
                defect,
            }
        })?;
        if !task.is_user_originated {
            warn!(node = %self.name, packet_id = task.packet_id, "completion ack sent to a compute node ignored");
            return Ok(());
        }
        self.on_task_arrived(task, datagram.source, ctx);
        Ok(())
    }

    fn shutdown(&mut self, ctx: &mut SimContext<'_>) {
        self.meter.integrate(ctx.now());
        self.cancel_pending(ctx);
        for task in self.execution_list.drain(..) {
            debug!(node = %self.name, task_id = task.id, remaining = task.remaining_mips, "unfinished task dropped");
        }
        self.reply_to.clear();

        let consumed = self.meter.consumed_wh();
        ctx.stats().add_node_energy(&self.name, consumed);
        info!(
            node = %self.name,
            arrived = self.num_arrived,
            completed = self.num_completed,
            energy_wh = consumed,
            "compute node finished"
        );
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventQueue;
    use crate::stats::RunStats;

    const SCHED: Address = Address::new(10, 0, 0, 1);
    const NODE: Address = Address::new(10, 0, 0, 2);
    const PORT: u16 = 1000;

    // ── Test helpers ──────────────────────────────────────────────────────────

    struct Harness {
        queue: EventQueue,
        stats: RunStats,
        node: ComputeNode,
        acks: Vec<CloudTask>,
    }

    impl Harness {
        fn new(config: ComputeNodeConfig) -> Self {
            Self {
                queue: EventQueue::new(),
                stats: RunStats::new(),
                node: ComputeNode::new("server0", NODE, PORT, config),
                acks: Vec::new(),
            }
        }

        fn dvfs() -> Self {
            Self::new(ComputeNodeConfig::default())
        }

        fn fixed_rate() -> Self {
            Self::new(ComputeNodeConfig {
                dvfs: false,
                ..Default::default()
            })
        }

        fn admit(&mut self, id: u64, mips: f64, deadline: f64) {
            let task = CloudTask::new_user_task(id, SCHED.to_string(), mips, 0.1, deadline);
            let datagram = Datagram {
                source: SCHED,
                destination: NODE,
                port: PORT,
                payload: task.encode_payload(),
            };
            let mut ctx = SimContext::new(&mut self.queue, &mut self.stats, NODE, 0.0);
            self.node.handle_datagram(datagram, &mut ctx).unwrap();
        }

        /// Fire one event.  Returns `false` when nothing is left.
        fn step(&mut self) -> bool {
            let Some(fired) = self.queue.pop() else {
                return false;
            };
            match fired.kind {
                EventKind::Deliver(d) => {
                    assert_eq!(d.destination, SCHED);
                    self.acks.push(CloudTask::decode_payload(&d.payload).unwrap());
                }
                kind => {
                    let mut ctx = SimContext::new(&mut self.queue, &mut self.stats, NODE, 0.0);
                    self.node.handle_event(kind, &mut ctx).unwrap();
                }
            }
            true
        }

        fn advance(&mut self, to: SimTime) {
            self.queue.advance_to(to);
        }
    }

    fn assert_equal_share(node: &ComputeNode) {
        let n = node.execution_list().len() as f64;
        let r = node.current_compute_rate();
        let sum: f64 = node
            .execution_list()
            .iter()
            .map(|t| t.current_processing_rate)
            .sum();
        for t in node.execution_list() {
            assert!((t.current_processing_rate - r / n).abs() < 1e-9);
        }
        assert!((sum - r).abs() < 1e-6);
    }

    // ── Rate sharing ──────────────────────────────────────────────────────────

    #[test]
    fn rate_is_shared_equally() {
        let mut h = Harness::dvfs();
        h.admit(1, 400.0, 1.0);
        h.advance(0.1);
        h.admit(2, 900.0, 2.0);
        h.advance(0.3);
        h.admit(3, 50.0, 0.5);
        assert_eq!(h.node.execution_list().len(), 3);
        assert_equal_share(&h.node);
    }

    #[test]
    fn dvfs_rate_follows_most_urgent_task() {
        let mut h = Harness::dvfs();
        h.admit(1, 400.0, 1.0);
        h.admit(2, 900.0, 3.0);
        // urgencies 400 and 300
        assert_eq!(h.node.current_compute_rate(), 800.0);
        assert_eq!(h.node.execution_list()[0].current_processing_rate, 400.0);
    }

    #[test]
    fn fixed_rate_node_runs_at_nominal() {
        let mut h = Harness::fixed_rate();
        h.admit(1, 400.0, 1.0);
        h.admit(2, 900.0, 3.0);
        assert_eq!(h.node.current_compute_rate(), 10_000.0);
        assert_equal_share(&h.node);
    }

    // ── Completion ────────────────────────────────────────────────────────────

    #[test]
    fn single_task_completes_at_its_deadline_under_dvfs() {
        let mut h = Harness::dvfs();
        h.admit(1, 500.0, 2.0);
        while h.step() {}
        assert!(h.node.execution_list().is_empty());
        assert_eq!(h.node.num_completed(), 1);
        assert!((h.queue.now() - 2.0).abs() < 1e-9);
        assert_eq!(h.stats.tasks_completed, 1);
        assert_eq!(h.stats.tasks_admitted, 1);
    }

    #[test]
    fn only_finished_tasks_are_removed() {
        let mut h = Harness::fixed_rate();
        for (id, mips) in [(1, 2_000.0), (2, 9_000.0), (3, 30_000.0)] {
            h.admit(id, mips, 1.0);
        }
        let mut last_len = h.node.execution_list().len();
        while h.step() {
            let len = h.node.execution_list().len();
            assert!(h.node.execution_list().iter().all(|t| t.remaining_mips > 1.0));
            assert!(len <= last_len);
            last_len = len;
        }
        assert_eq!(h.node.num_completed(), 3);
        assert_eq!(h.acks.len(), 3);
    }

    #[test]
    fn tiny_task_completes_on_arrival() {
        let mut h = Harness::dvfs();
        h.admit(1, 0.5, 1.0);
        assert!(h.node.execution_list().is_empty());
        assert_eq!(h.node.num_completed(), 1);
        assert_eq!(h.node.dispatch_status(), DispatchStatus::Idle);
    }

    #[test]
    fn completion_is_acked_to_the_dispatcher() {
        let mut h = Harness::dvfs();
        h.admit(7, 100.0, 1.0);
        while h.step() {}
        assert_eq!(h.acks.len(), 1);
        let ack = &h.acks[0];
        assert_eq!(ack.packet_id, 7);
        assert!(!ack.is_user_originated);
        assert_eq!(ack.source_address, NODE.to_string());
    }

    #[test]
    fn no_ack_when_replies_are_disabled() {
        let mut h = Harness::new(ComputeNodeConfig {
            reply_on_completion: false,
            ..Default::default()
        });
        h.admit(7, 100.0, 1.0);
        while h.step() {}
        assert_eq!(h.node.num_completed(), 1);
        assert!(h.acks.is_empty());
    }

    // ── Timer discipline ──────────────────────────────────────────────────────

    #[test]
    fn at_most_one_completion_check_is_pending() {
        let mut h = Harness::dvfs();
        for id in 1..=4 {
            h.admit(id, 100.0 * id as f64, 1.0 + id as f64);
            assert_eq!(h.queue.len(), 1);
            assert_eq!(h.node.dispatch_status(), DispatchStatus::Pending);
        }
        let handle = h.node.pending_timer().unwrap();
        assert!(h.queue.is_pending(handle));
    }

    #[test]
    fn check_targets_the_smallest_deadline() {
        let mut h = Harness::fixed_rate();
        h.admit(1, 5_000.0, 3.0);
        h.admit(2, 5_000.0, 1.0);
        h.admit(3, 5_000.0, 1.0);
        let fired = h.queue.pop().unwrap();
        match fired.kind {
            EventKind::TaskCompletion(s) => assert_eq!(s.id, 2),
            other => panic!("expected a completion check, got {other:?}"),
        }
    }

    #[test]
    fn stale_completion_check_changes_nothing() {
        let mut h = Harness::dvfs();
        h.admit(1, 600.0, 2.0);
        h.advance(0.5);
        let list_before = h.node.execution_list().to_vec();
        let energy_before = h.node.energy_consumed_wh();
        let draw_before = h.node.current_power_draw();
        let rate_before = h.node.current_compute_rate();

        let stale = TaskSnapshot {
            id: 999,
            remaining_mips: 10.0,
            deadline: 1.0,
            current_processing_rate: 5.0,
        };
        {
            let mut ctx = SimContext::new(&mut h.queue, &mut h.stats, NODE, 0.0);
            h.node.handle_event(EventKind::TaskCompletion(stale), &mut ctx).unwrap();
        }
        assert_eq!(h.node.execution_list(), list_before.as_slice());
        assert_eq!(h.node.energy_consumed_wh(), energy_before);
        assert_eq!(h.node.current_power_draw(), draw_before);
        assert_eq!(h.node.current_compute_rate(), rate_before);
        assert_eq!(h.stats.stale_events_discarded, 1);
        assert_eq!(h.node.dispatch_status(), DispatchStatus::Pending);
    }

    // ── Energy ────────────────────────────────────────────────────────────────

    #[test]
    fn idle_node_with_dns_draws_nothing() {
        let h = Harness::dvfs();
        assert_eq!(h.node.current_power_draw(), 0.0);
    }

    #[test]
    fn idle_node_without_dns_draws_idle_power() {
        let h = Harness::new(ComputeNodeConfig {
            dns: false,
            ..Default::default()
        });
        assert_eq!(h.node.current_power_draw(), 130.0 * 2.0 / 3.0);
    }

    #[test]
    fn energy_of_one_full_load_second() {
        let mut h = Harness::fixed_rate();
        h.admit(1, 10_000.0, 1.0);
        assert_eq!(h.node.utilization(), 1.0);
        assert!((h.node.current_power_draw() - 130.0).abs() < 1e-9);
        while h.step() {}
        assert!((h.queue.now() - 1.0).abs() < 1e-12);
        assert!((h.node.energy_consumed_wh() - 130.0 / 3600.0).abs() < 1e-9);
        assert_eq!(h.node.current_power_draw(), 0.0);
    }

    #[test]
    fn dvfs_draw_matches_cubic_model() {
        let mut h = Harness::dvfs();
        h.admit(1, 5_000.0, 1.0);
        let u = h.node.utilization();
        assert_eq!(u, 0.5);
        let m = h.node.energy_model();
        assert_eq!(h.node.current_power_draw(), m.idle_draw() + 130.0 * u * u * u / 3.0);
    }

    // ── Shutdown ──────────────────────────────────────────────────────────────

    #[test]
    fn shutdown_cancels_timer_and_reports_energy() {
        let mut h = Harness::fixed_rate();
        h.admit(1, 50_000.0, 10.0);
        h.advance(1.0);
        {
            let mut ctx = SimContext::new(&mut h.queue, &mut h.stats, NODE, 0.0);
            h.node.shutdown(&mut ctx);
        }
        assert!(h.queue.is_empty());
        assert!(h.node.execution_list().is_empty());
        assert_eq!(h.node.dispatch_status(), DispatchStatus::Idle);
        let recorded = h.stats.node_energy_wh["server0"];
        assert!((recorded - 130.0 / 3600.0).abs() < 1e-9);
    }

    #[test]
    fn malformed_payload_is_fatal() {
        let mut h = Harness::dvfs();
        let datagram = Datagram {
            source: SCHED,
            destination: NODE,
            port: PORT,
            payload: vec![0x0a, 0xff],
        };
        let mut ctx = SimContext::new(&mut h.queue, &mut h.stats, NODE, 0.0);
        let err = h.node.handle_datagram(datagram, &mut ctx).unwrap_err();
        assert!(matches!(err, SimError::MalformedPayload { .. }));
    }
}
