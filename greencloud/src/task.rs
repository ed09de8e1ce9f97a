/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Core task data structures.
//!
//! Two distinct types model the two sides of the pipeline:
//!
//! ```text
//! Generator ──(CloudTask)──► Dispatcher ──(CloudTask, fresh)──► ComputeNode ──► RuntimeTask
//!            wire record                   wire record                          local, mutable
//! ```
//!
//! # Ownership model
//! A `CloudTask` only ever crosses a module boundary *by value* (encoded into
//! a datagram).  A `RuntimeTask` is owned exclusively by the execution list of
//! the node that admitted it; the completion timer carries a [`TaskSnapshot`]
//! copy, never a reference, so a timer can outlive the task it describes.

use prost::Message;

use crate::error::PayloadDefect;
use crate::event::SimTime;

/// Globally unique task / packet identifier.  `0` means "no task".
pub type TaskId = u64;

/// A runtime task with this much work left (or less) is complete.
pub const COMPLETION_THRESHOLD_MIPS: f64 = 1.0;

// ── CloudTask (wire record) ───────────────────────────────────────────────────

/// Task record exchanged between generator, dispatcher and compute node.
///
/// Encoded as a protobuf message; the field numbers are the wire contract.
#[derive(Clone, PartialEq, Message)]
pub struct CloudTask {
    /// Sequence number assigned by the sender.
    #[prost(uint64, tag = "1")]
    pub packet_id: u64,

    /// Textual address of the originating module.
    #[prost(string, tag = "2")]
    pub source_address: String,

    /// Total computational work (million instructions).
    #[prost(double, tag = "3")]
    pub mips: f64,

    /// Scheduling attribute, not bytes on the wire.
    #[prost(double, tag = "4")]
    pub size: f64,

    /// Relative completion constraint in seconds.
    #[prost(double, tag = "5")]
    pub deadline: f64,

    #[prost(int64, tag = "6")]
    pub output_amount: i64,

    #[prost(int64, tag = "7")]
    pub intercom_amount: i64,

    #[prost(double, tag = "8")]
    pub current_processing_rate: f64,

    #[prost(double, tag = "9")]
    pub executed_since: f64,

    /// `true` for generator-created tasks, `false` for completion acks.
    #[prost(bool, tag = "10")]
    pub is_user_originated: bool,
}

impl CloudTask {
    /// Build a brand-new user task as a generator does.
    pub fn new_user_task(
        packet_id: u64,
        source_address: impl Into<String>,
        mips: f64,
        size: f64,
        deadline: f64,
    ) -> Self {
        CloudTask {
            packet_id,
            source_address: source_address.into(),
            mips,
            size,
            deadline,
            is_user_originated: true,
            ..Default::default()
        }
    }

    /// Copy of this task for a new administrative owner.
    ///
    /// Keeps the demand (`mips`, `size`, `deadline`) and origin flag, takes a
    /// new `packet_id` and `source_address`, and zeroes every accounting field
    /// so the receiving node starts its own bookkeeping.
    pub fn to_fresh_admission(&self, packet_id: u64, source_address: impl Into<String>) -> Self {
        CloudTask {
            packet_id,
            source_address: source_address.into(),
            mips: self.mips,
            size: self.size,
            deadline: self.deadline,
            output_amount: 0,
            intercom_amount: 0,
            current_processing_rate: 0.0,
            executed_since: 0.0,
            is_user_originated: self.is_user_originated,
        }
    }

    /// Acknowledgement a compute node sends once `task` has finished.
    pub fn completion_ack(task: &RuntimeTask, source_address: impl Into<String>) -> Self {
        CloudTask {
            packet_id: task.id,
            source_address: source_address.into(),
            mips: 0.0,
            size: task.size,
            deadline: task.deadline,
            output_amount: task.output_amount,
            intercom_amount: task.intercom_amount,
            current_processing_rate: task.current_processing_rate,
            executed_since: task.admitted_at,
            is_user_originated: false,
        }
    }

    /// Check the data-model invariants of a decoded record.
    pub fn validate(&self) -> Result<(), PayloadDefect> {
        if !self.mips.is_finite() || self.mips < 0.0 {
            return Err(PayloadDefect::InvalidMips(self.mips));
        }
        if !self.deadline.is_finite() || self.deadline <= 0.0 {
            return Err(PayloadDefect::InvalidDeadline(self.deadline));
        }
        Ok(())
    }

    /// Serialise for a datagram payload.
    pub fn encode_payload(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    /// Decode and validate a datagram payload.
    pub fn decode_payload(bytes: &[u8]) -> Result<Self, PayloadDefect> {
        let task =
            CloudTask::decode(bytes).map_err(|e| PayloadDefect::Undecodable(e.to_string()))?;
        task.validate()?;
        Ok(task)
    }
}

impl AsRef<CloudTask> for CloudTask {
    fn as_ref(&self) -> &CloudTask {
        self
    }
}

// ── RuntimeTask (local, mutable) ──────────────────────────────────────────────

/// A task currently occupying execution time on a node.
///
/// `remaining_mips` is integrated piecewise: between two rate changes the
/// task progresses linearly at `current_processing_rate`.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeTask {
    pub id: TaskId,
    pub remaining_mips: f64,
    pub size: f64,
    /// Relative deadline in seconds, as received.
    pub deadline: f64,
    pub output_amount: i64,
    pub intercom_amount: i64,
    /// Share of the node rate assigned to this task (MIPS per second).
    pub current_processing_rate: f64,
    /// Simulation time at which `current_processing_rate` was last set.
    pub last_rate_update: SimTime,
    /// Simulation time at which the node admitted the task.
    pub admitted_at: SimTime,
}

impl RuntimeTask {
    /// Admit `task` at time `now`.
    pub fn from_cloud_task(task: &CloudTask, now: SimTime) -> Self {
        RuntimeTask {
            id: task.packet_id,
            remaining_mips: task.mips,
            size: task.size,
            deadline: task.deadline,
            output_amount: task.output_amount,
            intercom_amount: task.intercom_amount,
            current_processing_rate: task.current_processing_rate,
            last_rate_update: now,
            admitted_at: now,
        }
    }

    /// Account for the work done since the last update at the *previous*
    /// rate, then switch to `new_rate`.
    pub fn advance_and_set_rate(&mut self, new_rate: f64, now: SimTime) {
        let elapsed = (now - self.last_rate_update).max(0.0);
        let done = self.current_processing_rate * elapsed;
        self.remaining_mips = (self.remaining_mips - done).max(0.0);
        self.current_processing_rate = new_rate;
        self.last_rate_update = now;
    }

    /// Seconds until the remaining work is done at the current rate, or
    /// `f64::MAX` if the task is not progressing.
    pub fn projected_remaining_time(&self) -> f64 {
        if self.current_processing_rate > 0.0 {
            self.remaining_mips / self.current_processing_rate
        } else {
            f64::MAX
        }
    }

    /// MIPS per second this task needs to finish within its deadline.
    pub fn urgency(&self) -> f64 {
        self.remaining_mips / self.deadline
    }

    pub fn is_complete(&self) -> bool {
        self.remaining_mips <= COMPLETION_THRESHOLD_MIPS
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.id,
            remaining_mips: self.remaining_mips,
            deadline: self.deadline,
            current_processing_rate: self.current_processing_rate,
        }
    }
}

/// Copy of a runtime task's fields carried by a completion timer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub remaining_mips: f64,
    pub deadline: f64,
    pub current_processing_rate: f64,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime(mips: f64, deadline: f64) -> RuntimeTask {
        let wire = CloudTask::new_user_task(7, "10.0.0.1", mips, 0.1, deadline);
        RuntimeTask::from_cloud_task(&wire, 0.0)
    }

    // ── CloudTask ─────────────────────────────────────────────────────────────

    #[test]
    fn payload_decodes_to_the_same_record() {
        let mut task = CloudTask::new_user_task(3, "10.0.0.4", 250.0, 0.1, 1.0);
        task.output_amount = 12;
        let decoded = CloudTask::decode_payload(&task.encode_payload()).unwrap();
        assert_eq!(decoded, task);
    }

    #[test]
    fn garbage_payload_is_undecodable() {
        let err = CloudTask::decode_payload(&[0xFF, 0xFF]).unwrap_err();
        assert!(matches!(err, PayloadDefect::Undecodable(_)));
    }

    #[test]
    fn empty_payload_fails_validation() {
        // An empty buffer decodes to the default record, whose deadline is 0.
        let err = CloudTask::decode_payload(&[]).unwrap_err();
        assert_eq!(err, PayloadDefect::InvalidDeadline(0.0));
    }

    #[test]
    fn negative_mips_fails_validation() {
        let task = CloudTask::new_user_task(1, "a", -5.0, 0.1, 1.0);
        assert_eq!(task.validate(), Err(PayloadDefect::InvalidMips(-5.0)));
    }

    #[test]
    fn fresh_admission_zeroes_accounting_fields() {
        let mut task = CloudTask::new_user_task(1, "10.0.0.9", 500.0, 0.1, 2.0);
        task.output_amount = 10;
        task.intercom_amount = 20;
        task.current_processing_rate = 33.0;
        task.executed_since = 4.5;

        let fresh = task.to_fresh_admission(42, "10.0.0.1");

        assert_eq!(fresh.packet_id, 42);
        assert_eq!(fresh.source_address, "10.0.0.1");
        assert_eq!(fresh.mips, 500.0);
        assert_eq!(fresh.size, 0.1);
        assert_eq!(fresh.deadline, 2.0);
        assert_eq!(fresh.output_amount, 0);
        assert_eq!(fresh.intercom_amount, 0);
        assert_eq!(fresh.current_processing_rate, 0.0);
        assert_eq!(fresh.executed_since, 0.0);
        assert!(fresh.is_user_originated);
        // the original is untouched
        assert_eq!(task.packet_id, 1);
        assert_eq!(task.output_amount, 10);
    }

    #[test]
    fn completion_ack_is_not_user_originated() {
        let mut rt = runtime(100.0, 1.0);
        rt.advance_and_set_rate(50.0, 0.0);
        let ack = CloudTask::completion_ack(&rt, "10.0.0.2");
        assert!(!ack.is_user_originated);
        assert_eq!(ack.packet_id, 7);
        assert_eq!(ack.source_address, "10.0.0.2");
        assert_eq!(ack.current_processing_rate, 50.0);
        assert_eq!(ack.mips, 0.0);
    }

    // ── RuntimeTask ───────────────────────────────────────────────────────────

    #[test]
    fn advance_integrates_at_previous_rate() {
        let mut t = runtime(1_000.0, 1.0);
        t.advance_and_set_rate(100.0, 0.0);
        t.advance_and_set_rate(400.0, 2.0); // 2 s at 100
        assert!((t.remaining_mips - 800.0).abs() < 1e-9);
        assert_eq!(t.current_processing_rate, 400.0);
        assert_eq!(t.last_rate_update, 2.0);
        t.advance_and_set_rate(0.0, 3.0); // 1 s at 400
        assert!((t.remaining_mips - 400.0).abs() < 1e-9);
    }

    #[test]
    fn remaining_work_never_increases() {
        let mut t = runtime(1_000.0, 1.0);
        let mut prev = t.remaining_mips;
        let rates = [10.0, 250.0, 0.0, 75.5, 900.0, 3.0];
        let mut now = 0.0;
        for rate in rates {
            now += 0.7;
            let expected = (prev - t.current_processing_rate * 0.7).max(0.0);
            t.advance_and_set_rate(rate, now);
            assert!(t.remaining_mips <= prev);
            assert!((t.remaining_mips - expected).abs() < 1e-9);
            prev = t.remaining_mips;
        }
    }

    #[test]
    fn remaining_work_is_clamped_at_zero() {
        let mut t = runtime(10.0, 1.0);
        t.advance_and_set_rate(100.0, 0.0);
        t.advance_and_set_rate(100.0, 5.0);
        assert_eq!(t.remaining_mips, 0.0);
        assert!(t.is_complete());
    }

    #[test]
    fn projected_time_is_infinite_without_rate() {
        let t = runtime(10.0, 1.0);
        assert_eq!(t.projected_remaining_time(), f64::MAX);
    }

    #[test]
    fn projected_time_divides_work_by_rate() {
        let mut t = runtime(600.0, 1.0);
        t.advance_and_set_rate(200.0, 0.0);
        assert!((t.projected_remaining_time() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn completion_threshold_is_inclusive() {
        assert!(runtime(1.0, 1.0).is_complete());
        assert!(!runtime(1.000_001, 1.0).is_complete());
    }

    #[test]
    fn urgency_is_work_over_deadline() {
        assert_eq!(runtime(300.0, 2.0).urgency(), 150.0);
    }
}
