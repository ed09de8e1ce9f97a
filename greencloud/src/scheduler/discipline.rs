/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Wait-queue disciplines.
//!
//! Every discipline is a single O(n) scan over the wait queue returning the
//! *index* of the task to dispatch next.  Ties go to the earliest entry.
//!
//! | Discipline | Picks | Reschedule delay |
//! |---|---|---|
//! | `Fcfs` | queue head | `schedule_delay` |
//! | `Sjf`  | minimum `mips` | `schedule_delay` |
//! | `Lifo` | queue tail | `lifo_delay` |
//! | `Dta`  | maximum `mips` | `schedule_delay` |
//!
//! `Dta` ("decreasing time algorithm") dispatches the *largest* job first.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::task::CloudTask;

/// Task-selection policy of the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Discipline {
    /// First come, first served.
    Fcfs,
    /// Shortest job (smallest `mips`) first.
    #[default]
    Sjf,
    /// Last in, first out.
    Lifo,
    /// Decreasing time: largest `mips` first.
    Dta,
}

impl Discipline {
    /// Index into `queue` of the task to dispatch, or `None` if it is empty.
    pub fn select<T: AsRef<CloudTask>>(self, queue: &[T]) -> Option<usize> {
        if queue.is_empty() {
            return None;
        }
        let mips = |i: usize| queue[i].as_ref().mips;
        match self {
            Discipline::Fcfs => Some(0),
            Discipline::Lifo => Some(queue.len() - 1),
            Discipline::Sjf => {
                let mut best = 0;
                for i in 1..queue.len() {
                    if mips(i) < mips(best) {
                        best = i;
                    }
                }
                Some(best)
            }
            Discipline::Dta => {
                let mut best = 0;
                for i in 1..queue.len() {
                    if mips(i) > mips(best) {
                        best = i;
                    }
                }
                Some(best)
            }
        }
    }

    /// Delay before the next dispatch while the queue is non-empty.
    pub fn reschedule_delay(self, schedule_delay: f64, lifo_delay: f64) -> f64 {
        match self {
            Discipline::Lifo => lifo_delay,
            Discipline::Fcfs | Discipline::Sjf | Discipline::Dta => schedule_delay,
        }
    }
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Discipline::Fcfs => "fcfs",
            Discipline::Sjf => "sjf",
            Discipline::Lifo => "lifo",
            Discipline::Dta => "dta",
        };
        f.write_str(s)
    }
}

impl FromStr for Discipline {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fcfs" => Ok(Discipline::Fcfs),
            "sjf" => Ok(Discipline::Sjf),
            "lifo" => Ok(Discipline::Lifo),
            "dta" => Ok(Discipline::Dta),
            other => Err(format!(
                "unknown discipline '{other}' (valid: fcfs, sjf, lifo, dta)"
            )),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
