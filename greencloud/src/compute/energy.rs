/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Server power model and energy integration.
//!
//! | Condition | Draw (W) |
//! |---|---|
//! | `dns` and utilization 0 | `0` |
//! | `dvfs` | `idle + P·u³/3` |
//! | otherwise | `idle + (P − idle)·u` |
//!
//! `P` is the nominal power at full load and `idle = P·2/3`.  Utilization is
//! the node-wide compute rate over the nominal rate and is not clamped.

use crate::event::SimTime;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Power model of one compute node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyModel {
    /// Draw at full load and maximum frequency, in W.
    pub nominal_power: f64,
    pub dvfs: bool,
    pub dns: bool,
}

impl EnergyModel {
    pub fn idle_draw(&self) -> f64 {
        self.nominal_power * 2.0 / 3.0
    }

    /// Instantaneous draw in W at `utilization`.
    pub fn power_draw(&self, utilization: f64) -> f64 {
        if utilization == 0.0 && self.dns {
            return 0.0;
        }
        let idle = self.idle_draw();
        if self.dvfs {
            idle + self.nominal_power * utilization * utilization * utilization / 3.0
        } else {
            idle + (self.nominal_power - idle) * utilization
        }
    }
}

/// Piecewise-constant integration of power draw into energy.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyMeter {
    consumed_wh: f64,
    current_draw: f64,
    last_update: SimTime,
}

impl EnergyMeter {
    pub fn new(start: SimTime, initial_draw: f64) -> Self {
        Self {
            consumed_wh: 0.0,
            current_draw: initial_draw,
            last_update: start,
        }
    }

    /// Add the energy drawn at the current level since the last update.
    pub fn integrate(&mut self, now: SimTime) {
        let hours = (now - self.last_update).max(0.0) / SECONDS_PER_HOUR;
        self.consumed_wh += hours * self.current_draw;
        self.last_update = now;
    }

    pub fn set_draw(&mut self, watts: f64) {
        self.current_draw = watts;
    }

    pub fn consumed_wh(&self) -> f64 {
        self.consumed_wh
    }

    pub fn current_draw(&self) -> f64 {
        self.current_draw
    }

    pub fn last_update(&self) -> SimTime {
        self.last_update
    }
}
