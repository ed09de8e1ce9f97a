/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! GreenCloud – energy-aware task scheduling simulator
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── task          – CloudTask wire record, RuntimeTask, TaskSnapshot
//! ├── net           – addresses, datagrams, name resolution
//! ├── event         – virtual-time event queue, cancellable timers
//! ├── stats         – run-wide counters and packet-id allocation
//! ├── component     – Component trait + SimContext
//! ├── scheduler/    – dispatcher, wait-queue disciplines, node table
//! ├── compute/      – compute node, DVFS/DNS energy model
//! ├── generator     – workload generator
//! ├── simulation    – scenario wiring and the run loop
//! ├── config/       – YAML scenario configuration
//! └── error         – SimError
//! ```

pub mod component;
pub mod compute;
pub mod config;
pub mod error;
pub mod event;
pub mod generator;
pub mod net;
pub mod scheduler;
pub mod simulation;
pub mod stats;
pub mod task;
