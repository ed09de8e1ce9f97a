/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for the GreenCloud simulator.
//!
//! Every variant here is *fatal* for the run: the event loop in
//! [`Simulation::run()`](crate::simulation::Simulation::run) stops at the
//! first error a component handler returns.  Recoverable conditions (stale
//! completion timers, empty queues, undeliverable datagrams) never surface as
//! a `SimError`; they are logged and counted instead.
//!
//! | Variant | Raised by |
//! |---|---|
//! | `MalformedPayload` | any component receiving a datagram |
//! | `NoComputeCapacity` | dispatcher, when no node can be selected |
//! | `NoComputeNodes` | dispatcher start-up with an empty peer list |
//! | `UnknownModule` | address resolution while wiring the run |
//! | `InvalidConfig` | scenario validation |

use thiserror::Error;

use crate::net::Address;

/// Why an incoming payload could not be accepted as a [`CloudTask`].
///
/// [`CloudTask`]: crate::task::CloudTask
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadDefect {
    /// The bytes are not a protobuf-encoded `CloudTask`.
    Undecodable(String),

    /// `mips` is negative, NaN or infinite.
    InvalidMips(f64),

    /// `deadline` is not a strictly positive finite number.
    InvalidDeadline(f64),
}

impl std::fmt::Display for PayloadDefect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayloadDefect::Undecodable(reason) => write!(f, "not a CloudTask record: {reason}"),
            PayloadDefect::InvalidMips(v) => write!(f, "mips must be finite and >= 0, got {v}"),
            PayloadDefect::InvalidDeadline(v) => {
                write!(f, "deadline must be finite and > 0, got {v}")
            }
        }
    }
}

/// Top-level error returned by component handlers and the run loop.
#[derive(Debug, Error)]
pub enum SimError {
    /// A datagram arrived whose payload cannot be interpreted as a task record.
    #[error("module '{module}' received a malformed payload from {source_addr}: {defect}")]
    MalformedPayload {
        module: String,
        source_addr: Address,
        defect: PayloadDefect,
    },

    /// The dispatcher could not select a compute node for a task.
    ///
    /// `selected` is the address the selection produced (unspecified or the
    /// loopback address).
    #[error("dispatcher '{module}' has no compute capacity for task {task_id} (selected {selected})")]
    NoComputeCapacity {
        module: String,
        task_id: u64,
        selected: Address,
    },

    /// The dispatcher was started with no peers other than itself.
    #[error("dispatcher '{module}' has an empty destination list")]
    NoComputeNodes { module: String },

    /// A module name could not be resolved to an address.
    #[error("unknown module '{0}'")]
    UnknownModule(String),

    /// The scenario is structurally valid YAML but semantically unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
