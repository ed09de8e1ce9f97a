/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Network boundary: addresses, datagrams and name resolution.
//!
//! The simulator does not model a protocol stack.  A [`Datagram`] carries an
//! encoded task record from one module to another after a fixed link delay;
//! there is no retransmission, ordering or acknowledgement beyond that.

use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::SimError;

// ── Address ───────────────────────────────────────────────────────────────────

/// Network address of a simulated module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(Ipv4Addr);

impl Address {
    /// `0.0.0.0` – "no node", returned when a selection finds nothing.
    pub const UNSPECIFIED: Address = Address(Ipv4Addr::UNSPECIFIED);

    /// `127.0.0.1` – never a valid dispatch target.
    pub const LOOPBACK: Address = Address(Ipv4Addr::LOCALHOST);

    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Self {
        Address(Ipv4Addr::new(a, b, c, d))
    }

    pub fn is_unspecified(&self) -> bool {
        self.0.is_unspecified()
    }

    pub fn is_loopback(&self) -> bool {
        self.0.is_loopback()
    }
}

impl Default for Address {
    fn default() -> Self {
        Address::UNSPECIFIED
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Address {
    type Err = std::net::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Ipv4Addr>().map(Address)
    }
}

// ── Datagram ──────────────────────────────────────────────────────────────────

/// One unit of network delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct Datagram {
    pub source: Address,
    pub destination: Address,
    pub port: u16,
    pub payload: Vec<u8>,
}

// ── AddressResolver ───────────────────────────────────────────────────────────

/// Maps module names to addresses.
///
/// Addresses are handed out as `10.0.0.N` in registration order, so a run is
/// fully determined by the order in which modules are registered.
#[derive(Debug, Default)]
pub struct AddressResolver {
    by_name: BTreeMap<String, Address>,
    next_host: u32,
}

impl AddressResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` and return its address.  Registering the same name
    /// twice returns the address it already has.
    pub fn register(&mut self, name: &str) -> Address {
        if let Some(addr) = self.by_name.get(name) {
            return *addr;
        }
        self.next_host += 1;
        let [_, b, c, d] = self.next_host.to_be_bytes();
        let addr = Address::new(10, b, c, d);
        self.by_name.insert(name.to_string(), addr);
        addr
    }

    /// Resolve a module name, or a literal dotted-quad address.
    pub fn resolve_address(&self, name: &str) -> Result<Address, SimError> {
        if let Some(addr) = self.by_name.get(name) {
            return Ok(*addr);
        }
        name.parse::<Address>()
            .map_err(|_| SimError::UnknownModule(name.to_string()))
    }

    /// Reverse lookup, used for log output only.
    pub fn name_of(&self, addr: Address) -> Option<&str> {
        self.by_name
            .iter()
            .find(|(_, a)| **a == addr)
            .map(|(n, _)| n.as_str())
    }

    /// All registered addresses, in registration order.
    pub fn addresses(&self) -> Vec<Address> {
        let mut all: Vec<Address> = self.by_name.values().copied().collect();
        all.sort();
        all
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
