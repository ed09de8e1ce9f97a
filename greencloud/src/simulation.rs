/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Run driver.
//!
//! [`Simulation::from_config`] registers every module with the
//! [`AddressResolver`] (dispatcher first, then compute nodes, then
//! generators, each group in name order), builds the components and wires
//! the dispatcher's peer list.  [`Simulation::run`] starts every module at
//! `t = 0`, fires events until `duration` and shuts the modules down.
//!
//! Events are routed by target address.  A datagram for an address nobody
//! owns, or for a port the owner does not listen on, is dropped and counted.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, error, info, warn};

use crate::component::{Component, SimContext};
use crate::compute::ComputeNode;
use crate::config::SimConfig;
use crate::error::SimError;
use crate::event::{EventKind, EventQueue, FiredEvent, SimTime};
use crate::generator::Generator;
use crate::net::{Address, AddressResolver};
use crate::scheduler::{Discipline, Dispatcher};
use crate::stats::RunStats;

// ── RunSummary ────────────────────────────────────────────────────────────────

/// Figures reported at the end of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub end_time: SimTime,
    pub discipline: Discipline,
    pub tasks_generated: u64,
    pub tasks_received: u64,
    pub tasks_dispatched: u64,
    pub tasks_admitted: u64,
    pub tasks_completed: u64,
    pub replies_received: u64,
    pub datagrams_dropped: u64,
    pub stale_events_discarded: u64,
    pub node_energy_wh: BTreeMap<String, f64>,
    pub total_energy_wh: f64,
}

impl RunSummary {
    fn from_stats(end_time: SimTime, discipline: Discipline, stats: &RunStats) -> Self {
        Self {
            end_time,
            discipline,
            tasks_generated: stats.tasks_generated,
            tasks_received: stats.tasks_received,
            tasks_dispatched: stats.tasks_dispatched,
            tasks_admitted: stats.tasks_admitted,
            tasks_completed: stats.tasks_completed,
            replies_received: stats.replies_received,
            datagrams_dropped: stats.datagrams_dropped,
            stale_events_discarded: stats.stale_events_discarded,
            node_energy_wh: stats.node_energy_wh.clone(),
            total_energy_wh: stats.total_energy_wh(),
        }
    }
}

// ── Simulation ────────────────────────────────────────────────────────────────

pub struct Simulation {
    queue: EventQueue,
    stats: RunStats,
    resolver: AddressResolver,
    components: Vec<Box<dyn Component>>,
    by_address: HashMap<Address, usize>,
    duration: SimTime,
    link_delay: SimTime,
    discipline: Discipline,
}

impl Simulation {
    /// Validate `config` and build every module it names.
    pub fn from_config(config: &SimConfig) -> Result<Self, SimError> {
        config.validate()?;

        let mut resolver = AddressResolver::new();
        let scheduler_addr = resolver.register(&config.scheduler.name);
        let node_addrs: Vec<(String, Address)> = config
            .compute_nodes
            .keys()
            .map(|name| (name.clone(), resolver.register(name)))
            .collect();
        let generator_addrs: Vec<(String, Address)> = config
            .generators
            .keys()
            .map(|name| (name.clone(), resolver.register(name)))
            .collect();

        for addr in resolver.addresses() {
            debug!(
                module = resolver.name_of(addr).unwrap_or("?"),
                address = %addr,
                "module registered"
            );
        }

        let mut components: Vec<Box<dyn Component>> = Vec::new();

        let peers = node_addrs.iter().map(|(_, a)| *a).collect();
        components.push(Box::new(Dispatcher::new(
            config.scheduler.name.clone(),
            scheduler_addr,
            config.port,
            config.scheduler.clone(),
            peers,
        )
        .with_completion_acks(
            config
                .compute_nodes
                .values()
                .any(|node| node.reply_on_completion),
        )));

        for (name, addr) in &node_addrs {
            let node_config = config.compute_nodes[name].clone();
            components.push(Box::new(ComputeNode::new(
                name.clone(),
                *addr,
                config.port,
                node_config,
            )));
        }

        for (index, (name, addr)) in generator_addrs.iter().enumerate() {
            let gen_config = config.generators[name].clone();
            let destination = resolver.resolve_address(&gen_config.destination)?;
            let seed = config.seed.wrapping_add(index as u64);
            components.push(Box::new(Generator::new(
                name.clone(),
                *addr,
                config.port,
                destination,
                gen_config,
                seed,
            )));
        }

        let by_address = components
            .iter()
            .enumerate()
            .map(|(i, c)| (c.address(), i))
            .collect();

        info!(
            scheduler = %scheduler_addr,
            compute_nodes = node_addrs.len(),
            generators = generator_addrs.len(),
            duration = config.duration,
            "simulation built"
        );

        Ok(Self {
            queue: EventQueue::new(),
            stats: RunStats::new(),
            resolver,
            components,
            by_address,
            duration: config.duration,
            link_delay: config.link_delay,
            discipline: config.scheduler.discipline,
        })
    }

    pub fn resolver(&self) -> &AddressResolver {
        &self.resolver
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn now(&self) -> SimTime {
        self.queue.now()
    }

    /// Run to `duration`.  The first error a module returns aborts the run.
    pub fn run(&mut self) -> Result<RunSummary, SimError> {
        for component in &self.components {
            self.queue
                .schedule_at(0.0, component.address(), EventKind::Start);
        }

        while let Some(next) = self.queue.peek_time() {
            if next > self.duration {
                break;
            }
            let Some(fired) = self.queue.pop() else {
                break;
            };
            if let Err(e) = self.deliver(fired) {
                error!(time = self.queue.now(), "run aborted: {e}");
                return Err(e);
            }
        }
        if self.queue.now() < self.duration {
            self.queue.advance_to(self.duration);
        }

        for component in &mut self.components {
            let mut ctx = SimContext::new(
                &mut self.queue,
                &mut self.stats,
                component.address(),
                self.link_delay,
            );
            component.shutdown(&mut ctx);
        }

        let summary = RunSummary::from_stats(self.queue.now(), self.discipline, &self.stats);
        info!(
            end_time = summary.end_time,
            discipline = %summary.discipline,
            generated = summary.tasks_generated,
            dispatched = summary.tasks_dispatched,
            completed = summary.tasks_completed,
            replies = summary.replies_received,
            dropped = summary.datagrams_dropped,
            energy_wh = summary.total_energy_wh,
            "run finished"
        );
        Ok(summary)
    }

    fn deliver(&mut self, fired: FiredEvent) -> Result<(), SimError> {
        let Some(&index) = self.by_address.get(&fired.target) else {
            warn!(address = %fired.target, event = ?fired.kind, "no module at address, event dropped");
            if matches!(fired.kind, EventKind::Deliver(_)) {
                self.stats.datagrams_dropped += 1;
            }
            return Ok(());
        };

        let component = &mut self.components[index];
        let mut ctx = SimContext::new(
            &mut self.queue,
            &mut self.stats,
            component.address(),
            self.link_delay,
        );
        match fired.kind {
            EventKind::Deliver(datagram) => {
                if datagram.port != component.port() {
                    warn!(
                        module = component.name(),
                        port = datagram.port,
                        source = %datagram.source,
                        "no listener on port, datagram dropped"
                    );
                    ctx.stats().datagrams_dropped += 1;
                    return Ok(());
                }
                component.handle_datagram(datagram, &mut ctx)
            }
            kind => component.handle_event(kind, &mut ctx),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
