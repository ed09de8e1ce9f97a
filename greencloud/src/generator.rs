/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Workload generator.
//!
//! Sends one [`CloudTask`] to its destination every `send_interval` seconds
//! from `start_time` until (excluding) `stop_time`.  MIPS are drawn
//! uniformly from `[0, max_mips)` with a seeded RNG, so a run is
//! reproducible.  Completion acks coming back are only counted.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::component::{Component, SimContext};
use crate::config::GeneratorConfig;
use crate::error::SimError;
use crate::event::{EventKind, TimerHandle};
use crate::net::{Address, Datagram};
use crate::task::CloudTask;

pub struct Generator {
    name: String,
    address: Address,
    port: u16,
    destination: Address,
    config: GeneratorConfig,
    rng: SmallRng,
    send_timer: Option<TimerHandle>,
    stopped: bool,
    num_sent: u64,
    num_received: u64,
}

impl Generator {
    pub fn new(
        name: impl Into<String>,
        address: Address,
        port: u16,
        destination: Address,
        config: GeneratorConfig,
        seed: u64,
    ) -> Self {
        Self {
            name: name.into(),
            address,
            port,
            destination,
            config,
            rng: SmallRng::seed_from_u64(seed),
            send_timer: None,
            stopped: false,
            num_sent: 0,
            num_received: 0,
        }
    }

    pub fn num_received(&self) -> u64 {
        self.num_received
    }

    fn start(&mut self, ctx: &mut SimContext<'_>) {
        let first = self.config.start_time.max(ctx.now());
        if self.config.stop_time.map_or(true, |stop| first < stop) {
            self.send_timer = Some(ctx.schedule_self_at(first, EventKind::Send));
        }
        if let Some(stop) = self.config.stop_time {
            ctx.schedule_self_at(stop, EventKind::Stop);
        }
        info!(
            generator = %self.name,
            address = %self.address,
            destination = %self.destination,
            interval = self.config.send_interval,
            first_send = first,
            "generator started"
        );
    }

    fn on_send_tick(&mut self, ctx: &mut SimContext<'_>) {
        self.send_timer = None;
        if self.stopped {
            return;
        }
        self.generate_and_send_task(ctx);

        let next = ctx.now() + self.config.send_interval;
        if self.config.stop_time.map_or(true, |stop| next < stop) {
            self.send_timer = Some(ctx.schedule_self_at(next, EventKind::Send));
        }
    }

    fn stop(&mut self, ctx: &mut SimContext<'_>) {
        self.stopped = true;
        if let Some(handle) = self.send_timer.take() {
            ctx.cancel(handle);
        }
        debug!(generator = %self.name, sent = self.num_sent, "generator stopped");
    }

    /// Build a fresh user task and send it to the destination.
    pub fn generate_and_send_task(&mut self, ctx: &mut SimContext<'_>) -> CloudTask {
        let mips = if self.config.max_mips > 0.0 {
            self.rng.gen_range(0.0..self.config.max_mips)
        } else {
            0.0
        };
        let packet_id = ctx.stats().next_packet_id();
        let task = CloudTask::new_user_task(
            packet_id,
            self.address.to_string(),
            mips,
            self.config.size,
            self.config.deadline,
        );

        debug!(generator = %self.name, packet_id, mips, "task generated");
        ctx.send_to(task.encode_payload(), self.destination, self.port);
        self.num_sent += 1;
        ctx.stats().tasks_generated += 1;
        task
    }

    /// Count a task coming back.
    pub fn on_reply_arrived(&mut self, reply: &CloudTask, ctx: &mut SimContext<'_>) {
        self.num_received += 1;
        ctx.stats().replies_received += 1;
        debug!(
            generator = %self.name,
            packet_id = reply.packet_id,
            received = self.num_received,
            "reply received"
        );
    }
}

impl Component for Generator {
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
            EventKind::Start => self.start(ctx),
            EventKind::Send => self.on_send_tick(ctx),
            EventKind::Stop => self.stop(ctx),
            other => warn!(generator = %self.name, event = ?other, "unexpected event ignored"),
        }
        Ok(())
    }

    fn handle_datagram(&mut self, datagram: Datagram, ctx: &mut SimContext<'_>) -> Result<(), SimError> {
        let reply = CloudTask::decode_payload(&datagram.payload).map_err(|defect| {
            SimError::MalformedPayload {
                module: self.name.clone(),
                source_addr: datagram.source,
                defect,
            }
        })?;
        self.on_reply_arrived(&reply, ctx);
        Ok(())
    }

    fn shutdown(&mut self, ctx: &mut SimContext<'_>) {
        if let Some(handle) = self.send_timer.take() {
            ctx.cancel(handle);
        }
        info!(
            generator = %self.name,
            sent = self.num_sent,
            received = self.num_received,
            "generator finished"
        );
    }
}
