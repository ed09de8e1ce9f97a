/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::{error, info, warn};

use greencloud::config::SimConfig;
use greencloud::scheduler::Discipline;
use greencloud::simulation::Simulation;

// ── CLI argument definition ───────────────────────────────────────────────────

/// GreenCloud energy-aware scheduling simulator.
///
/// Example:
///   greencloud-sim -c scenario.yaml -d lifo -t 500 --seed 7
#[derive(Debug, Parser)]
#[command(
    name = "greencloud-sim",
    about = "GreenCloud task scheduling and compute-node energy simulator",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML scenario file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Override the dispatcher discipline (fcfs, sjf, lifo, dta).
    #[arg(short = 'd', long = "discipline")]
    discipline: Option<Discipline>,

    /// Override the run length in simulated seconds.
    #[arg(short = 't', long = "duration")]
    duration: Option<f64>,

    /// Override the workload RNG seed.
    #[arg(long = "seed")]
    seed: Option<u64>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // ── Load scenario ─────────────────────────────────────────────────────────
    let mut config = match &cli.config {
        Some(path) => match SimConfig::load_from_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load scenario: {:#}", e);
                process::exit(1);
            }
        },
        None => {
            warn!("No scenario file provided, using the built-in default scenario");
            SimConfig::default_scenario()
        }
    };

    if let Some(discipline) = cli.discipline {
        config.scheduler.discipline = discipline;
    }
    if let Some(duration) = cli.duration {
        config.duration = duration;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }

    info!(
        duration   = config.duration,
        seed       = config.seed,
        discipline = %config.scheduler.discipline,
        selection  = ?config.scheduler.node_selection,
        nodes      = config.compute_nodes.len(),
        generators = config.generators.len(),
        "Configuration"
    );
    for (name, node) in &config.compute_nodes {
        info!(
            "  [{name}]  mips={mips}  power={power}W  dvfs={dvfs}  dns={dns}",
            mips = node.nominal_mips,
            power = node.nominal_power,
            dvfs = node.dvfs,
            dns = node.dns,
        );
    }

    // ── Run ───────────────────────────────────────────────────────────────────
    let summary = match Simulation::from_config(&config).and_then(|mut sim| sim.run()) {
        Ok(summary) => summary,
        Err(e) => {
            error!("Simulation failed: {}", e);
            process::exit(1);
        }
    };

    info!(
        "Tasks: generated={} received={} dispatched={} completed={} replies={}",
        summary.tasks_generated,
        summary.tasks_received,
        summary.tasks_dispatched,
        summary.tasks_completed,
        summary.replies_received,
    );
    for (node, wh) in &summary.node_energy_wh {
        info!("  [{node}]  energy={wh:.6} Wh");
    }
    info!("Total energy: {:.6} Wh", summary.total_energy_wh);
}
