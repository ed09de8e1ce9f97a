//! Scenario configuration loading.
//!
//! A scenario names every module of a run and its parameters.  Every field
//! has a default, so an empty file is a valid (if idle) scenario.
//!
//! The expected YAML structure is:
//! ```yaml
//! duration: 100
//! seed: 7
//! port: 1000
//! link_delay: 0.001
//! scheduler:
//!   name: scheduler
//!   discipline: sjf            # fcfs | sjf | lifo | dta
//!   schedule_delay: 0.1
//!   lifo_delay: 0.05
//!   node_selection: round_robin   # round_robin | first_idle
//!   reset_table_when_exhausted: false
//! compute_nodes:
//!   server0:
//!     nominal_mips: 10000
//!     nominal_power: 130
//!     dvfs: true
//!     dns: true
//!     queueing: SJF             # FCFS | PRIORITY | SJF
//! generators:
//!   user0:
//!     destination: scheduler
//!     send_interval: 1.0
//!     start_time: 0.0
//!     stop_time: 50.0
//!     max_mips: 1000
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::compute::NodeQueueing;
use crate::error::SimError;
use crate::event::SimTime;
use crate::scheduler::{Discipline, NodeSelection};

// ── Serde defaults ────────────────────────────────────────────────────────────

fn default_duration() -> SimTime {
    100.0
}
fn default_port() -> u16 {
    1000
}
fn default_link_delay() -> SimTime {
    0.001
}
fn default_scheduler_name() -> String {
    String::from("scheduler")
}
fn default_schedule_delay() -> SimTime {
    0.1
}
fn default_lifo_delay() -> SimTime {
    0.05
}
fn default_nominal_mips() -> f64 {
    10_000.0
}
fn default_nominal_power() -> f64 {
    130.0
}
fn default_true() -> bool {
    true
}
fn default_send_interval() -> SimTime {
    1.0
}
fn default_max_mips() -> f64 {
    1_000.0
}
fn default_task_size() -> f64 {
    0.1
}
fn default_task_deadline() -> f64 {
    1.0
}

// ── Sections ──────────────────────────────────────────────────────────────────

/// Dispatcher parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    #[serde(default = "default_scheduler_name")]
    pub name: String,
    #[serde(default)]
    pub discipline: Discipline,
    /// Delay between a trigger and the next one (all but LIFO).
    #[serde(default = "default_schedule_delay")]
    pub schedule_delay: SimTime,
    #[serde(default = "default_lifo_delay")]
    pub lifo_delay: SimTime,
    #[serde(default)]
    pub node_selection: NodeSelection,
    /// Under `first_idle`, reset the table once instead of failing when every
    /// node is busy.
    #[serde(default)]
    pub reset_table_when_exhausted: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            name: default_scheduler_name(),
            discipline: Discipline::default(),
            schedule_delay: default_schedule_delay(),
            lifo_delay: default_lifo_delay(),
            node_selection: NodeSelection::default(),
            reset_table_when_exhausted: false,
        }
    }
}

/// Compute node parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComputeNodeConfig {
    /// Rated speed in MIPS.
    #[serde(default = "default_nominal_mips")]
    pub nominal_mips: f64,
    /// Rated power in W.
    #[serde(default = "default_nominal_power")]
    pub nominal_power: f64,
    #[serde(default = "default_true")]
    pub dvfs: bool,
    #[serde(default = "default_true")]
    pub dns: bool,
    #[serde(default)]
    pub queueing: NodeQueueing,
    /// Send a completion ack for every finished task.
    #[serde(default = "default_true")]
    pub reply_on_completion: bool,
}

impl Default for ComputeNodeConfig {
    fn default() -> Self {
        Self {
            nominal_mips: default_nominal_mips(),
            nominal_power: default_nominal_power(),
            dvfs: true,
            dns: true,
            queueing: NodeQueueing::default(),
            reply_on_completion: true,
        }
    }
}

/// Generator parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Module name (or literal address) tasks are sent to.
    #[serde(default = "default_scheduler_name")]
    pub destination: String,
    #[serde(default = "default_send_interval")]
    pub send_interval: SimTime,
    #[serde(default)]
    pub start_time: SimTime,
    /// Generation stops at this time; `None` runs until the end.
    #[serde(default)]
    pub stop_time: Option<SimTime>,
    #[serde(default = "default_max_mips")]
    pub max_mips: f64,
    #[serde(default = "default_task_size")]
    pub size: f64,
    #[serde(default = "default_task_deadline")]
    pub deadline: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            destination: default_scheduler_name(),
            send_interval: default_send_interval(),
            start_time: 0.0,
            stop_time: None,
            max_mips: default_max_mips(),
            size: default_task_size(),
            deadline: default_task_deadline(),
        }
    }
}

// ── SimConfig ─────────────────────────────────────────────────────────────────

/// A complete scenario.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimConfig {
    /// Run length in simulated seconds.
    #[serde(default = "default_duration")]
    pub duration: SimTime,
    #[serde(default)]
    pub seed: u64,
    /// Port every module listens and sends on.
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_link_delay")]
    pub link_delay: SimTime,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub compute_nodes: BTreeMap<String, ComputeNodeConfig>,
    #[serde(default)]
    pub generators: BTreeMap<String, GeneratorConfig>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            duration: default_duration(),
            seed: 0,
            port: default_port(),
            link_delay: default_link_delay(),
            scheduler: SchedulerConfig::default(),
            compute_nodes: BTreeMap::new(),
            generators: BTreeMap::new(),
        }
    }
}

impl SimConfig {
    /// Parse a scenario from `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not a valid
    /// scenario document.  Semantic checks are left to [`validate`](Self::validate).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading scenario from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open scenario file: {}", path.display()))?;
        let config: SimConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML file: {}", path.display()))?;

        if config.compute_nodes.is_empty() {
            warn!("Scenario {} defines no compute nodes", path.display());
        }
        debug!(
            nodes = config.compute_nodes.len(),
            generators = config.generators.len(),
            "scenario parsed"
        );
        Ok(config)
    }

    /// The built-in scenario: one dispatcher, three compute nodes
    /// (`server0..server2`) and one generator (`user0`).
    pub fn default_scenario() -> Self {
        let compute_nodes = (0..3)
            .map(|i| (format!("server{i}"), ComputeNodeConfig::default()))
            .collect();
        let generators = BTreeMap::from([(String::from("user0"), GeneratorConfig::default())]);
        Self {
            compute_nodes,
            generators,
            ..Default::default()
        }
    }

    /// Check the scenario for values the run cannot work with.
    pub fn validate(&self) -> Result<(), SimError> {
        fn positive(what: &str, v: f64) -> Result<(), SimError> {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(SimError::InvalidConfig(format!("{what} must be > 0, got {v}")))
            }
        }
        fn non_negative(what: &str, v: f64) -> Result<(), SimError> {
            if v.is_finite() && v >= 0.0 {
                Ok(())
            } else {
                Err(SimError::InvalidConfig(format!("{what} must be >= 0, got {v}")))
            }
        }

        positive("duration", self.duration)?;
        non_negative("link_delay", self.link_delay)?;
        positive("scheduler.schedule_delay", self.scheduler.schedule_delay)?;
        positive("scheduler.lifo_delay", self.scheduler.lifo_delay)?;

        if self.compute_nodes.is_empty() {
            return Err(SimError::InvalidConfig(String::from(
                "at least one compute node is required",
            )));
        }

        let mut names: HashSet<&str> = HashSet::new();
        names.insert(self.scheduler.name.as_str());
        for (name, node) in &self.compute_nodes {
            if !names.insert(name) {
                return Err(SimError::InvalidConfig(format!("duplicate module name '{name}'")));
            }
            positive(&format!("compute_nodes.{name}.nominal_mips"), node.nominal_mips)?;
            non_negative(&format!("compute_nodes.{name}.nominal_power"), node.nominal_power)?;
        }
        for (name, gen) in &self.generators {
            if !names.insert(name) {
                return Err(SimError::InvalidConfig(format!("duplicate module name '{name}'")));
            }
            positive(&format!("generators.{name}.send_interval"), gen.send_interval)?;
            non_negative(&format!("generators.{name}.start_time"), gen.start_time)?;
            non_negative(&format!("generators.{name}.max_mips"), gen.max_mips)?;
            positive(&format!("generators.{name}.deadline"), gen.deadline)?;
            if let Some(stop) = gen.stop_time {
                if stop < gen.start_time {
                    return Err(SimError::InvalidConfig(format!(
                        "generators.{name}.stop_time ({stop}) is before start_time ({})",
                        gen.start_time
                    )));
                }
            }
        }

        // A literal address is accepted as-is; a name must be a module.
        for (name, gen) in &self.generators {
            let dest = gen.destination.as_str();
            if dest.parse::<crate::net::Address>().is_err() && !names.contains(dest) {
                return Err(SimError::UnknownModule(format!(
                    "{dest} (destination of generator '{name}')"
                )));
            }
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    // ── Test helpers ──────────────────────────────────────────────────────────

    /// Write `content` to a temporary file and return the handle.
    /// The file is deleted when the handle is dropped.
    fn yaml_tempfile(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().expect("failed to create temp file");
        f.write_all(content.as_bytes())
            .expect("failed to write temp file");
        f
    }

    const FULL_YAML: &str = r#"
duration: 50
seed: 42
port: 2000
link_delay: 0.01
scheduler:
  name: dc
  discipline: lifo
  schedule_delay: 0.2
  lifo_delay: 0.02
  node_selection: first_idle
  reset_table_when_exhausted: true
compute_nodes:
  server0:
    nominal_mips: 5000
    nominal_power: 200
    dvfs: false
    dns: false
    queueing: PRIORITY
  server1: {}
generators:
  user0:
    destination: dc
    send_interval: 0.5
    start_time: 1.0
    stop_time: 20.0
    max_mips: 300
"#;

    // ── load_from_file ────────────────────────────────────────────────────────

    #[test]
    fn load_full_scenario() {
        let f = yaml_tempfile(FULL_YAML);
        let cfg = SimConfig::load_from_file(f.path()).unwrap();

        assert_eq!(cfg.duration, 50.0);
        assert_eq!(cfg.seed, 42);
        assert_eq!(cfg.port, 2000);
        assert_eq!(cfg.scheduler.name, "dc");
        assert_eq!(cfg.scheduler.discipline, Discipline::Lifo);
        assert_eq!(cfg.scheduler.node_selection, NodeSelection::FirstIdle);
        assert!(cfg.scheduler.reset_table_when_exhausted);

        let s0 = &cfg.compute_nodes["server0"];
        assert_eq!(s0.nominal_mips, 5000.0);
        assert!(!s0.dvfs);
        assert_eq!(s0.queueing, NodeQueueing::Priority);

        let gen = &cfg.generators["user0"];
        assert_eq!(gen.stop_time, Some(20.0));
        assert_eq!(gen.max_mips, 300.0);
        cfg.validate().unwrap();
    }

    #[test]
    fn missing_fields_take_defaults() {
        let f = yaml_tempfile(FULL_YAML);
        let cfg = SimConfig::load_from_file(f.path()).unwrap();
        assert_eq!(cfg.compute_nodes["server1"], ComputeNodeConfig::default());

        let gen = &cfg.generators["user0"];
        assert_eq!(gen.size, 0.1);
        assert_eq!(gen.deadline, 1.0);
    }

    #[test]
    fn empty_document_is_the_default_config() {
        let f = yaml_tempfile("{}\n");
        let cfg = SimConfig::load_from_file(f.path()).unwrap();
        assert_eq!(cfg, SimConfig::default());
        assert_eq!(cfg.scheduler.discipline, Discipline::Sjf);
    }

    #[test]
    fn load_nonexistent_file_returns_error() {
        let err = SimConfig::load_from_file(Path::new("/nonexistent/scenario.yaml")).unwrap_err();
        assert!(format!("{err:#}").contains("Cannot open scenario file"));
    }

    #[test]
    fn load_invalid_yaml_returns_error() {
        let f = yaml_tempfile("scheduler: [unclosed\n");
        assert!(SimConfig::load_from_file(f.path()).is_err());
    }

    #[test]
    fn unknown_discipline_is_rejected() {
        let f = yaml_tempfile("scheduler:\n  discipline: edf\n");
        assert!(SimConfig::load_from_file(f.path()).is_err());
    }

    #[test]
    fn unknown_key_is_rejected() {
        let f = yaml_tempfile("durration: 10\n");
        assert!(SimConfig::load_from_file(f.path()).is_err());
    }

    // ── default_scenario ──────────────────────────────────────────────────────

    #[test]
    fn default_scenario_shape() {
        let cfg = SimConfig::default_scenario();
        assert_eq!(
            cfg.compute_nodes.keys().collect::<Vec<_>>(),
            vec!["server0", "server1", "server2"]
        );
        assert_eq!(cfg.generators.len(), 1);
        assert_eq!(cfg.generators["user0"].destination, "scheduler");
        cfg.validate().unwrap();
    }

    // ── validate ──────────────────────────────────────────────────────────────

    #[test]
    fn validate_requires_compute_nodes() {
        let cfg = SimConfig::default();
        assert!(matches!(cfg.validate(), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn validate_rejects_non_positive_interval() {
        let mut cfg = SimConfig::default_scenario();
        cfg.generators.get_mut("user0").unwrap().send_interval = 0.0;
        assert!(matches!(cfg.validate(), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn validate_rejects_zero_node_rate() {
        let mut cfg = SimConfig::default_scenario();
        cfg.compute_nodes.get_mut("server1").unwrap().nominal_mips = 0.0;
        assert!(matches!(cfg.validate(), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn validate_rejects_unknown_destination() {
        let mut cfg = SimConfig::default_scenario();
        cfg.generators.get_mut("user0").unwrap().destination = String::from("nowhere");
        assert!(matches!(cfg.validate(), Err(SimError::UnknownModule(_))));
    }

    #[test]
    fn validate_accepts_literal_destination() {
        let mut cfg = SimConfig::default_scenario();
        cfg.generators.get_mut("user0").unwrap().destination = String::from("10.0.0.1");
        cfg.validate().unwrap();
    }

    #[test]
    fn validate_rejects_duplicate_names() {
        let mut cfg = SimConfig::default_scenario();
        cfg.generators
            .insert(String::from("server0"), GeneratorConfig::default());
        assert!(matches!(cfg.validate(), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn validate_rejects_stop_before_start() {
        let mut cfg = SimConfig::default_scenario();
        let gen = cfg.generators.get_mut("user0").unwrap();
        gen.start_time = 5.0;
        gen.stop_time = Some(1.0);
        assert!(matches!(cfg.validate(), Err(SimError::InvalidConfig(_))));
    }
}
