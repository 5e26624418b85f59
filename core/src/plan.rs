//! The plan: configuration read once at startup and treated as
//! immutable for the lifetime of a run. Parsing the plan *file* (YAML,
//! by convention) is ambient config glue owned by each binary's
//! `settings` module; this module only defines the shape both the
//! aggregator and the collaborator deserialize into.

use std::{collections::HashMap, path::PathBuf};

use serde::Deserialize;
use validator::Validate;

/// Orchestration mode. Determines which state machine the aggregator
/// runs and which loop the collaborator runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Sync,
    Async,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Sync
    }
}

/// A participant as named in the plan: an id paired with the address
/// its collaborator process listens on (unused by the aggregator
/// itself today, since the aggregator is the one being dialed, but
/// carried through since the plan is the single source of truth for
/// the static participant list).
#[derive(Debug, Clone, Deserialize)]
pub struct Participant {
    pub id: String,
    pub address: String,
}

/// Recognized aggregation algorithm names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlgorithmName {
    Fedavg,
    Fedopt,
    Fedprox,
}

#[derive(Debug, Clone, Validate, Deserialize)]
pub struct AlgorithmConfig {
    pub name: AlgorithmName,
    #[serde(default)]
    pub hyperparameters: HashMap<String, f32>,
}

/// Parameters governing the async tick. Only meaningful when
/// `mode == Mode::Async`.
#[derive(Debug, Clone, Validate, Deserialize)]
pub struct AsyncConfig {
    #[serde(default = "AsyncConfig::default_max_staleness_s")]
    pub max_staleness_s: u64,
    #[validate(range(min = 1))]
    #[serde(default = "AsyncConfig::default_min_updates")]
    pub min_updates: usize,
    #[validate(range(min = 1))]
    #[serde(default = "AsyncConfig::default_aggregation_delay_s")]
    pub aggregation_delay_s: u64,
    /// Per spec §3: `staleness_weight ∈ (0, 1]`. The lower bound is
    /// enforced as `> 0.0` via a small positive floor since `validator`'s
    /// range check is inclusive.
    #[validate(range(min = 0.000001, max = 1.0))]
    #[serde(default = "AsyncConfig::default_staleness_weight")]
    pub staleness_weight: f32,
}

impl AsyncConfig {
    fn default_max_staleness_s() -> u64 {
        300
    }
    fn default_min_updates() -> usize {
        1
    }
    fn default_aggregation_delay_s() -> u64 {
        10
    }
    fn default_staleness_weight() -> f32 {
        0.95
    }
}

impl Default for AsyncConfig {
    fn default() -> Self {
        Self {
            max_staleness_s: Self::default_max_staleness_s(),
            min_updates: Self::default_min_updates(),
            aggregation_delay_s: Self::default_aggregation_delay_s(),
            staleness_weight: Self::default_staleness_weight(),
        }
    }
}

/// The external trainer invocation, passed through verbatim by the
/// collaborator — the aggregator never interprets these fields.
#[derive(Debug, Clone, Validate, Deserialize)]
pub struct TaskConfig {
    pub script: PathBuf,
    #[serde(default)]
    pub args: HashMap<String, String>,
}

#[derive(Debug, Clone, Validate, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub mode: Mode,
    /// Per spec §3: `rounds ≥ 1`.
    #[validate(range(min = 1))]
    pub rounds: u32,
    #[validate(length(min = 1))]
    pub participants: Vec<Participant>,
    #[validate(length(min = 1))]
    pub aggregator_address: String,
    pub initial_model_path: PathBuf,
    pub output_model_path: PathBuf,
    #[validate]
    pub algorithm: AlgorithmConfig,
    #[validate]
    #[serde(default)]
    pub async_config: AsyncConfig,
    #[validate]
    pub task: TaskConfig,
}

impl Plan {
    /// Number of participants `P`, used by the sync barrier.
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }
}
