//! Pluggable aggregation algorithms.
//!
//! The three variants differ in state shape (none / momentum+velocity
//! / a scalar hyperparameter) and numerical behavior but share one
//! capability set. Modeled as a closed sum type rather than an open
//! trait-object hierarchy: the set of algorithms is enumerated by the
//! plan and dispatched once at startup, matching the way the teacher
//! crate's `Aggregation` enum dispatches across `FedAvg`/`FedAdaGrad`/
//! `FedAdam`/`FedYogi`.

mod fedavg;
mod fedopt;
mod fedprox;

use std::collections::HashMap;

use crate::{error::CoreError, plan::AlgorithmName, update::ClientUpdate};

pub use fedavg::FedAvg;
pub use fedopt::FedOpt;
pub use fedprox::FedProx;

/// Shared capability set every aggregation algorithm implements.
pub trait Algorithm {
    /// Sets up per-algorithm state sized to the model's length `N`.
    /// Must be called with the discovered `N` before the first
    /// `aggregate` call.
    fn initialize(&mut self, model_size: usize, hyperparameters: &HashMap<String, f32>);

    /// Merges `updates` with the current `global` model into a new
    /// global model. Fails with [`CoreError::NoUpdates`] on an empty
    /// batch.
    fn aggregate(
        &mut self,
        updates: &[ClientUpdate],
        global: &[f32],
    ) -> Result<Vec<f32>, CoreError>;

    /// Constant algorithm name.
    fn name(&self) -> &'static str;

    /// Current effective hyperparameter values.
    fn get_hyperparameters(&self) -> HashMap<String, f32>;

    /// Merges `partial` into the current hyperparameters; unknown keys
    /// are ignored.
    fn update_hyperparameters(&mut self, partial: &HashMap<String, f32>);
}

/// A closed enum over the supported aggregation algorithms.
#[derive(Debug)]
pub enum Aggregation {
    FedAvg(FedAvg),
    FedOpt(FedOpt),
    FedProx(FedProx),
}

impl Aggregation {
    /// Creates the named algorithm, initialized for a model of length
    /// `model_size` with the given hyperparameters. Fails with
    /// [`CoreError::UnknownAlgorithm`] for a name outside
    /// `{fedavg, fedopt, fedprox}` — in practice this can't happen
    /// since `name` is already a validated [`AlgorithmName`].
    pub fn create(
        name: AlgorithmName,
        model_size: usize,
        hyperparameters: &HashMap<String, f32>,
    ) -> Result<Self, CoreError> {
        let mut agg = match name {
            AlgorithmName::Fedavg => Aggregation::FedAvg(FedAvg::default()),
            AlgorithmName::Fedopt => Aggregation::FedOpt(FedOpt::default()),
            AlgorithmName::Fedprox => Aggregation::FedProx(FedProx::default()),
        };
        agg.initialize(model_size, hyperparameters);
        Ok(agg)
    }

    pub fn from_str_name(
        name: &str,
        model_size: usize,
        hyperparameters: &HashMap<String, f32>,
    ) -> Result<Self, CoreError> {
        let name = match name {
            "fedavg" => AlgorithmName::Fedavg,
            "fedopt" => AlgorithmName::Fedopt,
            "fedprox" => AlgorithmName::Fedprox,
            other => return Err(CoreError::UnknownAlgorithm(other.to_string())),
        };
        Self::create(name, model_size, hyperparameters)
    }
}

impl Algorithm for Aggregation {
    fn initialize(&mut self, model_size: usize, hyperparameters: &HashMap<String, f32>) {
        match self {
            Aggregation::FedAvg(a) => a.initialize(model_size, hyperparameters),
            Aggregation::FedOpt(a) => a.initialize(model_size, hyperparameters),
            Aggregation::FedProx(a) => a.initialize(model_size, hyperparameters),
        }
    }

    fn aggregate(
        &mut self,
        updates: &[ClientUpdate],
        global: &[f32],
    ) -> Result<Vec<f32>, CoreError> {
        match self {
            Aggregation::FedAvg(a) => a.aggregate(updates, global),
            Aggregation::FedOpt(a) => a.aggregate(updates, global),
            Aggregation::FedProx(a) => a.aggregate(updates, global),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Aggregation::FedAvg(a) => a.name(),
            Aggregation::FedOpt(a) => a.name(),
            Aggregation::FedProx(a) => a.name(),
        }
    }

    fn get_hyperparameters(&self) -> HashMap<String, f32> {
        match self {
            Aggregation::FedAvg(a) => a.get_hyperparameters(),
            Aggregation::FedOpt(a) => a.get_hyperparameters(),
            Aggregation::FedProx(a) => a.get_hyperparameters(),
        }
    }

    fn update_hyperparameters(&mut self, partial: &HashMap<String, f32>) {
        match self {
            Aggregation::FedAvg(a) => a.update_hyperparameters(partial),
            Aggregation::FedOpt(a) => a.update_hyperparameters(partial),
            Aggregation::FedProx(a) => a.update_hyperparameters(partial),
        }
    }
}

/// Computes the weighted mean of `updates[i].weights` under `weights`,
/// shared by fedavg and as the first step of fedopt.
pub(crate) fn weighted_mean(updates: &[ClientUpdate], weights: &[f32], n: usize) -> Vec<f32> {
    let mut mean = vec![0.0_f32; n];
    for (update, &w) in updates.iter().zip(weights) {
        for (m, &x) in mean.iter_mut().zip(&update.weights) {
            *m += w * x;
        }
    }
    mean
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_rejects_unknown_name() {
        let err = Aggregation::from_str_name("fedsgd", 4, &HashMap::new()).unwrap_err();
        assert_eq!(err, CoreError::UnknownAlgorithm("fedsgd".to_string()));
    }

    #[test]
    fn create_dispatches_to_the_right_variant() {
        let agg = Aggregation::from_str_name("fedprox", 4, &HashMap::new()).unwrap();
        assert_eq!(agg.name(), "fedprox");
    }
}
