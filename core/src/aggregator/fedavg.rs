use std::collections::HashMap;

use crate::{
    aggregator::{weighted_mean, Algorithm},
    error::CoreError,
    update::{sample_weights, ClientUpdate},
};

/// Stateless weighted average of the batch.
///
/// [McMahan et al., Communication-Efficient Learning of Deep Networks
/// from Decentralized Data](https://arxiv.org/abs/1602.05629). The
/// current global model is ignored: the output is a pure weighted
/// mean of the batch.
#[derive(Debug, Default)]
pub struct FedAvg {
    model_size: usize,
}

impl Algorithm for FedAvg {
    fn initialize(&mut self, model_size: usize, _hyperparameters: &HashMap<String, f32>) {
        self.model_size = model_size;
    }

    fn aggregate(
        &mut self,
        updates: &[ClientUpdate],
        _global: &[f32],
    ) -> Result<Vec<f32>, CoreError> {
        if updates.is_empty() {
            return Err(CoreError::NoUpdates);
        }
        let weights = sample_weights(updates);
        Ok(weighted_mean(updates, &weights, self.model_size))
    }

    fn name(&self) -> &'static str {
        "fedavg"
    }

    fn get_hyperparameters(&self) -> HashMap<String, f32> {
        HashMap::new()
    }

    fn update_hyperparameters(&mut self, _partial: &HashMap<String, f32>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upd(id: &str, weights: Vec<f32>, samples: u32) -> ClientUpdate {
        ClientUpdate::new(id, weights, 1).with_num_samples(samples)
    }

    #[test]
    fn aggregate_fails_on_empty_batch() {
        let mut algo = FedAvg::default();
        algo.initialize(4, &HashMap::new());
        assert_eq!(algo.aggregate(&[], &[0.0; 4]), Err(CoreError::NoUpdates));
    }

    #[test]
    fn single_update_returns_its_own_weights() {
        let mut algo = FedAvg::default();
        algo.initialize(4, &HashMap::new());
        let u = upd("a", vec![1.0, 1.0, 1.0, 1.0], 1);
        let out = algo.aggregate(&[u.clone()], &[9.0; 4]).unwrap();
        assert_eq!(out, u.weights);
    }

    #[test]
    fn two_equal_updates_average() {
        let mut algo = FedAvg::default();
        algo.initialize(4, &HashMap::new());
        let a = upd("a", vec![1.0, 1.0, 1.0, 1.0], 1);
        let b = upd("b", vec![3.0, 3.0, 3.0, 3.0], 1);
        let out = algo.aggregate(&[a, b], &[0.0; 4]).unwrap();
        assert_eq!(out, vec![2.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn scenario_s1_two_rounds() {
        let mut algo = FedAvg::default();
        algo.initialize(4, &HashMap::new());

        let round1 = vec![
            upd("A", vec![1.0, 1.0, 1.0, 1.0], 1),
            upd("B", vec![3.0, 3.0, 3.0, 3.0], 1),
        ];
        let global1 = algo.aggregate(&round1, &[0.0; 4]).unwrap();
        assert_eq!(global1, vec![2.0, 2.0, 2.0, 2.0]);

        let round2 = vec![
            upd("A", vec![2.0, 2.0, 2.0, 2.0], 1),
            upd("B", vec![4.0, 4.0, 4.0, 4.0], 1),
        ];
        let global2 = algo.aggregate(&round2, &global1).unwrap();
        assert_eq!(global2, vec![3.0, 3.0, 3.0, 3.0]);
    }
}
