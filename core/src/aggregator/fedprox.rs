use std::collections::HashMap;

use crate::{aggregator::Algorithm, error::CoreError, update::ClientUpdate};

/// Proximal blending toward the current global model.
///
/// A single hyperparameter `mu` controls both how much extra weight
/// conservative (small learning-rate) clients get in the batch average,
/// and how strongly the result is pulled back toward the current
/// global. `mu = 0` reduces to plain weighted averaging; as `mu`
/// grows the output approaches the unchanged current global.
#[derive(Debug)]
pub struct FedProx {
    model_size: usize,
    mu: f32,
}

impl Default for FedProx {
    fn default() -> Self {
        Self {
            model_size: 0,
            mu: 0.01,
        }
    }
}

impl Algorithm for FedProx {
    fn initialize(&mut self, model_size: usize, hyperparameters: &HashMap<String, f32>) {
        self.model_size = model_size;
        self.update_hyperparameters(hyperparameters);
    }

    fn aggregate(
        &mut self,
        updates: &[ClientUpdate],
        global: &[f32],
    ) -> Result<Vec<f32>, CoreError> {
        if updates.is_empty() {
            return Err(CoreError::NoUpdates);
        }

        let mut weights: Vec<f32> = updates
            .iter()
            .map(|u| {
                let samples = u.samples() as f32;
                match u.learning_rate {
                    Some(lr) if lr > 0.0 => samples * (1.0 + self.mu / lr),
                    _ => samples,
                }
            })
            .collect();

        let total: f32 = weights.iter().sum();
        if total == 0.0 {
            let equal = 1.0 / updates.len() as f32;
            weights = vec![equal; updates.len()];
        }
        let total: f32 = weights.iter().sum();

        let mut agg = vec![0.0_f32; self.model_size];
        for (update, &w) in updates.iter().zip(&weights) {
            for (a, &x) in agg.iter_mut().zip(&update.weights) {
                *a += w * x;
            }
        }
        for a in agg.iter_mut() {
            *a /= total;
        }

        let alpha = self.mu / (1.0 + self.mu);
        let new_global: Vec<f32> = agg
            .iter()
            .zip(global)
            .map(|(&a, &g)| (1.0 - alpha) * a + alpha * g)
            .collect();
        Ok(new_global)
    }

    fn name(&self) -> &'static str {
        "fedprox"
    }

    fn get_hyperparameters(&self) -> HashMap<String, f32> {
        HashMap::from([("mu".to_string(), self.mu)])
    }

    fn update_hyperparameters(&mut self, partial: &HashMap<String, f32>) {
        if let Some(&v) = partial.get("mu") {
            self.mu = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_s3_single_update_with_learning_rate() {
        let mut algo = FedProx::default();
        algo.initialize(4, &HashMap::new());

        let mut update = ClientUpdate::new("a", vec![1.0, 1.0, 1.0, 1.0], 1).with_num_samples(100);
        update.learning_rate = Some(0.01);

        let global = vec![0.0; 4];
        let out = algo.aggregate(&[update], &global).unwrap();
        for &x in &out {
            assert!((x - 0.9901).abs() < 1e-3, "expected ~0.9901, got {x}");
        }
    }

    #[test]
    fn mu_zero_is_plain_weighted_average() {
        let mut algo = FedProx::default();
        let mut hp = HashMap::new();
        hp.insert("mu".to_string(), 0.0);
        algo.initialize(4, &hp);

        let a = ClientUpdate::new("a", vec![1.0, 1.0, 1.0, 1.0], 1).with_num_samples(1);
        let b = ClientUpdate::new("b", vec![3.0, 3.0, 3.0, 3.0], 1).with_num_samples(1);
        let global = vec![100.0; 4];
        let out = algo.aggregate(&[a, b], &global).unwrap();
        assert_eq!(out, vec![2.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn large_mu_approaches_current_global() {
        let mut algo = FedProx::default();
        let mut hp = HashMap::new();
        hp.insert("mu".to_string(), 1e6);
        algo.initialize(4, &hp);

        let update = ClientUpdate::new("a", vec![1.0, 1.0, 1.0, 1.0], 1).with_num_samples(1);
        let global = vec![42.0; 4];
        let out = algo.aggregate(&[update], &global).unwrap();
        for &x in &out {
            assert!((x - 42.0).abs() < 1e-2, "expected ~42.0, got {x}");
        }
    }

    #[test]
    fn falls_back_to_equal_weights_when_total_is_zero() {
        let mut algo = FedProx::default();
        algo.initialize(2, &HashMap::new());
        let a = ClientUpdate::new("a", vec![1.0, 1.0], 1);
        let b = ClientUpdate::new("b", vec![3.0, 3.0], 1);
        let out = algo.aggregate(&[a, b], &[0.0, 0.0]).unwrap();
        assert_eq!(out, vec![2.0, 2.0]);
    }
}
