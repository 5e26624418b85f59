use std::collections::HashMap;

use crate::{
    aggregator::{weighted_mean, Algorithm},
    error::CoreError,
    update::{sample_weights, ClientUpdate},
};

/// Adam-like adaptive server optimizer.
///
/// [Reddi et al., Adaptive Federated Optimization](https://arxiv.org/abs/2003.00295).
/// The batch weighted mean is treated as a pseudo-gradient against the
/// current global, and the server applies its own Adam update on top.
/// `momentum`/`velocity` persist across calls for the lifetime of the
/// process; `round_t` counts how many times `aggregate` has run.
#[derive(Debug)]
pub struct FedOpt {
    model_size: usize,
    server_lr: f32,
    beta_1: f32,
    beta_2: f32,
    epsilon: f32,
    momentum: Vec<f32>,
    velocity: Vec<f32>,
    round_t: u32,
}

impl Default for FedOpt {
    fn default() -> Self {
        Self {
            model_size: 0,
            server_lr: 1.0,
            beta_1: 0.9,
            beta_2: 0.999,
            epsilon: 1e-7,
            momentum: Vec::new(),
            velocity: Vec::new(),
            round_t: 0,
        }
    }
}

impl Algorithm for FedOpt {
    fn initialize(&mut self, model_size: usize, hyperparameters: &HashMap<String, f32>) {
        self.model_size = model_size;
        self.momentum = vec![0.0; model_size];
        self.velocity = vec![0.0; model_size];
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
        let weights = sample_weights(updates);
        let mean = weighted_mean(updates, &weights, self.model_size);

        self.round_t += 1;
        let bias_correction_1 = 1.0 - self.beta_1.powi(self.round_t as i32);
        let bias_correction_2 = 1.0 - self.beta_2.powi(self.round_t as i32);

        let mut new_global = vec![0.0_f32; self.model_size];
        for j in 0..self.model_size {
            let g = mean[j] - global[j];
            self.momentum[j] = self.beta_1 * self.momentum[j] + (1.0 - self.beta_1) * g;
            self.velocity[j] = self.beta_2 * self.velocity[j] + (1.0 - self.beta_2) * g * g;

            let m_hat = self.momentum[j] / bias_correction_1;
            let v_hat = self.velocity[j] / bias_correction_2;

            new_global[j] = global[j] + self.server_lr * m_hat / (v_hat.sqrt() + self.epsilon);
        }
        Ok(new_global)
    }

    fn name(&self) -> &'static str {
        "fedopt"
    }

    fn get_hyperparameters(&self) -> HashMap<String, f32> {
        HashMap::from([
            ("server_lr".to_string(), self.server_lr),
            ("beta1".to_string(), self.beta_1),
            ("beta2".to_string(), self.beta_2),
            ("epsilon".to_string(), self.epsilon),
        ])
    }

    fn update_hyperparameters(&mut self, partial: &HashMap<String, f32>) {
        if let Some(&v) = partial.get("server_lr") {
            self.server_lr = v;
        }
        if let Some(&v) = partial.get("beta1") {
            self.beta_1 = v;
        }
        if let Some(&v) = partial.get("beta2") {
            self.beta_2 = v;
        }
        if let Some(&v) = partial.get("epsilon") {
            self.epsilon = v;
        }
    }
}
