//! The record a collaborator submits, and the server-stamped metadata
//! attached to it at intake.

use std::time::SystemTime;

/// A model update submitted by a single collaborator.
///
/// `timestamp` and `round` are stamped by the aggregator at intake, not
/// supplied by the client; `staleness` is filled in later, at the moment
/// the update is considered for aggregation.
#[derive(Debug, Clone)]
pub struct ClientUpdate {
    pub collaborator_id: String,
    pub weights: Vec<f32>,
    pub timestamp: SystemTime,
    pub round: u32,
    /// Seconds between `timestamp` and the aggregation moment. `None`
    /// until the update is actually being considered for aggregation.
    pub staleness: Option<u64>,
    /// `None` or `Some(0)` means "absent": equal weighting is used.
    pub num_samples: Option<u32>,
    /// Only consulted by the fedprox algorithm.
    pub learning_rate: Option<f32>,
}

impl ClientUpdate {
    pub fn new(collaborator_id: impl Into<String>, weights: Vec<f32>, round: u32) -> Self {
        Self {
            collaborator_id: collaborator_id.into(),
            weights,
            timestamp: SystemTime::now(),
            round,
            staleness: None,
            num_samples: None,
            learning_rate: None,
        }
    }

    pub fn with_num_samples(mut self, num_samples: u32) -> Self {
        self.num_samples = Some(num_samples);
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = Some(learning_rate);
        self
    }

    /// Effective sample count for the shared weighting convention: `0`
    /// when absent, so the caller can fall through to equal weighting.
    pub fn samples(&self) -> u32 {
        self.num_samples.unwrap_or(0)
    }
}

/// Computes the per-update weight shared by all three algorithms:
/// `num_samples_i / S` when the batch total `S > 0`, else equal weight.
pub fn sample_weights(updates: &[ClientUpdate]) -> Vec<f32> {
    let total: u64 = updates.iter().map(|u| u.samples() as u64).sum();
    if total > 0 {
        updates
            .iter()
            .map(|u| u.samples() as f32 / total as f32)
            .collect()
    } else {
        let equal = 1.0 / updates.len() as f32;
        vec![equal; updates.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upd(samples: u32) -> ClientUpdate {
        ClientUpdate::new("c", vec![], 1).with_num_samples(samples)
    }

    #[test]
    fn equal_weighting_when_samples_absent() {
        let updates = vec![
            ClientUpdate::new("a", vec![], 1),
            ClientUpdate::new("b", vec![], 1),
        ];
        assert_eq!(sample_weights(&updates), vec![0.5, 0.5]);
    }

    #[test]
    fn proportional_weighting_when_samples_present() {
        let updates = vec![upd(1), upd(3)];
        let w = sample_weights(&updates);
        assert!((w[0] - 0.25).abs() < 1e-6);
        assert!((w[1] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn zero_total_samples_falls_back_to_equal() {
        let updates = vec![upd(0), upd(0)];
        assert_eq!(sample_weights(&updates), vec![0.5, 0.5]);
    }
}
