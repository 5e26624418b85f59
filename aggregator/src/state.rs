//! The single mutual-exclusion region covering the global model, the
//! update buffer, the round counter, and the algorithm's internal
//! state — per §4.3.3, held only across vector-valued work, never
//! across file or network I/O.

use fl_core::{plan::Mode, Aggregation, ClientUpdate};
use tokio::sync::{Mutex, Notify};

/// The state the mutex actually guards.
#[derive(Debug)]
pub struct Locked {
    pub global: Vec<f32>,
    pub round: u32,
    pub buffer: Vec<ClientUpdate>,
    pub algorithm: Aggregation,
}

/// Shared handle both the RPC service and the aggregation driver hold.
///
/// `round_ready` is the condition-variable-style signal the design
/// notes recommend in place of the original's two-second poll: a sync
/// `submit` that raises the round's buffer to `participant_count`
/// notifies the barrier waiter directly.
pub struct Shared {
    pub locked: Mutex<Locked>,
    pub round_ready: Notify,
    pub model_size: usize,
    pub participant_count: usize,
    pub mode: Mode,
}

impl Shared {
    pub fn new(
        global: Vec<f32>,
        algorithm: Aggregation,
        model_size: usize,
        participant_count: usize,
        mode: Mode,
    ) -> Self {
        let round = match mode {
            Mode::Sync => 1,
            Mode::Async => 0,
        };
        Self {
            locked: Mutex::new(Locked {
                global,
                round,
                buffer: Vec::new(),
                algorithm,
            }),
            round_ready: Notify::new(),
            model_size,
            participant_count,
            mode,
        }
    }

    /// Appends a decoded update to the buffer, stamping it with the
    /// round counter at the moment of acquisition, and signals the
    /// sync barrier when this submission raises the round's buffer to
    /// `participant_count`. Returns the round it was stamped with.
    pub async fn submit(
        &self,
        collaborator_id: String,
        weights: Vec<f32>,
        num_samples: Option<u32>,
        learning_rate: Option<f32>,
    ) -> u32 {
        let mut locked = self.locked.lock().await;
        let round = locked.round;
        let mut update = ClientUpdate::new(collaborator_id, weights, round);
        update.num_samples = num_samples;
        update.learning_rate = learning_rate;
        locked.buffer.push(update);
        let ready = self.mode == Mode::Sync && locked.buffer.len() >= self.participant_count;
        drop(locked);
        if ready {
            self.round_ready.notify_one();
        }
        round
    }

    /// A copy of the current global model and round counter, safe to
    /// hand to a caller: never an alias of the internal vector.
    pub async fn snapshot(&self) -> (Vec<f32>, u32) {
        let locked = self.locked.lock().await;
        (locked.global.clone(), locked.round)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn shared(mode: Mode, participants: usize) -> Shared {
        let algorithm = Aggregation::create(
            fl_core::plan::AlgorithmName::Fedavg,
            4,
            &HashMap::new(),
        )
        .unwrap();
        Shared::new(vec![0.0; 4], algorithm, 4, participants, mode)
    }

    #[tokio::test]
    async fn submit_stamps_the_round_at_intake() {
        let shared = shared(Mode::Sync, 2);
        let round = shared.submit("a".into(), vec![0.0; 4], None, None).await;
        assert_eq!(round, 1);
    }

    #[tokio::test]
    async fn sync_barrier_notifies_only_once_buffer_reaches_participant_count() {
        let shared = shared(Mode::Sync, 2);
        shared.submit("a".into(), vec![0.0; 4], None, None).await;

        // Not ready yet: a notified() call here would hang, so instead
        // assert on the buffer length directly under the lock.
        assert_eq!(shared.locked.lock().await.buffer.len(), 1);

        shared.submit("b".into(), vec![0.0; 4], None, None).await;
        // Does not hang: the second submit notified the barrier.
        shared.round_ready.notified().await;
        assert_eq!(shared.locked.lock().await.buffer.len(), 2);
    }

    #[tokio::test]
    async fn snapshot_never_aliases_the_internal_vector() {
        let shared = shared(Mode::Async, 1);
        let (mut copy, _round) = shared.snapshot().await;
        copy[0] = 42.0;
        let (original, _) = shared.snapshot().await;
        assert_eq!(original[0], 0.0);
    }
}
