//! The two aggregation drivers: the sync barrier loop (§4.3.1) and the
//! async aggregation tick (§4.3.2). Both acquire [`Shared::locked`] for
//! the merge and write-through only, then persist from a local copy
//! after releasing it, per the concurrency discipline in §4.3.3.

use std::{sync::Arc, time::Duration};

use fl_core::{model, plan::AsyncConfig, Algorithm};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{error::ServerError, state::Shared, store::ModelStore};

/// Runs the sync barrier until `rounds` aggregations have completed,
/// or until `cancel` fires.
///
/// Each iteration waits for [`Shared::round_ready`], then re-checks the
/// buffer length under the lock before aggregating: `notify_one` can
/// race with a second notifier, or could in principle be consumed by a
/// spurious wakeup, so the check is the actual gate, not the wakeup.
pub async fn run_sync(
    shared: Arc<Shared>,
    store: Arc<dyn ModelStore>,
    rounds: u32,
    cancel: CancellationToken,
) -> Result<(), ServerError> {
    let mut rounds_done = 0u32;
    while rounds_done < rounds {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(rounds_done, rounds, "sync aggregator cancelled mid-round");
                return Ok(());
            }
            _ = shared.round_ready.notified() => {}
        }

        loop {
            let aggregated = {
                let mut locked = shared.locked.lock().await;
                if locked.buffer.len() < shared.participant_count {
                    None
                } else {
                    let updates = std::mem::take(&mut locked.buffer);
                    let new_global = locked.algorithm.aggregate(&updates, &locked.global)?;
                    locked.global = new_global.clone();
                    locked.round += 1;
                    Some((locked.round, new_global))
                }
            };

            let (round, new_global) = match aggregated {
                Some(pair) => pair,
                None => break,
            };
            rounds_done += 1;
            let completed_round = round - 1;
            let bytes = model::encode(&new_global);

            if rounds_done == rounds {
                store.save_final(&bytes).await.map_err(|err| {
                    error!(%err, completed_round, "failed to persist final model");
                    err
                })?;
            } else if let Err(err) = store.save_round(completed_round, &bytes).await {
                warn!(%err, completed_round, "failed to persist intermediate snapshot");
            }
            info!(completed_round, rounds_done, rounds, "aggregated sync round");
            break;
        }
    }
    info!("sync barrier complete, aggregator terminating");
    Ok(())
}

/// Runs the async aggregation tick every `cfg.aggregation_delay_s`
/// seconds, until `cancel` fires.
pub async fn run_async(
    shared: Arc<Shared>,
    store: Arc<dyn ModelStore>,
    cfg: AsyncConfig,
    cancel: CancellationToken,
) -> Result<(), ServerError> {
    let mut ticker = time::interval(Duration::from_secs(cfg.aggregation_delay_s.max(1)));
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("async aggregator cancelled");
                return Ok(());
            }
            _ = ticker.tick() => {
                if let Err(err) = aggregate_async_tick(&shared, store.as_ref(), &cfg).await {
                    error!(%err, "async aggregation tick failed");
                }
            }
        }
    }
}

/// One firing of the async tick: drop stale updates, decay-weight the
/// rest, merge, and persist. A no-op (per §7, swallowed and logged)
/// when the buffer hasn't reached `min_updates` or every pending
/// update turned out stale.
async fn aggregate_async_tick(
    shared: &Shared,
    store: &dyn ModelStore,
    cfg: &AsyncConfig,
) -> Result<(), ServerError> {
    let now = std::time::SystemTime::now();
    let outcome = {
        let mut locked = shared.locked.lock().await;
        if locked.buffer.len() < cfg.min_updates {
            None
        } else {
            let pending = std::mem::take(&mut locked.buffer);
            let mut valid = Vec::with_capacity(pending.len());
            let mut dropped = 0usize;
            for mut update in pending {
                let staleness = now
                    .duration_since(update.timestamp)
                    .unwrap_or_default()
                    .as_secs();
                update.staleness = Some(staleness);
                if staleness <= cfg.max_staleness_s {
                    valid.push(update);
                } else {
                    dropped += 1;
                }
            }
            if dropped > 0 {
                warn!(dropped, max_staleness_s = cfg.max_staleness_s, "dropped stale updates");
            }

            if valid.is_empty() {
                None
            } else {
                apply_staleness_decay(&mut valid, cfg.staleness_weight);
                let new_global = locked.algorithm.aggregate(&valid, &locked.global)?;
                locked.global = new_global.clone();
                locked.round += 1;
                Some((locked.round, new_global))
            }
        }
    };

    if let Some((round, new_global)) = outcome {
        let bytes = model::encode(&new_global);
        match store.save_async_round(round, &bytes).await {
            Ok(()) => info!(round, "aggregated async round"),
            Err(err) => warn!(%err, round, "failed to persist async round snapshot"),
        }
    }
    Ok(())
}

/// Composes staleness decay with the configured algorithm's own
/// num_samples-based weighting: each update's effective sample count
/// is scaled by `staleness_weight ^ staleness` before the batch is
/// handed to the algorithm, so a stale update's contribution shrinks
/// in the same proportion the classic decay-merge in §4.3.2 item 6
/// would give it, whichever `Aggregation` variant is configured.
fn apply_staleness_decay(updates: &mut [fl_core::ClientUpdate], staleness_weight: f32) {
    const PRECISION: f32 = 1000.0;
    for update in updates.iter_mut() {
        let staleness = update.staleness.unwrap_or(0);
        let decay = staleness_weight.powi(staleness as i32);
        let base = update.num_samples.unwrap_or(1).max(1) as f32;
        let scaled = (base * decay * PRECISION).round().clamp(1.0, u32::MAX as f32);
        update.num_samples = Some(scaled as u32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::InMemoryStore;
    use fl_core::{model, plan::Mode, Aggregation};
    use std::{collections::HashMap, time::Duration as StdDuration};

    fn fedavg_shared(model_size: usize, participants: usize, mode: Mode) -> Arc<Shared> {
        let algorithm = Aggregation::create(fl_core::plan::AlgorithmName::Fedavg, model_size, &HashMap::new()).unwrap();
        Arc::new(Shared::new(vec![0.0; model_size], algorithm, model_size, participants, mode))
    }

    #[tokio::test]
    async fn scenario_s1_two_rounds_two_participants() {
        let shared = fedavg_shared(4, 2, Mode::Sync);
        let store = Arc::new(InMemoryStore::new(vec![0u8; 16]));
        let driver_store: Arc<dyn ModelStore> = store.clone();
        let cancel = CancellationToken::new();

        let driver = tokio::spawn(run_sync(shared.clone(), driver_store, 2, cancel.clone()));

        shared.submit("A".into(), vec![1.0, 1.0, 1.0, 1.0], Some(1), None).await;
        shared.submit("B".into(), vec![3.0, 3.0, 3.0, 3.0], Some(1), None).await;

        // give the driver a beat to aggregate round 1 before round 2 submits
        tokio::time::sleep(StdDuration::from_millis(20)).await;

        shared.submit("A".into(), vec![2.0, 2.0, 2.0, 2.0], Some(1), None).await;
        shared.submit("B".into(), vec![4.0, 4.0, 4.0, 4.0], Some(1), None).await;

        driver.await.unwrap().unwrap();

        let round_1 = store.get("round_1_model").unwrap();
        assert_eq!(model::decode(&round_1).unwrap(), vec![2.0, 2.0, 2.0, 2.0]);

        let output = store.get("output").unwrap();
        assert_eq!(model::decode(&output).unwrap(), vec![3.0, 3.0, 3.0, 3.0]);

        let (global, round) = shared.snapshot().await;
        assert_eq!(global, vec![3.0, 3.0, 3.0, 3.0]);
        assert_eq!(round, 3);
    }

    #[tokio::test]
    async fn scenario_s6_sync_stall_writes_nothing() {
        let shared = fedavg_shared(4, 2, Mode::Sync);
        let store = Arc::new(InMemoryStore::new(vec![0u8; 16]));
        let driver_store: Arc<dyn ModelStore> = store.clone();
        let cancel = CancellationToken::new();

        let driver = tokio::spawn(run_sync(shared.clone(), driver_store, 2, cancel.clone()));
        shared.submit("A".into(), vec![1.0, 1.0, 1.0, 1.0], Some(1), None).await;

        tokio::time::sleep(StdDuration::from_millis(20)).await;
        cancel.cancel();
        driver.await.unwrap().unwrap();

        assert!(store.get("round_1_model").is_none());
        let (global, round) = shared.snapshot().await;
        assert_eq!(global, vec![0.0, 0.0, 0.0, 0.0]);
        assert_eq!(round, 1);
    }

    #[tokio::test]
    async fn async_tick_drops_stale_updates_before_merging() {
        let shared = fedavg_shared(4, 1, Mode::Async);
        {
            let mut locked = shared.locked.lock().await;
            let mut stale = fl_core::ClientUpdate::new("old", vec![9.0; 4], 0);
            stale.timestamp -= StdDuration::from_secs(20);
            let fresh = fl_core::ClientUpdate::new("new", vec![1.0; 4], 0);
            locked.buffer.push(stale);
            locked.buffer.push(fresh);
        }

        let cfg = AsyncConfig {
            max_staleness_s: 10,
            min_updates: 1,
            aggregation_delay_s: 1,
            staleness_weight: 0.95,
        };
        let store = InMemoryStore::new(vec![0u8; 16]);
        aggregate_async_tick(&shared, &store, &cfg).await.unwrap();

        let (global, round) = shared.snapshot().await;
        assert_eq!(round, 1);
        for &x in &global {
            assert!((x - 1.0).abs() < 1e-3, "expected ~1.0, got {x}");
        }
    }
}
