//! Top-level collaborator loop: `connect` once, then either the sync
//! per-round loop or the unbounded async loop (§4.4).

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use fl_core::{plan::Mode, Plan};
use tokio::fs;
use tracing::info;

use crate::{client::Client, error::ClientError, trainer};

/// Mirrors the original's inter-round cadence: a pause between sync
/// rounds so a stalled aggregator doesn't get hammered with retries.
const SYNC_INTER_ROUND_PAUSE: Duration = Duration::from_secs(2);

/// Connects to the aggregator and runs the plan's configured mode
/// until completion (sync) or cancellation (async, handled by the
/// caller racing this future against a shutdown signal).
///
/// The trainer subprocess's own output isn't interpreted for sample
/// counts or learning rate here: the spec leaves the trainer's
/// internals out of scope, so updates are submitted with equal
/// weighting (`num_samples` and `learning_rate` both absent).
pub async fn run(
    plan: &Plan,
    collaborator_id: &str,
    model_in: PathBuf,
    model_out: PathBuf,
) -> Result<(), ClientError> {
    let mut client = Client::connect(collaborator_id, &plan.aggregator_address).await?;

    let initial = client.join().await?;
    let model_size = initial.len() / 4;
    write_model(&model_in, &initial).await?;
    info!(collaborator_id, model_size, "joined federation");

    match plan.mode {
        Mode::Sync => run_sync(plan, &mut client, &model_in, &model_out, model_size).await,
        Mode::Async => run_async(plan, &mut client, &model_in, &model_out, model_size).await,
    }
}

async fn run_sync(
    plan: &Plan,
    client: &mut Client,
    model_in: &Path,
    model_out: &Path,
    model_size: usize,
) -> Result<(), ClientError> {
    for round in 1..=plan.rounds {
        let output = trainer::run(
            &plan.task.script,
            &plan.task.args,
            model_in,
            model_out,
            model_size,
        )
        .await?;
        client.submit_update(output, 0, 0.0).await?;
        info!(round, rounds = plan.rounds, "submitted update for round");
        if round < plan.rounds {
            tokio::time::sleep(SYNC_INTER_ROUND_PAUSE).await;
        }
    }
    Ok(())
}

async fn run_async(
    plan: &Plan,
    client: &mut Client,
    model_in: &Path,
    model_out: &Path,
    model_size: usize,
) -> Result<(), ClientError> {
    let mut last_round = 0i32;
    loop {
        let output = trainer::run(
            &plan.task.script,
            &plan.task.args,
            model_in,
            model_out,
            model_size,
        )
        .await?;
        client.submit_update(output, 0, 0.0).await?;
        info!("submitted update");

        let (bytes, current_round) = client.get_latest_model().await?;
        if current_round > last_round {
            write_model(model_in, &bytes).await?;
            last_round = current_round;
            info!(current_round, "refreshed local model");
        }
    }
}

async fn write_model(path: &Path, bytes: &[u8]) -> Result<(), ClientError> {
    fs::write(path, bytes)
        .await
        .map_err(|source| ClientError::Io {
            path: path.display().to_string(),
            source,
        })
}
