use std::{path::PathBuf, process, sync::Arc};

use structopt::StructOpt;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::{error, info, warn};

use fl_aggregator::{
    engine,
    service::AggregationService,
    settings::{init_logging, Settings},
    state::Shared,
    store::{FsStore, ModelStore},
    ServerError,
};
use fl_core::{model, plan::Mode, Aggregation};

#[derive(Debug, StructOpt)]
#[structopt(name = "fl-aggregator")]
struct Opt {
    /// Path to the plan file.
    #[structopt(short, long, parse(from_os_str))]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let opt = Opt::from_args();
    let settings = Settings::from_path(&opt.config).unwrap_or_else(|err| {
        eprintln!("{err}");
        process::exit(1);
    });
    init_logging(&settings.log);

    if let Err(err) = run(settings).await {
        error!(%err, "aggregator exited with an error");
        process::exit(1);
    }
}

async fn run(settings: Settings) -> Result<(), ServerError> {
    let plan = settings.plan;
    let store = Arc::new(FsStore::new(
        plan.initial_model_path.clone(),
        plan.output_model_path.clone(),
        settings.save_dir.clone(),
    ));

    let initial_bytes = store.load_initial().await?;
    let global = model::decode(&initial_bytes)?;
    let model_size = global.len();
    info!(model_size, mode = ?plan.mode, "loaded initial model");

    let algorithm = Aggregation::create(
        plan.algorithm.name,
        model_size,
        &plan.algorithm.hyperparameters,
    )?;
    let shared = Arc::new(Shared::new(
        global,
        algorithm,
        model_size,
        plan.participant_count(),
        plan.mode,
    ));

    let addr: std::net::SocketAddr = plan
        .aggregator_address
        .parse()
        .map_err(|_| ServerError::InvalidAddress(plan.aggregator_address.clone()))?;

    let cancel = CancellationToken::new();
    let driver = match plan.mode {
        Mode::Sync => tokio::spawn(engine::run_sync(
            shared.clone(),
            store.clone(),
            plan.rounds,
            cancel.clone(),
        )),
        Mode::Async => tokio::spawn(engine::run_async(
            shared.clone(),
            store.clone(),
            plan.async_config.clone(),
            cancel.clone(),
        )),
    };

    let service = AggregationService::new(shared);
    let rpc_server = Server::builder()
        .add_service(service.into_server())
        .serve(addr);

    tokio::select! {
        biased;

        _ = signal::ctrl_c() => {
            warn!("shutting down: received interrupt signal");
            cancel.cancel();
        }
        result = driver => {
            cancel.cancel();
            match result {
                Ok(Ok(())) => info!("shutting down: aggregation driver completed"),
                Ok(Err(err)) => {
                    error!(%err, "shutting down: aggregation driver failed");
                    return Err(err);
                }
                Err(join_err) => error!(%join_err, "shutting down: aggregation driver panicked"),
            }
        }
        result = rpc_server => {
            cancel.cancel();
            if let Err(err) = result {
                error!(%err, "shutting down: gRPC server failed");
                return Err(err.into());
            }
        }
    }

    Ok(())
}
