use std::{path::PathBuf, process};

use structopt::StructOpt;
use tokio::signal;
use tracing::{error, warn};

use fl_collaborator::{
    run,
    settings::{init_logging, Settings},
};

#[derive(Debug, StructOpt)]
#[structopt(name = "fl-collaborator")]
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

    let result = tokio::select! {
        biased;

        _ = signal::ctrl_c() => {
            warn!("shutting down: received interrupt signal");
            Ok(())
        }
        result = run::run(
            &settings.plan,
            &settings.collaborator_id,
            settings.model_in.clone(),
            settings.model_out.clone(),
        ) => result,
    };

    if let Err(err) = result {
        error!(%err, "collaborator exited with an error");
        process::exit(1);
    }
}
