//! Invokes the external trainer subprocess per the wire contract in
//! §6: `--model-in <path>`, `--model-out <path>`, and each entry of
//! `task.args` converted from `snake_case` to `--kebab-case`.

use std::{collections::HashMap, path::Path, process::Stdio};

use tokio::{fs, process::Command};
use tracing::{info, warn};

use crate::error::ClientError;

/// Runs the trainer to completion and returns the bytes it wrote to
/// `model_out`. Fails with [`ClientError::TrainerFailed`] on a
/// non-zero exit, a missing output file, or an output file whose size
/// isn't exactly `4 * expected_model_size` bytes (§6/§7: "produced a
/// missing/short output file").
pub async fn run(
    script: &Path,
    args: &HashMap<String, String>,
    model_in: &Path,
    model_out: &Path,
    expected_model_size: usize,
) -> Result<Vec<u8>, ClientError> {
    let mut command = Command::new(script);
    command
        .arg("--model-in")
        .arg(model_in)
        .arg("--model-out")
        .arg(model_out)
        .stdin(Stdio::null());
    for (name, value) in args {
        command.arg(format!("--{}", kebab_case(name))).arg(value);
    }

    info!(script = %script.display(), "spawning trainer subprocess");
    let status = command.status().await.map_err(|source| ClientError::Io {
        path: script.display().to_string(),
        source,
    })?;

    if !status.success() {
        warn!(?status, "trainer subprocess exited non-zero");
        return Err(ClientError::TrainerFailed(format!(
            "{} exited with {status}",
            script.display()
        )));
    }

    let bytes = match fs::read(model_out).await {
        Ok(bytes) => bytes,
        Err(source) => {
            warn!(%source, "trainer subprocess produced no output file");
            return Err(ClientError::TrainerFailed(format!(
                "{} produced a missing output file: {source}",
                script.display()
            )));
        }
    };

    let expected_bytes = expected_model_size * 4;
    if bytes.len() != expected_bytes {
        warn!(
            expected_bytes,
            actual_bytes = bytes.len(),
            "trainer subprocess produced a short or oversized output file"
        );
        return Err(ClientError::TrainerFailed(format!(
            "{} produced an output file of {} bytes, expected {expected_bytes}",
            script.display(),
            bytes.len()
        )));
    }
    Ok(bytes)
}

fn kebab_case(name: &str) -> String {
    name.replace('_', "-")
}
