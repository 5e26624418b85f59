//! Persistence of model snapshots to the filesystem layout the wire
//! contract names: `initial_model_path` read once at startup,
//! `save/round_k_model` / `save/async_round_k_model` per aggregation,
//! `output_model_path` at sync completion.
//!
//! Mirrors the teacher's `db::traits::ModelStorage` seam, backed by
//! `tokio::fs` instead of the teacher's S3 client: the spec's layout is
//! plain local files, not object storage. The trait is kept anyway
//! because it is how the teacher isolates persistence from the engine,
//! and it lets tests swap in an in-memory double.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use displaydoc::Display;
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Display, Error)]
pub enum StoreError {
    /// failed to read model file {path}: {source}
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// failed to write model file {path}: {source}
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait]
pub trait ModelStore: Send + Sync {
    /// Reads the model the aggregator starts from. Called exactly
    /// once, at startup.
    async fn load_initial(&self) -> Result<Vec<u8>, StoreError>;

    /// Persists an intermediate sync-round snapshot, `save/round_k_model`.
    async fn save_round(&self, round: u32, bytes: &[u8]) -> Result<(), StoreError>;

    /// Persists an async aggregation snapshot, `save/async_round_k_model`.
    async fn save_async_round(&self, round: u32, bytes: &[u8]) -> Result<(), StoreError>;

    /// Persists the final sync-mode model at `output_model_path`.
    async fn save_final(&self, bytes: &[u8]) -> Result<(), StoreError>;
}

/// Filesystem-backed [`ModelStore`].
#[derive(Debug, Clone)]
pub struct FsStore {
    initial_model_path: PathBuf,
    output_model_path: PathBuf,
    save_dir: PathBuf,
}

impl FsStore {
    pub fn new(
        initial_model_path: impl Into<PathBuf>,
        output_model_path: impl Into<PathBuf>,
        save_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            initial_model_path: initial_model_path.into(),
            output_model_path: output_model_path.into(),
            save_dir: save_dir.into(),
        }
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Write {
                    path: path.display().to_string(),
                    source,
                })?;
        }
        fs::write(path, bytes)
            .await
            .map_err(|source| StoreError::Write {
                path: path.display().to_string(),
                source,
            })
    }
}

#[async_trait]
impl ModelStore for FsStore {
    async fn load_initial(&self) -> Result<Vec<u8>, StoreError> {
        fs::read(&self.initial_model_path)
            .await
            .map_err(|source| StoreError::Read {
                path: self.initial_model_path.display().to_string(),
                source,
            })
    }

    async fn save_round(&self, round: u32, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.save_dir.join(format!("round_{round}_model"));
        self.write(&path, bytes).await
    }

    async fn save_async_round(&self, round: u32, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.save_dir.join(format!("async_round_{round}_model"));
        self.write(&path, bytes).await
    }

    async fn save_final(&self, bytes: &[u8]) -> Result<(), StoreError> {
        self.write(&self.output_model_path, bytes).await
    }
}

/// In-memory [`ModelStore`] double used by the engine's own tests.
#[cfg(test)]
pub mod testing {
    use super::*;
    use std::{collections::HashMap, sync::Mutex};

    #[derive(Debug, Default)]
    pub struct InMemoryStore {
        pub initial: Vec<u8>,
        pub writes: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl InMemoryStore {
        pub fn new(initial: Vec<u8>) -> Self {
            Self {
                initial,
                writes: Mutex::new(HashMap::new()),
            }
        }

        pub fn get(&self, key: &str) -> Option<Vec<u8>> {
            self.writes.lock().unwrap().get(key).cloned()
        }
    }

    #[async_trait]
    impl ModelStore for InMemoryStore {
        async fn load_initial(&self) -> Result<Vec<u8>, StoreError> {
            Ok(self.initial.clone())
        }

        async fn save_round(&self, round: u32, bytes: &[u8]) -> Result<(), StoreError> {
            self.writes
                .lock()
                .unwrap()
                .insert(format!("round_{round}_model"), bytes.to_vec());
            Ok(())
        }

        async fn save_async_round(&self, round: u32, bytes: &[u8]) -> Result<(), StoreError> {
            self.writes
                .lock()
                .unwrap()
                .insert(format!("async_round_{round}_model"), bytes.to_vec());
            Ok(())
        }

        async fn save_final(&self, bytes: &[u8]) -> Result<(), StoreError> {
            self.writes
                .lock()
                .unwrap()
                .insert("output".to_string(), bytes.to_vec());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fs_store_round_trips_initial_model() {
        let dir = tempfile::tempdir().unwrap();
        let initial_path = dir.path().join("initial_model");
        tokio::fs::write(&initial_path, [1u8, 2, 3, 4]).await.unwrap();

        let store = FsStore::new(&initial_path, dir.path().join("out"), dir.path().join("save"));
        let bytes = store.load_initial().await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn fs_store_writes_round_and_final_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(
            dir.path().join("initial_model"),
            dir.path().join("output_model"),
            dir.path().join("save"),
        );

        store.save_round(1, &[9, 9]).await.unwrap();
        store.save_final(&[1, 1]).await.unwrap();

        let round_path = dir.path().join("save").join("round_1_model");
        assert_eq!(tokio::fs::read(&round_path).await.unwrap(), vec![9, 9]);
        assert_eq!(
            tokio::fs::read(dir.path().join("output_model")).await.unwrap(),
            vec![1, 1]
        );
    }
}
