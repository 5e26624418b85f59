use displaydoc::Display;
use thiserror::Error;

use crate::{settings::SettingsError, store::StoreError};

/// Errors that can terminate the aggregator's `main`.
///
/// Per-crate boundary error kinds, matching the teacher's
/// `displaydoc` + `thiserror` convention of one enum per module
/// boundary (`ServiceError`, `SettingsError`, `StorageError`).
#[derive(Debug, Display, Error)]
pub enum ServerError {
    /// model codec or aggregation error: {0}
    Core(#[from] fl_core::CoreError),
    /// gRPC transport failed: {0}
    Transport(#[from] tonic::transport::Error),
    /// failed to persist a model snapshot: {0}
    Persistence(#[from] StoreError),
    /// failed to load aggregator settings: {0}
    Settings(#[from] SettingsError),
    /// invalid aggregator address: {0}
    InvalidAddress(String),
}
