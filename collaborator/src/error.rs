use displaydoc::Display;
use thiserror::Error;

/// Errors surfaced to the caller of a collaborator run; there is no
/// automatic retry at this layer (§4.4).
#[derive(Debug, Display, Error)]
pub enum ClientError {
    /// model codec error: {0}
    Core(#[from] fl_core::CoreError),
    /// rpc call failed: {0}
    Transport(#[from] tonic::Status),
    /// failed to establish a gRPC connection: {0}
    Connect(#[from] tonic::transport::Error),
    /// trainer subprocess failed: {0}
    TrainerFailed(String),
    /// failed to read or write a model file at {path}: {source}
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
