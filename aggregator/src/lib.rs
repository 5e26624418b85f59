//! Long-lived server that owns the global model, accepts updates from
//! a fleet of collaborators over gRPC, and runs either the sync
//! barrier or the async aggregation tick to merge them.
pub mod engine;
pub mod error;
pub mod service;
pub mod settings;
pub mod state;
pub mod store;

pub use error::ServerError;
