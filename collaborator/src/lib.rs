//! RPC client that joins a federation, invokes the external trainer,
//! and submits model updates per sync round or continuously in async
//! mode.
pub mod client;
pub mod error;
pub mod run;
pub mod settings;
pub mod trainer;

pub use error::ClientError;
