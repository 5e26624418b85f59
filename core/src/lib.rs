//! Model codec, pluggable aggregation algorithms, and the shared wire
//! types used by both the aggregator server and the collaborator
//! client.
pub mod aggregator;
pub mod error;
pub mod model;
pub mod plan;
pub mod update;

pub use aggregator::{Aggregation, Algorithm};
pub use error::CoreError;
pub use plan::Plan;
pub use update::ClientUpdate;
