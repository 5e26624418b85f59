use displaydoc::Display;
use thiserror::Error;

/// Errors raised by the model codec and the aggregation algorithms.
///
/// These are the core's error kinds as named in the coordination
/// contract; transport- and persistence-level errors live in the
/// aggregator and collaborator crates, which wrap these where needed.
#[derive(Debug, Display, Error, Clone, Eq, PartialEq)]
pub enum CoreError {
    /// model byte buffer has length {0}, which is not a positive multiple of 4
    MalformedModel(usize),
    /// model byte buffer has length {actual}, expected {expected} (4 * N)
    ModelSizeMismatch { expected: usize, actual: usize },
    /// unknown aggregation algorithm: {0}
    UnknownAlgorithm(String),
    /// aggregate() called with an empty update batch
    NoUpdates,
}
