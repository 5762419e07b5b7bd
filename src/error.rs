//! Error taxonomy shared by every table layer.
//!
//! Absence of a key is never an error; lookups report it with `None`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// A constructor or configuration argument was out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The structural version moved underneath a traversal or callback.
    #[error("table was structurally modified during traversal or callback")]
    ConcurrentStructuralChange,
    /// A traversal-scoped operation was called out of order.
    #[error("illegal state: {0}")]
    IllegalState(&'static str),
}

pub type Result<T> = core::result::Result<T, TableError>;
