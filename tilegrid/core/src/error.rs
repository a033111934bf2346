use thiserror::Error;

use tilegrid_common::datatype::Error as DatatypeError;

/// Errors reported by the storage engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A function was given an argument which fails validation.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// A dimension index or name does not resolve against the schema.
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
    /// A subarray range fails its invariants.
    #[error("Invalid range: {0}")]
    InvalidRange(String),
    /// An operation does not support the datatype it was invoked with.
    #[error("Unsupported datatype: {0}")]
    UnsupportedType(String),
    /// The query is not in a state which permits the operation.
    #[error("Illegal state: {0}")]
    IllegalState(String),
    /// A single variable-length cell does not fit into the caller's
    /// buffers even when they are empty. The submission fails but the
    /// query may be reconfigured with larger buffers and resubmitted.
    #[error("Unsplittable buffer overflow: {0}")]
    BufferOverflow(String),
    /// Error reading or writing stored data.
    #[error("I/O error: {0}")]
    Io(String),
    /// Invariant violation inside the engine.
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Datatype error: {0}")]
    Datatype(#[from] DatatypeError),
    #[error("Buffer error: {0}")]
    Buffers(#[from] crate::query::buffers::BuffersError),
}

pub type Result<T> = std::result::Result<T, Error>;
