//!
//! Contains the Result and Error types for radar model operations.
//!

use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(ThisError, Debug)]
pub enum Error {
    #[error("failed to decode radar file: {0}")]
    DecodeFailure(String),
    #[error("elevation scan contains no radials")]
    EmptyScan,
    #[error("radial is missing the requested moment data block")]
    MissingMomentData,
}
