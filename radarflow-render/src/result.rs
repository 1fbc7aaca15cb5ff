//!
//! Contains the Result and Error types for sweep computation.
//!

use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

/// Reasons a sweep was not computed. The renderer keeps its current buffers
/// when one of these is returned.
#[derive(ThisError, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("the selected product is not valid for this view")]
    InvalidProduct,
    #[error("radar data is not loaded")]
    NotLoaded,
    #[error("the sweep is unchanged")]
    NoChange,
    #[error("radar data is invalid")]
    InvalidData,
}
