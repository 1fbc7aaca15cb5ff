//!
//! Contains the Result and Error types for radar product management.
//!

use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(ThisError, Debug)]
pub enum Error {
    #[error("no volume decoder installed")]
    DecoderNotInstalled,
    #[error("file IO error")]
    FileError(#[from] std::io::Error),
    #[error("radar data access error")]
    Data(#[from] radarflow_data::result::Error),
    #[error("radar file decoding error")]
    Model(#[from] radarflow_model::result::Error),
}
