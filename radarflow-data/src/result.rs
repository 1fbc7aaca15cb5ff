//!
//! Contains the Result and Error types for radar data access operations.
//!

use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(ThisError, Debug)]
pub enum Error {
    #[error("data file IO error")]
    FileError(#[from] std::io::Error),
    #[error("unexpected truncated S3 list objects response")]
    TruncatedListObjectsResponse,
    #[error("error decoding S3 list objects response")]
    S3ListObjectsDecodingError,
    #[error("error listing S3 objects")]
    S3ListObjectsError(reqwest::Error),
    #[error("error requesting S3 object")]
    S3GetObjectRequestError(reqwest::Error),
    #[error("error getting S3 object: {0:?}")]
    S3GetObjectError(Option<String>),
    #[error("error streaming/downloading S3 object")]
    S3StreamingError(reqwest::Error),
    #[error("S3 object not found")]
    S3ObjectNotFound,
    #[error("time not parsable from object key: \"{0}\"")]
    KeyTimeError(String),
    #[error("no object found for the requested time")]
    ObjectNotFound,
    #[error("radar file decoding error")]
    Model(#[from] radarflow_model::result::Error),
}
