//!
//! # AWS Radar Data
//! Radar data is distributed through public AWS S3 buckets. Archived volume
//! files live in a flat bucket keyed by radar site and date; the
//! near-real-time bucket exposes each in-progress volume as a common-prefix
//! group of chunk objects uploaded every few seconds. Both buckets allow
//! anonymous access.
//!

pub mod archive;
pub mod chunks;
pub(crate) mod client;
pub mod s3;
