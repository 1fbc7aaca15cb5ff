//! The decoder seam.
//!
//! Binary radar-file decoding (message headers, compressed record
//! extraction, moment bit unpacking) is an external collaborator for this
//! workspace. Data providers and the product manager consume decoders
//! through the [`VolumeDecoder`] trait; production builds plug in a real
//! decoder, tests supply synthetic ones.

use crate::level3::Level3File;
use crate::radial::Radial;
use crate::result::Result;
use crate::volume::VolumeFile;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Decodes raw object-store payloads into model structures.
pub trait VolumeDecoder: Send + Sync {
    /// Decodes a complete volume payload (header plus records) into a volume
    /// file. Used for archive objects and the Start chunk of a streaming
    /// volume. Callers index the returned file once loading settles.
    fn decode_volume(&self, data: &[u8]) -> Result<VolumeFile>;

    /// Decodes a records-only payload (an Intermediate or End chunk) into
    /// radials for appending to an existing volume file.
    fn decode_records(&self, data: &[u8]) -> Result<Vec<Radial>>;

    /// Decodes a Level-3 product payload.
    fn decode_level3(&self, data: &[u8]) -> Result<Level3File>;
}

/// A decoded product file of either family.
#[derive(Clone, Debug)]
pub enum ProductFile {
    /// A Level-2 volume file.
    Level2(Arc<VolumeFile>),
    /// A Level-3 product file.
    Level3(Arc<Level3File>),
}

impl ProductFile {
    /// The radar site identifier embedded in the file, if any.
    pub fn radar_id(&self) -> &str {
        match self {
            ProductFile::Level2(file) => file.radar_id(),
            ProductFile::Level3(file) => file.radar_id(),
        }
    }

    /// The file's nominal time: the volume start time for Level-2, the
    /// product generation time for Level-3.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        match self {
            ProductFile::Level2(file) => file.start_time(),
            ProductFile::Level3(file) => Some(file.time()),
        }
    }

    /// The Level-2 volume file, if this is one.
    pub fn level2(&self) -> Option<&Arc<VolumeFile>> {
        match self {
            ProductFile::Level2(file) => Some(file),
            ProductFile::Level3(_) => None,
        }
    }

    /// The Level-3 product file, if this is one.
    pub fn level3(&self) -> Option<&Arc<Level3File>> {
        match self {
            ProductFile::Level3(file) => Some(file),
            ProductFile::Level2(_) => None,
        }
    }
}
