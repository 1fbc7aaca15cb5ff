//! Radar product records: handles wrapping one decoded source file.

use chrono::{DateTime, Utc};
use radarflow_model::decode::ProductFile;
use radarflow_model::level3::Level3File;
use radarflow_model::product::{level3_product, RadarProductGroup};
use radarflow_model::volume::VolumeFile;
use std::fmt::Debug;
use std::sync::Arc;

/// The label used for Level-2 records, which are not product-qualified.
const LEVEL2_PRODUCT_NAME: &str = "L2";

/// The load state of a product query. States advance
/// `ListingProducts -> LoadingProduct -> (ProductLoaded | ProductNotAvailable)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// Remote product times are being listed.
    ListingProducts,
    /// A matching record exists but its file is being (re)loaded.
    LoadingProduct,
    /// The record and its file are available.
    ProductLoaded,
    /// No record matches the query.
    ProductNotAvailable,
}

/// A handle wrapping one decoded source file. Records are identified by
/// (product group, product name, time truncated to seconds); the record maps
/// hold them weakly while the recent-records sidelist bounds their strong
/// lifetime.
pub struct RadarProductRecord {
    radar_id: String,
    group: RadarProductGroup,
    product: String,
    time: DateTime<Utc>,
    file: ProductFile,
}

impl RadarProductRecord {
    /// Creates a record for a decoded file. When `time` is given it
    /// overrides the file's nominal time: filename-derived times are more
    /// reliable than in-file times for Level-2 volumes.
    pub fn new(file: ProductFile, time: Option<DateTime<Utc>>) -> Self {
        let (group, product) = match &file {
            ProductFile::Level2(_) => (RadarProductGroup::Level2, LEVEL2_PRODUCT_NAME.to_string()),
            ProductFile::Level3(level3) => {
                (RadarProductGroup::Level3, level3.awips_id().to_string())
            }
        };

        Self {
            radar_id: file.radar_id().to_string(),
            group,
            product,
            time: time
                .or_else(|| file.time())
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            file,
        }
    }

    /// The radar site identifier for this record.
    pub fn radar_id(&self) -> &str {
        &self.radar_id
    }

    /// The product group of the wrapped file.
    pub fn group(&self) -> RadarProductGroup {
        self.group
    }

    /// The product name ("L2" for Level-2 records, the AWIPS id otherwise).
    pub fn product(&self) -> &str {
        &self.product
    }

    /// The numeric product code, for Level-3 records.
    pub fn product_code(&self) -> Option<u16> {
        match &self.file {
            ProductFile::Level2(_) => None,
            ProductFile::Level3(level3) => Some(level3.product_code()).filter(|code| *code != 0),
        }
        .or_else(|| level3_product(&self.product).map(|info| info.code))
    }

    /// The record's nominal time.
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// The decoded file.
    pub fn file(&self) -> &ProductFile {
        &self.file
    }

    /// The wrapped Level-2 volume file, if this is a Level-2 record.
    pub fn level2_file(&self) -> Option<&Arc<VolumeFile>> {
        self.file.level2()
    }

    /// The wrapped Level-3 product file, if this is a Level-3 record.
    pub fn level3_file(&self) -> Option<&Arc<Level3File>> {
        self.file.level3()
    }
}

impl Debug for RadarProductRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RadarProductRecord")
            .field("radar_id", &self.radar_id)
            .field("group", &self.group)
            .field("product", &self.product)
            .field("time", &self.time)
            .finish()
    }
}
