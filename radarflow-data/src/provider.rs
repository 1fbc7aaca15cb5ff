//! The provider capability set shared by archive and chunked data sources.

use crate::result::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use radarflow_model::decode::ProductFile;
use radarflow_model::product::RadarProductGroup;

/// Counts reported by a provider listing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListOutcome {
    /// Whether the remote listing succeeded. A failed listing reports zero
    /// objects and the refresh scheduler retries on its next cycle.
    pub success: bool,
    /// Objects not previously known to the provider.
    pub new_objects: usize,
    /// All objects observed by this listing.
    pub total_objects: usize,
}

impl ListOutcome {
    /// An outcome for a listing that could not be performed.
    pub fn failure() -> Self {
        Self::default()
    }
}

/// Capabilities common to the radar data providers. Archive and chunked
/// providers are otherwise unrelated; consumers hold them behind this trait.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// The radar site identifier this provider serves.
    fn radar_id(&self) -> &str;

    /// The product group this provider serves.
    fn group(&self) -> RadarProductGroup;

    /// Number of remote objects currently known.
    fn cache_size(&self) -> usize;

    /// Last-modified time of the most recent known object.
    fn last_modified(&self) -> Option<DateTime<Utc>>;

    /// Observed period between the two most recent object updates.
    fn update_period(&self) -> Option<Duration>;

    /// The key of the object in effect at the given time.
    fn find_key(&self, time: DateTime<Utc>) -> Option<String>;

    /// The key of the most recent known object.
    fn find_latest_key(&self) -> Option<String>;

    /// The time of the most recent known object.
    fn find_latest_time(&self) -> Option<DateTime<Utc>>;

    /// Whether a listing has been performed for the given date.
    fn is_date_cached(&self, date: NaiveDate) -> bool;

    /// Lists remote objects for the given date and merges them into the
    /// provider's object index.
    async fn list_objects(&self, date: NaiveDate) -> ListOutcome;

    /// All known object times falling on the given date. When the date has
    /// not been listed yet and `update` is set, a fresh listing is performed
    /// first; otherwise cached results are returned.
    async fn get_time_points_by_date(&self, date: NaiveDate, update: bool) -> Vec<DateTime<Utc>>;

    /// Downloads and decodes the object with the given key.
    async fn load_object_by_key(&self, key: &str) -> Result<ProductFile>;

    /// Downloads and decodes the object in effect at the given time.
    async fn load_object_by_time(&self, time: DateTime<Utc>) -> Result<ProductFile>;

    /// Downloads and decodes the most recent known object.
    async fn load_latest_object(&self) -> Result<ProductFile>;

    /// Refreshes the provider's object index from the remote store. Returns
    /// `(new_objects, total_objects)`.
    async fn refresh(&self) -> (usize, usize);

    /// Requests the remotely-available product list, where the provider
    /// family supports one.
    async fn request_available_products(&self) {}

    /// The most recently requested available-product list.
    fn available_products(&self) -> Vec<String> {
        Vec::new()
    }
}
