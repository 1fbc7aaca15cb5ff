use crate::aws::archive::{
    is_marker_key, level2_prefix, level3_prefix, time_from_key, ObjectIndex, ObjectRecord,
    DEFAULT_LEVEL2_BUCKET, DEFAULT_LEVEL3_BUCKET, DEFAULT_MAX_OBJECTS,
};
use crate::aws::s3;
use crate::provider::{DataProvider, ListOutcome};
use crate::result::{Error, Result};
use crate::time_index::bounded_element;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{debug, trace, warn};
use radarflow_model::decode::{ProductFile, VolumeDecoder};
use radarflow_model::product::RadarProductGroup;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;

/// Provider metadata derived from the two most recent objects' modification
/// times.
#[derive(Debug, Default, Clone, Copy)]
struct ProviderMeta {
    last_modified: Option<DateTime<Utc>>,
    update_period: Option<Duration>,
}

/// Refresh bookkeeping: the most recent date a refresh listing covered, used
/// to detect midnight rollover.
#[derive(Debug, Default)]
struct RefreshState {
    refresh_date: Option<NaiveDate>,
}

/// Lists and fetches archived product files for one radar site and product.
/// Listings are cached per date; the oldest dates are pruned once the object
/// index exceeds its budget.
pub struct ArchiveDataProvider {
    radar_id: String,
    bucket: String,
    group: RadarProductGroup,
    product: Option<String>,
    decoder: Arc<dyn VolumeDecoder>,
    max_objects: usize,

    index: RwLock<ObjectIndex>,
    meta: RwLock<ProviderMeta>,
    refresh: Mutex<RefreshState>,
    available_products: RwLock<Vec<String>>,
}

impl ArchiveDataProvider {
    /// Creates a Level-2 archive provider for the given radar site, backed
    /// by the default archive bucket.
    pub fn level2(radar_id: impl Into<String>, decoder: Arc<dyn VolumeDecoder>) -> Self {
        Self {
            radar_id: radar_id.into(),
            bucket: DEFAULT_LEVEL2_BUCKET.to_string(),
            group: RadarProductGroup::Level2,
            product: None,
            decoder,
            max_objects: DEFAULT_MAX_OBJECTS,
            index: RwLock::default(),
            meta: RwLock::default(),
            refresh: Mutex::default(),
            available_products: RwLock::default(),
        }
    }

    /// Creates a Level-3 archive provider for the given radar site and AWIPS
    /// product id, backed by the default Level-3 bucket.
    pub fn level3(
        radar_id: impl Into<String>,
        product: impl Into<String>,
        decoder: Arc<dyn VolumeDecoder>,
    ) -> Self {
        Self {
            radar_id: radar_id.into(),
            bucket: DEFAULT_LEVEL3_BUCKET.to_string(),
            group: RadarProductGroup::Level3,
            product: Some(product.into()),
            decoder,
            max_objects: DEFAULT_MAX_OBJECTS,
            index: RwLock::default(),
            meta: RwLock::default(),
            refresh: Mutex::default(),
            available_products: RwLock::default(),
        }
    }

    /// Overrides the bucket this provider lists from.
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Overrides the object-index budget before old dates are pruned.
    pub fn with_max_objects(mut self, max_objects: usize) -> Self {
        self.max_objects = max_objects;
        self
    }

    /// The AWIPS product id, for Level-3 providers.
    pub fn product(&self) -> Option<&str> {
        self.product.as_deref()
    }

    fn prefix(&self, date: NaiveDate) -> String {
        match &self.product {
            Some(product) => level3_prefix(&self.radar_id, product, date),
            None => level2_prefix(&self.radar_id, date),
        }
    }

    fn update_metadata(&self) {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        let mut meta = self.meta.write().unwrap_or_else(PoisonError::into_inner);

        let mut newest = index.objects.values().rev();
        let last = newest.next().and_then(|record| record.last_modified);
        let previous = newest.next().and_then(|record| record.last_modified);

        meta.last_modified = last;
        if let (Some(last), Some(previous)) = (last, previous) {
            meta.update_period = Some(last - previous);
        }
    }

    fn touch_date(&self, date: NaiveDate) {
        self.index
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .touch_date(date);
    }
}

#[async_trait]
impl DataProvider for ArchiveDataProvider {
    fn radar_id(&self) -> &str {
        &self.radar_id
    }

    fn group(&self) -> RadarProductGroup {
        self.group
    }

    fn cache_size(&self) -> usize {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .objects
            .len()
    }

    fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.meta
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last_modified
    }

    fn update_period(&self) -> Option<Duration> {
        self.meta
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .update_period
    }

    fn find_key(&self, time: DateTime<Utc>) -> Option<String> {
        debug!("FindKey: {time}");

        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        bounded_element(&index.objects, time).map(|(_, record)| record.key.clone())
    }

    fn find_latest_key(&self) -> Option<String> {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        index
            .objects
            .values()
            .next_back()
            .map(|record| record.key.clone())
    }

    fn find_latest_time(&self) -> Option<DateTime<Utc>> {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        index.objects.keys().next_back().copied()
    }

    fn is_date_cached(&self, date: NaiveDate) -> bool {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_date_cached(date)
    }

    async fn list_objects(&self, date: NaiveDate) -> ListOutcome {
        let prefix = self.prefix(date);
        debug!("ListObjects: {prefix}");

        let listing = match s3::list_objects(&self.bucket, &prefix, None, None).await {
            Ok(listing) => listing,
            Err(err) => {
                warn!("Could not list objects: {err}");
                return ListOutcome::failure();
            }
        };

        if listing.truncated {
            warn!("Truncated list objects response for prefix \"{prefix}\"");
        }
        debug!("Found {} objects", listing.objects.len());

        let mut new_objects = 0;
        let mut total_objects = 0;

        {
            let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);

            for object in &listing.objects {
                if is_marker_key(&object.key) {
                    continue;
                }

                let Some(time) = time_from_key(&object.key) else {
                    warn!("Time not parsable from key: \"{}\"", object.key);
                    continue;
                };

                let inserted = index.insert(
                    time,
                    ObjectRecord {
                        key: object.key.clone(),
                        last_modified: object.last_modified,
                    },
                );

                if inserted {
                    new_objects += 1;
                }
                total_objects += 1;
            }

            if new_objects > 0 {
                index.touch_date(date);
                index.prune(self.max_objects, Utc::now().date_naive());
            }
        }

        if new_objects > 0 {
            self.update_metadata();
        }

        ListOutcome {
            success: true,
            new_objects,
            total_objects,
        }
    }

    async fn get_time_points_by_date(&self, date: NaiveDate, update: bool) -> Vec<DateTime<Utc>> {
        trace!("GetTimePointsByDate: {date}");

        let cached = self.is_date_cached(date);

        if !cached {
            if !update {
                return Vec::new();
            }

            // List objects, since the date is not present in the date list
            let outcome = self.list_objects(date).await;
            if outcome.success {
                self.touch_date(date);
            }
        }

        let time_points = self
            .index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .time_points_on(date);

        // If we haven't updated the most recently queried dates yet, because
        // the date was already cached, update
        if cached {
            self.touch_date(date);
        }

        time_points
    }

    async fn load_object_by_key(&self, key: &str) -> Result<ProductFile> {
        let object = s3::download_object(&self.bucket, key).await?;

        match self.group {
            RadarProductGroup::Level2 => {
                let mut file = self.decoder.decode_volume(&object.data)?;
                file.index_file();
                Ok(ProductFile::Level2(Arc::new(file)))
            }
            RadarProductGroup::Level3 => {
                let file = self.decoder.decode_level3(&object.data)?;
                Ok(ProductFile::Level3(Arc::new(file)))
            }
        }
    }

    async fn load_object_by_time(&self, time: DateTime<Utc>) -> Result<ProductFile> {
        let key = self.find_key(time).ok_or(Error::ObjectNotFound)?;
        self.load_object_by_key(&key).await
    }

    async fn load_latest_object(&self) -> Result<ProductFile> {
        let key = self.find_latest_key().ok_or(Error::ObjectNotFound)?;
        self.load_object_by_key(&key).await
    }

    async fn refresh(&self) -> (usize, usize) {
        debug!("Refresh()");

        let mut state = self.refresh.lock().await;

        let today = Utc::now().date_naive();
        let yesterday = today.pred_opt().unwrap_or(today);

        let mut all_new = 0;
        let mut all_total = 0;

        // If we haven't gotten any objects from today, first list objects
        // for yesterday, to ensure we haven't missed any objects near
        // midnight
        if state.refresh_date.map_or(true, |date| date < today) {
            let outcome = self.list_objects(yesterday).await;
            all_new += outcome.new_objects;
            all_total += outcome.total_objects;
            if outcome.total_objects > 0 {
                state.refresh_date = Some(yesterday);
            }
        }

        let outcome = self.list_objects(today).await;
        all_new += outcome.new_objects;
        all_total += outcome.total_objects;
        if outcome.total_objects > 0 {
            state.refresh_date = Some(today);
        }

        (all_new, all_total)
    }

    async fn request_available_products(&self) {
        if self.group != RadarProductGroup::Level3 {
            return;
        }

        let prefix = format!("{}/", self.radar_id);
        let listing = match s3::list_objects(&self.bucket, &prefix, Some("/"), None).await {
            Ok(listing) => listing,
            Err(err) => {
                warn!("Could not list available products: {err}");
                return;
            }
        };

        let products: Vec<String> = listing
            .common_prefixes
            .iter()
            .filter_map(|common_prefix| {
                common_prefix
                    .trim_end_matches('/')
                    .rsplit('/')
                    .next()
                    .map(str::to_string)
            })
            .collect();

        debug!("Found {} available products", products.len());

        *self
            .available_products
            .write()
            .unwrap_or_else(PoisonError::into_inner) = products;
    }

    fn available_products(&self) -> Vec<String> {
        self.available_products
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
