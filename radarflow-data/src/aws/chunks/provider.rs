use crate::aws::archive::ArchiveDataProvider;
use crate::aws::chunks::{ChunkKey, ChunkedScanRecord, DEFAULT_CHUNKS_BUCKET};
use crate::aws::s3;
use crate::provider::{DataProvider, ListOutcome};
use crate::result::{Error, Result};
use crate::time_index::bounded_element;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{debug, trace, warn};
use radarflow_model::decode::{ProductFile, VolumeDecoder};
use radarflow_model::product::RadarProductGroup;
use radarflow_model::volume::VolumeFile;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;

/// Provider metadata derived from the most recent scan's chunk modification
/// times.
#[derive(Debug, Default, Clone, Copy)]
struct ProviderMeta {
    last_modified: Option<DateTime<Utc>>,
    update_period: Option<Duration>,
}

/// One entry in the active-scan map: the chunk-group prefix plus the
/// lock-guarded assembly state.
struct ScanEntry {
    prefix: String,
    record: Arc<Mutex<ChunkedScanRecord>>,
}

/// Assembles ongoing Level-2 volume scans from the chunk stream. Holds a
/// handle to the sibling archive provider so an incomplete volume can be
/// completed by cross-volume stitching; the handle is a dependency, not
/// ownership — the manager owns both providers and tears them down together.
pub struct ChunksDataProvider {
    radar_id: String,
    bucket: String,
    decoder: Arc<dyn VolumeDecoder>,
    archive: Option<Arc<ArchiveDataProvider>>,

    scans: RwLock<BTreeMap<DateTime<Utc>, ScanEntry>>,
    refresh: Mutex<()>,
    meta: RwLock<ProviderMeta>,
}

impl ChunksDataProvider {
    /// Creates a chunked provider for the given radar site, backed by the
    /// default chunk bucket. The archive provider, when given, is used to
    /// stitch interrupted scans across the volume boundary.
    pub fn new(
        radar_id: impl Into<String>,
        decoder: Arc<dyn VolumeDecoder>,
        archive: Option<Arc<ArchiveDataProvider>>,
    ) -> Self {
        Self {
            radar_id: radar_id.into(),
            bucket: DEFAULT_CHUNKS_BUCKET.to_string(),
            decoder,
            archive,
            scans: RwLock::default(),
            refresh: Mutex::default(),
            meta: RwLock::default(),
        }
    }

    /// Overrides the bucket this provider lists from.
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// The elevation angle of the scan currently being assembled in the most
    /// recent volume.
    pub async fn current_elevation(&self) -> Option<f32> {
        let latest = {
            let scans = self.scans.read().unwrap_or_else(PoisonError::into_inner);
            scans
                .values()
                .next_back()
                .map(|entry| Arc::clone(&entry.record))
        };

        let latest = latest?;
        let record = latest.lock().await;
        record
            .file
            .as_ref()
            .and_then(|file| file.current_elevation_angle())
    }

    /// Reads the start time of a chunk group by listing its first key.
    async fn get_scan_time(&self, prefix: &str) -> Result<DateTime<Utc>> {
        let listing = s3::list_objects(&self.bucket, prefix, Some("/"), Some(1)).await?;
        let object = listing.objects.first().ok_or(Error::ObjectNotFound)?;

        Ok(ChunkKey::parse(&object.key)?.time())
    }

    /// Downloads and applies every not-yet-ingested chunk of the record in
    /// sequence order. Idempotent for completed records. Returns the number
    /// of chunks ingested.
    async fn load_scan(&self, record: &mut ChunkedScanRecord) -> Result<usize> {
        if record.has_all_files {
            return Ok(0);
        }

        let listing = s3::list_objects(&self.bucket, &record.prefix, Some("/"), None).await?;

        let mut ingested = 0;
        for object in &listing.objects {
            let chunk_key = match ChunkKey::parse(&object.key) {
                Ok(chunk_key) => chunk_key,
                Err(err) => {
                    warn!("Skipping unparsable chunk key: {err}");
                    continue;
                }
            };

            if chunk_key.sequence() != record.next_file {
                continue;
            }

            let downloaded = s3::download_object(&self.bucket, &object.key).await?;
            record.ingest_chunk(
                self.decoder.as_ref(),
                &chunk_key,
                &downloaded.data,
                downloaded.metadata.last_modified,
            )?;
            ingested += 1;
        }

        if ingested > 0 {
            if let Some(file) = record.file.as_mut() {
                file.index_file();
            }
        }

        Ok(ingested)
    }

    /// Fetches (once) the archive volume preceding this record's start time,
    /// for stitching when no predecessor chunk volume is assembled.
    async fn stitch_from_archive(&self, record: &mut ChunkedScanRecord) -> Option<Arc<VolumeFile>> {
        if record.stitch_base.is_none() {
            let archive = self.archive.as_ref()?;
            let start = record.file.as_ref().and_then(|file| file.start_time())?;
            let key = archive.find_key(start - Duration::seconds(1))?;

            match archive.load_object_by_key(&key).await {
                Ok(ProductFile::Level2(file)) => record.stitch_base = Some(file),
                Ok(_) => {}
                Err(err) => warn!("Could not load archive volume for stitching: {err}"),
            }
        }

        record.stitch_base.clone()
    }

    /// Updates provider metadata from the most recent scan's chunk
    /// modification times. Callers must not hold any record lock.
    async fn update_metadata(&self) {
        let latest = {
            let scans = self.scans.read().unwrap_or_else(PoisonError::into_inner);
            scans
                .values()
                .next_back()
                .map(|entry| Arc::clone(&entry.record))
        };

        let Some(latest) = latest else {
            return;
        };

        let record = latest.lock().await;
        let mut meta = self.meta.write().unwrap_or_else(PoisonError::into_inner);
        meta.last_modified = record.last_modified;
        if let (Some(last), Some(second)) = (record.last_modified, record.second_last_modified) {
            meta.update_period = Some(last - second);
        }
    }
}

#[async_trait]
impl DataProvider for ChunksDataProvider {
    fn radar_id(&self) -> &str {
        &self.radar_id
    }

    fn group(&self) -> RadarProductGroup {
        RadarProductGroup::Level2
    }

    fn cache_size(&self) -> usize {
        self.scans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
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

        let scans = self.scans.read().unwrap_or_else(PoisonError::into_inner);
        bounded_element(&scans, time).map(|(_, entry)| entry.prefix.clone())
    }

    fn find_latest_key(&self) -> Option<String> {
        let scans = self.scans.read().unwrap_or_else(PoisonError::into_inner);
        scans.values().next_back().map(|entry| entry.prefix.clone())
    }

    fn find_latest_time(&self) -> Option<DateTime<Utc>> {
        let scans = self.scans.read().unwrap_or_else(PoisonError::into_inner);
        scans.keys().next_back().copied()
    }

    fn is_date_cached(&self, _date: NaiveDate) -> bool {
        // Chunk volumes are not date-listed
        true
    }

    async fn list_objects(&self, _date: NaiveDate) -> ListOutcome {
        let prefix = format!("{}/", self.radar_id);
        debug!("ListObjects: {prefix}");

        let listing = match s3::list_objects(&self.bucket, &prefix, Some("/"), None).await {
            Ok(listing) => listing,
            Err(err) => {
                warn!("Could not list scans: {err}");
                return ListOutcome::failure();
            }
        };

        debug!("Found {} scans", listing.common_prefixes.len());

        let known: HashSet<String> = {
            let scans = self.scans.read().unwrap_or_else(PoisonError::into_inner);
            scans.values().map(|entry| entry.prefix.clone()).collect()
        };

        let mut new_objects = 0;
        let total_objects = listing.common_prefixes.len();

        for scan_prefix in &listing.common_prefixes {
            if known.contains(scan_prefix) {
                continue;
            }

            let time = match self.get_scan_time(scan_prefix).await {
                Ok(time) => time,
                Err(err) => {
                    warn!("Could not read scan time for \"{scan_prefix}\": {err}");
                    continue;
                }
            };

            let mut scans = self.scans.write().unwrap_or_else(PoisonError::into_inner);
            scans.entry(time).or_insert_with(|| {
                new_objects += 1;
                ScanEntry {
                    prefix: scan_prefix.clone(),
                    record: Arc::new(Mutex::new(ChunkedScanRecord::new(scan_prefix.clone()))),
                }
            });
        }

        ListOutcome {
            success: true,
            new_objects,
            total_objects,
        }
    }

    async fn get_time_points_by_date(&self, _date: NaiveDate, _update: bool) -> Vec<DateTime<Utc>> {
        Vec::new()
    }

    async fn load_object_by_key(&self, _key: &str) -> Result<ProductFile> {
        // Chunk volumes are addressed by time, not key
        Err(Error::ObjectNotFound)
    }

    async fn load_object_by_time(&self, time: DateTime<Utc>) -> Result<ProductFile> {
        trace!("LoadObjectByTime: {time}");

        let (record_arc, previous_arc) = {
            let scans = self.scans.read().unwrap_or_else(PoisonError::into_inner);
            let (key, entry) = bounded_element(&scans, time).ok_or(Error::ObjectNotFound)?;
            let previous = scans
                .range(..*key)
                .next_back()
                .map(|(_, entry)| Arc::clone(&entry.record));

            (Arc::clone(&entry.record), previous)
        };

        let mut record = record_arc.lock().await;
        self.load_scan(&mut record).await?;

        let Some(file) = record.file.clone() else {
            return Err(Error::ObjectNotFound);
        };

        // Stitch with the predecessor chunk volume when it is assembled,
        // otherwise with the archive volume preceding this one. Lock order
        // is always newer record first.
        let previous_file = match previous_arc {
            Some(previous_arc) => {
                let previous = previous_arc.lock().await;
                previous.file.clone().map(Arc::new)
            }
            None => None,
        };
        let previous_file = match previous_file {
            Some(previous_file) => Some(previous_file),
            None => self.stitch_from_archive(&mut record).await,
        };

        drop(record);
        self.update_metadata().await;

        let merged = VolumeFile::merged(&file, previous_file.as_deref());
        Ok(ProductFile::Level2(Arc::new(merged)))
    }

    async fn load_latest_object(&self) -> Result<ProductFile> {
        let time = self.find_latest_time().ok_or(Error::ObjectNotFound)?;
        self.load_object_by_time(time).await
    }

    async fn refresh(&self) -> (usize, usize) {
        let _guard = self.refresh.lock().await;

        let outcome = self.list_objects(Utc::now().date_naive()).await;
        let mut new_objects = outcome.new_objects;

        let entries: Vec<Arc<Mutex<ChunkedScanRecord>>> = {
            let scans = self.scans.read().unwrap_or_else(PoisonError::into_inner);
            scans
                .values()
                .map(|entry| Arc::clone(&entry.record))
                .collect()
        };

        for entry in entries {
            let mut record = entry.lock().await;
            if record.file.is_none() {
                continue;
            }

            match self.load_scan(&mut record).await {
                Ok(ingested) if ingested > 0 => new_objects += 1,
                Ok(_) => {}
                Err(err) => warn!("Could not reload scan \"{}\": {err}", record.prefix),
            }
        }

        self.update_metadata().await;

        (new_objects, outcome.total_objects)
    }
}
