//! The per-site radar product manager.

use crate::coordinates::{calculate_coordinates, CoordinateTables, RadialSize};
use crate::decoder::decoder;
use crate::event::RadarEvent;
use crate::record::{LoadStatus, RadarProductRecord};
use crate::refresh::{schedule_refresh, ProviderManager};
use crate::result::Result;
use crate::store::RecordStore;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{debug, info, trace, warn};
use once_cell::sync::Lazy;
use radarflow_data::aws::archive::ArchiveDataProvider;
use radarflow_data::aws::chunks::ChunksDataProvider;
use radarflow_data::provider::DataProvider;
use radarflow_data::time_index::bounded_element;
use radarflow_model::decode::ProductFile;
use radarflow_model::level3::Level3File;
use radarflow_model::product::{MomentType, RadarProductGroup};
use radarflow_model::scan::ElevationScan;
use radarflow_model::site::{RadarSite, SiteType};
use radarflow_model::volume::floor_seconds;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError, RwLock, Weak};
use std::time::Instant;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

/// The default AWIPS product consulted for Level-3 availability listings.
const DEFAULT_LEVEL3_PRODUCT: &str = "N0B";

/// Minimum (and default) bound on the recent-records sidelist.
const MIN_CACHE_LIMIT: usize = 6;

/// Chunked data older than this is considered stale and archive records are
/// consulted instead.
const MAX_CHUNK_DELAY: Duration = Duration::minutes(10);

/// Level-3 records are only served within this window of the request.
const LEVEL3_VALIDITY_WINDOW: Duration = Duration::hours(24);

/// Capacity of the manager's event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

static INSTANCES: Lazy<StdMutex<HashMap<String, Weak<RadarProductManager>>>> =
    Lazy::new(|| StdMutex::new(HashMap::new()));

static FILE_INDEX: Lazy<StdMutex<HashMap<String, Arc<RadarProductRecord>>>> =
    Lazy::new(|| StdMutex::new(HashMap::new()));

/// Serializes file decoding for direct loads: decoding is CPU-heavy and
/// decompressing several volumes at once causes memory bursts.
static FILE_LOAD_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Which record store a load targets.
enum StoreKind {
    Level2,
    Level3(String),
}

/// The result of a Level-2 elevation-scan query.
#[derive(Debug, Clone)]
pub struct Level2Selection {
    /// The selected elevation scan.
    pub scan: Arc<ElevationScan>,
    /// The elevation angle of the selected cut.
    pub elevation_cut: f32,
    /// All elevation cuts available in the source file.
    pub elevation_cuts: Vec<f32>,
    /// The scan's collection time, floored to seconds.
    pub time: DateTime<Utc>,
}

/// One radar site's product manager: composes the site's data providers,
/// record caches, refresh loops, and coordinate tables, and serves
/// elevation-scan queries. Instances are created lazily per site id and
/// cached weakly; consumers hold the strong references.
pub struct RadarProductManager {
    radar_id: String,
    site: Arc<RadarSite>,
    cache_limit: AtomicUsize,

    initialized: StdMutex<bool>,
    tables: RwLock<CoordinateTables>,

    archive_provider: Arc<ArchiveDataProvider>,
    chunks_provider: Arc<ChunksDataProvider>,

    level2_provider_manager: Arc<ProviderManager>,
    level2_chunks_provider_manager: Arc<ProviderManager>,
    level3_provider_managers: RwLock<HashMap<String, Arc<ProviderManager>>>,

    level2_store: RwLock<RecordStore>,
    level3_stores: RwLock<HashMap<String, RecordStore>>,

    load_level2_lock: Mutex<()>,
    load_level3_lock: Mutex<()>,

    refresh_map: StdMutex<HashMap<Uuid, Vec<Arc<ProviderManager>>>>,

    incoming_elevation: StdMutex<Option<f32>>,

    level3_products_initialized: StdMutex<bool>,
    available_level3_products: RwLock<Vec<String>>,

    events: broadcast::Sender<RadarEvent>,
}

impl RadarProductManager {
    /// Returns the manager for the given radar site, creating it if no live
    /// instance exists. Requires a decoder to have been installed.
    pub fn instance(radar_id: &str) -> Result<Arc<Self>> {
        let mut instances = INSTANCES.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = instances.get(radar_id).and_then(Weak::upgrade) {
            return Ok(existing);
        }

        let manager = Arc::new(Self::create(radar_id)?);
        instances.insert(radar_id.to_string(), Arc::downgrade(&manager));

        Ok(manager)
    }

    fn create(radar_id: &str) -> Result<Self> {
        let decoder = decoder()?;

        let site = RadarSite::get(radar_id).unwrap_or_else(|| {
            warn!("Radar site not found: \"{radar_id}\"");
            Arc::new(RadarSite::new(radar_id, 0.0, 0.0, 0.0, SiteType::Wsr88d))
        });

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let archive_provider = Arc::new(ArchiveDataProvider::level2(radar_id, Arc::clone(&decoder)));
        let chunks_provider = Arc::new(ChunksDataProvider::new(
            radar_id,
            Arc::clone(&decoder),
            Some(Arc::clone(&archive_provider)),
        ));

        let level2_provider_manager = ProviderManager::new(
            radar_id,
            RadarProductGroup::Level2,
            "L2",
            false,
            Arc::clone(&archive_provider) as Arc<dyn DataProvider>,
            events.clone(),
        );
        let level2_chunks_provider_manager = ProviderManager::new(
            radar_id,
            RadarProductGroup::Level2,
            "L2",
            true,
            Arc::clone(&chunks_provider) as Arc<dyn DataProvider>,
            events.clone(),
        );

        Ok(Self {
            radar_id: radar_id.to_string(),
            site,
            cache_limit: AtomicUsize::new(MIN_CACHE_LIMIT),
            initialized: StdMutex::new(false),
            tables: RwLock::default(),
            archive_provider,
            chunks_provider,
            level2_provider_manager,
            level2_chunks_provider_manager,
            level3_provider_managers: RwLock::default(),
            level2_store: RwLock::default(),
            level3_stores: RwLock::default(),
            load_level2_lock: Mutex::new(()),
            load_level3_lock: Mutex::new(()),
            refresh_map: StdMutex::new(HashMap::new()),
            incoming_elevation: StdMutex::new(None),
            level3_products_initialized: StdMutex::new(false),
            available_level3_products: RwLock::default(),
            events,
        })
    }

    /// Drops all cached manager instances and the direct-load file index.
    pub fn cleanup() {
        FILE_INDEX
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        INSTANCES
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Logs every known record time per site and product, marking expired
    /// entries.
    pub fn dump_records() {
        info!("Record Dump");

        let managers: Vec<Arc<RadarProductManager>> = {
            let instances = INSTANCES.lock().unwrap_or_else(PoisonError::into_inner);
            instances.values().filter_map(Weak::upgrade).collect()
        };

        for manager in managers {
            info!(" {}", manager.radar_id);
            info!("  Level 2");
            {
                let store = manager
                    .level2_store
                    .read()
                    .unwrap_or_else(PoisonError::into_inner);
                for (time, weak) in store.records() {
                    let expired = if weak.upgrade().is_none() {
                        " (expired)"
                    } else {
                        ""
                    };
                    info!("   {time}{expired}");
                }
            }

            info!("  Level 3");
            {
                let stores = manager
                    .level3_stores
                    .read()
                    .unwrap_or_else(PoisonError::into_inner);
                for (product, store) in stores.iter() {
                    info!("   {product}");
                    for (time, weak) in store.records() {
                        let expired = if weak.upgrade().is_none() {
                            " (expired)"
                        } else {
                            ""
                        };
                        info!("    {time}{expired}");
                    }
                }
            }
        }
    }

    /// The radar site identifier this manager serves.
    pub fn radar_id(&self) -> &str {
        &self.radar_id
    }

    /// The radar site descriptor.
    pub fn radar_site(&self) -> &Arc<RadarSite> {
        &self.site
    }

    /// Whether this site is a terminal doppler weather radar.
    pub fn is_tdwr(&self) -> bool {
        self.site.is_tdwr()
    }

    /// The base range gate size for this site in meters.
    pub fn gate_size(&self) -> f32 {
        self.site.gate_size_meters()
    }

    /// The elevation angle currently being assembled by the chunked
    /// provider, if live data is being served.
    pub fn incoming_level2_elevation(&self) -> Option<f32> {
        *self
            .incoming_elevation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribes to this manager's event notifications.
    pub fn subscribe_events(&self) -> broadcast::Receiver<RadarEvent> {
        self.events.subscribe()
    }

    /// Bounds the recent-records sidelist. Values below the minimum of 6 are
    /// clamped.
    pub fn set_cache_limit(&self, cache_limit: usize) {
        self.cache_limit
            .store(cache_limit.max(MIN_CACHE_LIMIT), Ordering::SeqCst);
    }

    fn cache_limit(&self) -> usize {
        self.cache_limit.load(Ordering::SeqCst)
    }

    /// Precomputes the geodetic coordinate tables for this site. Idempotent;
    /// TDWR sites skip precomputation.
    pub fn initialize(&self) {
        let mut initialized = self
            .initialized
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *initialized {
            return;
        }

        debug!("Initialize()");

        if self.is_tdwr() {
            *initialized = true;
            return;
        }

        let mut tables = CoordinateTables::default();

        for (radial_size, angle_offset, range_offset, label) in [
            // Far end of the first gate is the gate size distance from the
            // radar site
            (RadialSize::HalfDegree, 0.0, 1.0, "0.5 degree"),
            // Center of the first gate is half the gate size distance from
            // the radar site
            (RadialSize::HalfDegree, 0.25, 0.5, "0.5 degree smooth"),
            (RadialSize::OneDegree, 0.0, 1.0, "1 degree"),
            (RadialSize::OneDegree, 0.5, 0.5, "1 degree smooth"),
        ] {
            let start = Instant::now();
            let table = Arc::new(calculate_coordinates(
                &self.site,
                radial_size,
                angle_offset,
                range_offset,
            ));
            debug!(
                "Coordinates ({label}) calculated in {:?}",
                start.elapsed()
            );

            match (radial_size, range_offset == 0.5) {
                (RadialSize::HalfDegree, false) => tables.half_degree_edge = table,
                (RadialSize::HalfDegree, true) => tables.half_degree_center = table,
                (RadialSize::OneDegree, false) => tables.one_degree_edge = table,
                (RadialSize::OneDegree, true) => tables.one_degree_center = table,
            }
        }

        *self.tables.write().unwrap_or_else(PoisonError::into_inner) = tables;
        *initialized = true;
    }

    /// The precomputed coordinate table for the given radial spacing. The
    /// smoothed variant positions vertices at gate centers.
    pub fn coordinates(&self, radial_size: RadialSize, smoothing_enabled: bool) -> Arc<Vec<f32>> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        match (radial_size, smoothing_enabled) {
            (RadialSize::HalfDegree, false) => Arc::clone(&tables.half_degree_edge),
            (RadialSize::HalfDegree, true) => Arc::clone(&tables.half_degree_center),
            (RadialSize::OneDegree, false) => Arc::clone(&tables.one_degree_edge),
            (RadialSize::OneDegree, true) => Arc::clone(&tables.one_degree_center),
        }
    }

    fn level3_provider_manager(&self, product: &str) -> Result<Arc<ProviderManager>> {
        {
            let managers = self
                .level3_provider_managers
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(manager) = managers.get(product) {
                return Ok(Arc::clone(manager));
            }
        }

        let provider = Arc::new(ArchiveDataProvider::level3(
            &self.radar_id,
            product,
            decoder()?,
        ));
        let manager = ProviderManager::new(
            &self.radar_id,
            RadarProductGroup::Level3,
            product,
            false,
            provider as Arc<dyn DataProvider>,
            self.events.clone(),
        );

        let mut managers = self
            .level3_provider_managers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(
            managers
                .entry(product.to_string())
                .or_insert_with(|| manager),
        ))
    }

    /// Enables or disables periodic refresh of the given product for one
    /// subscriber. Level-2 refresh drives both the archive and chunked
    /// providers; Level-3 refresh is enabled only for remotely-available
    /// products.
    pub fn enable_refresh(
        self: &Arc<Self>,
        group: RadarProductGroup,
        product: &str,
        enabled: bool,
        subscriber: Uuid,
    ) {
        match group {
            RadarProductGroup::Level2 => {
                self.enable_refresh_inner(
                    subscriber,
                    vec![
                        Arc::clone(&self.level2_provider_manager),
                        Arc::clone(&self.level2_chunks_provider_manager),
                    ],
                    enabled,
                );
            }
            RadarProductGroup::Level3 => {
                let provider_manager = match self.level3_provider_manager(product) {
                    Ok(provider_manager) => provider_manager,
                    Err(err) => {
                        warn!("Could not create Level 3 provider: {err}");
                        return;
                    }
                };

                if enabled {
                    // Only enable refresh on available products
                    let this = Arc::clone(self);
                    let product = product.to_string();
                    tokio::spawn(async move {
                        provider_manager.provider.request_available_products().await;
                        let available = provider_manager.provider.available_products();

                        if available.iter().any(|available| available == &product) {
                            this.enable_refresh_inner(subscriber, vec![provider_manager], true);
                        }
                    });
                } else {
                    self.enable_refresh_inner(subscriber, vec![provider_manager], false);
                }
            }
        }
    }

    pub(crate) fn enable_refresh_inner(
        &self,
        subscriber: Uuid,
        provider_managers: Vec<Arc<ProviderManager>>,
        enabled: bool,
    ) {
        {
            let mut refresh_map = self
                .refresh_map
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            if let Some(current_managers) = refresh_map.remove(&subscriber) {
                for current in current_managers {
                    let remaining = current.remove_subscriber();

                    let still_wanted = provider_managers
                        .iter()
                        .any(|manager| Arc::ptr_eq(manager, &current));

                    // If enabling refresh for a different product, or
                    // disabling refresh, and this was the last reference to
                    // the provider in the refresh map
                    if (!still_wanted || !enabled) && remaining == 0 {
                        current.disable();
                    }
                }
            }

            if enabled {
                for provider_manager in &provider_managers {
                    provider_manager.add_subscriber();
                }
                refresh_map.insert(subscriber, provider_managers.clone());
            }
        }

        // A disable request is fully handled by this point. If enabling, and
        // the provider manager refresh isn't already enabled, enable it.
        if enabled {
            for provider_manager in provider_managers {
                if provider_manager.enable() {
                    schedule_refresh(provider_manager);
                }
            }
        }
    }

    /// All volume times known to the providers under active refresh
    /// subscriptions, queried in parallel for the day surrounding `time`.
    /// Returns an empty set when no time is given.
    pub async fn get_active_volume_times(&self, time: Option<DateTime<Utc>>) -> BTreeSet<DateTime<Utc>> {
        let Some(time) = time else {
            return BTreeSet::new();
        };

        let mut providers: Vec<Arc<dyn DataProvider>> = Vec::new();
        {
            let refresh_map = self
                .refresh_map
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            for provider_managers in refresh_map.values() {
                for provider_manager in provider_managers {
                    if !providers
                        .iter()
                        .any(|provider| Arc::ptr_eq(provider, &provider_manager.provider))
                    {
                        providers.push(Arc::clone(&provider_manager.provider));
                    }
                }
            }
        }

        let dates = query_dates(Some(time));

        let mut queries = Vec::new();
        for provider in &providers {
            for date in &dates {
                let provider = Arc::clone(provider);
                let date = *date;
                queries.push(async move { provider.get_time_points_by_date(date, true).await });
            }
        }

        futures::future::join_all(queries)
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    async fn populate_level2_product_times(&self, time: Option<DateTime<Utc>>, update: bool) {
        let provider = Arc::clone(&self.archive_provider) as Arc<dyn DataProvider>;
        let times = populate_product_times(&provider, time, update).await;

        let mut store = self
            .level2_store
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for time in times {
            store.insert_time(time);
        }
    }

    async fn populate_level3_product_times(
        &self,
        product: &str,
        time: Option<DateTime<Utc>>,
        update: bool,
    ) -> Result<()> {
        let provider_manager = self.level3_provider_manager(product)?;
        let times = populate_product_times(&provider_manager.provider, time, update).await;

        let mut stores = self
            .level3_stores
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let store = stores.entry(product.to_string()).or_default();
        for time in times {
            store.insert_time(time);
        }

        Ok(())
    }

    fn are_level2_product_times_populated(&self, time: Option<DateTime<Utc>>) -> bool {
        are_product_times_populated(self.archive_provider.as_ref(), time)
    }

    fn are_level3_product_times_populated(&self, product: &str, time: Option<DateTime<Utc>>) -> bool {
        match self.level3_provider_manager(product) {
            Ok(provider_manager) => {
                are_product_times_populated(provider_manager.provider.as_ref(), time)
            }
            Err(_) => false,
        }
    }

    /// The Level-2 records surrounding the requested time: the bounded
    /// record and its predecessor (the requested time may lie within the
    /// predecessor's volume), or the latest record when no time is given.
    /// Expired entries trigger asynchronous reloads that complete with a
    /// [`RadarEvent::DataReloaded`] notification.
    pub async fn get_level2_product_records(
        self: &Arc<Self>,
        time: Option<DateTime<Utc>>,
    ) -> Vec<Arc<RadarProductRecord>> {
        // Ensure Level 2 product records are updated
        self.populate_level2_product_times(time, true).await;

        let mut selected: Vec<(DateTime<Utc>, Option<Arc<RadarProductRecord>>)> = Vec::new();
        {
            let store = self
                .level2_store
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            let records = store.records();

            match time {
                None => {
                    if let Some((record_time, weak)) = records.iter().next_back() {
                        selected.push((*record_time, weak.upgrade()));
                    }
                }
                Some(time) => {
                    if let Some((record_time, weak)) = bounded_element(records, time) {
                        selected.push((*record_time, weak.upgrade()));

                        // The requested time may be in the previous record
                        if let Some((previous_time, previous_weak)) =
                            records.range(..*record_time).next_back()
                        {
                            selected.push((*previous_time, previous_weak.upgrade()));
                        }
                    }
                }
            }
        }

        for (record_time, record) in &selected {
            if record.is_none() {
                // Product is expired, reload it
                let this = Arc::clone(self);
                let record_time = *record_time;
                tokio::spawn(async move {
                    match this.load_level2_data(record_time).await {
                        Ok(record) => {
                            let _ = this.events.send(RadarEvent::DataReloaded { record });
                        }
                        Err(err) => warn!("Could not reload Level 2 data: {err}"),
                    }
                });
            }
        }

        selected
            .into_iter()
            .filter_map(|(_, record)| record)
            .collect()
    }

    /// Loads (or returns the cached) Level-2 record for the given time.
    pub async fn load_level2_data(
        self: &Arc<Self>,
        time: DateTime<Utc>,
    ) -> Result<Arc<RadarProductRecord>> {
        trace!("LoadLevel2Data: {time}");

        self.load_provider_data(
            time,
            Arc::clone(&self.archive_provider) as Arc<dyn DataProvider>,
            StoreKind::Level2,
        )
        .await
    }

    /// Loads (or returns the cached) Level-3 record for the given product
    /// and time.
    pub async fn load_level3_data(
        self: &Arc<Self>,
        product: &str,
        time: DateTime<Utc>,
    ) -> Result<Arc<RadarProductRecord>> {
        debug!("LoadLevel3Data: {time}");

        let provider_manager = self.level3_provider_manager(product)?;
        self.load_provider_data(
            time,
            Arc::clone(&provider_manager.provider),
            StoreKind::Level3(product.to_string()),
        )
        .await
    }

    async fn load_provider_data(
        self: &Arc<Self>,
        time: DateTime<Utc>,
        provider: Arc<dyn DataProvider>,
        kind: StoreKind,
    ) -> Result<Arc<RadarProductRecord>> {
        let lock = match kind {
            StoreKind::Level2 => &self.load_level2_lock,
            StoreKind::Level3(_) => &self.load_level3_lock,
        };
        let _guard = lock.lock().await;

        // Previously loaded data is served from the record cache
        if let Some(existing) = self.lookup_record(&kind, time) {
            trace!("Data previously loaded, loading from data cache");
            return Ok(self.store_record(existing));
        }

        let file = provider.load_object_by_time(time).await?;
        let record = Arc::new(RadarProductRecord::new(file, Some(time)));

        // Prefer the file-embedded radar id over this manager's
        let manager = if record.radar_id().is_empty() || record.radar_id() == self.radar_id {
            Arc::clone(self)
        } else {
            Self::instance(record.radar_id())?
        };
        manager.initialize();

        Ok(manager.store_record(record))
    }

    fn lookup_record(&self, kind: &StoreKind, time: DateTime<Utc>) -> Option<Arc<RadarProductRecord>> {
        let time = floor_seconds(time);

        match kind {
            StoreKind::Level2 => {
                let store = self
                    .level2_store
                    .read()
                    .unwrap_or_else(PoisonError::into_inner);
                store.records().get(&time).and_then(Weak::upgrade)
            }
            StoreKind::Level3(product) => {
                let stores = self
                    .level3_stores
                    .read()
                    .unwrap_or_else(PoisonError::into_inner);
                stores
                    .get(product)
                    .and_then(|store| store.records().get(&time))
                    .and_then(Weak::upgrade)
            }
        }
    }

    /// Installs a record into the matching record store, returning the
    /// canonical record (an existing record at the same seconds-floored time
    /// wins).
    pub fn store_record(&self, record: Arc<RadarProductRecord>) -> Arc<RadarProductRecord> {
        trace!("StoreRadarProductRecord()");

        let cache_limit = self.cache_limit();

        match record.group() {
            RadarProductGroup::Level2 => self
                .level2_store
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .store(record, cache_limit),
            RadarProductGroup::Level3 => {
                let product = record.product().to_string();
                let mut stores = self
                    .level3_stores
                    .write()
                    .unwrap_or_else(PoisonError::into_inner);
                stores.entry(product).or_default().store(record, cache_limit)
            }
        }
    }

    /// Serves a Level-2 elevation-scan query. The chunked provider is
    /// consulted first; when its data is older than ten minutes relative to
    /// the request the archive records are searched and the newest scan not
    /// newer than the requested time wins.
    pub async fn get_level2_data(
        self: &Arc<Self>,
        moment_type: MomentType,
        elevation: f32,
        time: Option<DateTime<Utc>>,
    ) -> (Option<Level2Selection>, LoadStatus) {
        let first_valid_chunk_time = time.unwrap_or_else(Utc::now) - MAX_CHUNK_DELAY;

        let mut selection: Option<Level2Selection> = None;
        let mut need_archive = true;

        // See if we have this one in the chunk provider
        let chunk_result = match time {
            Some(time) => self.chunks_provider.load_object_by_time(time).await,
            None => self.chunks_provider.load_latest_object().await,
        };
        let chunk_file = match chunk_result {
            Ok(file) => file.level2().cloned(),
            Err(err) => {
                trace!("No chunked data available: {err}");
                None
            }
        };

        if let Some(file) = chunk_file {
            if let Some((scan, elevation_cut, elevation_cuts)) =
                file.get_elevation_scan(moment_type, elevation, time)
            {
                let incoming = self.chunks_provider.current_elevation().await;
                self.set_incoming_elevation(incoming);

                if let Some(found_time) = scan.collection_time().map(floor_seconds) {
                    if found_time >= first_valid_chunk_time {
                        need_archive = false;
                    }

                    selection = Some(Level2Selection {
                        scan,
                        elevation_cut,
                        elevation_cuts,
                        time: found_time,
                    });
                }
            }
        }

        // It is not in the chunk provider (or is stale), so check the archive
        if need_archive {
            let records = self.get_level2_product_records(time).await;
            let mut from_archive = false;

            for record in records {
                let Some(file) = record.level2_file() else {
                    continue;
                };
                let Some((scan, elevation_cut, elevation_cuts)) =
                    file.get_elevation_scan(moment_type, elevation, time)
                else {
                    continue;
                };
                let Some(collection_time) = scan.collection_time().map(floor_seconds) else {
                    continue;
                };

                // Find the newest radar data, not newer than the selected time
                let better = match &selection {
                    None => true,
                    Some(current) => match time {
                        Some(time) => collection_time <= time && current.time < collection_time,
                        None => current.time < collection_time,
                    },
                };

                if better {
                    selection = Some(Level2Selection {
                        scan,
                        elevation_cut,
                        elevation_cuts,
                        time: collection_time,
                    });
                    from_archive = true;
                }
            }

            if from_archive {
                // Archive data carries no incoming elevation
                self.set_incoming_elevation(None);
            }
        }

        (selection, LoadStatus::ProductLoaded)
    }

    /// Resolves the Level-3 record for a product and time, advancing through
    /// the listing/loading state machine. Listing and reloading happen
    /// asynchronously; callers re-query on [`RadarEvent::ProductTimesPopulated`]
    /// and [`RadarEvent::DataReloaded`] notifications.
    pub async fn get_level3_product_record(
        self: &Arc<Self>,
        product: &str,
        time: Option<DateTime<Utc>>,
    ) -> (Option<Arc<RadarProductRecord>>, Option<DateTime<Utc>>, LoadStatus) {
        // Ensure Level 3 product times are updated
        if !self.are_level3_product_times_populated(product, time) {
            debug!("Level 3 product times need populated: {product}");

            let this = Arc::clone(self);
            let product = product.to_string();
            tokio::spawn(async move {
                if let Err(err) = this.populate_level3_product_times(&product, time, true).await {
                    warn!("Could not populate Level 3 product times: {err}");
                }

                let _ = this.events.send(RadarEvent::ProductTimesPopulated {
                    group: RadarProductGroup::Level3,
                    product,
                    time,
                });
            });

            return (None, time, LoadStatus::ListingProducts);
        }

        if let Err(err) = self.populate_level3_product_times(product, time, false).await {
            warn!("Could not populate Level 3 product times: {err}");
        }

        // Advance to loading product
        let mut record_pointer: Option<(DateTime<Utc>, Option<Arc<RadarProductRecord>>)> = None;
        {
            let stores = self
                .level3_stores
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(store) = stores.get(product) {
                let records = store.records();

                let entry = match time {
                    None => records.iter().next_back(),
                    Some(time) => bounded_element(records, time),
                };

                if let Some((record_time, weak)) = entry {
                    record_pointer = Some((*record_time, weak.upgrade()));
                }
            }
        }

        // Validate the record's recency before serving it
        if let Some((record_time, _)) = record_pointer {
            let valid = match time {
                // For latest data, ensure it is from the last 24 hours
                None => record_time > Utc::now() - LEVEL3_VALIDITY_WINDOW,
                // For time queries, ensure data is within 24 hours of the
                // request
                Some(time) => {
                    let delta = record_time.signed_duration_since(time);
                    delta.abs() < LEVEL3_VALIDITY_WINDOW
                }
            };

            if !valid {
                record_pointer = None;
            }
        }

        let Some((record_time, record)) = record_pointer else {
            // If the record is empty, the product is not available
            return (None, time, LoadStatus::ProductNotAvailable);
        };

        if record.is_none() {
            // Product is expired, reload it
            let this = Arc::clone(self);
            let product = product.to_string();
            tokio::spawn(async move {
                match this.load_level3_data(&product, record_time).await {
                    Ok(record) => {
                        let _ = this.events.send(RadarEvent::DataReloaded { record });
                    }
                    Err(err) => warn!("Could not reload Level 3 data: {err}"),
                }
            });

            return (None, Some(record_time), LoadStatus::LoadingProduct);
        }

        (record, Some(record_time), LoadStatus::ProductLoaded)
    }

    /// Serves a Level-3 product query: the decoded file plus the resolved
    /// record time and load status.
    pub async fn get_level3_data(
        self: &Arc<Self>,
        product: &str,
        time: Option<DateTime<Utc>>,
    ) -> (Option<Arc<Level3File>>, Option<DateTime<Utc>>, LoadStatus) {
        let (record, record_time, status) = self.get_level3_product_record(product, time).await;

        let file = record.as_ref().and_then(|record| record.level3_file().cloned());

        (file, record_time, status)
    }

    /// Requests the remotely-available Level-3 product list. Runs once; the
    /// completion is signalled with [`RadarEvent::Level3ProductsChanged`].
    pub fn update_available_products(self: &Arc<Self>) {
        {
            let mut initialized = self
                .level3_products_initialized
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            if *initialized {
                let _ = self.events.send(RadarEvent::Level3ProductsChanged);
                return;
            }

            // Although not complete here, only initialize once. The event is
            // emitted once complete.
            *initialized = true;
        }

        debug!("UpdateAvailableProducts()");

        let this = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = this.update_available_products_sync().await {
                warn!("Could not update available products: {err}");
            }
        });
    }

    async fn update_available_products_sync(&self) -> Result<()> {
        let provider_manager = self.level3_provider_manager(DEFAULT_LEVEL3_PRODUCT)?;
        provider_manager.provider.request_available_products().await;
        let products = provider_manager.provider.available_products();

        *self
            .available_level3_products
            .write()
            .unwrap_or_else(PoisonError::into_inner) = products;

        let _ = self.events.send(RadarEvent::Level3ProductsChanged);
        Ok(())
    }

    /// The remotely-available Level-3 AWIPS ids, as of the last
    /// [`RadarProductManager::update_available_products`] pass.
    pub fn available_level3_products(&self) -> Vec<String> {
        self.available_level3_products
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Loads a radar file from a local path, deduplicating repeated loads by
    /// filename.
    pub async fn load_file(path: &str, radar_hint: Option<&str>) -> Result<Arc<RadarProductRecord>> {
        debug!("LoadFile: {path}");

        {
            let index = FILE_INDEX.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = index.get(path) {
                debug!("File previously loaded, loading from file cache");
                return Ok(Arc::clone(existing));
            }
        }

        let data = tokio::fs::read(path).await?;
        let record = Self::load_nexrad_file(&data, None, radar_hint).await?;

        FILE_INDEX
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), Arc::clone(&record));

        Ok(record)
    }

    /// Loads a radar file from an in-memory byte stream.
    pub async fn load_data(data: &[u8], radar_hint: Option<&str>) -> Result<Arc<RadarProductRecord>> {
        debug!("LoadData()");

        Self::load_nexrad_file(data, None, radar_hint).await
    }

    /// The direct file-loading pipeline: decode under the global file-load
    /// lock, resolve the owning manager from the file-embedded radar id, and
    /// store the record through it.
    async fn load_nexrad_file(
        data: &[u8],
        time: Option<DateTime<Utc>>,
        radar_hint: Option<&str>,
    ) -> Result<Arc<RadarProductRecord>> {
        let _guard = FILE_LOAD_LOCK.lock().await;

        let decoder = decoder()?;
        let mut file = decoder.decode_volume(data)?;
        file.index_file();

        let record = Arc::new(RadarProductRecord::new(
            ProductFile::Level2(Arc::new(file)),
            time,
        ));

        let radar_id = if record.radar_id().is_empty() {
            radar_hint.unwrap_or_default().to_string()
        } else {
            record.radar_id().to_string()
        };

        let manager = Self::instance(&radar_id)?;
        manager.initialize();
        Ok(manager.store_record(record))
    }

    fn set_incoming_elevation(&self, elevation: Option<f32>) {
        let mut current = self
            .incoming_elevation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if *current != elevation {
            *current = elevation;
            let _ = self
                .events
                .send(RadarEvent::IncomingElevationChanged { elevation });
        }
    }

    /// Whether Level-2 product times around the given time are cached.
    pub fn level2_times_populated(&self, time: Option<DateTime<Utc>>) -> bool {
        self.are_level2_product_times_populated(time)
    }
}

impl Drop for RadarProductManager {
    fn drop(&mut self) {
        self.level2_provider_manager.disable();
        self.level2_chunks_provider_manager.disable();

        let managers = self
            .level3_provider_managers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        for provider_manager in managers.values() {
            provider_manager.disable();
        }
    }
}

/// Yesterday, today, and tomorrow around the given time (now when absent),
/// skipping dates in the future.
fn query_dates(time: Option<DateTime<Utc>>) -> Vec<NaiveDate> {
    let today = time.unwrap_or_else(Utc::now).date_naive();
    let last_queryable = Utc::now().date_naive();

    let mut dates = Vec::with_capacity(3);
    if let Some(yesterday) = today.pred_opt() {
        dates.push(yesterday);
    }
    dates.push(today);
    if let Some(tomorrow) = today.succ_opt() {
        dates.push(tomorrow);
    }

    dates.retain(|date| *date <= last_queryable);
    dates
}

/// Queries the provider for all time points surrounding `time`, listing the
/// three dates in parallel.
async fn populate_product_times(
    provider: &Arc<dyn DataProvider>,
    time: Option<DateTime<Utc>>,
    update: bool,
) -> BTreeSet<DateTime<Utc>> {
    debug!(
        "Populating product times (Update: {update}): {}, {}",
        provider.group(),
        provider.radar_id(),
    );

    let dates = query_dates(time);

    let queries = dates.into_iter().map(|date| {
        let provider = Arc::clone(provider);
        async move { provider.get_time_points_by_date(date, update).await }
    });

    futures::future::join_all(queries)
        .await
        .into_iter()
        .flatten()
        .collect()
}

/// Whether listings exist for every queryable date surrounding `time`.
fn are_product_times_populated(provider: &dyn DataProvider, time: Option<DateTime<Utc>>) -> bool {
    query_dates(time)
        .into_iter()
        .all(|date| provider.is_date_cached(date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use radarflow_data::provider::ListOutcome;
    use radarflow_model::radial::Radial;
    use radarflow_model::result::Result as ModelResult;
    use radarflow_model::volume::VolumeFile;

    struct StubDecoder;

    impl radarflow_model::decode::VolumeDecoder for StubDecoder {
        fn decode_volume(&self, _data: &[u8]) -> ModelResult<VolumeFile> {
            Ok(VolumeFile::new("KLSX", None))
        }

        fn decode_records(&self, _data: &[u8]) -> ModelResult<Vec<Radial>> {
            Ok(Vec::new())
        }

        fn decode_level3(&self, _data: &[u8]) -> ModelResult<Level3File> {
            Ok(Level3File::new("KLSX", "N0B", 153, Utc::now(), Vec::new()))
        }
    }

    struct StubProvider;

    #[async_trait]
    impl DataProvider for StubProvider {
        fn radar_id(&self) -> &str {
            "KLSX"
        }

        fn group(&self) -> RadarProductGroup {
            RadarProductGroup::Level2
        }

        fn cache_size(&self) -> usize {
            0
        }

        fn last_modified(&self) -> Option<DateTime<Utc>> {
            None
        }

        fn update_period(&self) -> Option<Duration> {
            None
        }

        fn find_key(&self, _time: DateTime<Utc>) -> Option<String> {
            None
        }

        fn find_latest_key(&self) -> Option<String> {
            None
        }

        fn find_latest_time(&self) -> Option<DateTime<Utc>> {
            None
        }

        fn is_date_cached(&self, _date: NaiveDate) -> bool {
            true
        }

        async fn list_objects(&self, _date: NaiveDate) -> ListOutcome {
            ListOutcome::failure()
        }

        async fn get_time_points_by_date(
            &self,
            _date: NaiveDate,
            _update: bool,
        ) -> Vec<DateTime<Utc>> {
            Vec::new()
        }

        async fn load_object_by_key(
            &self,
            _key: &str,
        ) -> radarflow_data::result::Result<ProductFile> {
            Err(radarflow_data::result::Error::ObjectNotFound)
        }

        async fn load_object_by_time(
            &self,
            _time: DateTime<Utc>,
        ) -> radarflow_data::result::Result<ProductFile> {
            Err(radarflow_data::result::Error::ObjectNotFound)
        }

        async fn load_latest_object(&self) -> radarflow_data::result::Result<ProductFile> {
            Err(radarflow_data::result::Error::ObjectNotFound)
        }

        async fn refresh(&self) -> (usize, usize) {
            (0, 0)
        }
    }

    fn stub_provider_manager(product: &str) -> Arc<ProviderManager> {
        let (events, _) = broadcast::channel(8);
        ProviderManager::new(
            "KLSX",
            RadarProductGroup::Level3,
            product,
            false,
            Arc::new(StubProvider) as Arc<dyn DataProvider>,
            events,
        )
    }

    fn test_manager() -> Arc<RadarProductManager> {
        crate::decoder::install_decoder(Arc::new(StubDecoder));
        RadarProductManager::instance("KLSX").unwrap()
    }

    #[tokio::test]
    async fn subscriber_reference_counting() {
        let manager = test_manager();

        let reflectivity = stub_provider_manager("REF");
        let velocity = stub_provider_manager("VEL");

        let subscriber_a = Uuid::new_v4();
        let subscriber_b = Uuid::new_v4();

        // Both subscribers enable reflectivity
        manager.enable_refresh_inner(subscriber_a, vec![Arc::clone(&reflectivity)], true);
        manager.enable_refresh_inner(subscriber_b, vec![Arc::clone(&reflectivity)], true);
        assert_eq!(reflectivity.subscriber_count(), 2);
        assert!(reflectivity.refresh_enabled());

        // Subscriber A switches to velocity: implicit release of
        // reflectivity, which stays enabled for subscriber B
        manager.enable_refresh_inner(subscriber_a, vec![Arc::clone(&velocity)], true);
        assert_eq!(reflectivity.subscriber_count(), 1);
        assert_eq!(velocity.subscriber_count(), 1);
        assert!(reflectivity.refresh_enabled());
        assert!(velocity.refresh_enabled());

        // Subscriber B disables: the last reflectivity reference disables it
        manager.enable_refresh_inner(subscriber_b, Vec::new(), false);
        assert_eq!(reflectivity.subscriber_count(), 0);
        assert!(!reflectivity.refresh_enabled());
        assert!(velocity.refresh_enabled());

        // Subscriber A disables velocity as well
        manager.enable_refresh_inner(subscriber_a, Vec::new(), false);
        assert_eq!(velocity.subscriber_count(), 0);
        assert!(!velocity.refresh_enabled());
    }

    #[tokio::test]
    async fn store_record_canonicalizes_by_time() {
        let manager = test_manager();

        let time = Utc::now();
        let file = || {
            ProductFile::Level2(Arc::new(VolumeFile::new(
                "KLSX",
                Some(floor_seconds(time)),
            )))
        };

        let first = Arc::new(RadarProductRecord::new(file(), Some(floor_seconds(time))));
        let second = Arc::new(RadarProductRecord::new(file(), Some(floor_seconds(time))));

        let stored_first = manager.store_record(Arc::clone(&first));
        let stored_second = manager.store_record(second);

        assert!(Arc::ptr_eq(&stored_first, &stored_second));
        assert!(Arc::ptr_eq(&stored_first, &first));
    }

    #[test]
    fn query_dates_skip_the_future() {
        let now = Utc::now();
        let dates = query_dates(Some(now));
        assert_eq!(dates.len(), 2);
        assert_eq!(dates[1], now.date_naive());

        let past = now - Duration::days(30);
        let dates = query_dates(Some(past));
        assert_eq!(dates.len(), 3);
    }

    #[test]
    fn cache_limit_is_clamped() {
        let manager = test_manager();
        manager.set_cache_limit(2);
        assert_eq!(manager.cache_limit(), 6);
        manager.set_cache_limit(10);
        assert_eq!(manager.cache_limit(), 10);
    }
}
