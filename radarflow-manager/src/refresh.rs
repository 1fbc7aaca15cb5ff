//! Per-provider refresh loops.
//!
//! Each provider gets a `ProviderManager` driving a periodic refresh with an
//! interval adapted to the provider's observed update period. Subscribers
//! reference-count the managers by opaque id; when the last subscriber
//! releases a manager its timer is cancelled.

use crate::event::RadarEvent;
use chrono::{DateTime, Utc};
use log::{debug, info, trace};
use radarflow_data::provider::DataProvider;
use radarflow_model::product::RadarProductGroup;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::{Mutex, Notify};

pub(crate) const FAST_RETRY_INTERVAL: Duration = Duration::from_secs(15);
pub(crate) const FAST_RETRY_INTERVAL_CHUNKS: Duration = Duration::from_secs(3);
pub(crate) const SLOW_RETRY_INTERVAL: Duration = Duration::from_secs(120);
pub(crate) const SLOW_RETRY_INTERVAL_CHUNKS: Duration = Duration::from_secs(20);

/// If the provider has not updated for this many update periods, the
/// refresh relaxes to the slow interval.
const STALE_UPDATE_PERIODS: i32 = 5;

/// Owns the refresh loop for one provider.
pub(crate) struct ProviderManager {
    radar_id: String,
    group: RadarProductGroup,
    product: String,
    is_chunks: bool,

    pub(crate) provider: Arc<dyn DataProvider>,

    refresh_enabled: AtomicBool,
    subscriber_count: AtomicUsize,
    cancel: Notify,
    refresh_lock: Mutex<()>,
    events: broadcast::Sender<RadarEvent>,
}

impl ProviderManager {
    pub fn new(
        radar_id: impl Into<String>,
        group: RadarProductGroup,
        product: impl Into<String>,
        is_chunks: bool,
        provider: Arc<dyn DataProvider>,
        events: broadcast::Sender<RadarEvent>,
    ) -> Arc<Self> {
        Arc::new(Self {
            radar_id: radar_id.into(),
            group,
            product: product.into(),
            is_chunks,
            provider,
            refresh_enabled: AtomicBool::new(false),
            subscriber_count: AtomicUsize::new(0),
            cancel: Notify::new(),
            refresh_lock: Mutex::new(()),
            events,
        })
    }

    /// Display name for log messages.
    pub fn name(&self) -> String {
        if self.group == RadarProductGroup::Level3 {
            format!("{}, {}, {}", self.radar_id, self.group, self.product)
        } else if self.is_chunks {
            format!("{}, {} chunks", self.radar_id, self.group)
        } else {
            format!("{}, {}", self.radar_id, self.group)
        }
    }

    pub fn refresh_enabled(&self) -> bool {
        self.refresh_enabled.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count.load(Ordering::SeqCst)
    }

    /// Increments the subscriber count. Call with the refresh map locked.
    pub fn add_subscriber(&self) {
        self.subscriber_count.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrements the subscriber count, returning the new count. Call with
    /// the refresh map locked.
    pub fn remove_subscriber(&self) -> usize {
        let previous = self.subscriber_count.fetch_sub(1, Ordering::SeqCst);
        previous.saturating_sub(1)
    }

    /// Marks refresh enabled, returning whether this call made the
    /// transition from disabled.
    pub fn enable(&self) -> bool {
        !self.refresh_enabled.swap(true, Ordering::SeqCst)
    }

    /// Cancels the refresh timer and clears the enabled flag. An in-flight
    /// refresh runs to completion but will not reschedule.
    pub fn disable(&self) {
        debug!("Disabling refresh: {}", self.name());

        self.refresh_enabled.store(false, Ordering::SeqCst);
        self.cancel.notify_waiters();
    }
}

/// Queues an immediate refresh cycle for the provider.
pub(crate) fn schedule_refresh(provider_manager: Arc<ProviderManager>) {
    trace!("RefreshData: {}", provider_manager.name());

    tokio::spawn(async move {
        refresh_data_sync(provider_manager).await;
    });
}

/// One refresh cycle: refresh the provider, derive the next interval, emit
/// a new-data notification if warranted, and arm the one-shot timer.
async fn refresh_data_sync(provider_manager: Arc<ProviderManager>) {
    let guard = provider_manager.refresh_lock.lock().await;

    let (new_objects, total_objects) = provider_manager.provider.refresh().await;

    let interval = compute_refresh_interval(
        provider_manager.is_chunks,
        total_objects,
        provider_manager.provider.update_period(),
        provider_manager.provider.last_modified(),
        Utc::now(),
    );

    if total_objects == 0 && provider_manager.refresh_enabled() {
        info!("[{}] No data found", provider_manager.name());
    }

    if new_objects > 0 {
        let _ = provider_manager.events.send(RadarEvent::NewDataAvailable {
            group: provider_manager.group,
            product: provider_manager.product.clone(),
            chunks: provider_manager.is_chunks,
            latest_time: provider_manager.provider.find_latest_time(),
        });
    }

    drop(guard);

    if provider_manager.refresh_enabled() {
        trace!(
            "[{}] Scheduled refresh in {:?}",
            provider_manager.name(),
            interval
        );

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if provider_manager.refresh_enabled() {
                        schedule_refresh(provider_manager);
                    }
                }
                _ = provider_manager.cancel.notified() => {
                    debug!("[{}] Data refresh timer cancelled", provider_manager.name());
                }
            }
        });
    }
}

/// Derives the next refresh interval. With objects present, the next object
/// is expected one update period after the last modification; the interval
/// is clamped to no quicker than the fast retry interval, and relaxed to the
/// slow interval when the provider has gone stale (or nothing was found).
pub(crate) fn compute_refresh_interval(
    is_chunks: bool,
    total_objects: usize,
    update_period: Option<chrono::Duration>,
    last_modified: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Duration {
    let fast = if is_chunks {
        FAST_RETRY_INTERVAL_CHUNKS
    } else {
        FAST_RETRY_INTERVAL
    };
    let slow = if is_chunks {
        SLOW_RETRY_INTERVAL_CHUNKS
    } else {
        SLOW_RETRY_INTERVAL
    };

    if total_objects == 0 {
        return slow;
    }

    let (Some(update_period), Some(last_modified)) = (update_period, last_modified) else {
        return fast;
    };

    let since_last_modified = now - last_modified;

    if update_period > chrono::Duration::zero()
        && since_last_modified > update_period * STALE_UPDATE_PERIODS
    {
        // Well past the expected update: relax until data reappears
        return slow;
    }

    match (update_period - since_last_modified).to_std() {
        Ok(interval) if interval > fast => interval,
        _ => fast,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn no_objects_uses_slow_interval() {
        assert_eq!(
            compute_refresh_interval(false, 0, None, None, now()),
            SLOW_RETRY_INTERVAL
        );
        assert_eq!(
            compute_refresh_interval(true, 0, None, None, now()),
            SLOW_RETRY_INTERVAL_CHUNKS
        );
    }

    #[test]
    fn missing_metadata_uses_fast_interval() {
        assert_eq!(
            compute_refresh_interval(false, 10, None, None, now()),
            FAST_RETRY_INTERVAL
        );
    }

    #[test]
    fn nominal_interval_predicts_next_update() {
        // Updated 100s ago with a 300s period: expect data in 200s
        let interval = compute_refresh_interval(
            false,
            10,
            Some(chrono::Duration::seconds(300)),
            Some(now() - chrono::Duration::seconds(100)),
            now(),
        );
        assert_eq!(interval, Duration::from_secs(200));
    }

    #[test]
    fn overdue_update_clamps_to_fast() {
        // Updated 310s ago with a 300s period: the nominal interval is
        // negative, clamp to fast
        let interval = compute_refresh_interval(
            false,
            10,
            Some(chrono::Duration::seconds(300)),
            Some(now() - chrono::Duration::seconds(310)),
            now(),
        );
        assert_eq!(interval, FAST_RETRY_INTERVAL);
    }

    #[test]
    fn stale_provider_relaxes_to_slow() {
        // Five update periods without a change
        let interval = compute_refresh_interval(
            true,
            10,
            Some(chrono::Duration::seconds(10)),
            Some(now() - chrono::Duration::seconds(51)),
            now(),
        );
        assert_eq!(interval, SLOW_RETRY_INTERVAL_CHUNKS);
    }
}
