//! Time-indexed record maps with a bounded strong-reference sidelist.

use crate::record::RadarProductRecord;
use chrono::{DateTime, Utc};
use log::debug;
use radarflow_model::volume::floor_seconds;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Weak};

/// A map of known scan times to weakly-held records. A weak entry marks that
/// a scan existed at that time; the strong handle may have been evicted.
pub(crate) type RecordMap = BTreeMap<DateTime<Utc>, Weak<RadarProductRecord>>;

/// One product's record map plus its recent-records sidelist. The sidelist
/// is the sole strong-reference store: once a record falls off its tail,
/// only weak refs remain in the map and the next lookup reloads it.
#[derive(Default)]
pub(crate) struct RecordStore {
    records: RecordMap,
    recent: VecDeque<Arc<RadarProductRecord>>,
}

impl RecordStore {
    /// The time-indexed record map.
    pub fn records(&self) -> &RecordMap {
        &self.records
    }

    /// Marks that a scan exists remotely at the given time without loading
    /// it. Existing entries are left untouched.
    pub fn insert_time(&mut self, time: DateTime<Utc>) {
        self.records.entry(floor_seconds(time)).or_default();
    }

    /// Stores a record keyed by its seconds-floored time. When a live record
    /// already exists at that time, the existing record is returned and the
    /// new one dropped (deduplication by time identity). The returned
    /// canonical record is moved to the front of the sidelist.
    pub fn store(
        &mut self,
        record: Arc<RadarProductRecord>,
        cache_limit: usize,
    ) -> Arc<RadarProductRecord> {
        let time = floor_seconds(record.time());

        let stored = match self.records.get(&time).and_then(Weak::upgrade) {
            Some(existing) => {
                debug!("Product previously loaded, using cached record");
                existing
            }
            None => {
                self.records.insert(time, Arc::downgrade(&record));
                record
            }
        };

        self.update_recent(Arc::clone(&stored), cache_limit);
        stored
    }

    /// Moves the record to the front of the sidelist (inserting it if
    /// absent) and trims the tail to the cache limit.
    fn update_recent(&mut self, record: Arc<RadarProductRecord>, cache_limit: usize) {
        match self
            .recent
            .iter()
            .position(|recent| Arc::ptr_eq(recent, &record))
        {
            Some(0) => {}
            Some(position) => {
                self.recent.remove(position);
                self.recent.push_front(record);
            }
            None => self.recent.push_front(record),
        }

        self.recent.truncate(cache_limit);
    }

    /// Number of strongly-held recent records.
    #[cfg(test)]
    pub fn recent_len(&self) -> usize {
        self.recent.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use radarflow_model::decode::ProductFile;
    use radarflow_model::volume::VolumeFile;

    fn record(time: DateTime<Utc>) -> Arc<RadarProductRecord> {
        let file = ProductFile::Level2(Arc::new(VolumeFile::new("KLSX", Some(time))));
        Arc::new(RadarProductRecord::new(file, Some(time)))
    }

    fn time(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, h, m, s).unwrap()
    }

    #[test]
    fn store_installs_weak_entry_and_strong_recent() {
        let mut store = RecordStore::default();
        let record = record(time(10, 9, 35));

        let stored = store.store(Arc::clone(&record), 6);
        assert!(Arc::ptr_eq(&stored, &record));
        assert_eq!(store.recent_len(), 1);
        assert_eq!(store.records().len(), 1);

        let weak = store.records().values().next().unwrap();
        assert!(weak.upgrade().is_some());
    }

    #[test]
    fn store_deduplicates_by_seconds_floored_time() {
        let mut store = RecordStore::default();
        let first = record(time(10, 0, 0));
        let duplicate = record(time(10, 0, 0));

        let stored_first = store.store(Arc::clone(&first), 6);
        let stored_second = store.store(Arc::clone(&duplicate), 6);

        assert!(Arc::ptr_eq(&stored_first, &stored_second));
        assert_eq!(store.recent_len(), 1);
        assert_eq!(store.records().len(), 1);
    }

    #[test]
    fn sidelist_is_bounded_and_unique() {
        let mut store = RecordStore::default();

        let records: Vec<_> = (0..10).map(|i| record(time(10, i, 0))).collect();
        for record in &records {
            store.store(Arc::clone(record), 6);
        }
        assert_eq!(store.recent_len(), 6);

        // Re-storing an existing record moves it to the front without
        // growing the list
        store.store(Arc::clone(&records[9]), 6);
        assert_eq!(store.recent_len(), 6);

        // The oldest records fell off the sidelist; their map entries are
        // expired unless another strong ref exists
        drop(records);
        let expired = store
            .records()
            .values()
            .filter(|weak| weak.upgrade().is_none())
            .count();
        assert_eq!(expired, 4);
    }

    #[test]
    fn insert_time_does_not_displace_live_records() {
        let mut store = RecordStore::default();
        let record = record(time(10, 4, 47));
        store.store(Arc::clone(&record), 6);

        store.insert_time(time(10, 4, 47));
        assert!(store
            .records()
            .get(&time(10, 4, 47))
            .and_then(Weak::upgrade)
            .is_some());

        store.insert_time(time(10, 9, 35));
        assert_eq!(store.records().len(), 2);
        assert!(store
            .records()
            .get(&time(10, 9, 35))
            .and_then(Weak::upgrade)
            .is_none());
    }
}
