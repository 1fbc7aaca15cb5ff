//! The archive provider's time-keyed object index and its listing-date
//! cache.

use super::MIN_DATES_BEFORE_PRUNING;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use std::collections::BTreeMap;

/// A remote object known to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ObjectRecord {
    /// The object's key within the bucket.
    pub key: String,
    /// When the object was last modified, if reported by the store.
    pub last_modified: Option<DateTime<Utc>>,
}

/// All objects known to an archive provider, keyed by the time decoded from
/// each object key, alongside the dates for which listings have been
/// performed. Dates are kept in least-recently-used-first order.
#[derive(Debug, Default)]
pub(crate) struct ObjectIndex {
    pub objects: BTreeMap<DateTime<Utc>, ObjectRecord>,
    pub dates: Vec<NaiveDate>,
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

impl ObjectIndex {
    /// Inserts or replaces the object at the given time. Returns whether the
    /// time was not previously present.
    pub fn insert(&mut self, time: DateTime<Utc>, record: ObjectRecord) -> bool {
        self.objects.insert(time, record).is_none()
    }

    /// Whether a listing has been performed for the given date.
    pub fn is_date_cached(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    /// Marks the date as most recently used, adding it if absent.
    pub fn touch_date(&mut self, date: NaiveDate) {
        self.dates.retain(|cached| *cached != date);
        self.dates.push(date);
    }

    /// All object times falling on the given date.
    pub fn time_points_on(&self, date: NaiveDate) -> Vec<DateTime<Utc>> {
        let start = day_start(date);
        let end = start + Days::new(1);

        self.objects.range(start..end).map(|(time, _)| *time).collect()
    }

    /// Drops the oldest dates (and their objects) while the index exceeds
    /// its object budget and enough dates remain cached. Today and yesterday
    /// are never pruned.
    pub fn prune(&mut self, max_objects: usize, today: NaiveDate) {
        let yesterday = today.pred_opt().unwrap_or(today);

        let mut position = 0;
        while position < self.dates.len()
            && self.objects.len() > max_objects
            && self.dates.len() >= MIN_DATES_BEFORE_PRUNING
        {
            let date = self.dates[position];
            if date < yesterday {
                let start = day_start(date);
                let end = start + Days::new(1);
                self.objects.retain(|time, _| !(start..end).contains(time));

                self.dates.remove(position);
            } else {
                position += 1;
            }
        }
    }
}
