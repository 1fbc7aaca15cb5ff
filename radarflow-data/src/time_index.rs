//! Bounded-element lookups over time-ordered maps.
//!
//! The primary time-query primitive for providers and record maps: "the scan
//! in effect at time `t`" has its nominal timestamp at or just before `t`.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Returns the entry with the largest key at or before `time`. When every
/// key is after `time`, returns the first entry; when the map is empty,
/// returns `None`.
pub fn bounded_element<V>(
    map: &BTreeMap<DateTime<Utc>, V>,
    time: DateTime<Utc>,
) -> Option<(&DateTime<Utc>, &V)> {
    map.range(..=time).next_back().or_else(|| map.iter().next())
}

/// Returns the key of the bounded element for `time`, if any.
pub fn bounded_key<V>(map: &BTreeMap<DateTime<Utc>, V>, time: DateTime<Utc>) -> Option<DateTime<Utc>> {
    bounded_element(map, time).map(|(key, _)| *key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn time(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, h, m, s).unwrap()
    }

    fn map() -> BTreeMap<DateTime<Utc>, &'static str> {
        BTreeMap::from([
            (time(10, 0, 0), "k1"),
            (time(10, 4, 47), "k2"),
            (time(10, 9, 35), "k3"),
        ])
    }

    #[test]
    fn empty_map_yields_nothing() {
        let map: BTreeMap<DateTime<Utc>, ()> = BTreeMap::new();
        assert!(bounded_element(&map, time(10, 0, 0)).is_none());
    }

    #[test]
    fn selects_largest_key_at_or_before() {
        let map = map();
        assert_eq!(bounded_element(&map, time(10, 5, 0)).unwrap().1, &"k2");
        assert_eq!(bounded_element(&map, time(10, 9, 35)).unwrap().1, &"k3");
        assert_eq!(bounded_element(&map, time(23, 0, 0)).unwrap().1, &"k3");
    }

    #[test]
    fn exact_match_is_returned() {
        let map = map();
        assert_eq!(bounded_element(&map, time(10, 4, 47)).unwrap().1, &"k2");
    }

    #[test]
    fn below_minimum_falls_back_to_first() {
        let map = map();
        assert_eq!(bounded_element(&map, time(9, 0, 0)).unwrap().1, &"k1");
    }
}
