//! Elevation scans: the ordered radial sets produced by one rotation of the
//! radar at a single elevation angle.

use crate::angle::angle_delta;
use crate::radial::Radial;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

/// A scan whose first-to-last azimuth gap exceeds this threshold is treated
/// as incomplete (interrupted or still being acquired).
const INCOMPLETE_ANGLE_THRESHOLD_DEGREES: f32 = 2.5;

/// All radials acquired at one elevation angle during one volume, indexed by
/// 0-based radial number. Radials are dense in a finished scan but may be
/// sparse while a chunked volume is still assembling.
#[derive(Clone, Default, PartialEq)]
pub struct ElevationScan {
    radials: BTreeMap<u16, Arc<Radial>>,
}

impl ElevationScan {
    /// Create an empty elevation scan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an elevation scan from pre-indexed radials.
    pub fn from_radials(radials: BTreeMap<u16, Arc<Radial>>) -> Self {
        Self { radials }
    }

    /// The radials comprising this scan, keyed by 0-based radial index.
    pub fn radials(&self) -> &BTreeMap<u16, Arc<Radial>> {
        &self.radials
    }

    /// Inserts a radial at the given 0-based index, replacing any existing
    /// radial at that index.
    pub fn insert_radial(&mut self, index: u16, radial: Arc<Radial>) {
        self.radials.insert(index, radial);
    }

    /// The radial at the given 0-based index.
    pub fn radial(&self, index: u16) -> Option<&Arc<Radial>> {
        self.radials.get(&index)
    }

    /// The lowest-indexed radial in the scan.
    pub fn first_radial(&self) -> Option<&Arc<Radial>> {
        self.radials.values().next()
    }

    /// The highest-indexed radial in the scan.
    pub fn last_radial(&self) -> Option<&Arc<Radial>> {
        self.radials.values().next_back()
    }

    /// The highest 0-based radial index present.
    pub fn last_radial_index(&self) -> Option<u16> {
        self.radials.keys().next_back().copied()
    }

    /// Number of radials present.
    pub fn len(&self) -> usize {
        self.radials.len()
    }

    /// Whether the scan contains no radials.
    pub fn is_empty(&self) -> bool {
        self.radials.is_empty()
    }

    /// The collection time of the scan's first radial.
    pub fn collection_time(&self) -> Option<DateTime<Utc>> {
        self.first_radial().map(|radial| radial.collection_time())
    }

    /// The elevation angle reported by the scan's first radial.
    pub fn elevation_angle_degrees(&self) -> Option<f32> {
        self.first_radial()
            .map(|radial| radial.elevation_angle_degrees())
    }

    /// Whether this scan covers a full rotation. The scan is complete when
    /// the angular gap between its first and last radials is at most 2.5
    /// degrees.
    pub fn is_complete(&self) -> bool {
        let (Some(first), Some(last)) = (self.first_radial(), self.last_radial()) else {
            return false;
        };

        angle_delta(first.azimuth_angle_degrees(), last.azimuth_angle_degrees())
            <= INCOMPLETE_ANGLE_THRESHOLD_DEGREES
    }
}

impl Debug for ElevationScan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElevationScan")
            .field("radials", &self.radials.len())
            .field("elevation_angle", &self.elevation_angle_degrees())
            .field("complete", &self.is_complete())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_with_azimuths(azimuths: &[f32]) -> ElevationScan {
        let mut scan = ElevationScan::new();
        for (index, azimuth) in azimuths.iter().enumerate() {
            let radial = Radial::new(index as u16 + 1, *azimuth, 1, 0.5, 1, 0, 212);
            scan.insert_radial(index as u16, Arc::new(radial));
        }
        scan
    }

    #[test]
    fn full_rotation_is_complete() {
        let scan = scan_with_azimuths(&[0.2, 90.0, 180.0, 270.0, 359.8]);
        assert!(scan.is_complete());
    }

    #[test]
    fn partial_rotation_is_incomplete() {
        // 8.5 degree gap between first and last azimuths
        let scan = scan_with_azimuths(&[272.0, 274.0, 276.0, 278.5, 280.5]);
        assert!(!scan.is_complete());
    }

    #[test]
    fn empty_scan_is_incomplete() {
        assert!(!ElevationScan::new().is_complete());
    }
}
