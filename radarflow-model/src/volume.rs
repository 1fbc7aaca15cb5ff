//! Assembled Level-2 volume files: elevation scans plus the per-moment,
//! per-elevation, per-time index used to serve elevation-scan queries.

use crate::decode::VolumeDecoder;
use crate::product::{MomentType, MOMENT_TYPES};
use crate::radial::Radial;
use crate::result::Result;
use crate::scan::ElevationScan;
use chrono::{DateTime, Utc};
use log::warn;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Index key granularity for elevation angles. Angles are keyed in
/// centidegrees so nearby floating-point cuts collapse to one entry.
fn centidegrees(angle: f32) -> i32 {
    (angle * 100.0).round() as i32
}

/// The scans recorded for one elevation cut, in time order.
#[derive(Clone, Debug, Default)]
struct ElevationCutIndex {
    angle: f32,
    scans: BTreeMap<DateTime<Utc>, Arc<ElevationScan>>,
}

/// An in-memory Level-2 volume file: the elevation scans decoded so far and
/// an index over them. For archive objects the file is decoded in one shot;
/// for chunked volumes radials are appended as chunks arrive and the index is
/// rebuilt with [`VolumeFile::index_file`].
#[derive(Clone, Default)]
pub struct VolumeFile {
    radar_id: String,
    start_time: Option<DateTime<Utc>>,
    scans: BTreeMap<u8, ElevationScan>,
    index: BTreeMap<MomentType, BTreeMap<i32, ElevationCutIndex>>,
}

impl VolumeFile {
    /// Create an empty volume file for the given radar site.
    pub fn new(radar_id: impl Into<String>, start_time: Option<DateTime<Utc>>) -> Self {
        Self {
            radar_id: radar_id.into(),
            start_time,
            scans: BTreeMap::new(),
            index: BTreeMap::new(),
        }
    }

    /// The radar site identifier embedded in the volume header, if any.
    pub fn radar_id(&self) -> &str {
        &self.radar_id
    }

    /// The volume start time from the file header.
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    /// Overrides the volume start time.
    pub fn set_start_time(&mut self, time: Option<DateTime<Utc>>) {
        self.start_time = time;
    }

    /// The elevation scans decoded so far, keyed by 0-based elevation index.
    pub fn scans(&self) -> &BTreeMap<u8, ElevationScan> {
        &self.scans
    }

    /// Whether no radials have been decoded yet.
    pub fn is_empty(&self) -> bool {
        self.scans.values().all(|scan| scan.is_empty())
    }

    /// The collection time of the last radial in the highest elevation scan.
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.scans
            .values()
            .next_back()
            .and_then(|scan| scan.last_radial())
            .map(|radial| radial.collection_time())
    }

    /// The elevation angle of the scan currently being assembled (the highest
    /// elevation index present).
    pub fn current_elevation_angle(&self) -> Option<f32> {
        self.scans
            .values()
            .next_back()
            .and_then(|scan| scan.elevation_angle_degrees())
    }

    /// Places a radial into its elevation scan by the radial's own 1-based
    /// elevation and azimuth numbers.
    pub fn add_radial(&mut self, radial: Radial) {
        let elevation_index = radial.elevation_number().saturating_sub(1);
        let azimuth_index = radial.azimuth_number().saturating_sub(1);

        self.scans
            .entry(elevation_index)
            .or_default()
            .insert_radial(azimuth_index, Arc::new(radial));
    }

    /// Appends additional records to this volume through the decoder seam.
    /// Call [`VolumeFile::index_file`] afterwards to refresh the index.
    pub fn load_ldm_records(&mut self, decoder: &dyn VolumeDecoder, data: &[u8]) -> Result<()> {
        for radial in decoder.decode_records(data)? {
            self.add_radial(radial);
        }

        Ok(())
    }

    /// Rebuilds the per-moment, per-elevation, per-time index from the
    /// current elevation scans.
    pub fn index_file(&mut self) {
        self.index.clear();

        for scan in self.scans.values() {
            let Some(radial0) = scan.first_radial() else {
                warn!("Empty radial data");
                continue;
            };

            let angle = radial0.elevation_angle_degrees();
            let time = radial0.collection_time();
            let shared = Arc::new(scan.clone());

            for moment_type in MOMENT_TYPES {
                if radial0.moment_block(moment_type).is_some() {
                    let cut = self
                        .index
                        .entry(moment_type)
                        .or_default()
                        .entry(centidegrees(angle))
                        .or_default();
                    cut.angle = angle;
                    cut.scans.insert(time, Arc::clone(&shared));
                }
            }
        }
    }

    /// All indexed elevation angles for the given moment type.
    pub fn elevation_cuts(&self, moment_type: MomentType) -> Vec<f32> {
        self.index
            .get(&moment_type)
            .map(|cuts| cuts.values().map(|cut| cut.angle).collect())
            .unwrap_or_default()
    }

    /// Selects the elevation scan for the given moment closest to the
    /// requested elevation angle (ties to the lower cut), then the scan with
    /// the latest time not newer than `time` (or the latest scan overall when
    /// `time` is `None`). Returns the scan, the chosen elevation cut, and all
    /// elevation cuts available for the moment.
    pub fn get_elevation_scan(
        &self,
        moment_type: MomentType,
        elevation: f32,
        time: Option<DateTime<Utc>>,
    ) -> Option<(Arc<ElevationScan>, f32, Vec<f32>)> {
        let cuts = self.index.get(&moment_type)?;

        let mut elevation_cuts = Vec::with_capacity(cuts.len());
        let mut selected: Option<&ElevationCutIndex> = None;
        let mut selected_delta = f32::INFINITY;

        for cut in cuts.values() {
            elevation_cuts.push(cut.angle);

            let delta = (cut.angle - elevation).abs();
            if delta < selected_delta {
                selected = Some(cut);
                selected_delta = delta;
            }
        }

        let cut = selected?;

        let mut elevation_scan: Option<&Arc<ElevationScan>> = None;
        let mut found_time: Option<DateTime<Utc>> = None;

        for (scan_time, scan) in &cut.scans {
            let scan_time = floor_seconds(*scan_time);
            let in_bounds = time.map_or(true, |time| scan_time <= time);

            if elevation_scan.is_none() || (in_bounds && Some(scan_time) > found_time) {
                elevation_scan = Some(scan);
                found_time = Some(scan_time);
            }
        }

        elevation_scan.map(|scan| (Arc::clone(scan), cut.angle, elevation_cuts))
    }

    /// Builds an index-only volume from `current`, completing interrupted
    /// elevation scans by stitching radials from the previous volume.
    ///
    /// For each elevation cut of `current`, the most recent scan is kept
    /// as-is when complete. An incomplete scan is merged with the same cut's
    /// earlier scan in this volume, or with `previous`'s scan at the same
    /// elevation: the new radials keep their indices from zero and the old
    /// radials are re-indexed after them in azimuth order, keeping only
    /// azimuths strictly beyond the new scan's coverage. Elevation cuts
    /// present in `previous` above `current`'s highest cut are carried over.
    pub fn merged(current: &VolumeFile, previous: Option<&VolumeFile>) -> VolumeFile {
        let mut merged = VolumeFile::new(current.radar_id.clone(), current.start_time);

        for (moment_type, cuts) in &current.index {
            for (key, cut) in cuts {
                let Some((most_recent_time, most_recent)) = cut.scans.iter().next_back() else {
                    continue;
                };

                let scan = if most_recent.is_complete() {
                    Arc::clone(most_recent)
                } else {
                    // Prefer an earlier scan at this cut from the same volume
                    let earlier = cut
                        .scans
                        .iter()
                        .rev()
                        .nth(1)
                        .map(|(_, scan)| Arc::clone(scan))
                        .or_else(|| {
                            previous.and_then(|previous| {
                                previous
                                    .get_elevation_scan(*moment_type, cut.angle, None)
                                    .map(|(scan, _, _)| scan)
                            })
                        });

                    match earlier {
                        Some(earlier) => merge_scans(most_recent, &earlier),
                        None => Arc::clone(most_recent),
                    }
                };

                let entry = merged
                    .index
                    .entry(*moment_type)
                    .or_default()
                    .entry(*key)
                    .or_default();
                entry.angle = cut.angle;
                entry.scans.insert(*most_recent_time, scan);
            }
        }

        if let Some(previous) = previous {
            for (moment_type, cuts) in &previous.index {
                // Carry over only cuts above the current volume's highest,
                // with a slight offset for a stable floating point compare
                let highest_current = merged
                    .index
                    .get(moment_type)
                    .and_then(|cuts| cuts.values().next_back())
                    .map(|cut| cut.angle + 0.01)
                    .unwrap_or(-90.0);

                for (key, cut) in cuts {
                    if cut.angle <= highest_current {
                        continue;
                    }

                    let Some((time, scan)) = cut.scans.iter().next_back() else {
                        continue;
                    };

                    let entry = merged
                        .index
                        .entry(*moment_type)
                        .or_default()
                        .entry(*key)
                        .or_default();
                    entry.angle = cut.angle;
                    entry.scans.insert(*time, Arc::clone(scan));
                }
            }
        }

        merged
    }
}

impl Debug for VolumeFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeFile")
            .field("radar_id", &self.radar_id)
            .field("start_time", &self.start_time)
            .field("scans", &self.scans.len())
            .finish()
    }
}

/// Truncates a time point to seconds precision.
pub fn floor_seconds(time: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(time.timestamp(), 0).unwrap_or(time)
}

/// Merges an incomplete scan with an earlier scan of the same elevation. The
/// new scan's radials keep their indices starting at zero; the old scan's
/// radials continue after them, re-indexed in azimuth order so the combined
/// scan sweeps monotonically. Radials whose azimuth falls inside the new
/// scan's coverage are dropped, with strict comparisons at the boundaries.
fn merge_scans(new_scan: &Arc<ElevationScan>, old_scan: &Arc<ElevationScan>) -> Arc<ElevationScan> {
    let (Some(first), Some(last)) = (new_scan.first_radial(), new_scan.last_radial()) else {
        return Arc::clone(old_scan);
    };

    let lowest_azimuth = first.azimuth_angle_degrees();
    let highest_azimuth = last.azimuth_angle_degrees();

    let mut combined = ElevationScan::new();
    for (index, radial) in new_scan.radials() {
        combined.insert_radial(*index, Arc::clone(radial));
    }

    let mut index = new_scan.last_radial_index().map(|i| i + 1).unwrap_or(0);

    // Sort the old radials by azimuth; ordering the remainder of the sweep is
    // then a matter of two linear passes
    let mut old_radials: Vec<(f32, Arc<Radial>)> = old_scan
        .radials()
        .values()
        .map(|radial| (radial.azimuth_angle_degrees(), Arc::clone(radial)))
        .collect();
    old_radials.sort_by(|a, b| a.0.total_cmp(&b.0));

    if lowest_azimuth <= highest_azimuth {
        // The new scan does not cross 0/360: first the old radials beyond the
        // new coverage, then those before it
        for (azimuth, radial) in &old_radials {
            if *azimuth > highest_azimuth {
                combined.insert_radial(index, Arc::clone(radial));
                index += 1;
            }
        }
        for (azimuth, radial) in &old_radials {
            if *azimuth < lowest_azimuth {
                combined.insert_radial(index, Arc::clone(radial));
                index += 1;
            } else {
                break;
            }
        }
    } else {
        // The new scan crosses 0/360; the remaining old radials are already
        // in sweep order
        for (azimuth, radial) in &old_radials {
            if *azimuth > highest_azimuth && *azimuth < lowest_azimuth {
                combined.insert_radial(index, Arc::clone(radial));
                index += 1;
            }
        }
    }

    Arc::new(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moment::{GateData, MomentBlock};
    use chrono::TimeZone;

    fn radial(azimuth_number: u16, azimuth: f32, elevation_number: u8, angle: f32) -> Radial {
        Radial::new(azimuth_number, azimuth, elevation_number, angle, 19_723, 0, 212).with_moment(
            MomentType::Reflectivity,
            MomentBlock::new(2, 0, 250, 2.0, 66.0, 16, GateData::Eight(vec![50, 60])),
        )
    }

    fn volume_with_cuts(cuts: &[(u8, f32)]) -> VolumeFile {
        let mut file = VolumeFile::new("KLSX", None);
        for (elevation_number, angle) in cuts {
            for azimuth_number in 1..=4u16 {
                let azimuth = (azimuth_number - 1) as f32 * 90.0;
                file.add_radial(radial(azimuth_number, azimuth, *elevation_number, *angle));
            }
        }
        file.index_file();
        file
    }

    #[test]
    fn closest_cut_selection_ties_to_lower() {
        let file = volume_with_cuts(&[(1, 0.5), (2, 1.5), (3, 2.5)]);

        let (_, cut, cuts) = file
            .get_elevation_scan(MomentType::Reflectivity, 1.0, None)
            .unwrap();

        // 1.0 is equidistant from 0.5 and 1.5
        assert_eq!(cut, 0.5);
        assert_eq!(cuts, vec![0.5, 1.5, 2.5]);

        let (_, cut, _) = file
            .get_elevation_scan(MomentType::Reflectivity, 2.4, None)
            .unwrap();
        assert_eq!(cut, 2.5);
    }

    #[test]
    fn unknown_moment_yields_nothing() {
        let file = volume_with_cuts(&[(1, 0.5)]);
        assert!(file
            .get_elevation_scan(MomentType::Velocity, 0.5, None)
            .is_none());
    }

    #[test]
    fn time_selection_prefers_latest_not_newer() {
        let mut file = VolumeFile::new("KLSX", None);

        // A split cut: two sweeps at the same 0.5 degree angle, one hour
        // apart, held in separate elevation slots
        for (elevation_number, time_ms) in [(1u8, 0u32), (2, 3_600_000)] {
            for azimuth_number in 1..=4u16 {
                let azimuth = (azimuth_number - 1) as f32 * 90.0;
                let radial = Radial::new(
                    azimuth_number,
                    azimuth,
                    elevation_number,
                    0.5,
                    19_723,
                    time_ms,
                    212,
                )
                .with_moment(
                    MomentType::Reflectivity,
                    MomentBlock::new(2, 0, 250, 2.0, 66.0, 16, GateData::Eight(vec![50, 60])),
                );
                file.add_radial(radial);
            }
        }
        file.index_file();

        let midnight = Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap();

        // Both sweeps collapse into one cut with two time entries; a request
        // between them selects the earlier sweep
        let (scan, _, cuts) = file
            .get_elevation_scan(
                MomentType::Reflectivity,
                0.5,
                Some(midnight + chrono::Duration::minutes(30)),
            )
            .unwrap();
        assert_eq!(cuts.len(), 1);
        assert_eq!(scan.collection_time(), Some(midnight));

        // A latest-available request selects the later sweep
        let (scan, _, _) = file
            .get_elevation_scan(MomentType::Reflectivity, 0.5, None)
            .unwrap();
        assert_eq!(
            scan.collection_time(),
            Some(midnight + chrono::Duration::hours(1))
        );
    }

    #[test]
    fn merge_reindexes_old_radials_after_new() {
        // New (incomplete) scan covers 272 -> 280.5 degrees
        let mut new_scan = ElevationScan::new();
        for (index, azimuth) in [272.0f32, 274.0, 276.5, 278.0, 280.5].iter().enumerate() {
            new_scan.insert_radial(index as u16, Arc::new(radial(index as u16 + 1, *azimuth, 1, 0.5)));
        }

        // Old scan covers the full rotation at 2 degree spacing
        let mut old_scan = ElevationScan::new();
        for index in 0..180u16 {
            let azimuth = (index as f32 * 2.0 + 281.0) % 360.0;
            old_scan.insert_radial(index, Arc::new(radial(index + 1, azimuth, 1, 0.5)));
        }

        let new_scan = Arc::new(new_scan);
        let old_scan = Arc::new(old_scan);
        let combined = merge_scans(&new_scan, &old_scan);

        // New radials keep their indices
        for index in 0..5u16 {
            assert_eq!(
                combined.radial(index).unwrap().azimuth_angle_degrees(),
                new_scan.radial(index).unwrap().azimuth_angle_degrees()
            );
        }

        // Old radials continue after the new ones in sweep order
        assert!(combined.len() > new_scan.len());
        let mut previous = combined.radial(5).unwrap().azimuth_angle_degrees();
        assert!(previous > 280.5);
        for index in 6..combined.len() as u16 {
            let azimuth = combined.radial(index).unwrap().azimuth_angle_degrees();
            let unwrapped = if azimuth < previous {
                azimuth + 360.0
            } else {
                azimuth
            };
            assert!(unwrapped >= previous);
            previous = azimuth;
        }

        // No old radial inside the new scan's coverage survives
        for radial in combined.radials().values().skip(5) {
            let azimuth = radial.azimuth_angle_degrees();
            assert!(!(272.0..=280.5).contains(&azimuth));
        }
    }

    #[test]
    fn merged_volume_completes_incomplete_cut_from_previous() {
        // Current volume has one incomplete cut
        let mut current = VolumeFile::new("KLSX", None);
        for (index, azimuth) in [272.0f32, 276.0, 280.5].iter().enumerate() {
            current.add_radial(radial(index as u16 + 1, *azimuth, 1, 0.5));
        }
        current.index_file();

        // Previous volume has a complete rotation at the same cut plus a
        // higher cut
        let mut previous = VolumeFile::new("KLSX", None);
        for index in 0..120u16 {
            let azimuth = (index as f32 * 3.0 + 281.0) % 360.0;
            previous.add_radial(radial(index + 1, azimuth, 1, 0.5));
            previous.add_radial(radial(index + 1, azimuth, 2, 1.5));
        }
        previous.index_file();

        let merged = VolumeFile::merged(&current, Some(&previous));

        let (scan, cut, cuts) = merged
            .get_elevation_scan(MomentType::Reflectivity, 0.5, None)
            .unwrap();
        assert_eq!(cut, 0.5);
        assert!(scan.len() > 3);

        // The higher cut from the previous volume is carried over
        assert_eq!(cuts, vec![0.5, 1.5]);
    }
}
