//! Radials: single-beam samples carrying per-moment gate data.

use crate::moment::MomentBlock;
use crate::product::MomentType;
use chrono::{DateTime, Duration, Utc};
use std::fmt::Debug;

/// A single radar ray at one (azimuth, elevation) pair. Contains the moment
/// data blocks collected for each range gate along the beam.
#[derive(Clone, PartialEq)]
pub struct Radial {
    azimuth_number: u16,
    azimuth_angle_degrees: f32,
    elevation_number: u8,
    elevation_angle_degrees: f32,
    modified_julian_date: u32,
    collection_time_ms: u32,
    volume_coverage_pattern: u16,

    reflectivity: Option<MomentBlock>,
    velocity: Option<MomentBlock>,
    spectrum_width: Option<MomentBlock>,
    differential_reflectivity: Option<MomentBlock>,
    differential_phase: Option<MomentBlock>,
    correlation_coefficient: Option<MomentBlock>,
    clutter_filter_power: Option<MomentBlock>,
}

impl Radial {
    /// Create a new radial with the given properties and no moment data.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        azimuth_number: u16,
        azimuth_angle_degrees: f32,
        elevation_number: u8,
        elevation_angle_degrees: f32,
        modified_julian_date: u32,
        collection_time_ms: u32,
        volume_coverage_pattern: u16,
    ) -> Self {
        Self {
            azimuth_number,
            azimuth_angle_degrees,
            elevation_number,
            elevation_angle_degrees,
            modified_julian_date,
            collection_time_ms,
            volume_coverage_pattern,
            reflectivity: None,
            velocity: None,
            spectrum_width: None,
            differential_reflectivity: None,
            differential_phase: None,
            correlation_coefficient: None,
            clutter_filter_power: None,
        }
    }

    /// Attaches a moment data block to this radial, replacing any existing
    /// block of the same type.
    pub fn with_moment(mut self, moment_type: MomentType, block: MomentBlock) -> Self {
        match moment_type {
            MomentType::Reflectivity => self.reflectivity = Some(block),
            MomentType::Velocity => self.velocity = Some(block),
            MomentType::SpectrumWidth => self.spectrum_width = Some(block),
            MomentType::DifferentialReflectivity => self.differential_reflectivity = Some(block),
            MomentType::DifferentialPhase => self.differential_phase = Some(block),
            MomentType::CorrelationCoefficient => self.correlation_coefficient = Some(block),
            MomentType::ClutterFilterPower => self.clutter_filter_power = Some(block),
        }
        self
    }

    /// The 1-based index of this radial's azimuth in the elevation sweep,
    /// ranging up to 720 depending on the azimuthal resolution.
    pub fn azimuth_number(&self) -> u16 {
        self.azimuth_number
    }

    /// Azimuth angle this radial's data was collected at, in degrees
    /// `[0, 360)`.
    pub fn azimuth_angle_degrees(&self) -> f32 {
        self.azimuth_angle_degrees
    }

    /// The 1-based index of this radial's elevation in the volume scan.
    pub fn elevation_number(&self) -> u8 {
        self.elevation_number
    }

    /// Elevation angle this radial's data was collected at, in degrees.
    pub fn elevation_angle_degrees(&self) -> f32 {
        self.elevation_angle_degrees
    }

    /// The modified Julian date of collection (day 1 = January 1, 1970).
    pub fn modified_julian_date(&self) -> u32 {
        self.modified_julian_date
    }

    /// Milliseconds past midnight UTC at collection.
    pub fn collection_time_ms(&self) -> u32 {
        self.collection_time_ms
    }

    /// The volume coverage pattern number in effect during collection.
    pub fn volume_coverage_pattern(&self) -> u16 {
        self.volume_coverage_pattern
    }

    /// The collection time for this radial and its data.
    pub fn collection_time(&self) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
            + Duration::days(self.modified_julian_date.saturating_sub(1) as i64)
            + Duration::milliseconds(self.collection_time_ms as i64)
    }

    /// The moment data block of the given type, if present.
    pub fn moment_block(&self, moment_type: MomentType) -> Option<&MomentBlock> {
        match moment_type {
            MomentType::Reflectivity => self.reflectivity.as_ref(),
            MomentType::Velocity => self.velocity.as_ref(),
            MomentType::SpectrumWidth => self.spectrum_width.as_ref(),
            MomentType::DifferentialReflectivity => self.differential_reflectivity.as_ref(),
            MomentType::DifferentialPhase => self.differential_phase.as_ref(),
            MomentType::CorrelationCoefficient => self.correlation_coefficient.as_ref(),
            MomentType::ClutterFilterPower => self.clutter_filter_power.as_ref(),
        }
    }
}

impl Debug for Radial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Radial")
            .field("azimuth_number", &self.azimuth_number)
            .field("azimuth_angle_degrees", &self.azimuth_angle_degrees)
            .field("elevation_number", &self.elevation_number)
            .field("elevation_angle_degrees", &self.elevation_angle_degrees)
            .field("collection_time", &self.collection_time())
            .field("volume_coverage_pattern", &self.volume_coverage_pattern)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moment::GateData;
    use chrono::TimeZone;

    #[test]
    fn collection_time_from_julian_date() {
        // Day 1 is January 1, 1970
        let radial = Radial::new(1, 0.5, 1, 0.5, 1, 3_600_000, 212);
        assert_eq!(
            radial.collection_time(),
            Utc.with_ymd_and_hms(1970, 1, 1, 1, 0, 0).unwrap()
        );

        let radial = Radial::new(1, 0.5, 1, 0.5, 19_723, 43_200_500, 212);
        let time = radial.collection_time();
        assert_eq!(
            time.date_naive(),
            Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0)
                .unwrap()
                .date_naive()
        );
    }

    #[test]
    fn moment_blocks_are_addressable_by_type() {
        let block = MomentBlock::new(2, 0, 250, 2.0, 66.0, 16, GateData::Eight(vec![10, 20]));
        let radial =
            Radial::new(1, 0.5, 1, 0.5, 1, 0, 212).with_moment(MomentType::Velocity, block);

        assert!(radial.moment_block(MomentType::Velocity).is_some());
        assert!(radial.moment_block(MomentType::Reflectivity).is_none());
    }
}
