//! Geodetic coordinate precompute tables.
//!
//! For WSR-88D sites the manager precomputes (latitude, longitude) pairs for
//! full radial-by-gate grids so downstream renderers can index vertex
//! positions directly. Four variants are kept: 0.5 and 1 degree radial
//! spacing, each with gate-edge and gate-center range offsets (the center
//! variant feeds smoothed rendering).

use geo::{Destination, Geodesic, Point};
use radarflow_model::site::RadarSite;
use radarflow_model::{MAX_HALF_DEGREE_RADIALS, MAX_MOMENT_GATES, MAX_ONE_DEGREE_RADIALS};
use rayon::prelude::*;
use std::sync::Arc;

/// The radial spacing of a coordinate table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RadialSize {
    /// Super-resolution 0.5 degree radials (720 per sweep).
    HalfDegree,
    /// Standard 1 degree radials (360 per sweep).
    OneDegree,
}

impl RadialSize {
    /// The number of radials in a full sweep at this spacing.
    pub fn num_radials(&self) -> u32 {
        match self {
            RadialSize::HalfDegree => MAX_HALF_DEGREE_RADIALS as u32,
            RadialSize::OneDegree => MAX_ONE_DEGREE_RADIALS as u32,
        }
    }

    /// The angular step between radials in degrees.
    pub fn step_degrees(&self) -> f32 {
        match self {
            RadialSize::HalfDegree => 0.5,
            RadialSize::OneDegree => 1.0,
        }
    }
}

/// The four precomputed tables for one radar site. Each table is interleaved
/// (latitude, longitude) pairs for radial-major, gate-minor grid order.
#[derive(Default, Clone)]
pub(crate) struct CoordinateTables {
    pub half_degree_edge: Arc<Vec<f32>>,
    pub half_degree_center: Arc<Vec<f32>>,
    pub one_degree_edge: Arc<Vec<f32>>,
    pub one_degree_center: Arc<Vec<f32>>,
}

/// WGS-84 geodesic forward solution: the point reached from the given
/// position along a bearing for a distance in meters. Returns (latitude,
/// longitude) in degrees.
pub fn destination(
    latitude: f64,
    longitude: f64,
    bearing_degrees: f64,
    distance_meters: f64,
) -> (f64, f64) {
    let point = Geodesic.destination(
        Point::new(longitude, latitude),
        bearing_degrees,
        distance_meters,
    );

    (point.y(), point.x())
}

/// Computes one coordinate table for a site: for each (radial, gate), the
/// geographic position at bearing `radial * step + angle_offset` and range
/// `(gate + gate_range_offset) * gate_size`. The grid is computed in
/// parallel.
pub(crate) fn calculate_coordinates(
    site: &RadarSite,
    radial_size: RadialSize,
    angle_offset_degrees: f32,
    gate_range_offset: f32,
) -> Vec<f32> {
    let gate_size = site.gate_size_meters();
    let latitude = site.latitude();
    let longitude = site.longitude();
    let step = radial_size.step_degrees();

    let radial_gates = radial_size.num_radials() as usize * MAX_MOMENT_GATES as usize;
    let mut coordinates = vec![0.0f32; radial_gates * 2];

    coordinates
        .par_chunks_exact_mut(2)
        .enumerate()
        .for_each(|(radial_gate, pair)| {
            let gate = (radial_gate % MAX_MOMENT_GATES as usize) as f32;
            let radial = (radial_gate / MAX_MOMENT_GATES as usize) as f32;

            let angle = radial * step + angle_offset_degrees;
            let range = (gate + gate_range_offset) * gate_size;

            let (lat, lon) = destination(latitude, longitude, angle as f64, range as f64);

            pair[0] = lat as f32;
            pair[1] = lon as f32;
        });

    coordinates
}
