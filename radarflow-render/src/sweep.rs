//! The sweep computation pipeline.
//!
//! Converts one polar elevation scan into a triangle strip of geographic
//! (latitude, longitude) vertices with per-vertex raw moment values. In
//! non-smoothed mode each gate quad replicates a single value across its six
//! vertices and the innermost gate draws an origin triangle from the radar
//! site; in smoothed mode the quad's four corners carry four distinct
//! values, shifted half a bin toward gate centers so the renderer
//! interpolates bilinearly.

use crate::result::{Error, Result};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use radarflow_manager::coordinates::destination;
use radarflow_model::angle::normalize_degrees;
use radarflow_model::product::MomentType;
use radarflow_model::radial::Radial;
use radarflow_model::scan::ElevationScan;
use radarflow_model::site::RadarSite;
use radarflow_model::{MAX_HALF_DEGREE_RADIALS, MAX_MOMENT_GATES, RANGE_FOLDED};
use rayon::prelude::*;
use std::sync::Arc;

const VERTICES_PER_GATE: usize = 6;
const VERTICES_PER_ORIGIN_GATE: usize = 3;
const VALUES_PER_VERTEX: usize = 2;

/// When a radial's neighbors are missing, assume a half degree azimuthal
/// spacing.
const DEFAULT_AZIMUTH_DELTA: f32 = 0.5;

/// Sweep computation flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOptions {
    /// Shift gate quads to bin centers and give each corner its own value.
    pub smoothing_enabled: bool,
    /// Preserve range-folded codes through smoothing instead of treating
    /// them as absent data.
    pub show_smoothed_range_folding: bool,
}

/// Per-vertex raw moment values, 8- or 16-bit to match the scan's data word
/// size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MomentBuffer {
    /// 8-bit data words.
    Eight(Vec<u8>),
    /// 16-bit data words.
    Sixteen(Vec<u16>),
}

impl MomentBuffer {
    fn for_word_size(word_size: u8) -> Self {
        if word_size == 8 {
            MomentBuffer::Eight(Vec::new())
        } else {
            MomentBuffer::Sixteen(Vec::new())
        }
    }

    fn push(&mut self, value: u16) {
        match self {
            MomentBuffer::Eight(values) => values.push(value as u8),
            MomentBuffer::Sixteen(values) => values.push(value),
        }
    }

    /// Number of per-vertex values stored.
    pub fn len(&self) -> usize {
        match self {
            MomentBuffer::Eight(values) => values.len(),
            MomentBuffer::Sixteen(values) => values.len(),
        }
    }

    /// Whether no values are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The value at the given vertex index, widened to `u16`.
    pub fn value(&self, index: usize) -> Option<u16> {
        match self {
            MomentBuffer::Eight(values) => values.get(index).map(|value| *value as u16),
            MomentBuffer::Sixteen(values) => values.get(index).copied(),
        }
    }
}

/// The outputs of one sweep computation, consumed by the downstream
/// renderer.
#[derive(Debug, Clone)]
pub struct SweepBuffers {
    /// Interleaved (latitude, longitude) coordinates, two floats per vertex.
    pub vertices: Vec<f32>,
    /// Raw moment values, one per vertex.
    pub moments: MomentBuffer,
    /// Clutter-filter-power values aligned with the moment buffer
    /// (reflectivity only, non-smoothed mode).
    pub cfp_moments: Option<Vec<u8>>,
    /// The collection time of the scan's first radial.
    pub sweep_time: Option<DateTime<Utc>>,
    /// The volume coverage pattern in effect.
    pub vcp: Option<u16>,
    /// The range to the far edge of the last gate, in meters.
    pub range_meters: f32,
}

/// Computes sweeps, reusing its coordinate scratch buffer between scans.
#[derive(Default)]
pub struct SweepComputer {
    coordinates: Vec<f32>,
}

impl SweepComputer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the sweep pipeline for one elevation scan.
    pub fn compute(
        &mut self,
        scan: &ElevationScan,
        moment_type: MomentType,
        site: &RadarSite,
        options: SweepOptions,
    ) -> Result<SweepBuffers> {
        let radial0 = scan.first_radial().ok_or(Error::InvalidData)?;
        let moment0 = radial0.moment_block(moment_type).ok_or_else(|| {
            warn!("No moment data for {moment_type:?}");
            Error::InvalidData
        })?;

        let last_index = scan.last_radial_index().ok_or(Error::InvalidData)? as usize;
        let mut radials = last_index + 1;
        let mut vertex_radials = radials;

        // When the scan was interrupted, add an empty vertex radial at the
        // end to avoid stretching the last wedge across the gap
        if !scan.is_complete() {
            vertex_radials += 1;
        }

        radials = radials.min(MAX_HALF_DEGREE_RADIALS as usize);
        vertex_radials = vertex_radials.min(MAX_HALF_DEGREE_RADIALS as usize);

        self.compute_coordinates(scan, site, vertex_radials, options.smoothing_enabled);

        let gates = moment0.gate_count() as usize;
        let word_size = moment0.data_word_size();
        let gate_size_meters = site.gate_size_meters() as i32;

        let snr_threshold = moment0.snr_threshold_raw().max(2) as u16;

        // For most products other than reflectivity, the edge should not go
        // to the bottom of the color table
        let edge_value = edge_value(moment_type, moment0.offset());

        let with_cfp = moment_type == MomentType::Reflectivity
            && !options.smoothing_enabled
            && radial0.moment_block(MomentType::ClutterFilterPower).is_some();

        let mut vertices: Vec<f32> =
            Vec::with_capacity(vertex_radials * gates * VERTICES_PER_GATE * VALUES_PER_VERTEX);
        let mut moments = MomentBuffer::for_word_size(word_size);
        let mut cfp_moments: Vec<u8> = Vec::new();

        let radial_entries: Vec<(&u16, &Arc<Radial>)> = scan.radials().iter().collect();

        for (entry_index, (radial_index, radial)) in radial_entries.iter().enumerate() {
            let radial_index = **radial_index as usize;
            if radial_index >= radials {
                break;
            }

            let Some(moment_block) = radial.moment_block(moment_type) else {
                warn!("Radial {radial_index} has no moment data");
                continue;
            };

            if moment_block.data_word_size() != word_size {
                warn!("Radial {radial_index} has different word size");
                continue;
            }

            // Compute gate interval and range [start_gate, end_gate)
            let interval = moment_block.sample_interval_raw();
            let interval_h = interval / 2;
            let range_raw = moment_block.data_moment_range_raw().max(interval_h);

            // Number of base gates per data bin
            let gate_size = (interval / gate_size_meters).max(1);

            let mut start_gate = (range_raw - interval_h) / gate_size_meters;
            let num_gates = (moment_block.gate_count() as i32).min(gates as i32);
            let end_gate =
                (start_gate + num_gates * gate_size).min(MAX_MOMENT_GATES as i32);

            // The next radial participates in smoothed quads
            let next_radial = if options.smoothing_enabled {
                let next_entry = radial_entries
                    .get(entry_index + 1)
                    .or_else(|| radial_entries.first());
                next_entry.map(|(_, radial)| *radial)
            } else {
                None
            };

            let next_moment_block = next_radial
                .and_then(|radial| radial.moment_block(moment_type));
            let num_next_gates = next_moment_block
                .map(|block| (block.gate_count() as i32).min(gates as i32))
                .unwrap_or(0);

            if options.smoothing_enabled {
                match next_moment_block {
                    Some(block) if block.data_word_size() == word_size => {}
                    _ => {
                        // Data should be consistent between radials
                        warn!("Invalid data moment size");
                        continue;
                    }
                }

                // Smoothing skips the radar site origin
                start_gate += 1;
            }

            let cfp_block = if with_cfp {
                radial.moment_block(MomentType::ClutterFilterPower)
            } else {
                None
            };

            let mut gate = start_gate;
            let mut i = 0usize;
            while gate + gate_size <= end_gate {
                if !options.smoothing_enabled {
                    let Some(value) = moment_block.raw_value(i) else {
                        break;
                    };

                    // Any bin below the threshold is suppressed, except the
                    // range-folded sentinel
                    if value < snr_threshold && value != RANGE_FOLDED {
                        gate += gate_size;
                        i += 1;
                        continue;
                    }

                    let vertex_count = if gate > 0 {
                        VERTICES_PER_GATE
                    } else {
                        VERTICES_PER_ORIGIN_GATE
                    };

                    for _ in 0..vertex_count {
                        moments.push(value);
                        if let Some(cfp_block) = cfp_block {
                            cfp_moments.push(cfp_block.raw_value(i).unwrap_or(0) as u8);
                        }
                    }

                    self.emit_gate_vertices(
                        &mut vertices,
                        site,
                        radial_index,
                        vertex_radials,
                        gate,
                        gate_size,
                    );
                } else {
                    // Validate indices are all in range
                    if i as i32 + 1 >= num_gates || i as i32 + 1 >= num_next_gates {
                        gate += gate_size;
                        i += 1;
                        continue;
                    }

                    let (Some(next_block), Some(dm1), Some(dm2)) = (
                        next_moment_block,
                        moment_block.raw_value(i),
                        moment_block.raw_value(i + 1),
                    ) else {
                        break;
                    };
                    let (Some(dm3), Some(dm4)) =
                        (next_block.raw_value(i), next_block.raw_value(i + 1))
                    else {
                        break;
                    };

                    if quad_is_hidden(
                        [dm1, dm2, dm3, dm4],
                        snr_threshold,
                        options.show_smoothed_range_folding,
                    ) {
                        gate += gate_size;
                        i += 1;
                        continue;
                    }

                    // The order must match the stored vertices below
                    for value in [dm1, dm2, dm4, dm1, dm3, dm4] {
                        moments.push(remap_moment(
                            value,
                            edge_value,
                            options.show_smoothed_range_folding,
                        ));
                    }

                    self.emit_gate_vertices(
                        &mut vertices,
                        site,
                        radial_index,
                        vertex_radials,
                        gate,
                        gate_size,
                    );
                }

                gate += gate_size;
                i += 1;
            }
        }

        debug_assert_eq!(moments.len() * VALUES_PER_VERTEX, vertices.len());

        let range_meters = moment0.data_moment_range_raw() as f32
            + moment0.sample_interval_raw() as f32 * (gates as f32 - 0.5);

        Ok(SweepBuffers {
            vertices,
            moments,
            cfp_moments: if with_cfp { Some(cfp_moments) } else { None },
            sweep_time: scan.collection_time(),
            vcp: scan.first_radial().map(|radial| radial.volume_coverage_pattern()),
            range_meters,
        })
    }

    /// Emits the six quad vertices (or the three origin-triangle vertices)
    /// for one gate from the per-scan coordinate grid.
    fn emit_gate_vertices(
        &self,
        vertices: &mut Vec<f32>,
        site: &RadarSite,
        radial_index: usize,
        vertex_radials: usize,
        gate: i32,
        gate_size: i32,
    ) {
        let stride = MAX_MOMENT_GATES as usize;
        let coordinates = &self.coordinates;

        if gate > 0 {
            // Draw two triangles per gate
            //
            // 2 +---+ 4
            //   |  /|
            //   | / |
            //   |/  |
            // 1 +---+ 3

            let base = (gate - 1) as usize;

            let offset1 = (radial_index % vertex_radials * stride + base) * 2;
            let offset2 = offset1 + gate_size as usize * 2;
            let offset3 = ((radial_index + 1) % vertex_radials * stride + base) * 2;
            let offset4 = offset3 + gate_size as usize * 2;

            for offset in [offset1, offset2, offset4, offset1, offset3, offset4] {
                vertices.push(coordinates[offset]);
                vertices.push(coordinates[offset + 1]);
            }
        } else {
            let offset1 = radial_index % vertex_radials * stride * 2;
            let offset2 = (radial_index + 1) % vertex_radials * stride * 2;

            vertices.push(site.latitude() as f32);
            vertices.push(site.longitude() as f32);
            for offset in [offset1, offset2] {
                vertices.push(coordinates[offset]);
                vertices.push(coordinates[offset + 1]);
            }
        }
    }

    /// Computes the geographic coordinate grid for the scan's radials. Each
    /// vertex radial takes its azimuth from the radial data when present,
    /// shifted to the bin center when smoothing; missing radials are
    /// extrapolated from their predecessors.
    fn compute_coordinates(
        &mut self,
        scan: &ElevationScan,
        site: &RadarSite,
        vertex_radials: usize,
        smoothing_enabled: bool,
    ) {
        debug!("ComputeCoordinates()");

        let gate_size = site.gate_size_meters();
        let latitude = site.latitude();
        let longitude = site.longitude();

        let gate_range_offset = if smoothing_enabled {
            // Center of the first gate is half the gate size distance from
            // the radar site
            0.5f32
        } else {
            // Far end of the first gate is the gate size distance from the
            // radar site
            1.0f32
        };

        let stride = MAX_MOMENT_GATES as usize * 2;
        self.coordinates.clear();
        self.coordinates.resize(vertex_radials * stride, 0.0);

        self.coordinates
            .par_chunks_mut(stride)
            .enumerate()
            .for_each(|(radial, row)| {
                let Some(angle) =
                    select_azimuth(scan, radial, vertex_radials, smoothing_enabled)
                else {
                    // Not enough angles present to determine an angle
                    return;
                };

                for gate in 0..MAX_MOMENT_GATES as usize {
                    let range = (gate as f32 + gate_range_offset) * gate_size;
                    let (lat, lon) =
                        destination(latitude, longitude, angle as f64, range as f64);

                    row[gate * 2] = lat as f32;
                    row[gate * 2 + 1] = lon as f32;
                }
            });
    }
}

/// Whether all four corners of a smoothed quad are suppressed. With smoothed
/// range folding shown, range-folded codes count as visible data; without
/// it, they count as absent.
fn quad_is_hidden(corners: [u16; 4], snr_threshold: u16, show_smoothed_range_folding: bool) -> bool {
    if show_smoothed_range_folding {
        corners
            .iter()
            .all(|value| *value < snr_threshold && *value != RANGE_FOLDED)
    } else {
        corners
            .iter()
            .all(|value| *value < snr_threshold || *value == RANGE_FOLDED)
    }
}

/// Replaces absent corner values with the product's edge value so smoothing
/// does not bleed the bottom of the palette into empty bins.
fn remap_moment(value: u16, edge_value: u16, show_smoothed_range_folding: bool) -> u16 {
    if value != 0 && (value != RANGE_FOLDED || show_smoothed_range_folding) {
        value
    } else {
        edge_value
    }
}

/// The synthetic value substituted for absent corners while smoothing.
fn edge_value(moment_type: MomentType, offset: f32) -> u16 {
    match moment_type {
        // The raw word decoding to zero velocity / zero dB
        MomentType::Velocity | MomentType::DifferentialReflectivity => offset.round() as u16,
        MomentType::SpectrumWidth | MomentType::DifferentialPhase => 2,
        MomentType::CorrelationCoefficient => u8::MAX as u16,
        _ => 0,
    }
}

/// Selects the azimuth angle for a vertex radial slot. Present radials use
/// their own azimuth (shifted half a bin when smoothing); missing radials
/// extrapolate from up to two predecessors.
fn select_azimuth(
    scan: &ElevationScan,
    radial: usize,
    num_radials: usize,
    smoothing_enabled: bool,
) -> Option<f32> {
    let wrap = |index: isize| -> u16 {
        ((index + num_radials as isize) % num_radials as isize) as u16
    };

    let current = scan.radial(radial as u16);
    let previous1 = scan.radial(wrap(radial as isize - 1));
    let previous2 = scan.radial(wrap(radial as isize - 2));

    if let Some(current) = current {
        let current_angle = current.azimuth_angle_degrees();

        if !smoothing_enabled {
            return Some(current_angle);
        }

        // Half the delta to the previous radial reaches the bin center
        let delta = previous1
            .map(|previous| normalize_degrees(current_angle - previous.azimuth_angle_degrees()))
            .unwrap_or(DEFAULT_AZIMUTH_DELTA);

        return Some(current_angle + delta * 0.5);
    }

    let previous1 = previous1?;
    let previous_angle = previous1.azimuth_angle_degrees();

    let delta = previous2
        .map(|previous2| normalize_degrees(previous_angle - previous2.azimuth_angle_degrees()))
        .unwrap_or(DEFAULT_AZIMUTH_DELTA);

    // 1.5x the delta reaches the center of the next bin when smoothing
    let delta_scale = if smoothing_enabled { 1.5 } else { 1.0 };

    Some(previous_angle + delta * delta_scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_values_follow_the_product() {
        // Velocity and ZDR use the raw word decoding to zero
        assert_eq!(edge_value(MomentType::Velocity, 129.0), 129);
        assert_eq!(edge_value(MomentType::DifferentialReflectivity, 128.0), 128);

        assert_eq!(edge_value(MomentType::SpectrumWidth, 129.0), 2);
        assert_eq!(edge_value(MomentType::DifferentialPhase, 2.0), 2);
        assert_eq!(edge_value(MomentType::CorrelationCoefficient, 0.0), 255);
        assert_eq!(edge_value(MomentType::Reflectivity, 66.0), 0);
    }

    #[test]
    fn remap_preserves_data_and_substitutes_absence() {
        assert_eq!(remap_moment(45, 7, false), 45);
        assert_eq!(remap_moment(0, 7, false), 7);
        assert_eq!(remap_moment(RANGE_FOLDED, 7, false), 7);
        assert_eq!(remap_moment(RANGE_FOLDED, 7, true), RANGE_FOLDED);
    }

    #[test]
    fn quad_hidden_rules() {
        // All below threshold, none range folded: hidden either way
        assert!(quad_is_hidden([3, 4, 3, 2], 5, false));
        assert!(quad_is_hidden([3, 4, 3, 2], 5, true));

        // Range-folded corners keep the quad visible without the flag (they
        // survive as edge values) and with it (they are data)
        assert!(!quad_is_hidden([45, 1, 1, 40], 5, false));
        assert!(!quad_is_hidden([45, 1, 1, 40], 5, true));

        // All range folded: visible only when showing smoothed range folding
        assert!(quad_is_hidden([1, 1, 1, 1], 5, false));
        assert!(!quad_is_hidden([1, 1, 1, 1], 5, true));
    }
}
