//! Sweep computation tests over synthetic elevation scans.

use radarflow_model::moment::{GateData, MomentBlock};
use radarflow_model::product::MomentType;
use radarflow_model::radial::Radial;
use radarflow_model::scan::ElevationScan;
use radarflow_model::site::{RadarSite, SiteType};
use radarflow_render::{MomentBuffer, SweepComputer, SweepOptions};
use std::sync::Arc;

fn site() -> RadarSite {
    RadarSite::new("KLSX", 38.6989, -90.6828, 186.0, SiteType::Wsr88d)
}

fn moment_block(values: GateData, snr_threshold: i16) -> MomentBlock {
    let gate_count = match &values {
        GateData::Eight(v) => v.len() as u16,
        GateData::Sixteen(v) => v.len() as u16,
    };
    // One 250 m bin per base gate, first bin centered one gate out
    MomentBlock::new(gate_count, 250, 250, 2.0, 66.0, snr_threshold, values)
}

fn radial(index: u16, azimuth: f32, block: MomentBlock) -> Radial {
    Radial::new(index + 1, azimuth, 1, 0.5, 19_723, index as u32 * 500, 212)
        .with_moment(MomentType::Reflectivity, block)
}

fn scan_from_gates(rows: &[&[u8]], snr_threshold: i16) -> ElevationScan {
    let mut scan = ElevationScan::new();
    for (index, gates) in rows.iter().enumerate() {
        scan.insert_radial(
            index as u16,
            Arc::new(radial(
                index as u16,
                index as f32 * 0.5,
                moment_block(GateData::Eight(gates.to_vec()), snr_threshold),
            )),
        );
    }
    scan
}

fn moment_values(moments: &MomentBuffer) -> Vec<u16> {
    (0..moments.len())
        .map(|index| moments.value(index).unwrap())
        .collect()
}

#[test]
fn non_smoothed_emission_suppresses_below_threshold() {
    let scan = scan_from_gates(&[&[45, 3, 1], &[50, 60, 2]], 5);

    let mut computer = SweepComputer::new();
    let buffers = computer
        .compute(
            &scan,
            MomentType::Reflectivity,
            &site(),
            SweepOptions::default(),
        )
        .unwrap();

    // Radial 0: origin gate (3 vertices, value 45), gate 1 suppressed
    // (3 < threshold), gate 2 kept as range folded (6 vertices).
    // Radial 1: origin gate (3 vertices), gate 1 kept (6 vertices), gate 2
    // suppressed.
    assert_eq!(
        moment_values(&buffers.moments),
        vec![45, 45, 45, 1, 1, 1, 1, 1, 1, 50, 50, 50, 60, 60, 60, 60, 60, 60]
    );

    // One moment per vertex, one vertex being two floats
    assert_eq!(buffers.vertices.len(), buffers.moments.len() * 2);
}

#[test]
fn origin_triangle_starts_at_the_radar_site() {
    let scan = scan_from_gates(&[&[45], &[50]], 5);

    let mut computer = SweepComputer::new();
    let buffers = computer
        .compute(
            &scan,
            MomentType::Reflectivity,
            &site(),
            SweepOptions::default(),
        )
        .unwrap();

    // Two origin triangles of three vertices each
    assert_eq!(buffers.moments.len(), 6);

    // The first vertex of each triangle is the radar site position
    assert!((buffers.vertices[0] - 38.6989).abs() < 1e-4);
    assert!((buffers.vertices[1] - -90.6828).abs() < 1e-4);
}

#[test]
fn smoothed_range_folding_takes_edge_values_when_hidden() {
    // 2x2 bin neighborhood {45, 1, 1, 40} with threshold 5
    let scan = scan_from_gates(&[&[45, 1], &[1, 40]], 5);

    let mut computer = SweepComputer::new();
    let buffers = computer
        .compute(
            &scan,
            MomentType::Reflectivity,
            &site(),
            SweepOptions {
                smoothing_enabled: true,
                show_smoothed_range_folding: false,
            },
        )
        .unwrap();

    // Radial 0's quad carries corners (dm1, dm2, dm4, dm1, dm3, dm4) with
    // range-folded corners remapped to the reflectivity edge value 0
    let values = moment_values(&buffers.moments);
    assert_eq!(values[..6], [45, 0, 40, 45, 0, 40]);
    assert_eq!(buffers.vertices.len(), buffers.moments.len() * 2);
}

#[test]
fn smoothed_range_folding_is_preserved_when_shown() {
    let scan = scan_from_gates(&[&[45, 1], &[1, 40]], 5);

    let mut computer = SweepComputer::new();
    let buffers = computer
        .compute(
            &scan,
            MomentType::Reflectivity,
            &site(),
            SweepOptions {
                smoothing_enabled: true,
                show_smoothed_range_folding: true,
            },
        )
        .unwrap();

    let values = moment_values(&buffers.moments);
    assert_eq!(values[..6], [45, 1, 40, 45, 1, 40]);
}

#[test]
fn smoothed_quad_is_skipped_when_all_corners_hidden() {
    // All four corners below threshold and none range folded
    let scan = scan_from_gates(&[&[3, 4], &[3, 2]], 5);

    let mut computer = SweepComputer::new();
    let buffers = computer
        .compute(
            &scan,
            MomentType::Reflectivity,
            &site(),
            SweepOptions {
                smoothing_enabled: true,
                show_smoothed_range_folding: false,
            },
        )
        .unwrap();

    assert!(buffers.moments.is_empty());
    assert!(buffers.vertices.is_empty());
}

#[test]
fn mismatched_word_size_radials_are_skipped() {
    let mut scan = ElevationScan::new();
    scan.insert_radial(
        0,
        Arc::new(radial(
            0,
            0.0,
            moment_block(GateData::Eight(vec![45, 50]), 5),
        )),
    );
    scan.insert_radial(
        1,
        Arc::new(radial(
            1,
            0.5,
            moment_block(GateData::Sixteen(vec![45, 50]), 5),
        )),
    );

    let mut computer = SweepComputer::new();
    let buffers = computer
        .compute(
            &scan,
            MomentType::Reflectivity,
            &site(),
            SweepOptions::default(),
        )
        .unwrap();

    // Only radial 0 is emitted: origin gate plus one quad
    assert!(matches!(buffers.moments, MomentBuffer::Eight(_)));
    assert_eq!(buffers.moments.len(), 9);
}

#[test]
fn cfp_moments_align_with_reflectivity() {
    let mut scan = ElevationScan::new();
    for index in 0..2u16 {
        let radial = Radial::new(index + 1, index as f32 * 0.5, 1, 0.5, 19_723, 0, 212)
            .with_moment(
                MomentType::Reflectivity,
                moment_block(GateData::Eight(vec![45, 50, 60]), 5),
            )
            .with_moment(
                MomentType::ClutterFilterPower,
                moment_block(GateData::Eight(vec![10, 20, 30]), 5),
            );
        scan.insert_radial(index, Arc::new(radial));
    }

    let mut computer = SweepComputer::new();
    let buffers = computer
        .compute(
            &scan,
            MomentType::Reflectivity,
            &site(),
            SweepOptions::default(),
        )
        .unwrap();

    let cfp = buffers.cfp_moments.unwrap();
    assert_eq!(cfp.len(), buffers.moments.len());
    assert_eq!(&cfp[..3], &[10, 10, 10]);
}

#[test]
fn missing_moment_data_is_invalid() {
    let mut scan = ElevationScan::new();
    scan.insert_radial(
        0,
        Arc::new(Radial::new(1, 0.0, 1, 0.5, 19_723, 0, 212)),
    );

    let mut computer = SweepComputer::new();
    let result = computer.compute(
        &scan,
        MomentType::Reflectivity,
        &site(),
        SweepOptions::default(),
    );

    assert_eq!(result.unwrap_err(), radarflow_render::result::Error::InvalidData);
}
