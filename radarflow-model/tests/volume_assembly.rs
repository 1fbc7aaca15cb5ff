//! Volume file assembly through the decoder seam, as the chunked provider
//! drives it: decode the start payload, append record payloads, re-index,
//! and query elevation scans.

use radarflow_model::decode::VolumeDecoder;
use radarflow_model::level3::Level3File;
use radarflow_model::moment::{GateData, MomentBlock};
use radarflow_model::product::MomentType;
use radarflow_model::radial::Radial;
use radarflow_model::result::{Error, Result};
use radarflow_model::volume::VolumeFile;

/// A synthetic wire format: each byte pair is (elevation number, azimuth
/// number).
struct PairDecoder;

fn radial(elevation_number: u8, azimuth_number: u16) -> Radial {
    Radial::new(
        azimuth_number,
        (azimuth_number - 1) as f32,
        elevation_number,
        elevation_number as f32 - 0.5,
        19_723,
        azimuth_number as u32 * 250,
        212,
    )
    .with_moment(
        MomentType::Reflectivity,
        MomentBlock::new(2, 250, 250, 2.0, 66.0, 16, GateData::Eight(vec![50, 60])),
    )
}

impl VolumeDecoder for PairDecoder {
    fn decode_volume(&self, data: &[u8]) -> Result<VolumeFile> {
        let mut file = VolumeFile::new("KLSX", None);
        for radial in self.decode_records(data)? {
            file.add_radial(radial);
        }
        Ok(file)
    }

    fn decode_records(&self, data: &[u8]) -> Result<Vec<Radial>> {
        if data.len() % 2 != 0 {
            return Err(Error::DecodeFailure("odd payload length".to_string()));
        }

        Ok(data
            .chunks_exact(2)
            .map(|pair| radial(pair[0], pair[1] as u16))
            .collect())
    }

    fn decode_level3(&self, _data: &[u8]) -> Result<Level3File> {
        Err(Error::DecodeFailure("not a level 3 payload".to_string()))
    }
}

#[test]
fn appended_records_appear_after_reindexing() {
    let decoder = PairDecoder;

    // Start chunk: two radials of elevation 1
    let mut file = decoder.decode_volume(&[1, 1, 1, 2]).unwrap();
    file.index_file();

    let (scan, cut, cuts) = file
        .get_elevation_scan(MomentType::Reflectivity, 0.5, None)
        .unwrap();
    assert_eq!(scan.len(), 2);
    assert_eq!(cut, 0.5);
    assert_eq!(cuts, vec![0.5]);

    // Intermediate chunk: the rest of elevation 1 plus a new elevation
    file.load_ldm_records(&decoder, &[1, 3, 1, 4, 2, 1, 2, 2])
        .unwrap();

    // The index is stale until the file is re-indexed
    let (scan, _, _) = file
        .get_elevation_scan(MomentType::Reflectivity, 0.5, None)
        .unwrap();
    assert_eq!(scan.len(), 2);

    file.index_file();

    let (scan, _, cuts) = file
        .get_elevation_scan(MomentType::Reflectivity, 0.5, None)
        .unwrap();
    assert_eq!(scan.len(), 4);
    assert_eq!(cuts, vec![0.5, 1.5]);
}

#[test]
fn decode_errors_propagate() {
    let decoder = PairDecoder;
    let mut file = decoder.decode_volume(&[1, 1]).unwrap();

    assert!(file.load_ldm_records(&decoder, &[1]).is_err());
}

#[test]
fn current_elevation_tracks_the_highest_scan() {
    let decoder = PairDecoder;
    let mut file = decoder.decode_volume(&[1, 1]).unwrap();
    assert_eq!(file.current_elevation_angle(), Some(0.5));

    file.load_ldm_records(&decoder, &[2, 1]).unwrap();
    assert_eq!(file.current_elevation_angle(), Some(1.5));

    assert!(!file.is_empty());
    assert!(file.end_time().is_some());
}
