//! Live AWS archive tests. These hit the public radar buckets and are
//! ignored by default; run with `cargo test -- --ignored` when network
//! access is available.

use chrono::Utc;
use radarflow_data::aws::archive::ArchiveDataProvider;
use radarflow_data::provider::DataProvider;
use radarflow_model::decode::VolumeDecoder;
use radarflow_model::level3::Level3File;
use radarflow_model::radial::Radial;
use radarflow_model::result::{Error, Result};
use radarflow_model::volume::VolumeFile;
use std::sync::Arc;

/// Listing does not decode anything; a failing decoder keeps these tests
/// honest about that.
struct NoDecoder;

impl VolumeDecoder for NoDecoder {
    fn decode_volume(&self, _data: &[u8]) -> Result<VolumeFile> {
        Err(Error::DecodeFailure("decoding not under test".to_string()))
    }

    fn decode_records(&self, _data: &[u8]) -> Result<Vec<Radial>> {
        Err(Error::DecodeFailure("decoding not under test".to_string()))
    }

    fn decode_level3(&self, _data: &[u8]) -> Result<Level3File> {
        Err(Error::DecodeFailure("decoding not under test".to_string()))
    }
}

#[tokio::test]
#[ignore]
async fn list_todays_level2_objects() {
    let provider = ArchiveDataProvider::level2("KDMX", Arc::new(NoDecoder));

    let today = Utc::now().date_naive();
    let outcome = provider.list_objects(today).await;

    assert!(outcome.success);
    assert!(outcome.total_objects > 0);
    assert!(provider.is_date_cached(today));
    assert!(provider.find_latest_time().is_some());
    assert!(provider.find_latest_key().is_some());
}

#[tokio::test]
#[ignore]
async fn refresh_reports_new_objects_once() {
    let provider = ArchiveDataProvider::level2("KDMX", Arc::new(NoDecoder));

    let (new_objects, total_objects) = provider.refresh().await;
    assert!(total_objects > 0);
    assert!(new_objects > 0);

    // A second refresh observes the same objects, none of them new
    let (new_objects, total_objects) = provider.refresh().await;
    assert!(total_objects > 0);
    assert_eq!(new_objects, 0);
}
