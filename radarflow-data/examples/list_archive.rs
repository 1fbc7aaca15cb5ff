//! Lists today's archived Level-2 volume objects for a radar site.
//!
//! Usage: `cargo run --example list_archive [SITE]`

use chrono::Utc;
use radarflow_data::aws::archive::ArchiveDataProvider;
use radarflow_data::provider::DataProvider;
use radarflow_model::decode::VolumeDecoder;
use radarflow_model::level3::Level3File;
use radarflow_model::radial::Radial;
use radarflow_model::result::{Error, Result};
use radarflow_model::volume::VolumeFile;
use std::sync::Arc;

/// Listing needs no decoding; downloads are not performed here.
struct ListingOnlyDecoder;

impl VolumeDecoder for ListingOnlyDecoder {
    fn decode_volume(&self, _data: &[u8]) -> Result<VolumeFile> {
        Err(Error::DecodeFailure("listing only".to_string()))
    }

    fn decode_records(&self, _data: &[u8]) -> Result<Vec<Radial>> {
        Err(Error::DecodeFailure("listing only".to_string()))
    }

    fn decode_level3(&self, _data: &[u8]) -> Result<Level3File> {
        Err(Error::DecodeFailure("listing only".to_string()))
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let site = std::env::args().nth(1).unwrap_or_else(|| "KDMX".to_string());
    let provider = ArchiveDataProvider::level2(&site, Arc::new(ListingOnlyDecoder));

    let today = Utc::now().date_naive();
    let times = provider.get_time_points_by_date(today, true).await;

    println!("{} volumes for {site} on {today}", times.len());
    for time in times {
        println!("  {time}");
    }

    if let Some(latest) = provider.find_latest_key() {
        println!("latest: {latest}");
    }
}
