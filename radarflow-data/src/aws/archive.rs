//!
//! # Archived Radar Data
//! Archived radar data lives in flat S3 buckets. Level-2 volume files are
//! keyed by radar site and date (`RRRR/YYYY/MM/DD/`); Level-3 products add a
//! product qualifier (`RRRR/PPP/YYYY/MM/DD/`). Object names embed the scan
//! time as `YYYYMMDD_HHMMSS`. Marker objects (`*_MDM`, `NWS_NEXRAD_*`) are
//! metadata and are skipped during listing.
//!
//! The [`ArchiveDataProvider`] maintains a time-keyed index of the objects
//! discovered so far, lists per date on demand, and prunes old dates once
//! the index grows past its budget.
//!

mod key;
pub(crate) use key::{is_marker_key, level2_prefix, level3_prefix, time_from_key};

mod object_index;
pub(crate) use object_index::{ObjectIndex, ObjectRecord};

mod provider;
pub use provider::ArchiveDataProvider;

const DEFAULT_LEVEL2_BUCKET: &str = "noaa-nexrad-level2";
const DEFAULT_LEVEL3_BUCKET: &str = "unidata-nexrad-level3";

/// Dates kept in the listing cache before pruning may begin: at least today,
/// yesterday, and three more dates alongside the most recent listing.
const MIN_DATES_BEFORE_PRUNING: usize = 6;

/// Default object-index budget before old dates are pruned.
const DEFAULT_MAX_OBJECTS: usize = 2500;
