//! Out-bound notifications emitted by the radar product manager.

use crate::record::RadarProductRecord;
use chrono::{DateTime, Utc};
use radarflow_model::product::RadarProductGroup;
use std::sync::Arc;

/// Events published on a manager's broadcast channel.
#[derive(Debug, Clone)]
pub enum RadarEvent {
    /// A provider refresh observed new remote objects.
    NewDataAvailable {
        /// The product group the provider serves.
        group: RadarProductGroup,
        /// The product name ("L2" for Level-2 providers).
        product: String,
        /// Whether the chunked provider observed the new data.
        chunks: bool,
        /// The time of the most recent known object.
        latest_time: Option<DateTime<Utc>>,
    },
    /// A reload triggered by an expired-record lookup completed.
    DataReloaded {
        /// The reloaded (canonical) record.
        record: Arc<RadarProductRecord>,
    },
    /// A background product-times listing completed.
    ProductTimesPopulated {
        /// The product group that was listed.
        group: RadarProductGroup,
        /// The product name.
        product: String,
        /// The time the listing was centered on, if any.
        time: Option<DateTime<Utc>>,
    },
    /// The elevation currently being assembled by the chunked provider
    /// changed (cleared when serving archive data).
    IncomingElevationChanged {
        /// The incoming elevation angle, if one is being assembled.
        elevation: Option<f32>,
    },
    /// The remotely-available Level-3 product list was updated.
    Level3ProductsChanged,
}
