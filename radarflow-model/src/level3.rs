//! Level-3 derived product files.

use chrono::{DateTime, Utc};
use std::fmt::Debug;

/// A decoded Level-3 product file. Packet-level decoding is below the sweep
/// level and out of scope for this workspace; the file carries product
/// metadata plus the undecoded message payload for downstream consumers.
#[derive(Clone, PartialEq)]
pub struct Level3File {
    radar_id: String,
    awips_id: String,
    product_code: u16,
    time: DateTime<Utc>,
    payload: Vec<u8>,
}

impl Level3File {
    /// Create a new Level-3 product file.
    pub fn new(
        radar_id: impl Into<String>,
        awips_id: impl Into<String>,
        product_code: u16,
        time: DateTime<Utc>,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            radar_id: radar_id.into(),
            awips_id: awips_id.into(),
            product_code,
            time,
            payload,
        }
    }

    /// The radar site identifier this product was generated for.
    pub fn radar_id(&self) -> &str {
        &self.radar_id
    }

    /// The three-character AWIPS product identifier.
    pub fn awips_id(&self) -> &str {
        &self.awips_id
    }

    /// The numeric product code.
    pub fn product_code(&self) -> u16 {
        self.product_code
    }

    /// The product generation time.
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// The undecoded product message payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

impl Debug for Level3File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Level3File")
            .field("radar_id", &self.radar_id)
            .field("awips_id", &self.awips_id)
            .field("product_code", &self.product_code)
            .field("time", &self.time)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}
