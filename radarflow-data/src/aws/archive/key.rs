//! Archive bucket key schemes and time extraction.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// The listing prefix for a radar site's Level-2 volumes on a date.
pub(crate) fn level2_prefix(radar_id: &str, date: NaiveDate) -> String {
    format!("{}/{}/", radar_id, date.format("%Y/%m/%d"))
}

/// The listing prefix for a radar site's Level-3 product files on a date.
pub(crate) fn level3_prefix(radar_id: &str, product: &str, date: NaiveDate) -> String {
    format!("{}/{}/{}/", radar_id, product, date.format("%Y/%m/%d"))
}

/// Whether the key names a metadata marker object rather than radar data.
pub(crate) fn is_marker_key(key: &str) -> bool {
    key.contains("NWS_NEXRAD_") || key.ends_with("_MDM")
}

/// Extracts the scan time embedded in an object key. Object names carry a
/// `YYYYMMDD_HHMMSS` segment at an arbitrary position within the final key
/// component.
pub(crate) fn time_from_key(key: &str) -> Option<DateTime<Utc>> {
    const FORMAT_LEN: usize = "YYYYMMDD_HHMMSS".len();

    let name = key.rsplit('/').next().unwrap_or(key);
    let bytes = name.as_bytes();

    for start in 0..bytes.len().saturating_sub(FORMAT_LEN - 1) {
        let window = &bytes[start..start + FORMAT_LEN];
        if window[8] != b'_' {
            continue;
        }
        if !window[..8].iter().all(u8::is_ascii_digit)
            || !window[9..].iter().all(u8::is_ascii_digit)
        {
            continue;
        }

        if let Some(candidate) = std::str::from_utf8(window)
            .ok()
            .and_then(|text| NaiveDateTime::parse_from_str(text, "%Y%m%d_%H%M%S").ok())
        {
            return Some(candidate.and_utc());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn prefixes_are_date_qualified() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(level2_prefix("KLSX", date), "KLSX/2024/01/15/");
        assert_eq!(level3_prefix("KLSX", "N0B", date), "KLSX/N0B/2024/01/15/");
    }

    #[test]
    fn time_is_extracted_from_level2_keys() {
        let time = time_from_key("KLSX/2024/01/15/KLSX20240115_100447_V06").unwrap();
        assert_eq!(time, Utc.with_ymd_and_hms(2024, 1, 15, 10, 4, 47).unwrap());
    }

    #[test]
    fn time_is_extracted_from_level3_keys() {
        let time = time_from_key("KLSX/N0B/2024/01/15/KLSX_N0B_20240115_231501").unwrap();
        assert_eq!(time, Utc.with_ymd_and_hms(2024, 1, 15, 23, 15, 1).unwrap());
    }

    #[test]
    fn unparsable_keys_yield_nothing() {
        assert!(time_from_key("KLSX/2024/01/15/garbage").is_none());
        assert!(time_from_key("").is_none());
        assert!(time_from_key("KLSX20240115_9999").is_none());
    }

    #[test]
    fn marker_objects_are_recognized() {
        assert!(is_marker_key("KLSX/2024/01/15/KLSX20240115_100447_V06_MDM"));
        assert!(is_marker_key("KLSX/2024/01/15/NWS_NEXRAD_NXL2DPBL_KLSX"));
        assert!(!is_marker_key("KLSX/2024/01/15/KLSX20240115_100447_V06"));
    }
}
