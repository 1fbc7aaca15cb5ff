//! Radar site descriptors and the process-wide site registry.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::{Arc, RwLock};

/// The kind of radar installed at a site. The site type determines the base
/// range gate size: 250 m for a WSR-88D, 150 m for a terminal doppler radar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteType {
    /// A standard WSR-88D weather surveillance radar.
    Wsr88d,
    /// A terminal doppler weather radar.
    Tdwr,
}

impl Display for SiteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SiteType::Wsr88d => write!(f, "wsr88d"),
            SiteType::Tdwr => write!(f, "tdwr"),
        }
    }
}

/// A radar site's static metadata. Site descriptors are loaded once and
/// immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RadarSite {
    identifier: String,
    latitude: f64,
    longitude: f64,
    altitude_meters: f32,
    site_type: SiteType,
}

impl RadarSite {
    /// Create a new radar site descriptor with the given properties.
    pub fn new(
        identifier: impl Into<String>,
        latitude: f64,
        longitude: f64,
        altitude_meters: f32,
        site_type: SiteType,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            latitude,
            longitude,
            altitude_meters,
            site_type,
        }
    }

    /// The four- or five-character site identifier (e.g. "KLSX").
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The latitude of the radar site in degrees.
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// The longitude of the radar site in degrees.
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// The altitude of the radar site above sea level in meters.
    pub fn altitude_meters(&self) -> f32 {
        self.altitude_meters
    }

    /// The kind of radar installed at this site.
    pub fn site_type(&self) -> SiteType {
        self.site_type
    }

    /// Whether this site is a terminal doppler weather radar.
    pub fn is_tdwr(&self) -> bool {
        self.site_type == SiteType::Tdwr
    }

    /// The base range gate size for this site in meters.
    pub fn gate_size_meters(&self) -> f32 {
        match self.site_type {
            SiteType::Tdwr => 150.0,
            SiteType::Wsr88d => 250.0,
        }
    }

    /// Looks up a site descriptor by identifier in the registry.
    pub fn get(identifier: &str) -> Option<Arc<RadarSite>> {
        registry()
            .read()
            .ok()
            .and_then(|sites| sites.get(identifier).cloned())
    }

    /// Adds a site descriptor to the registry, replacing any existing entry
    /// with the same identifier.
    pub fn register(site: RadarSite) {
        if let Ok(mut sites) = registry().write() {
            sites.insert(site.identifier.clone(), Arc::new(site));
        }
    }
}

fn registry() -> &'static RwLock<HashMap<String, Arc<RadarSite>>> {
    static REGISTRY: Lazy<RwLock<HashMap<String, Arc<RadarSite>>>> =
        Lazy::new(|| RwLock::new(builtin_sites()));
    &REGISTRY
}

/// A starter set of site descriptors. Applications with a full site database
/// extend the registry through [`RadarSite::register`].
fn builtin_sites() -> HashMap<String, Arc<RadarSite>> {
    let sites = [
        RadarSite::new("KDMX", 41.7311, -93.7229, 299.0, SiteType::Wsr88d),
        RadarSite::new("KIND", 39.7075, -86.2803, 241.0, SiteType::Wsr88d),
        RadarSite::new("KLSX", 38.6989, -90.6828, 186.0, SiteType::Wsr88d),
        RadarSite::new("KTLX", 35.3331, -97.2775, 370.0, SiteType::Wsr88d),
        RadarSite::new("KDVN", 41.6117, -90.5808, 230.0, SiteType::Wsr88d),
        RadarSite::new("KEAX", 38.8103, -94.2644, 303.0, SiteType::Wsr88d),
        RadarSite::new("TSTL", 38.8047, -90.4886, 178.0, SiteType::Tdwr),
        RadarSite::new("TDFW", 33.0644, -96.9153, 168.0, SiteType::Tdwr),
    ];

    sites
        .into_iter()
        .map(|site| (site.identifier.clone(), Arc::new(site)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_size_follows_site_type() {
        let wsr = RadarSite::new("KLSX", 38.6989, -90.6828, 186.0, SiteType::Wsr88d);
        let tdwr = RadarSite::new("TSTL", 38.8047, -90.4886, 178.0, SiteType::Tdwr);

        assert_eq!(wsr.gate_size_meters(), 250.0);
        assert_eq!(tdwr.gate_size_meters(), 150.0);
        assert!(!wsr.is_tdwr());
        assert!(tdwr.is_tdwr());
    }

    #[test]
    fn registry_lookup_and_register() {
        assert!(RadarSite::get("KLSX").is_some());
        assert!(RadarSite::get("XXXX").is_none());

        RadarSite::register(RadarSite::new(
            "KTST",
            40.0,
            -100.0,
            100.0,
            SiteType::Wsr88d,
        ));
        let site = RadarSite::get("KTST").unwrap();
        assert_eq!(site.latitude(), 40.0);
    }
}
