//! Built-in city registry and the region carried in a map context.

use crate::core::geo::LatLng;
use serde::{Deserialize, Serialize};

/// A city the dashboard knows about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub name: String,
    pub center: LatLng,
    /// ISO 3166-1 alpha-3 country code
    pub iso: String,
}

/// The area of interest a layer is resolved for.
///
/// Regions without a country code are valid; only layers built from
/// per-country mosaics need one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub center: LatLng,
    pub iso: Option<String>,
}

impl Region {
    pub fn new(name: impl Into<String>, center: LatLng) -> Self {
        Self {
            name: name.into(),
            center,
            iso: None,
        }
    }

    pub fn with_iso(mut self, iso: impl Into<String>) -> Self {
        self.iso = Some(iso.into());
        self
    }
}

impl From<&City> for Region {
    fn from(city: &City) -> Self {
        Self {
            name: city.name.clone(),
            center: city.center,
            iso: Some(city.iso.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CityRegistry {
    cities: Vec<City>,
}

impl CityRegistry {
    pub fn new(cities: Vec<City>) -> Self {
        Self { cities }
    }

    /// The five cities shipped with the dashboard
    pub fn builtin() -> Self {
        let city = |name: &str, lat: f64, lng: f64, iso: &str| City {
            name: name.to_string(),
            center: LatLng::new(lat, lng),
            iso: iso.to_string(),
        };

        Self::new(vec![
            city("Metro Manila", 14.5995, 120.9842, "PHL"),
            city("Tokyo", 35.6762, 139.6503, "JPN"),
            city("New York", 40.7128, -74.006, "USA"),
            city("London", 51.5074, -0.1278, "GBR"),
            city("São Paulo", -23.5505, -46.6333, "BRA"),
        ])
    }

    pub fn get(&self, name: &str) -> Option<&City> {
        self.cities.iter().find(|c| c.name == name)
    }

    /// Region for `name`, if the city is registered
    pub fn region(&self, name: &str) -> Option<Region> {
        self.get(name).map(Region::from)
    }

    /// The first registered city, used when the selection is unknown
    pub fn default_city(&self) -> Option<&City> {
        self.cities.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &City> {
        self.cities.iter()
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }
}

impl Default for CityRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let registry = CityRegistry::builtin();
        assert_eq!(registry.len(), 5);

        let tokyo = registry.region("Tokyo").unwrap();
        assert_eq!(tokyo.iso.as_deref(), Some("JPN"));
        assert_eq!(tokyo.center, LatLng::new(35.6762, 139.6503));

        assert_eq!(registry.get("São Paulo").unwrap().iso, "BRA");
        assert!(registry.region("Atlantis").is_none());
        assert_eq!(registry.default_city().unwrap().name, "Metro Manila");
    }

    #[test]
    fn test_custom_region_has_no_iso() {
        let region = Region::new("Somewhere", LatLng::new(1.0, 2.0));
        assert!(region.iso.is_none());
        assert_eq!(region.with_iso("KEN").iso.as_deref(), Some("KEN"));
    }
}
