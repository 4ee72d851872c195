//! Haversine distance and the geocoding directory.
//!
//! The directory is a read-only name → coordinates table parsed from a JSON
//! asset at start-up and injected into the server state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

impl Coordinates {
    /// Create a point.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Great-circle distance between two points in kilometres.
#[must_use]
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Pick the candidate closest to `origin`, with its distance.
pub fn nearest<T>(
    origin: Coordinates,
    candidates: impl IntoIterator<Item = (T, Coordinates)>,
) -> Option<(T, f64)> {
    candidates
        .into_iter()
        .map(|(key, point)| (key, haversine_km(origin, point)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

/// One entry of the geocoding asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    /// Display name, e.g. `Colombo`.
    pub name: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

/// Errors loading the geocoding asset.
#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    /// The asset is not a JSON array of places.
    #[error("invalid geocoding table: {0}")]
    Parse(#[from] serde_json::Error),
    /// A place has coordinates outside the valid range.
    #[error("place {0} has out-of-range coordinates")]
    OutOfRange(String),
}

/// Case-insensitive name → coordinates lookup.
#[derive(Debug, Clone, Default)]
pub struct GeoDirectory {
    places: HashMap<String, Place>,
}

impl GeoDirectory {
    /// Parse a JSON array of `{"name", "lat", "lng"}` objects.
    ///
    /// # Errors
    ///
    /// Returns `GeoError` if the JSON is malformed or a coordinate is out of
    /// range.
    pub fn from_json(json: &str) -> Result<Self, GeoError> {
        let places: Vec<Place> = serde_json::from_str(json)?;
        places.into_iter().try_fold(Self::default(), |mut dir, place| {
            if !(-90.0..=90.0).contains(&place.lat) || !(-180.0..=180.0).contains(&place.lng) {
                return Err(GeoError::OutOfRange(place.name));
            }
            dir.places.insert(normalize(&place.name), place);
            Ok(dir)
        })
    }

    /// Look up a place by name, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Coordinates> {
        self.places
            .get(&normalize(name))
            .map(|p| Coordinates::new(p.lat, p.lng))
    }

    /// Number of known places.
    #[must_use]
    pub fn len(&self) -> usize {
        self.places.len()
    }

    /// Whether the directory has no places.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TABLE: &str = r#"[
        {"name": "Colombo", "lat": 6.9271, "lng": 79.8612},
        {"name": "Kandy", "lat": 7.2906, "lng": 80.6337},
        {"name": "Galle", "lat": 6.0535, "lng": 80.2210}
    ]"#;

    #[test]
    fn test_haversine_known_distance() {
        let colombo = Coordinates::new(6.9271, 79.8612);
        let kandy = Coordinates::new(7.2906, 80.6337);
        let km = haversine_km(colombo, kandy);
        assert!((km - 94.0).abs() < 2.0, "got {km}");
        assert!(haversine_km(colombo, colombo).abs() < 1e-9);
    }

    #[test]
    fn test_directory_lookup_is_case_insensitive() {
        let dir = GeoDirectory::from_json(TABLE).unwrap();
        assert_eq!(dir.len(), 3);
        assert_eq!(dir.lookup("  kandy "), Some(Coordinates::new(7.2906, 80.6337)));
        assert_eq!(dir.lookup("Jaffna"), None);
    }

    #[test]
    fn test_directory_rejects_bad_input() {
        assert!(matches!(GeoDirectory::from_json("{}"), Err(GeoError::Parse(_))));
        let bad = r#"[{"name": "Nowhere", "lat": 123.0, "lng": 0.0}]"#;
        assert!(matches!(GeoDirectory::from_json(bad), Err(GeoError::OutOfRange(_))));
    }

    #[test]
    fn test_nearest_picks_closest() {
        let origin = Coordinates::new(6.10, 80.20); // near Galle
        let candidates = vec![
            ("colombo", Coordinates::new(6.9271, 79.8612)),
            ("galle", Coordinates::new(6.0535, 80.2210)),
            ("kandy", Coordinates::new(7.2906, 80.6337)),
        ];
        let (name, km) = nearest(origin, candidates).unwrap();
        assert_eq!(name, "galle");
        assert!(km < 10.0);
        assert!(nearest::<&str>(origin, Vec::new()).is_none());
    }
}
