//! Geographic helpers for nearby-job discovery.
//!
//! Nearby search is a two step filter: a cheap latitude/longitude bounding box
//! that the store can evaluate with plain range comparisons, followed by an
//! exact great-circle distance check on the survivors.

pub mod nominatim;

use serde::{Deserialize, Serialize};

use crate::core::Job;
use crate::error::{MatchingError, Result};

pub use nominatim::{Address, Geocoder, NominatimGeocoder};

/// Mean Earth radius (IUGG)
const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Kilometres per degree of latitude, as used for the prefilter box
const KM_PER_DEGREE: f64 = 111.0;

const MILES_PER_KM: f64 = 0.621371;

/// WGS84 latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Build validated coordinates
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(MatchingError::InvalidInput(format!(
                "latitude {} outside [-90, 90]",
                latitude
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(MatchingError::InvalidInput(format!(
                "longitude {} outside [-180, 180]",
                longitude
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    #[default]
    #[serde(alias = "km")]
    Kilometers,
    #[serde(alias = "mi")]
    Miles,
}

impl DistanceUnit {
    /// Express a distance given in kilometres in this unit
    pub fn from_km(self, km: f64) -> f64 {
        match self {
            DistanceUnit::Kilometers => km,
            DistanceUnit::Miles => km * MILES_PER_KM,
        }
    }

    /// Express a distance given in this unit in kilometres
    pub fn to_km(self, value: f64) -> f64 {
        match self {
            DistanceUnit::Kilometers => value,
            DistanceUnit::Miles => value / MILES_PER_KM,
        }
    }

    pub fn abbreviation(self) -> &'static str {
        match self {
            DistanceUnit::Kilometers => "km",
            DistanceUnit::Miles => "mi",
        }
    }
}

/// Great-circle distance in kilometres (haversine)
pub fn distance_km(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Axis-aligned latitude/longitude box, inclusive on every edge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lng_min: f64,
    pub lng_max: f64,
}

impl BoundingBox {
    /// Box that contains every point within `radius_km` of `center`
    pub fn around(center: Coordinates, radius_km: f64) -> Self {
        let radius_deg = radius_km / KM_PER_DEGREE;
        // cos(lat) goes to zero at the poles; widen to the full circle there
        let cos_lat = center.latitude.to_radians().cos().abs();
        let lng_delta = if cos_lat < 1e-6 {
            180.0
        } else {
            (radius_deg / cos_lat).min(180.0)
        };

        Self {
            lat_min: center.latitude - radius_deg,
            lat_max: center.latitude + radius_deg,
            lng_min: center.longitude - lng_delta,
            lng_max: center.longitude + lng_delta,
        }
    }

    pub fn contains(&self, point: Coordinates) -> bool {
        (self.lat_min..=self.lat_max).contains(&point.latitude)
            && (self.lng_min..=self.lng_max).contains(&point.longitude)
    }
}

/// An open job together with its distance from the search center
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyJob {
    pub job: Job,
    pub distance_km: f64,
}

impl NearbyJob {
    pub fn distance_in(&self, unit: DistanceUnit) -> f64 {
        unit.from_km(self.distance_km)
    }
}

/// Keep jobs within `radius_km` of `center`, nearest first, at most `limit`
pub fn filter_nearby(center: Coordinates, radius_km: f64, jobs: Vec<Job>, limit: usize) -> Vec<NearbyJob> {
    let mut nearby: Vec<NearbyJob> = jobs
        .into_iter()
        .filter_map(|job| {
            let location = job.location?;
            let d = distance_km(center, location);
            (d <= radius_km).then_some(NearbyJob { job, distance_km: d })
        })
        .collect();

    nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    nearby.truncate(limit);
    nearby
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords(lat: f64, lon: f64) -> Coordinates {
        Coordinates::new(lat, lon).unwrap()
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(Coordinates::new(91.0, 0.0).is_err());
        assert!(Coordinates::new(0.0, -181.0).is_err());
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_distance_mumbai_pune() {
        let mumbai = coords(19.0760, 72.8777);
        let pune = coords(18.5204, 73.8567);
        let d = distance_km(mumbai, pune);
        // ~120 km as the crow flies
        assert!((115.0..125.0).contains(&d), "got {}", d);
    }

    #[test]
    fn test_distance_unit_conversion() {
        assert!((DistanceUnit::Miles.from_km(100.0) - 62.1371).abs() < 1e-9);
        assert!((DistanceUnit::Miles.to_km(DistanceUnit::Miles.from_km(42.0)) - 42.0).abs() < 1e-9);
        assert_eq!(DistanceUnit::Kilometers.from_km(7.5), 7.5);

        let unit: DistanceUnit = serde_json::from_str("\"mi\"").unwrap();
        assert_eq!(unit, DistanceUnit::Miles);
        let unit: DistanceUnit = serde_json::from_str("\"kilometers\"").unwrap();
        assert_eq!(unit, DistanceUnit::Kilometers);
    }

    #[test]
    fn test_distance_zero_for_same_point() {
        let p = coords(12.9716, 77.5946);
        assert_eq!(distance_km(p, p), 0.0);
    }

    #[test]
    fn test_bounding_box_contains_radius() {
        let center = coords(28.6139, 77.2090);
        let bbox = BoundingBox::around(center, 10.0);
        assert!(bbox.contains(center));
        assert!(bbox.contains(coords(28.6139 + 0.08, 77.2090)));
        assert!(!bbox.contains(coords(28.6139 + 0.2, 77.2090)));
        // Longitude span is wider than latitude span away from the equator
        assert!(bbox.lng_max - bbox.lng_min > bbox.lat_max - bbox.lat_min);
    }

    #[test]
    fn test_bounding_box_at_pole() {
        let bbox = BoundingBox::around(coords(90.0, 0.0), 5.0);
        assert_eq!(bbox.lng_min, -180.0);
        assert_eq!(bbox.lng_max, 180.0);
    }

    #[test]
    fn test_filter_nearby_sorts_and_limits() {
        let center = coords(19.0760, 72.8777);
        let mut near = Job::new(1, "near", "");
        near.location = Some(coords(19.0800, 72.8800));
        let mut mid = Job::new(2, "mid", "");
        mid.location = Some(coords(19.1200, 72.9000));
        let mut far = Job::new(3, "far", "");
        far.location = Some(coords(18.5204, 73.8567));
        let nowhere = Job::new(4, "no location", "");

        let result = filter_nearby(center, 10.0, vec![far, mid, nowhere, near], 20);
        let ids: Vec<i64> = result.iter().map(|n| n.job.id.0).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(result[0].distance_km < result[1].distance_km);

        let mut only = Job::new(5, "only", "");
        only.location = Some(center);
        assert_eq!(filter_nearby(center, 10.0, vec![only.clone(), only], 1).len(), 1);
    }
}
