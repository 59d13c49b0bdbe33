//! Geographic bounding box types and operations.

use serde::{Deserialize, Serialize};

/// A geographic bounding box in degrees (EPSG:4326).
///
/// Latitudes are in [-90, 90]. Longitudes are in [-180, 180], and a box with
/// `lon_min > lon_max` crosses the antimeridian: it covers
/// `[lon_min, 180] ∪ [-180, lon_max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    /// Create a new bounding box from edge coordinates.
    ///
    /// Returns an error for out-of-range or inverted latitudes. Inverted
    /// longitudes are valid and mean the box wraps across the antimeridian.
    pub fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Result<Self, BboxError> {
        if !(-90.0..=90.0).contains(&lat_min) || !(-90.0..=90.0).contains(&lat_max) {
            return Err(BboxError::LatitudeOutOfRange(lat_min, lat_max));
        }
        if lat_min > lat_max {
            return Err(BboxError::InvertedLatitudes(lat_min, lat_max));
        }
        if !(-180.0..=180.0).contains(&lon_min) || !(-180.0..=180.0).contains(&lon_max) {
            return Err(BboxError::LongitudeOutOfRange(lon_min, lon_max));
        }
        Ok(Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        })
    }

    /// Create from the [north, west, south, east] edge order used by the
    /// region tables.
    pub fn from_nwse(north: f64, west: f64, south: f64, east: f64) -> Result<Self, BboxError> {
        Self::new(south, north, west, east)
    }

    /// True when the box spans the antimeridian.
    pub fn crosses_antimeridian(&self) -> bool {
        self.lon_min > self.lon_max
    }

    /// Latitudinal extent in degrees.
    pub fn lat_span(&self) -> f64 {
        self.lat_max - self.lat_min
    }

    /// Longitudinal extent in degrees, accounting for wraparound.
    pub fn lon_span(&self) -> f64 {
        if self.crosses_antimeridian() {
            360.0 - (self.lon_min - self.lon_max)
        } else {
            self.lon_max - self.lon_min
        }
    }

    /// Check if a latitude falls inside the box (inclusive).
    pub fn contains_lat(&self, lat: f64) -> bool {
        lat >= self.lat_min && lat <= self.lat_max
    }

    /// Check if a longitude falls inside the box (inclusive), honoring
    /// wraparound for antimeridian-crossing boxes.
    pub fn contains_lon(&self, lon: f64) -> bool {
        let lon = normalize_lon(lon);
        if self.crosses_antimeridian() {
            lon >= self.lon_min || lon <= self.lon_max
        } else {
            lon >= self.lon_min && lon <= self.lon_max
        }
    }

    /// Check if a point is contained within this box (inclusive bounds).
    pub fn contains_point(&self, lat: f64, lon: f64) -> bool {
        self.contains_lat(lat) && self.contains_lon(lon)
    }
}

/// Fold a longitude into [-180, 180).
pub fn normalize_lon(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

#[derive(Debug, thiserror::Error)]
pub enum BboxError {
    #[error("Latitude out of [-90, 90]: {0}, {1}")]
    LatitudeOutOfRange(f64, f64),

    #[error("lat_min {0} exceeds lat_max {1}")]
    InvertedLatitudes(f64, f64),

    #[error("Longitude out of [-180, 180]: {0}, {1}")]
    LongitudeOutOfRange(f64, f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_bad_latitudes() {
        assert!(BoundingBox::new(-95.0, 10.0, 0.0, 20.0).is_err());
        assert!(BoundingBox::new(30.0, 10.0, 0.0, 20.0).is_err());
    }

    #[test]
    fn test_from_nwse_matches_edges() {
        let bbox = BoundingBox::from_nwse(71.0, -31.0, 36.0, 40.0).unwrap();
        assert_eq!(bbox.lat_min, 36.0);
        assert_eq!(bbox.lat_max, 71.0);
        assert_eq!(bbox.lon_min, -31.0);
        assert_eq!(bbox.lon_max, 40.0);
        assert!(!bbox.crosses_antimeridian());
    }

    #[test]
    fn test_contains_point_inclusive() {
        let bbox = BoundingBox::new(36.0, 71.0, -31.0, 40.0).unwrap();
        assert!(bbox.contains_point(36.0, -31.0));
        assert!(bbox.contains_point(71.0, 40.0));
        assert!(bbox.contains_point(50.0, 10.0));
        assert!(!bbox.contains_point(35.9, 10.0));
        assert!(!bbox.contains_point(50.0, 41.0));
    }

    #[test]
    fn test_antimeridian_containment() {
        // Central Pacific: 150E across the dateline to 140W
        let bbox = BoundingBox::new(-30.0, 30.0, 150.0, -140.0).unwrap();
        assert!(bbox.crosses_antimeridian());
        assert!(bbox.contains_lon(170.0));
        assert!(bbox.contains_lon(180.0));
        assert!(bbox.contains_lon(-170.0));
        assert!(bbox.contains_lon(-140.0));
        assert!(!bbox.contains_lon(0.0));
        assert!(!bbox.contains_lon(149.0));
        assert!((bbox.lon_span() - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_lon_wraps() {
        assert_eq!(normalize_lon(190.0), -170.0);
        assert_eq!(normalize_lon(-190.0), 170.0);
        assert_eq!(normalize_lon(360.0), 0.0);
        assert_eq!(normalize_lon(45.0), 45.0);
    }
}
