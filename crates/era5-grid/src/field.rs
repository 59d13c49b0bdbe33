//! In-memory representation of pressure-level fields.
//!
//! Fields are stored as flat `Vec<f32>` in (level, lat, lon) row-major order
//! with the coordinate vectors kept alongside. NaN is the only missing-data
//! marker; downstream arithmetic propagates it and never replaces it with a
//! numeric value.

use crate::error::{GridError, GridResult};

/// The two bracketing pressure levels used for the shear layer.
///
/// `lower` is the level closer to the ground (higher pressure). Defaults
/// match the 500/300 hPa layer the service was calibrated on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelPair {
    pub lower_hpa: f32,
    pub upper_hpa: f32,
}

impl LevelPair {
    pub fn new(lower_hpa: f32, upper_hpa: f32) -> GridResult<Self> {
        if !(upper_hpa > 0.0 && lower_hpa > upper_hpa) {
            return Err(GridError::InconsistentGrid(format!(
                "invalid level pair: lower {} hPa must exceed upper {} hPa",
                lower_hpa, upper_hpa
            )));
        }
        Ok(Self {
            lower_hpa,
            upper_hpa,
        })
    }

    /// Levels formatted for an archive request, lower level first.
    pub fn request_levels(&self) -> [String; 2] {
        [
            format!("{}", self.lower_hpa.round() as i64),
            format!("{}", self.upper_hpa.round() as i64),
        ]
    }
}

impl Default for LevelPair {
    fn default() -> Self {
        Self {
            lower_hpa: 500.0,
            upper_hpa: 300.0,
        }
    }
}

/// One scalar variable on a (level, lat, lon) grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GriddedField {
    pub name: String,
    /// Pressure levels in hPa, lower (higher pressure) first.
    pub levels: Vec<f32>,
    /// Latitudes in degrees, strictly monotonic (ERA5 delivers descending).
    pub lats: Vec<f64>,
    /// Longitudes in degrees, strictly increasing. Extracted fields that
    /// cross the antimeridian are unwrapped past 180 so this still holds.
    pub lons: Vec<f64>,
    data: Vec<f32>,
}

impl GriddedField {
    pub fn new(
        name: impl Into<String>,
        levels: Vec<f32>,
        lats: Vec<f64>,
        lons: Vec<f64>,
        data: Vec<f32>,
    ) -> GridResult<Self> {
        let name = name.into();
        let expected = levels.len() * lats.len() * lons.len();
        if data.len() != expected {
            return Err(GridError::InconsistentGrid(format!(
                "field {}: {} values for {} levels x {} lats x {} lons",
                name,
                data.len(),
                levels.len(),
                lats.len(),
                lons.len()
            )));
        }
        if lats.is_empty() || lons.is_empty() || levels.is_empty() {
            return Err(GridError::InconsistentGrid(format!(
                "field {}: empty coordinate axis",
                name
            )));
        }
        if !is_strictly_monotonic(&lats) {
            return Err(GridError::InconsistentGrid(format!(
                "field {}: latitudes are not strictly monotonic",
                name
            )));
        }
        if !is_strictly_increasing(&lons) {
            return Err(GridError::InconsistentGrid(format!(
                "field {}: longitudes are not strictly increasing",
                name
            )));
        }
        Ok(Self {
            name,
            levels,
            lats,
            lons,
            data,
        })
    }

    pub fn nlev(&self) -> usize {
        self.levels.len()
    }

    pub fn nlat(&self) -> usize {
        self.lats.len()
    }

    pub fn nlon(&self) -> usize {
        self.lons.len()
    }

    #[inline]
    pub fn index(&self, level: usize, lat: usize, lon: usize) -> usize {
        (level * self.nlat() + lat) * self.nlon() + lon
    }

    #[inline]
    pub fn value(&self, level: usize, lat: usize, lon: usize) -> f32 {
        self.data[self.index(level, lat, lon)]
    }

    pub fn values(&self) -> &[f32] {
        &self.data
    }

    /// 2-D slice for one pressure level.
    pub fn level_slice(&self, level: usize) -> &[f32] {
        let plane = self.nlat() * self.nlon();
        &self.data[level * plane..(level + 1) * plane]
    }

    /// Locate a pressure level by value with a small tolerance.
    pub fn level_index(&self, level_hpa: f32) -> Option<usize> {
        self.levels
            .iter()
            .position(|&l| (l - level_hpa).abs() < 0.5)
    }
}

fn is_strictly_monotonic(values: &[f64]) -> bool {
    is_strictly_increasing(values) || values.windows(2).all(|w| w[1] < w[0])
}

fn is_strictly_increasing(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[1] > w[0])
}

/// The wind components and geopotential delivered together for one timestamp.
///
/// All three fields share identical coordinate axes; construction enforces
/// that so downstream code can index them in lockstep.
#[derive(Debug, Clone)]
pub struct FieldSet {
    pub u: GriddedField,
    pub v: GriddedField,
    pub z: GriddedField,
}

impl FieldSet {
    pub fn new(u: GriddedField, v: GriddedField, z: GriddedField) -> GridResult<Self> {
        for other in [&v, &z] {
            if other.levels != u.levels || other.lats != u.lats || other.lons != u.lons {
                return Err(GridError::InconsistentGrid(format!(
                    "field {} does not share the grid of field {}",
                    other.name, u.name
                )));
            }
        }
        Ok(Self { u, v, z })
    }

    pub fn levels(&self) -> &[f32] {
        &self.u.levels
    }

    pub fn lats(&self) -> &[f64] {
        &self.u.lats
    }

    pub fn lons(&self) -> &[f64] {
        &self.u.lons
    }

    pub fn nlat(&self) -> usize {
        self.u.nlat()
    }

    pub fn nlon(&self) -> usize {
        self.u.nlon()
    }
}
