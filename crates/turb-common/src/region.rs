//! Named region registry.
//!
//! Maps user-facing region names (continents plus a few ocean basins) to
//! geographic bounding boxes. The registry is built once at startup and is
//! immutable afterwards; lookups normalize case and surrounding whitespace.

use std::collections::HashMap;

use crate::bbox::BoundingBox;
use crate::error::TurbError;

/// One named region with its display name preserved.
#[derive(Debug, Clone)]
pub struct Region {
    pub name: String,
    pub bbox: BoundingBox,
}

/// Immutable name -> bounding box table.
#[derive(Debug, Clone)]
pub struct RegionRegistry {
    regions: HashMap<String, Region>,
}

/// Built-in regions as (name, north, west, south, east) edges in degrees.
const BUILTIN_REGIONS: &[(&str, f64, f64, f64, f64)] = &[
    ("Africa", 37.38, -18.03, -34.83, 51.48),
    ("Antarctica", -60.0, -180.0, -90.0, 180.0),
    ("Asia", 77.71, 25.98, -11.02, 179.69),
    ("Australia", -10.07, 112.92, -43.63, 159.11),
    ("Europe", 71.0, -31.0, 36.0, 40.0),
    ("North America", 83.17, -168.69, 14.53, -52.62),
    ("South America", 13.40, -81.30, -55.96, -34.76),
    // West edge east of the east edge: wraps across the antimeridian.
    ("Pacific", 45.0, 140.0, -45.0, -120.0),
];

impl RegionRegistry {
    /// Build the registry from the built-in region table.
    pub fn builtin() -> Self {
        let mut registry = Self {
            regions: HashMap::new(),
        };
        for &(name, north, west, south, east) in BUILTIN_REGIONS {
            // The built-in table is static and known valid.
            if let Ok(bbox) = BoundingBox::from_nwse(north, west, south, east) {
                registry.insert(name, bbox);
            }
        }
        registry
    }

    /// Add or replace a region. Used for config-supplied extras.
    pub fn insert(&mut self, name: &str, bbox: BoundingBox) {
        self.regions.insert(
            normalize_name(name),
            Region {
                name: name.to_string(),
                bbox,
            },
        );
    }

    /// Resolve a user-supplied region name.
    ///
    /// Lookup is case-insensitive and tolerant of extra whitespace;
    /// unresolved names are an error, never silently substituted.
    pub fn resolve(&self, name: &str) -> Result<&Region, TurbError> {
        self.regions
            .get(&normalize_name(name))
            .ok_or_else(|| TurbError::UnknownRegion(name.trim().to_string()))
    }

    /// Region names in sorted order, for help text.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.regions.values().map(|r| r.name.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
