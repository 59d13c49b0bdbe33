//! NetCDF decoding for archive-delivered pressure-level files.
//!
//! Reads the u/v wind components and geopotential for one timestamp and the
//! two configured pressure levels. Handles both coordinate naming schemes the
//! archive has shipped (`time`/`valid_time`, `level`/`pressure_level`) and
//! both packed (scale/offset) and plain float payloads. Fill values become
//! NaN; nothing downstream ever sees the packed sentinel.

use std::path::Path;

use tracing::{debug, warn};

use crate::error::{GridError, GridResult};
use crate::field::{FieldSet, GriddedField, LevelPair};

const TIME_NAMES: &[&str] = &["valid_time", "time"];
const LEVEL_NAMES: &[&str] = &["pressure_level", "level", "isobaricInhPa"];
const LAT_NAMES: &[&str] = &["latitude", "lat"];
const LON_NAMES: &[&str] = &["longitude", "lon"];

const U_NAMES: &[&str] = &["u", "u_component_of_wind"];
const V_NAMES: &[&str] = &["v", "v_component_of_wind"];
const Z_NAMES: &[&str] = &["z", "geopotential"];

/// Read u, v and z for `levels` from a downloaded NetCDF file.
pub fn read_field_set(path: &Path, levels: LevelPair) -> GridResult<FieldSet> {
    let file = netcdf::open(path)
        .map_err(|e| GridError::UnreadableFile(format!("{}: {}", path.display(), e)))?;

    let lats = read_coordinate(&file, LAT_NAMES)?;
    let lons = read_coordinate(&file, LON_NAMES)?;
    let file_levels = read_coordinate(&file, LEVEL_NAMES)?;

    let time_len = TIME_NAMES
        .iter()
        .find_map(|n| file.dimension(n))
        .map(|d| d.len())
        .unwrap_or(1);
    if time_len > 1 {
        // Requests are issued per timestamp, so extra steps mean the file
        // does not match the request; use the first and say so.
        warn!(time_len, "file has multiple time steps, using the first");
    }

    let lower_idx = find_level(&file_levels, levels.lower_hpa)?;
    let upper_idx = find_level(&file_levels, levels.upper_hpa)?;
    let selected_levels = vec![
        file_levels[lower_idx] as f32,
        file_levels[upper_idx] as f32,
    ];

    debug!(
        nlat = lats.len(),
        nlon = lons.len(),
        lower = selected_levels[0],
        upper = selected_levels[1],
        "decoding pressure-level file"
    );

    let u = decode_variable(&file, U_NAMES, &[lower_idx, upper_idx], lats.len(), lons.len())?;
    let v = decode_variable(&file, V_NAMES, &[lower_idx, upper_idx], lats.len(), lons.len())?;
    let z = decode_variable(&file, Z_NAMES, &[lower_idx, upper_idx], lats.len(), lons.len())?;

    FieldSet::new(
        GriddedField::new("u", selected_levels.clone(), lats.clone(), lons.clone(), u)?,
        GriddedField::new("v", selected_levels.clone(), lats.clone(), lons.clone(), v)?,
        GriddedField::new("z", selected_levels, lats, lons, z)?,
    )
}

/// Read one variable and reorder it to (level, lat, lon) for the selected
/// levels at the first time step.
fn decode_variable(
    file: &netcdf::File,
    candidates: &[&str],
    level_indices: &[usize],
    nlat: usize,
    nlon: usize,
) -> GridResult<Vec<f32>> {
    let var = find_variable(file, candidates)?;

    let dims: Vec<(String, usize)> = var
        .dimensions()
        .iter()
        .map(|d| (d.name(), d.len()))
        .collect();
    let axes = AxisStrides::from_dims(&dims, &var.name())?;
    if axes.level == 0 && level_indices.len() > 1 {
        return Err(GridError::InconsistentGrid(format!(
            "variable {} has no level dimension but two levels were requested",
            var.name()
        )));
    }

    let raw: Vec<f64> = var
        .get_values(..)
        .map_err(|e| GridError::UnreadableFile(format!("variable {}: {}", var.name(), e)))?;

    // Fill comparison happens on the packed value, before scaling.
    let fill = get_f64_attr(&var, "_FillValue").or_else(|| get_f64_attr(&var, "missing_value"));
    let scale = get_f64_attr(&var, "scale_factor").unwrap_or(1.0);
    let offset = get_f64_attr(&var, "add_offset").unwrap_or(0.0);

    let mut out = Vec::with_capacity(level_indices.len() * nlat * nlon);
    for &level in level_indices {
        for j in 0..nlat {
            for i in 0..nlon {
                let idx = level * axes.level + j * axes.lat + i * axes.lon;
                let raw_value = *raw.get(idx).ok_or_else(|| {
                    GridError::InconsistentGrid(format!(
                        "variable {} is smaller than its dimensions claim",
                        var.name()
                    ))
                })?;
                out.push(unpack(raw_value, fill, scale, offset));
            }
        }
    }
    Ok(out)
}

/// Flat-index strides for the axes a variable may carry.
///
/// Axes absent from the variable get stride zero, which pins them to index
/// zero without special-casing the lookup.
#[derive(Debug, PartialEq, Eq)]
struct AxisStrides {
    level: usize,
    lat: usize,
    lon: usize,
}

impl AxisStrides {
    fn from_dims(dims: &[(String, usize)], var_name: &str) -> GridResult<Self> {
        let mut level = None;
        let mut lat = None;
        let mut lon = None;

        let mut stride = 1usize;
        for (name, len) in dims.iter().rev() {
            if LEVEL_NAMES.contains(&name.as_str()) {
                level = Some(stride);
            } else if LAT_NAMES.contains(&name.as_str()) {
                lat = Some(stride);
            } else if LON_NAMES.contains(&name.as_str()) {
                lon = Some(stride);
            } else if !TIME_NAMES.contains(&name.as_str()) {
                return Err(GridError::InconsistentGrid(format!(
                    "variable {} has unexpected dimension {}",
                    var_name, name
                )));
            }
            stride *= len;
        }

        Ok(Self {
            level: level.unwrap_or(0),
            lat: lat.ok_or_else(|| {
                GridError::MissingData(format!("latitude dimension on variable {}", var_name))
            })?,
            lon: lon.ok_or_else(|| {
                GridError::MissingData(format!("longitude dimension on variable {}", var_name))
            })?,
        })
    }
}

/// Expand one packed value, mapping the fill sentinel to NaN.
fn unpack(raw: f64, fill: Option<f64>, scale: f64, offset: f64) -> f32 {
    if !raw.is_finite() || fill.is_some_and(|f| raw == f) {
        f32::NAN
    } else {
        (raw * scale + offset) as f32
    }
}

fn read_coordinate(file: &netcdf::File, candidates: &[&str]) -> GridResult<Vec<f64>> {
    let var = find_variable(file, candidates)?;
    var.get_values(..)
        .map_err(|e| GridError::UnreadableFile(format!("coordinate {}: {}", var.name(), e)))
}

fn find_variable<'f>(
    file: &'f netcdf::File,
    candidates: &[&str],
) -> GridResult<netcdf::Variable<'f>> {
    candidates
        .iter()
        .find_map(|n| file.variable(n))
        .ok_or_else(|| GridError::MissingData(format!("variable {}", candidates[0])))
}

fn find_level(file_levels: &[f64], level_hpa: f32) -> GridResult<usize> {
    file_levels
        .iter()
        .position(|&l| (l - level_hpa as f64).abs() < 0.5)
        .ok_or_else(|| {
            GridError::LevelNotFound(
                level_hpa,
                file_levels
                    .iter()
                    .map(|l| format!("{}", l))
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        })
}

/// Check if a variable has an attribute with the given name.
/// Probing `attribute_value` for absent attributes makes the HDF5 layer
/// print to stderr; scanning the attribute list first stays quiet.
fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

fn get_f64_attr(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !has_attr(var, name) {
        return None;
    }
    let attr_value = var.attribute_value(name)?.ok()?;
    f64::try_from(attr_value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpack_applies_scale_and_offset() {
        assert_eq!(unpack(100.0, None, 0.5, 3.0), 53.0);
        assert_eq!(unpack(2.0, None, 1.0, 0.0), 2.0);
    }

    #[test]
    fn test_unpack_maps_fill_to_nan() {
        assert!(unpack(-32767.0, Some(-32767.0), 0.001, 0.0).is_nan());
        assert!(unpack(f64::NAN, None, 1.0, 0.0).is_nan());
        assert!(!unpack(-32766.0, Some(-32767.0), 0.001, 0.0).is_nan());
    }

    #[test]
    fn test_axis_strides_standard_order() {
        let dims = vec![
            ("valid_time".to_string(), 1),
            ("pressure_level".to_string(), 2),
            ("latitude".to_string(), 3),
            ("longitude".to_string(), 4),
        ];
        let axes = AxisStrides::from_dims(&dims, "u").unwrap();
        assert_eq!(
            axes,
            AxisStrides {
                level: 12,
                lat: 4,
                lon: 1
            }
        );
    }

    #[test]
    fn test_axis_strides_legacy_names_and_order() {
        // Some conversions put level after time with legacy names.
        let dims = vec![
            ("time".to_string(), 1),
            ("level".to_string(), 2),
            ("lat".to_string(), 5),
            ("lon".to_string(), 7),
        ];
        let axes = AxisStrides::from_dims(&dims, "u").unwrap();
        assert_eq!(
            axes,
            AxisStrides {
                level: 35,
                lat: 7,
                lon: 1
            }
        );
    }

    #[test]
    fn test_axis_strides_rejects_unknown_dimension() {
        let dims = vec![
            ("ensemble".to_string(), 10),
            ("latitude".to_string(), 3),
            ("longitude".to_string(), 4),
        ];
        assert!(AxisStrides::from_dims(&dims, "u").is_err());
    }

    #[test]
    fn test_find_level_tolerance() {
        let levels = vec![1000.0, 500.0, 300.0];
        assert_eq!(find_level(&levels, 500.0).unwrap(), 1);
        assert_eq!(find_level(&levels, 300.2).unwrap(), 2);
        assert!(find_level(&levels, 850.0).is_err());
    }
}
