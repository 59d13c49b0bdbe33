//! Wind-shear derivation.
//!
//! Inputs are extracted field sets carrying the two bracketing pressure
//! levels, lower level first. Outputs are 2-D fields in m/s per km. NaN
//! marks no-data in both directions: any NaN touching a stencil yields NaN
//! in that cell, and no gap is ever replaced by a number.

use era5_grid::FieldSet;

use crate::error::{AnalysisError, AnalysisResult};

/// Standard gravity, converts geopotential (m^2/s^2) to height (m).
pub const G0: f64 = 9.80665;

/// Kilometers per degree of latitude on the mean sphere.
pub const KM_PER_DEG: f64 = 111.195;

/// Floor on the geopotential-height thickness of the shear layer, in
/// meters. Keeps the vertical ratio finite when both levels report the
/// same height; identical winds still yield exactly zero shear.
pub const MIN_LAYER_THICKNESS_M: f64 = 1.0;

/// Floor on cos(latitude) in zonal spacing, so pole rows keep a nonzero
/// east-west distance.
const MIN_COS_LAT: f64 = 0.01;

/// A derived 2-D shear magnitude field on the source grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ShearField {
    /// Row-major (lat, lon) magnitudes, m/s per km.
    pub values: Vec<f32>,
    pub lats: Vec<f64>,
    pub lons: Vec<f64>,
}

impl ShearField {
    pub fn new(values: Vec<f32>, lats: Vec<f64>, lons: Vec<f64>) -> AnalysisResult<Self> {
        if values.len() != lats.len() * lons.len() {
            return Err(AnalysisError::ShapeMismatch(format!(
                "{} values for {} lats x {} lons",
                values.len(),
                lats.len(),
                lons.len()
            )));
        }
        Ok(Self { values, lats, lons })
    }

    pub fn nlat(&self) -> usize {
        self.lats.len()
    }

    pub fn nlon(&self) -> usize {
        self.lons.len()
    }

    #[inline]
    pub fn value(&self, lat: usize, lon: usize) -> f32 {
        self.values[lat * self.nlon() + lon]
    }

    fn same_grid(&self, other: &ShearField) -> bool {
        self.lats == other.lats && self.lons == other.lons
    }
}

/// Wind change across the bracketing levels over the layer thickness.
///
/// Thickness comes from the geopotential difference via standard gravity
/// and is floored at [`MIN_LAYER_THICKNESS_M`].
pub fn vertical_shear(set: &FieldSet) -> AnalysisResult<ShearField> {
    let levels = set.levels();
    if levels.len() < 2 {
        return Err(AnalysisError::MissingLevel(
            levels.first().copied().unwrap_or(0.0),
        ));
    }

    let (nlat, nlon) = (set.nlat(), set.nlon());
    let mut values = Vec::with_capacity(nlat * nlon);
    for j in 0..nlat {
        for i in 0..nlon {
            let du = set.u.value(1, j, i) - set.u.value(0, j, i);
            let dv = set.v.value(1, j, i) - set.v.value(0, j, i);
            let dz = (set.z.value(1, j, i) - set.z.value(0, j, i)) as f64 / G0;

            // The thickness floor must not paper over a missing height.
            if du.is_nan() || dv.is_nan() || dz.is_nan() {
                values.push(f32::NAN);
                continue;
            }

            let thickness_km = dz.abs().max(MIN_LAYER_THICKNESS_M) / 1000.0;
            values.push((du.hypot(dv) as f64 / thickness_km) as f32);
        }
    }

    ShearField::new(values, set.lats().to_vec(), set.lons().to_vec())
}

/// Horizontal wind gradients on the lower level.
///
/// Centered differences in the interior, one-sided at the domain edges.
/// Zonal spacing scales with cos(latitude), floored near the poles.
pub fn horizontal_shear(set: &FieldSet) -> AnalysisResult<ShearField> {
    let (nlat, nlon) = (set.nlat(), set.nlon());
    if nlat < 2 || nlon < 2 {
        return Err(AnalysisError::GridTooSmall(format!(
            "{}x{} grid cannot support finite differences",
            nlat, nlon
        )));
    }

    let lats = set.lats();
    let lons = set.lons();
    let mut values = Vec::with_capacity(nlat * nlon);
    for j in 0..nlat {
        let cos_lat = lats[j].to_radians().cos().max(MIN_COS_LAT);
        let (j_lo, j_hi) = stencil(j, nlat);
        let dy_km = (lats[j_hi] - lats[j_lo]).abs() * KM_PER_DEG;

        for i in 0..nlon {
            let (i_lo, i_hi) = stencil(i, nlon);
            let dx_km = (lons[i_hi] - lons[i_lo]) * KM_PER_DEG * cos_lat;

            // A gap at the cell itself is no-data even though the centered
            // stencil does not read it.
            if set.u.value(0, j, i).is_nan() || set.v.value(0, j, i).is_nan() {
                values.push(f32::NAN);
                continue;
            }

            let du = set.u.value(0, j, i_hi) - set.u.value(0, j, i_lo);
            let dv = set.v.value(0, j_hi, i) - set.v.value(0, j_lo, i);

            let du_dx = du as f64 / dx_km;
            let dv_dy = dv as f64 / dy_km;
            values.push(du_dx.hypot(dv_dy) as f32);
        }
    }

    ShearField::new(values, lats.to_vec(), lons.to_vec())
}

/// Euclidean combination of the vertical and horizontal magnitudes.
pub fn combined_shear(
    vertical: &ShearField,
    horizontal: &ShearField,
) -> AnalysisResult<ShearField> {
    if !vertical.same_grid(horizontal) {
        return Err(AnalysisError::ShapeMismatch(format!(
            "vertical {}x{} vs horizontal {}x{}",
            vertical.nlat(),
            vertical.nlon(),
            horizontal.nlat(),
            horizontal.nlon()
        )));
    }

    let values = vertical
        .values
        .iter()
        .zip(&horizontal.values)
        .map(|(&v, &h)| v.hypot(h))
        .collect();
    ShearField::new(values, vertical.lats.clone(), vertical.lons.clone())
}

/// Difference stencil around index `idx`: centered in the interior,
/// one-sided at either edge.
#[inline]
fn stencil(idx: usize, len: usize) -> (usize, usize) {
    if idx == 0 {
        (0, 1)
    } else if idx == len - 1 {
        (len - 2, len - 1)
    } else {
        (idx - 1, idx + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use era5_grid::GriddedField;

    /// Two-level set built from per-cell closures for (u, v, z).
    fn make_set<F>(nlat: usize, nlon: usize, f: F) -> FieldSet
    where
        F: Fn(usize, usize, usize) -> (f32, f32, f32),
    {
        let levels = vec![500.0, 300.0];
        let lats: Vec<f64> = (0..nlat).map(|j| 1.0 - j as f64).collect();
        let lons: Vec<f64> = (0..nlon).map(|i| i as f64).collect();

        let mut u = Vec::new();
        let mut v = Vec::new();
        let mut z = Vec::new();
        for level in 0..2 {
            for j in 0..nlat {
                for i in 0..nlon {
                    let (uu, vv, zz) = f(level, j, i);
                    u.push(uu);
                    v.push(vv);
                    z.push(zz);
                }
            }
        }

        FieldSet::new(
            GriddedField::new("u", levels.clone(), lats.clone(), lons.clone(), u).unwrap(),
            GriddedField::new("v", levels.clone(), lats.clone(), lons.clone(), v).unwrap(),
            GriddedField::new("z", levels, lats, lons, z).unwrap(),
        )
        .unwrap()
    }

    fn height_z(height_m: f32) -> f32 {
        height_m * G0 as f32
    }

    #[test]
    fn test_vertical_shear_known_value() {
        // 10 m/s change over a 4 km layer.
        let set = make_set(2, 2, |level, _, _| {
            if level == 0 {
                (5.0, 0.0, height_z(5000.0))
            } else {
                (15.0, 0.0, height_z(9000.0))
            }
        });
        let shear = vertical_shear(&set).unwrap();
        for &v in &shear.values {
            assert!((v - 2.5).abs() < 1e-4, "got {v}");
        }
    }

    #[test]
    fn test_vertical_shear_identical_levels_is_zero() {
        // Same winds and same heights: the thickness floor kicks in and the
        // result is exactly zero, not an error or a huge number.
        let set = make_set(2, 2, |_, _, _| (12.0, -3.0, height_z(7000.0)));
        let shear = vertical_shear(&set).unwrap();
        assert!(shear.values.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_vertical_shear_thickness_floor_stays_finite() {
        // Different winds at identical heights: large but finite.
        let set = make_set(2, 2, |level, _, _| {
            let u = if level == 0 { 0.0 } else { 1.0 };
            (u, 0.0, height_z(7000.0))
        });
        let shear = vertical_shear(&set).unwrap();
        for &v in &shear.values {
            assert!(v.is_finite());
            assert!(v > 0.0);
        }
    }

    #[test]
    fn test_vertical_shear_nan_propagates_from_wind() {
        let set = make_set(2, 2, |level, j, i| {
            let u = if level == 1 && j == 0 && i == 0 {
                f32::NAN
            } else {
                10.0
            };
            (u, 0.0, height_z(5000.0 + 4000.0 * level as f32))
        });
        let shear = vertical_shear(&set).unwrap();
        assert!(shear.value(0, 0).is_nan());
        assert!(!shear.value(1, 1).is_nan());
    }

    #[test]
    fn test_vertical_shear_nan_propagates_from_geopotential() {
        // A missing height must not fall through the thickness floor.
        let set = make_set(2, 2, |level, j, i| {
            let z = if level == 0 && j == 1 && i == 1 {
                f32::NAN
            } else {
                height_z(5000.0 + 4000.0 * level as f32)
            };
            (10.0, 5.0, z)
        });
        let shear = vertical_shear(&set).unwrap();
        assert!(shear.value(1, 1).is_nan());
        assert!(!shear.value(0, 0).is_nan());
    }

    #[test]
    fn test_horizontal_shear_uniform_wind_is_zero() {
        let set = make_set(3, 4, |_, _, _| (20.0, -7.0, height_z(5000.0)));
        let shear = horizontal_shear(&set).unwrap();
        assert!(shear.values.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_horizontal_shear_linear_gradient() {
        // u grows 2 m/s per degree of longitude near the equator; v constant.
        let set = make_set(3, 5, |_, _, i| (2.0 * i as f32, 0.0, height_z(5000.0)));
        let shear = horizontal_shear(&set).unwrap();

        let cos_lat = 0.0_f64.to_radians().cos();
        let expected = 4.0 / (2.0 * KM_PER_DEG * cos_lat);
        let got = shear.value(1, 2) as f64;
        assert!(
            (got - expected).abs() < 1e-6,
            "got {got}, expected {expected}"
        );
    }

    #[test]
    fn test_horizontal_shear_edges_use_one_sided_differences() {
        let set = make_set(3, 3, |_, _, i| (3.0 * i as f32, 0.0, height_z(5000.0)));
        let shear = horizontal_shear(&set).unwrap();
        // One-sided at the west edge: 3 m/s over one degree.
        let cos_lat = 1.0_f64.to_radians().cos();
        let expected = 3.0 / (KM_PER_DEG * cos_lat);
        let got = shear.value(0, 0) as f64;
        assert!(
            (got - expected).abs() < 1e-6,
            "got {got}, expected {expected}"
        );
    }

    #[test]
    fn test_horizontal_shear_nan_propagates_through_stencil() {
        let set = make_set(3, 3, |_, j, i| {
            let u = if j == 1 && i == 1 { f32::NAN } else { 5.0 };
            (u, 0.0, height_z(5000.0))
        });
        let shear = horizontal_shear(&set).unwrap();
        // Neighbors whose stencil reads the gap go NaN, the far corner stays.
        assert!(shear.value(1, 0).is_nan());
        assert!(shear.value(1, 2).is_nan());
        assert!(shear.value(1, 1).is_nan());
        assert!(!shear.value(0, 0).is_nan());
    }

    #[test]
    fn test_horizontal_shear_rejects_tiny_grids() {
        let set = make_set(1, 4, |_, _, _| (0.0, 0.0, 0.0));
        assert!(matches!(
            horizontal_shear(&set),
            Err(AnalysisError::GridTooSmall(_))
        ));
    }

    #[test]
    fn test_combined_shear_is_euclidean() {
        let lats = vec![1.0, 0.0];
        let lons = vec![0.0, 1.0];
        let v = ShearField::new(vec![3.0; 4], lats.clone(), lons.clone()).unwrap();
        let h = ShearField::new(vec![4.0; 4], lats, lons).unwrap();
        let c = combined_shear(&v, &h).unwrap();
        assert!(c.values.iter().all(|&x| (x - 5.0).abs() < 1e-6));
    }

    #[test]
    fn test_combined_shear_propagates_nan() {
        let lats = vec![1.0, 0.0];
        let lons = vec![0.0, 1.0];
        let v = ShearField::new(vec![3.0, f32::NAN, 3.0, 3.0], lats.clone(), lons.clone()).unwrap();
        let h = ShearField::new(vec![4.0; 4], lats, lons).unwrap();
        let c = combined_shear(&v, &h).unwrap();
        assert!(c.values[1].is_nan());
        assert!(!c.values[0].is_nan());
    }

    #[test]
    fn test_combined_shear_rejects_mismatched_grids() {
        let v = ShearField::new(vec![0.0; 4], vec![1.0, 0.0], vec![0.0, 1.0]).unwrap();
        let h = ShearField::new(vec![0.0; 6], vec![1.0, 0.0], vec![0.0, 1.0, 2.0]).unwrap();
        assert!(matches!(
            combined_shear(&v, &h),
            Err(AnalysisError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_shear_outputs_are_non_negative() {
        // Mixed-sign winds in both directions.
        let set = make_set(5, 6, |level, j, i| {
            let u = ((i as f32 * 7.0 + j as f32 * 3.0) % 11.0) - 5.0 + level as f32;
            let v = ((i as f32 * 5.0 + j as f32 * 13.0) % 9.0) - 4.0 - level as f32;
            (u, v, height_z(5000.0 + 4000.0 * level as f32))
        });
        let vert = vertical_shear(&set).unwrap();
        let horiz = horizontal_shear(&set).unwrap();
        let comb = combined_shear(&vert, &horiz).unwrap();
        for field in [&vert, &horiz, &comb] {
            assert!(field.values.iter().all(|&x| x.is_finite() && x >= 0.0));
        }
    }
}
