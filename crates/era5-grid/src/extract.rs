//! Regional subsetting of global fields.
//!
//! Selection is inclusive: a grid point belongs to the subset when its
//! coordinate lies inside the bounding box. Longitude selection is circular,
//! so boxes that span the antimeridian (and boxes that straddle the seam of
//! a 0..360 grid) come out as one contiguous block with strictly increasing,
//! unwrapped longitudes.

use turb_common::bbox::{normalize_lon, BoundingBox};

use crate::error::{GridError, GridResult};
use crate::field::{FieldSet, GriddedField};

/// Extract the subset of `field` covered by `bbox`.
///
/// The input is never mutated and the operation is idempotent: re-extracting
/// an extracted field with the same box returns an identical field.
pub fn extract_region(field: &GriddedField, bbox: &BoundingBox) -> GridResult<GriddedField> {
    let lat_idx: Vec<usize> = (0..field.nlat())
        .filter(|&j| bbox.contains_lat(field.lats[j]))
        .collect();
    if lat_idx.is_empty() {
        return Err(GridError::EmptySelection(format!(
            "no latitudes in [{}, {}]",
            bbox.lat_min, bbox.lat_max
        )));
    }

    let lon_idx = select_longitudes(&field.lons, bbox)?;

    let mut lons = Vec::with_capacity(lon_idx.len());
    for &i in &lon_idx {
        let mut lon = normalize_lon(field.lons[i]);
        if let Some(&prev) = lons.last() {
            // Unwrap past the seam so the output axis stays increasing.
            if lon <= prev {
                lon += 360.0;
            }
        }
        lons.push(lon);
    }
    // A full-circle selection keeps the source axis untouched.
    if lon_idx.len() == field.nlon() && lon_idx[0] == 0 {
        lons = field.lons.clone();
    }

    let lats: Vec<f64> = lat_idx.iter().map(|&j| field.lats[j]).collect();

    let mut data = Vec::with_capacity(field.nlev() * lat_idx.len() * lon_idx.len());
    for level in 0..field.nlev() {
        for &j in &lat_idx {
            for &i in &lon_idx {
                data.push(field.value(level, j, i));
            }
        }
    }

    GriddedField::new(field.name.clone(), field.levels.clone(), lats, lons, data)
}

/// Extract every field of a set with the same box.
pub fn extract_field_set(set: &FieldSet, bbox: &BoundingBox) -> GridResult<FieldSet> {
    FieldSet::new(
        extract_region(&set.u, bbox)?,
        extract_region(&set.v, bbox)?,
        extract_region(&set.z, bbox)?,
    )
}

/// Pick the longitude indices inside `bbox`, in circular walk order.
///
/// On a longitudinally global grid the contained indices form one circular
/// arc; the walk starts at the arc's western edge and may wrap past the end
/// of the axis. Non-global grids only admit linear (non-wrapping) selections.
fn select_longitudes(lons: &[f64], bbox: &BoundingBox) -> GridResult<Vec<usize>> {
    let nlon = lons.len();
    let in_box: Vec<bool> = lons.iter().map(|&l| bbox.contains_lon(l)).collect();
    let count = in_box.iter().filter(|&&b| b).count();

    if count == 0 {
        return Err(GridError::EmptySelection(format!(
            "no longitudes in [{}, {}]",
            bbox.lon_min, bbox.lon_max
        )));
    }
    if count == nlon {
        return Ok((0..nlon).collect());
    }

    // Start of the (single) circular run: an in-box index whose circular
    // predecessor is outside.
    let start = (0..nlon)
        .find(|&i| in_box[i] && !in_box[(i + nlon - 1) % nlon])
        .ok_or_else(|| {
            GridError::InconsistentGrid("longitude selection has no run boundary".to_string())
        })?;

    let wraps = start + count > nlon;
    if wraps && !is_global(lons) {
        return Err(GridError::InconsistentGrid(
            "bounding box wraps around but the grid is not longitudinally global".to_string(),
        ));
    }

    let idx: Vec<usize> = (0..count).map(|k| (start + k) % nlon).collect();
    // An interval box selects exactly one arc; anything else means the
    // coordinates and the box disagree.
    if idx.iter().any(|&i| !in_box[i]) {
        return Err(GridError::InconsistentGrid(
            "longitude selection is not a single contiguous arc".to_string(),
        ));
    }
    Ok(idx)
}

/// True when the longitude axis covers the full circle at its own spacing.
fn is_global(lons: &[f64]) -> bool {
    if lons.len() < 2 {
        return false;
    }
    let spacing = (lons[lons.len() - 1] - lons[0]) / (lons.len() - 1) as f64;
    let closed = lons[lons.len() - 1] - lons[0] + spacing;
    (closed - 360.0).abs() < spacing * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One-level global grid at 1 degree with value = source lon index.
    fn global_field(lon_start: f64) -> GriddedField {
        let lats: Vec<f64> = (0..181).map(|j| 90.0 - j as f64).collect();
        let lons: Vec<f64> = (0..360).map(|i| lon_start + i as f64).collect();
        let mut data = Vec::with_capacity(lats.len() * lons.len());
        for _j in 0..lats.len() {
            for i in 0..lons.len() {
                data.push(i as f32);
            }
        }
        GriddedField::new("u", vec![500.0], lats, lons, data).unwrap()
    }

    #[test]
    fn test_extract_plain_box() {
        let field = global_field(-180.0);
        let europe = BoundingBox::new(36.0, 71.0, -31.0, 40.0).unwrap();
        let sub = extract_region(&field, &europe).unwrap();

        assert_eq!(sub.lats.first().copied(), Some(71.0));
        assert_eq!(sub.lats.last().copied(), Some(36.0));
        assert_eq!(sub.lons.first().copied(), Some(-31.0));
        assert_eq!(sub.lons.last().copied(), Some(40.0));
        assert_eq!(sub.nlon(), 72);
        assert_eq!(sub.nlat(), 36);
    }

    #[test]
    fn test_extract_across_grid_seam() {
        // A 0..359 grid splits Europe across its seam; the output must still
        // be one block running west to east.
        let field = global_field(0.0);
        let europe = BoundingBox::new(36.0, 71.0, -31.0, 40.0).unwrap();
        let sub = extract_region(&field, &europe).unwrap();

        assert_eq!(sub.nlon(), 72);
        assert_eq!(sub.lons.first().copied(), Some(-31.0));
        assert_eq!(sub.lons.last().copied(), Some(40.0));
        assert!(sub.lons.windows(2).all(|w| w[1] > w[0]));
        // Values follow the source indices: 329..359 then 0..40.
        assert_eq!(sub.value(0, 0, 0), 329.0);
        assert_eq!(sub.value(0, 0, 31), 0.0);
        assert_eq!(sub.value(0, 0, 71), 40.0);
    }

    #[test]
    fn test_extract_across_antimeridian() {
        let field = global_field(-180.0);
        let pacific = BoundingBox::new(-45.0, 45.0, 140.0, -120.0).unwrap();
        let sub = extract_region(&field, &pacific).unwrap();

        // 140..179 native plus -180..-120 unwrapped to 180..240.
        assert_eq!(sub.lons.first().copied(), Some(140.0));
        assert_eq!(sub.lons.last().copied(), Some(240.0));
        assert_eq!(sub.nlon(), 101);
        assert!(sub.lons.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_extract_is_idempotent() {
        let field = global_field(0.0);
        let europe = BoundingBox::new(36.0, 71.0, -31.0, 40.0).unwrap();
        let once = extract_region(&field, &europe).unwrap();
        let twice = extract_region(&once, &europe).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_extract_empty_selection() {
        let field = global_field(-180.0);
        // Latitudes outside any grid point: between two integer rows.
        let sliver = BoundingBox::new(10.2, 10.8, 0.0, 10.0).unwrap();
        assert!(matches!(
            extract_region(&field, &sliver),
            Err(GridError::EmptySelection(_))
        ));
    }

    #[test]
    fn test_full_circle_box_is_identity() {
        let field = global_field(0.0);
        let antarctica = BoundingBox::new(-90.0, -60.0, -180.0, 180.0).unwrap();
        let sub = extract_region(&field, &antarctica).unwrap();
        assert_eq!(sub.nlon(), 360);
        assert_eq!(sub.lons, field.lons);
        assert_eq!(sub.lats.first().copied(), Some(-60.0));
        assert_eq!(sub.lats.last().copied(), Some(-90.0));
    }
}
