//! Raster resampling to the output pixel grid.
//!
//! Continuous fields use bilinear interpolation with NaN-aware weights:
//! missing corners drop out and the remaining weights renormalize, so gaps
//! shrink to their true footprint instead of bleeding NaN across the panel.
//! A pixel whose four corners are all missing stays missing. Categorical
//! fields use nearest-neighbor, since severity classes do not interpolate.

/// Bilinear resample of a row-major grid to `dst_width` x `dst_height`.
pub fn resample_bilinear(
    data: &[f32],
    src_width: usize,
    src_height: usize,
    dst_width: usize,
    dst_height: usize,
) -> Vec<f32> {
    if src_width == dst_width && src_height == dst_height {
        return data.to_vec();
    }

    let mut output = vec![f32::NAN; dst_width * dst_height];

    let x_ratio = ratio(src_width, dst_width);
    let y_ratio = ratio(src_height, dst_height);

    for y in 0..dst_height {
        for x in 0..dst_width {
            let src_x = x as f32 * x_ratio;
            let src_y = y as f32 * y_ratio;

            let x1 = (src_x.floor() as usize).min(src_width - 1);
            let y1 = (src_y.floor() as usize).min(src_height - 1);
            let x2 = (x1 + 1).min(src_width - 1);
            let y2 = (y1 + 1).min(src_height - 1);

            let dx = src_x - x1 as f32;
            let dy = src_y - y1 as f32;

            let corners = [
                (data[y1 * src_width + x1], (1.0 - dx) * (1.0 - dy)),
                (data[y1 * src_width + x2], dx * (1.0 - dy)),
                (data[y2 * src_width + x1], (1.0 - dx) * dy),
                (data[y2 * src_width + x2], dx * dy),
            ];

            let mut sum = 0.0f32;
            let mut weight = 0.0f32;
            for (value, w) in corners {
                if !value.is_nan() && w > 0.0 {
                    sum += value * w;
                    weight += w;
                }
            }

            output[y * dst_width + x] = if weight > 0.0 { sum / weight } else { f32::NAN };
        }
    }

    output
}

/// Nearest-neighbor resample for classified cells.
pub fn resample_nearest(
    cells: &[Option<u8>],
    src_width: usize,
    src_height: usize,
    dst_width: usize,
    dst_height: usize,
) -> Vec<Option<u8>> {
    if src_width == dst_width && src_height == dst_height {
        return cells.to_vec();
    }

    let x_ratio = ratio(src_width, dst_width);
    let y_ratio = ratio(src_height, dst_height);

    let mut output = Vec::with_capacity(dst_width * dst_height);
    for y in 0..dst_height {
        let src_y = ((y as f32 * y_ratio).round() as usize).min(src_height - 1);
        for x in 0..dst_width {
            let src_x = ((x as f32 * x_ratio).round() as usize).min(src_width - 1);
            output.push(cells[src_y * src_width + src_x]);
        }
    }
    output
}

/// Edge-aligned source step per destination pixel.
fn ratio(src: usize, dst: usize) -> f32 {
    if dst <= 1 {
        0.0
    } else {
        (src - 1) as f32 / (dst - 1) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bilinear_identity_when_sizes_match() {
        let data = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(resample_bilinear(&data, 2, 2, 2, 2), data);
    }

    #[test]
    fn test_bilinear_midpoint() {
        // 2x2 -> 3x3 puts the center pixel at the average of all corners.
        let data = vec![0.0, 2.0, 2.0, 4.0];
        let out = resample_bilinear(&data, 2, 2, 3, 3);
        assert_eq!(out.len(), 9);
        assert!((out[4] - 2.0).abs() < 1e-6);
        assert_eq!(out[0], 0.0);
        assert_eq!(out[8], 4.0);
    }

    #[test]
    fn test_bilinear_renormalizes_around_gaps() {
        // One NaN corner: the center uses the other three, stays finite.
        let data = vec![f32::NAN, 2.0, 2.0, 4.0];
        let out = resample_bilinear(&data, 2, 2, 3, 3);
        let center = out[4];
        assert!(center.is_finite());
        assert!((center - (2.0 + 2.0 + 4.0) / 3.0).abs() < 1e-6);
        // The corner that maps exactly onto the gap has no finite support.
        assert!(out[0].is_nan());
    }

    #[test]
    fn test_bilinear_all_nan_stays_nan() {
        let data = vec![f32::NAN; 4];
        let out = resample_bilinear(&data, 2, 2, 4, 4);
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_nearest_keeps_categories() {
        let cells = vec![Some(0), Some(1), None, Some(4)];
        let out = resample_nearest(&cells, 2, 2, 4, 4);
        assert_eq!(out.len(), 16);
        assert_eq!(out[0], Some(0));
        assert_eq!(out[3], Some(1));
        assert_eq!(out[12], None);
        assert_eq!(out[15], Some(4));
        // Nothing interpolated: every output cell is one of the inputs.
        assert!(out.iter().all(|c| cells.contains(c)));
    }
}
