//! Chart composition: layout, colorization, annotation and encoding.
//!
//! Input rasters are row-major with row 0 at the northern edge, matching the
//! descending-latitude order the analysis grids use. Longitudes are given
//! unwrapped, so extents crossing the antimeridian stay monotonic.

use image::{Rgba, RgbaImage};
use tracing::debug;

use crate::annotate::{self, FontBook, Panel};
use crate::colormap::{CategoryScale, ColorScale, NO_DATA_COLOR};
use crate::error::{RenderError, RenderResult};
use crate::png::encode_png;
use crate::resample::{resample_bilinear, resample_nearest};

const MARGIN_LEFT: u32 = 56;
const MARGIN_RIGHT: u32 = 110;
const MARGIN_TOP: u32 = 48;
const MARGIN_BOTTOM: u32 = 40;

const MIN_PANEL_HEIGHT: u32 = 160;
const MAX_PANEL_HEIGHT: u32 = 1400;

/// Geographic coverage of the raster handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapExtent {
    pub lat_min: f64,
    pub lat_max: f64,
    /// Western edge. May be any unwrapped value.
    pub lon_min: f64,
    /// Eastern edge, strictly greater than `lon_min`; exceeds 180 when the
    /// chart crosses the antimeridian.
    pub lon_max: f64,
}

impl MapExtent {
    pub fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> RenderResult<Self> {
        if !(lat_min.is_finite() && lat_max.is_finite() && lon_min.is_finite() && lon_max.is_finite())
        {
            return Err(RenderError::InvalidInput(
                "extent coordinates must be finite".to_string(),
            ));
        }
        if lat_min >= lat_max {
            return Err(RenderError::InvalidInput(format!(
                "latitude range is empty: {lat_min} >= {lat_max}"
            )));
        }
        if lon_min >= lon_max {
            return Err(RenderError::InvalidInput(format!(
                "longitude range is empty: {lon_min} >= {lon_max} (unwrapped)"
            )));
        }
        Ok(Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        })
    }

    pub fn lat_span(&self) -> f64 {
        self.lat_max - self.lat_min
    }

    pub fn lon_span(&self) -> f64 {
        self.lon_max - self.lon_min
    }
}

/// Chart layout and typography options.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Width of the data panel in pixels; the canvas adds fixed margins.
    pub panel_width: u32,
    pub title: String,
    pub subtitle: String,
    /// Font files to try before the built-in candidates.
    pub font_paths: Vec<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            panel_width: 900,
            title: String::new(),
            subtitle: String::new(),
            font_paths: Vec::new(),
        }
    }
}

/// Render a continuous shear field as a finished PNG chart.
///
/// `values` is row-major, `nlat` rows by `nlon` columns, row 0 north.
/// NaN cells come out in the no-data gray.
pub fn render_continuous(
    values: &[f32],
    nlat: usize,
    nlon: usize,
    extent: &MapExtent,
    scale: &ColorScale,
    options: &RenderOptions,
) -> RenderResult<Vec<u8>> {
    check_raster(values.len(), nlat, nlon)?;

    let (panel, canvas_w, canvas_h) = layout(extent, options);
    let fonts = FontBook::load(&options.font_paths);

    debug!(
        canvas_w,
        canvas_h,
        nlat,
        nlon,
        unit = %scale.unit,
        "rendering continuous chart"
    );

    let resampled = resample_bilinear(
        values,
        nlon,
        nlat,
        panel.width as usize,
        panel.height as usize,
    );

    let mut img = blank_canvas(canvas_w, canvas_h);
    for row in 0..panel.height as usize {
        for col in 0..panel.width as usize {
            let value = resampled[row * panel.width as usize + col];
            let color = if value.is_nan() {
                NO_DATA_COLOR
            } else {
                scale.color_at(value)
            };
            img.put_pixel(
                panel.x as u32 + col as u32,
                panel.y as u32 + row as u32,
                color.to_rgba(),
            );
        }
    }

    annotate::draw_graticule(&mut img, &panel, extent, &fonts);
    annotate::draw_frame(&mut img, &panel);
    annotate::draw_title_block(&mut img, &fonts, &options.title, &options.subtitle, panel.x);

    let legend_height = ((panel.height as f32 * 0.6) as u32).clamp(120, 260).min(panel.height);
    annotate::draw_scale_bar(
        &mut img,
        &fonts,
        scale,
        panel.right() + 26,
        panel.y + 20,
        legend_height,
    );

    encode_png(img.as_raw(), canvas_w as usize, canvas_h as usize)
}

/// Render classified severity cells as a finished PNG chart.
///
/// `cells` is row-major like `render_continuous`; `None` cells come out in
/// the no-data gray. Cells resample by nearest neighbor, so class boundaries
/// stay crisp.
pub fn render_categorical(
    cells: &[Option<u8>],
    nlat: usize,
    nlon: usize,
    extent: &MapExtent,
    scale: &CategoryScale,
    options: &RenderOptions,
) -> RenderResult<Vec<u8>> {
    check_raster(cells.len(), nlat, nlon)?;

    let (panel, canvas_w, canvas_h) = layout(extent, options);
    let fonts = FontBook::load(&options.font_paths);

    debug!(canvas_w, canvas_h, nlat, nlon, "rendering categorical chart");

    let resampled = resample_nearest(
        cells,
        nlon,
        nlat,
        panel.width as usize,
        panel.height as usize,
    );

    let mut img = blank_canvas(canvas_w, canvas_h);
    for row in 0..panel.height as usize {
        for col in 0..panel.width as usize {
            let cell = resampled[row * panel.width as usize + col];
            img.put_pixel(
                panel.x as u32 + col as u32,
                panel.y as u32 + row as u32,
                scale.color_for(cell).to_rgba(),
            );
        }
    }

    annotate::draw_graticule(&mut img, &panel, extent, &fonts);
    annotate::draw_frame(&mut img, &panel);
    annotate::draw_title_block(&mut img, &fonts, &options.title, &options.subtitle, panel.x);
    annotate::draw_category_key(&mut img, &fonts, scale, panel.right() + 26, panel.y + 8);

    encode_png(img.as_raw(), canvas_w as usize, canvas_h as usize)
}

fn check_raster(len: usize, nlat: usize, nlon: usize) -> RenderResult<()> {
    if nlat == 0 || nlon == 0 {
        return Err(RenderError::InvalidInput(
            "raster must have at least one row and column".to_string(),
        ));
    }
    if len != nlat * nlon {
        return Err(RenderError::InvalidInput(format!(
            "raster has {len} cells but {nlat}x{nlon} needs {}",
            nlat * nlon
        )));
    }
    Ok(())
}

/// Panel geometry follows the geographic aspect ratio so regions keep their
/// proportions; extreme ratios are clamped to stay printable.
fn layout(extent: &MapExtent, options: &RenderOptions) -> (Panel, u32, u32) {
    let panel_width = options.panel_width.max(200);
    let aspect = extent.lat_span() / extent.lon_span();
    let panel_height =
        ((panel_width as f64 * aspect).round() as u32).clamp(MIN_PANEL_HEIGHT, MAX_PANEL_HEIGHT);

    let panel = Panel {
        x: MARGIN_LEFT as i32,
        y: MARGIN_TOP as i32,
        width: panel_width,
        height: panel_height,
    };
    let canvas_w = MARGIN_LEFT + panel_width + MARGIN_RIGHT;
    let canvas_h = MARGIN_TOP + panel_height + MARGIN_BOTTOM;
    (panel, canvas_w, canvas_h)
}

fn blank_canvas(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]))
}
