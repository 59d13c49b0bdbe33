//! Chart annotation: fonts, graticule, frame, titles and legends.
//!
//! All text rendering degrades gracefully. When no usable TrueType font is
//! found the chart is still produced with its data panel, graticule lines and
//! legend swatches; only the text labels are omitted.

use image::{Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut,
};
use imageproc::rect::Rect;
use rusttype::{Font, Scale};

use crate::colormap::{CategoryScale, ColorScale, NO_DATA_COLOR};
use crate::map::MapExtent;

/// Well-known font locations tried after any configured paths.
const DEFAULT_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
];

const FRAME_COLOR: Rgba<u8> = Rgba([60, 60, 60, 255]);
const GRID_LINE_COLOR: Rgba<u8> = Rgba([170, 170, 170, 255]);
const LABEL_COLOR: Rgba<u8> = Rgba([60, 60, 60, 255]);
const TITLE_COLOR: Rgba<u8> = Rgba([20, 20, 20, 255]);

/// Loaded chart font, or nothing if no candidate path worked.
pub struct FontBook {
    font: Option<Font<'static>>,
}

impl FontBook {
    /// Try `extra_paths` first, then the built-in candidates.
    pub fn load(extra_paths: &[String]) -> Self {
        let candidates = extra_paths
            .iter()
            .map(String::as_str)
            .chain(DEFAULT_FONT_PATHS.iter().copied());

        for path in candidates {
            let bytes = match std::fs::read(path) {
                Ok(b) => b,
                Err(_) => continue,
            };
            match Font::try_from_vec(bytes) {
                Some(font) => {
                    tracing::debug!(path, "loaded chart font");
                    return Self { font: Some(font) };
                }
                None => {
                    tracing::warn!(path, "file is not a usable TrueType font");
                }
            }
        }

        tracing::warn!("no chart font found; labels will be omitted");
        Self { font: None }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    fn font(&self) -> Option<&Font<'static>> {
        self.font.as_ref()
    }
}

/// Pixel rectangle holding the data raster inside the chart canvas.
pub(crate) struct Panel {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Panel {
    pub(crate) fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub(crate) fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    fn lon_to_x(&self, lon: f64, extent: &MapExtent) -> f32 {
        let frac = (lon - extent.lon_min) / extent.lon_span();
        self.x as f32 + frac as f32 * self.width as f32
    }

    fn lat_to_y(&self, lat: f64, extent: &MapExtent) -> f32 {
        let frac = (extent.lat_max - lat) / extent.lat_span();
        self.y as f32 + frac as f32 * self.height as f32
    }
}

/// Draw latitude/longitude lines across the panel with edge labels.
pub(crate) fn draw_graticule(
    img: &mut RgbaImage,
    panel: &Panel,
    extent: &MapExtent,
    fonts: &FontBook,
) {
    let lon_step = graticule_step(extent.lon_span());
    let lat_step = graticule_step(extent.lat_span());

    let mut lon = (extent.lon_min / lon_step).ceil() * lon_step;
    while lon <= extent.lon_max + 1e-9 {
        let x = panel.lon_to_x(lon, extent);
        if x >= panel.x as f32 && x <= panel.right() as f32 {
            draw_line_segment_mut(
                img,
                (x, panel.y as f32),
                (x, panel.bottom() as f32),
                GRID_LINE_COLOR,
            );
            let text = format_lon(lon);
            let tx = x as i32 - text_width(&text, 11.0) / 2;
            draw_label(img, fonts, &text, tx, panel.bottom() + 5, 11.0, LABEL_COLOR);
        }
        lon += lon_step;
    }

    let mut lat = (extent.lat_min / lat_step).ceil() * lat_step;
    while lat <= extent.lat_max + 1e-9 {
        let y = panel.lat_to_y(lat, extent);
        if y >= panel.y as f32 && y <= panel.bottom() as f32 {
            draw_line_segment_mut(
                img,
                (panel.x as f32, y),
                (panel.right() as f32, y),
                GRID_LINE_COLOR,
            );
            let text = format_lat(lat);
            let tx = panel.x - text_width(&text, 11.0) - 6;
            draw_label(img, fonts, &text, tx, y as i32 - 6, 11.0, LABEL_COLOR);
        }
        lat += lat_step;
    }
}

/// Outline the data panel.
pub(crate) fn draw_frame(img: &mut RgbaImage, panel: &Panel) {
    draw_hollow_rect_mut(
        img,
        Rect::at(panel.x, panel.y).of_size(panel.width, panel.height),
        FRAME_COLOR,
    );
}

/// Title and subtitle above the panel.
pub(crate) fn draw_title_block(
    img: &mut RgbaImage,
    fonts: &FontBook,
    title: &str,
    subtitle: &str,
    x: i32,
) {
    draw_label(img, fonts, title, x, 8, 18.0, TITLE_COLOR);
    if !subtitle.is_empty() {
        draw_label(img, fonts, subtitle, x, 30, 12.0, LABEL_COLOR);
    }
}

/// Vertical gradient bar with tick labels for a continuous scale, plus a
/// no-data swatch underneath.
pub(crate) fn draw_scale_bar(
    img: &mut RgbaImage,
    fonts: &FontBook,
    scale: &ColorScale,
    x: i32,
    y: i32,
    height: u32,
) {
    const BAR_WIDTH: u32 = 18;

    let min = scale.min_value();
    let max = scale.max_value();
    let range = (max - min).max(f32::EPSILON);

    draw_label(img, fonts, &scale.unit, x, y - 16, 11.0, LABEL_COLOR);

    // Highest value at the top of the bar.
    for row in 0..height {
        let value = max - range * row as f32 / (height.max(2) - 1) as f32;
        let color = scale.color_at(value).to_rgba();
        for col in 0..BAR_WIDTH {
            let px = x + col as i32;
            let py = y + row as i32;
            if px >= 0 && py >= 0 && (px as u32) < img.width() && (py as u32) < img.height() {
                img.put_pixel(px as u32, py as u32, color);
            }
        }
    }
    draw_hollow_rect_mut(img, Rect::at(x, y).of_size(BAR_WIDTH, height), FRAME_COLOR);

    for (value, _) in &scale.stops {
        let row = ((max - value) / range * (height - 1) as f32).round() as i32;
        let py = y + row;
        draw_line_segment_mut(
            img,
            ((x + BAR_WIDTH as i32) as f32, py as f32),
            ((x + BAR_WIDTH as i32 + 4) as f32, py as f32),
            FRAME_COLOR,
        );
        draw_label(
            img,
            fonts,
            &format_scale_value(*value),
            x + BAR_WIDTH as i32 + 7,
            py - 6,
            11.0,
            LABEL_COLOR,
        );
    }

    let swatch_y = y + height as i32 + 12;
    draw_filled_rect_mut(
        img,
        Rect::at(x, swatch_y).of_size(BAR_WIDTH, 12),
        NO_DATA_COLOR.to_rgba(),
    );
    draw_hollow_rect_mut(img, Rect::at(x, swatch_y).of_size(BAR_WIDTH, 12), FRAME_COLOR);
    draw_label(
        img,
        fonts,
        "no data",
        x + BAR_WIDTH as i32 + 7,
        swatch_y,
        11.0,
        LABEL_COLOR,
    );
}

/// Swatch-per-category key, one row per severity plus the no-data row.
pub(crate) fn draw_category_key(
    img: &mut RgbaImage,
    fonts: &FontBook,
    scale: &CategoryScale,
    x: i32,
    y: i32,
) {
    const SWATCH: u32 = 14;
    const ROW_HEIGHT: i32 = 21;

    let mut row_y = y;
    for (label, color) in &scale.entries {
        draw_filled_rect_mut(img, Rect::at(x, row_y).of_size(SWATCH, SWATCH), color.to_rgba());
        draw_hollow_rect_mut(img, Rect::at(x, row_y).of_size(SWATCH, SWATCH), FRAME_COLOR);
        draw_label(img, fonts, label, x + SWATCH as i32 + 8, row_y + 1, 12.0, LABEL_COLOR);
        row_y += ROW_HEIGHT;
    }

    draw_filled_rect_mut(
        img,
        Rect::at(x, row_y).of_size(SWATCH, SWATCH),
        NO_DATA_COLOR.to_rgba(),
    );
    draw_hollow_rect_mut(img, Rect::at(x, row_y).of_size(SWATCH, SWATCH), FRAME_COLOR);
    draw_label(
        img,
        fonts,
        &scale.no_data_label,
        x + SWATCH as i32 + 8,
        row_y + 1,
        12.0,
        LABEL_COLOR,
    );
}

fn draw_label(
    img: &mut RgbaImage,
    fonts: &FontBook,
    text: &str,
    x: i32,
    y: i32,
    size: f32,
    color: Rgba<u8>,
) {
    let font = match fonts.font() {
        Some(f) => f,
        None => return,
    };
    if x < 0 || y < 0 || x >= img.width() as i32 || y >= img.height() as i32 {
        return;
    }
    draw_text_mut(img, color, x, y, Scale::uniform(size), font, text);
}

/// Rough text width for centering and right-alignment.
fn text_width(text: &str, size: f32) -> i32 {
    (text.len() as f32 * size * 0.6) as i32
}

/// Degree spacing that keeps the line count readable for a given span.
fn graticule_step(span: f64) -> f64 {
    const STEPS: &[f64] = &[0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 15.0, 20.0, 30.0, 45.0];
    for &step in STEPS {
        if span / step <= 8.0 {
            return step;
        }
    }
    45.0
}

/// Map any longitude into [-180, 180) for display.
fn wrap_degrees(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

pub(crate) fn format_lat(lat: f64) -> String {
    if lat.abs() < 1e-9 {
        "0\u{b0}".to_string()
    } else if lat > 0.0 {
        format!("{}\u{b0}N", format_degrees(lat))
    } else {
        format!("{}\u{b0}S", format_degrees(-lat))
    }
}

pub(crate) fn format_lon(lon: f64) -> String {
    let wrapped = wrap_degrees(lon);
    if wrapped.abs() < 1e-9 {
        "0\u{b0}".to_string()
    } else if (wrapped + 180.0).abs() < 1e-9 {
        "180\u{b0}".to_string()
    } else if wrapped > 0.0 {
        format!("{}\u{b0}E", format_degrees(wrapped))
    } else {
        format!("{}\u{b0}W", format_degrees(-wrapped))
    }
}

fn format_degrees(value: f64) -> String {
    if (value - value.round()).abs() < 1e-9 {
        format!("{}", value.round() as i64)
    } else {
        format!("{value:.1}")
    }
}

fn format_scale_value(value: f32) -> String {
    if (value - value.round()).abs() < 1e-3 {
        format!("{}", value.round() as i64)
    } else {
        format!("{value:.1}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_lat() {
        assert_eq!(format_lat(45.0), "45\u{b0}N");
        assert_eq!(format_lat(-33.5), "33.5\u{b0}S");
        assert_eq!(format_lat(0.0), "0\u{b0}");
    }

    #[test]
    fn test_format_lon_wraps_unwrapped_values() {
        assert_eq!(format_lon(120.0), "120\u{b0}E");
        assert_eq!(format_lon(-75.0), "75\u{b0}W");
        assert_eq!(format_lon(0.0), "0\u{b0}");
        assert_eq!(format_lon(180.0), "180\u{b0}");
        // Values past the antimeridian come from unwrapped extraction grids.
        assert_eq!(format_lon(195.0), "165\u{b0}W");
        assert_eq!(format_lon(240.0), "120\u{b0}W");
    }

    #[test]
    fn test_graticule_step_scales_with_span() {
        assert_eq!(graticule_step(2.0), 0.25);
        assert_eq!(graticule_step(35.0), 5.0);
        assert_eq!(graticule_step(71.0), 10.0);
        assert_eq!(graticule_step(100.0), 15.0);
        assert_eq!(graticule_step(360.0), 45.0);
    }

    #[test]
    fn test_missing_font_still_draws_geometry() {
        let fonts = FontBook {
            font: None,
        };
        let mut img = RgbaImage::from_pixel(120, 100, Rgba([255, 255, 255, 255]));
        let panel = Panel {
            x: 20,
            y: 10,
            width: 80,
            height: 70,
        };
        let extent = MapExtent::new(36.0, 71.0, -31.0, 40.0).unwrap();
        draw_graticule(&mut img, &panel, &extent, &fonts);
        draw_frame(&mut img, &panel);
        // Frame corner pixel takes the frame color.
        assert_eq!(img.get_pixel(20, 10), &Rgba([60, 60, 60, 255]));
    }
}
