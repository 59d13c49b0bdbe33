//! Color scales for continuous and categorical products.

/// Color value in RGBA format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub(crate) fn to_rgba(self) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, self.a])
    }
}

/// Gray used for gaps in both product families; also appears in legends.
pub const NO_DATA_COLOR: Color = Color::rgb(205, 205, 205);

/// Linear color interpolation
pub fn interpolate_color(color1: Color, color2: Color, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    let t_inv = 1.0 - t;

    Color::new(
        ((color1.r as f32 * t_inv) + (color2.r as f32 * t)) as u8,
        ((color1.g as f32 * t_inv) + (color2.g as f32 * t)) as u8,
        ((color1.b as f32 * t_inv) + (color2.b as f32 * t)) as u8,
        ((color1.a as f32 * t_inv) + (color2.a as f32 * t)) as u8,
    )
}

/// Piecewise-linear gradient over ascending value stops.
#[derive(Debug, Clone)]
pub struct ColorScale {
    /// Unit annotation for the colorbar, e.g. "m/s per km".
    pub unit: String,
    /// Ascending (value, color) stops.
    pub stops: Vec<(f32, Color)>,
}

impl ColorScale {
    pub fn new(unit: impl Into<String>, stops: Vec<(f32, Color)>) -> Self {
        Self {
            unit: unit.into(),
            stops,
        }
    }

    /// Shear gradient anchored on the classification breakpoints, so the
    /// continuous charts and the severity charts tell the same story.
    pub fn shear(light: f32, moderate: f32, severe: f32, extreme: f32) -> Self {
        Self::new(
            "m/s per km",
            vec![
                (0.0, Color::rgb(240, 248, 255)),
                (light * 0.5, Color::rgb(170, 215, 250)),
                (light, Color::rgb(80, 170, 240)),
                (moderate, Color::rgb(250, 230, 80)),
                (severe, Color::rgb(250, 140, 40)),
                (extreme, Color::rgb(220, 40, 40)),
                (extreme * 1.5, Color::rgb(120, 10, 60)),
            ],
        )
    }

    pub fn min_value(&self) -> f32 {
        self.stops.first().map(|s| s.0).unwrap_or(0.0)
    }

    pub fn max_value(&self) -> f32 {
        self.stops.last().map(|s| s.0).unwrap_or(1.0)
    }

    /// Color for a finite value; values beyond the ends clamp.
    pub fn color_at(&self, value: f32) -> Color {
        match self.stops.as_slice() {
            [] => NO_DATA_COLOR,
            [only] => only.1,
            stops => {
                if value <= stops[0].0 {
                    return stops[0].1;
                }
                for pair in stops.windows(2) {
                    let (v0, c0) = pair[0];
                    let (v1, c1) = pair[1];
                    if value <= v1 {
                        let t = if v1 > v0 { (value - v0) / (v1 - v0) } else { 1.0 };
                        return interpolate_color(c0, c1, t);
                    }
                }
                stops[stops.len() - 1].1
            }
        }
    }
}

impl Default for ColorScale {
    fn default() -> Self {
        Self::shear(2.0, 4.0, 7.0, 10.0)
    }
}

/// Fixed palette with one labeled swatch per category.
#[derive(Debug, Clone)]
pub struct CategoryScale {
    /// (label, color) in ascending severity order; cell indices point here.
    pub entries: Vec<(String, Color)>,
    /// Legend label for the no-data swatch.
    pub no_data_label: String,
}

impl CategoryScale {
    /// The five turbulence severities.
    pub fn turbulence() -> Self {
        Self {
            entries: vec![
                ("None".to_string(), Color::rgb(198, 228, 199)),
                ("Light".to_string(), Color::rgb(255, 241, 118)),
                ("Moderate".to_string(), Color::rgb(255, 167, 38)),
                ("Severe".to_string(), Color::rgb(229, 57, 53)),
                ("Extreme".to_string(), Color::rgb(123, 31, 162)),
            ],
            no_data_label: "No data".to_string(),
        }
    }

    /// Color for a classified cell; `None` and out-of-range map to gray.
    pub fn color_for(&self, cell: Option<u8>) -> Color {
        cell.and_then(|idx| self.entries.get(idx as usize))
            .map(|(_, c)| *c)
            .unwrap_or(NO_DATA_COLOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_color_endpoints() {
        let a = Color::rgb(0, 0, 0);
        let b = Color::rgb(200, 100, 50);
        assert_eq!(interpolate_color(a, b, 0.0), a);
        assert_eq!(interpolate_color(a, b, 1.0), b);
        let mid = interpolate_color(a, b, 0.5);
        assert_eq!(mid.r, 100);
        assert_eq!(mid.g, 50);
        assert_eq!(mid.b, 25);
    }

    #[test]
    fn test_color_scale_clamps_at_ends() {
        let scale = ColorScale::default();
        assert_eq!(scale.color_at(-5.0), scale.stops[0].1);
        assert_eq!(scale.color_at(1000.0), scale.stops.last().unwrap().1);
    }

    #[test]
    fn test_color_scale_hits_stops_exactly() {
        let scale = ColorScale::shear(2.0, 4.0, 7.0, 10.0);
        for &(value, color) in &scale.stops {
            assert_eq!(scale.color_at(value), color, "at stop {value}");
        }
    }

    #[test]
    fn test_category_scale_gray_for_gaps() {
        let scale = CategoryScale::turbulence();
        assert_eq!(scale.color_for(None), NO_DATA_COLOR);
        assert_eq!(scale.color_for(Some(99)), NO_DATA_COLOR);
        assert_eq!(scale.color_for(Some(0)), scale.entries[0].1);
        assert_eq!(scale.color_for(Some(4)), scale.entries[4].1);
    }
}
