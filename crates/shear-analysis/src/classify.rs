//! Turbulence classification from combined shear.

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};
use crate::shear::ShearField;

/// Severity categories in ascending order.
///
/// No-data is not a category: classified cells are `Option`-valued and a
/// gap is `None` at the `Option` level, never folded into
/// [`TurbulenceCategory::None`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurbulenceCategory {
    None,
    Light,
    Moderate,
    Severe,
    Extreme,
}

impl TurbulenceCategory {
    pub const ALL: [TurbulenceCategory; 5] = [
        TurbulenceCategory::None,
        TurbulenceCategory::Light,
        TurbulenceCategory::Moderate,
        TurbulenceCategory::Severe,
        TurbulenceCategory::Extreme,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TurbulenceCategory::None => "None",
            TurbulenceCategory::Light => "Light",
            TurbulenceCategory::Moderate => "Moderate",
            TurbulenceCategory::Severe => "Severe",
            TurbulenceCategory::Extreme => "Extreme",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// Ascending classification breakpoints in m/s per km.
///
/// These are calibration constants, not physics: operators tune them in
/// config to match how strongly the combined field should saturate the
/// severity scale. A value equal to a breakpoint classifies upward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub light: f32,
    pub moderate: f32,
    pub severe: f32,
    pub extreme: f32,
}

impl Thresholds {
    pub fn new(light: f32, moderate: f32, severe: f32, extreme: f32) -> AnalysisResult<Self> {
        let t = Self {
            light,
            moderate,
            severe,
            extreme,
        };
        t.validate()?;
        Ok(t)
    }

    /// Config-deserialized values pass through here before use.
    pub fn validate(&self) -> AnalysisResult<()> {
        let seq = [self.light, self.moderate, self.severe, self.extreme];
        if seq.iter().any(|t| !t.is_finite() || *t <= 0.0) {
            return Err(AnalysisError::InvalidThresholds(format!(
                "breakpoints must be positive and finite, got {:?}",
                seq
            )));
        }
        if seq.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AnalysisError::InvalidThresholds(format!(
                "breakpoints must be strictly ascending, got {:?}",
                seq
            )));
        }
        Ok(())
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            light: 2.0,
            moderate: 4.0,
            severe: 7.0,
            extreme: 10.0,
        }
    }
}

/// Classify one combined-shear value. NaN is no-data.
pub fn classify_cell(value: f32, thresholds: &Thresholds) -> Option<TurbulenceCategory> {
    if value.is_nan() {
        return None;
    }
    Some(if value < thresholds.light {
        TurbulenceCategory::None
    } else if value < thresholds.moderate {
        TurbulenceCategory::Light
    } else if value < thresholds.severe {
        TurbulenceCategory::Moderate
    } else if value < thresholds.extreme {
        TurbulenceCategory::Severe
    } else {
        TurbulenceCategory::Extreme
    })
}

/// Per-cell categories on the source grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedField {
    pub cells: Vec<Option<TurbulenceCategory>>,
    pub lats: Vec<f64>,
    pub lons: Vec<f64>,
}

impl ClassifiedField {
    pub fn nlat(&self) -> usize {
        self.lats.len()
    }

    pub fn nlon(&self) -> usize {
        self.lons.len()
    }

    #[inline]
    pub fn cell(&self, lat: usize, lon: usize) -> Option<TurbulenceCategory> {
        self.cells[lat * self.nlon() + lon]
    }

    /// Cell counts per category plus the no-data tally.
    pub fn counts(&self) -> CategoryCounts {
        let mut counts = CategoryCounts::default();
        for cell in &self.cells {
            match cell {
                Some(TurbulenceCategory::None) => counts.none += 1,
                Some(TurbulenceCategory::Light) => counts.light += 1,
                Some(TurbulenceCategory::Moderate) => counts.moderate += 1,
                Some(TurbulenceCategory::Severe) => counts.severe += 1,
                Some(TurbulenceCategory::Extreme) => counts.extreme += 1,
                None => counts.no_data += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub none: usize,
    pub light: usize,
    pub moderate: usize,
    pub severe: usize,
    pub extreme: usize,
    pub no_data: usize,
}

/// Classify every cell of a combined-shear field.
pub fn classify_field(shear: &ShearField, thresholds: &Thresholds) -> ClassifiedField {
    ClassifiedField {
        cells: shear
            .values
            .iter()
            .map(|&v| classify_cell(v, thresholds))
            .collect(),
        lats: shear.lats.clone(),
        lons: shear.lons.clone(),
    }
}
