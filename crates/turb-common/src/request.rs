//! Request specification and cache keying.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TurbError;

/// Which derived product a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Product {
    /// Categorical turbulence severity map.
    Turbulence,
    /// Combined wind shear magnitude, continuous.
    WindShear,
    /// Vertical component only.
    VerticalShear,
    /// Horizontal component only.
    HorizontalShear,
}

impl Product {
    pub fn from_name(name: &str) -> Result<Self, TurbError> {
        match name.trim().to_lowercase().as_str() {
            "turbulence" => Ok(Product::Turbulence),
            "windshear" | "wind_shear" => Ok(Product::WindShear),
            "vertical_shear" | "vertical" => Ok(Product::VerticalShear),
            "horizontal_shear" | "horizontal" => Ok(Product::HorizontalShear),
            other => Err(TurbError::InvalidRequest(format!(
                "unknown product \"{}\"",
                other
            ))),
        }
    }

    /// Short name used in filenames and metric labels.
    pub fn slug(&self) -> &'static str {
        match self {
            Product::Turbulence => "turbulence",
            Product::WindShear => "windshear",
            Product::VerticalShear => "vertical_shear",
            Product::HorizontalShear => "horizontal_shear",
        }
    }

    /// Human title used on rendered maps.
    pub fn title(&self) -> &'static str {
        match self {
            Product::Turbulence => "Turbulence severity",
            Product::WindShear => "Wind shear",
            Product::VerticalShear => "Vertical wind shear",
            Product::HorizontalShear => "Horizontal wind shear",
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// A fully validated chart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub valid_time: DateTime<Utc>,
    pub region: String,
    pub product: Product,
}

impl RequestSpec {
    pub fn new(valid_time: DateTime<Utc>, region: impl Into<String>, product: Product) -> Self {
        Self {
            valid_time,
            region: region.into(),
            product,
        }
    }

    /// Key identifying the global field this request needs.
    ///
    /// Fields are global per (date, hour); every region and product for the
    /// same timestamp shares one download.
    pub fn field_key(&self) -> FieldKey {
        FieldKey {
            date: self.valid_time.date_naive(),
            hour: self.valid_time.hour(),
        }
    }

    /// Filename stem for persisted artifacts of this request.
    pub fn artifact_stem(&self) -> String {
        format!(
            "{}_{:02}z_{}_{}",
            self.valid_time.format("%Y%m%d"),
            self.valid_time.hour(),
            self.region.to_lowercase().replace(' ', "_"),
            self.product.slug()
        )
    }
}

/// Cache key for one global field download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldKey {
    pub date: NaiveDate,
    pub hour: u32,
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}",
            self.date.year(),
            self.date.month(),
            self.date.day(),
            self.hour
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_product_from_name() {
        assert_eq!(Product::from_name("turbulence").unwrap(), Product::Turbulence);
        assert_eq!(Product::from_name("WindShear").unwrap(), Product::WindShear);
        assert_eq!(Product::from_name("vertical").unwrap(), Product::VerticalShear);
        assert!(Product::from_name("clouds").is_err());
    }

    #[test]
    fn test_field_key_shared_across_regions() {
        let t = Utc.with_ymd_and_hms(2024, 11, 24, 10, 0, 0).unwrap();
        let a = RequestSpec::new(t, "Europe", Product::Turbulence);
        let b = RequestSpec::new(t, "Asia", Product::WindShear);
        assert_eq!(a.field_key(), b.field_key());
        assert_eq!(a.field_key().to_string(), "2024-11-24T10");
    }

    #[test]
    fn test_artifact_stem() {
        let t = Utc.with_ymd_and_hms(2024, 11, 24, 10, 0, 0).unwrap();
        let spec = RequestSpec::new(t, "North America", Product::Turbulence);
        assert_eq!(spec.artifact_stem(), "20241124_10z_north_america_turbulence");
    }
}
