//! Retrieval request bodies for the ERA5 pressure-level archive.

use serde::Serialize;
use turb_common::FieldKey;

/// Dataset holding hourly u/v wind and geopotential on pressure levels.
pub const ERA5_PRESSURE_LEVELS: &str = "reanalysis-era5-pressure-levels";

/// One retrieval: a single valid time, the analysis variables, and the
/// pressure levels the shear calculation needs.
///
/// Serializes to the JSON body the CDS dataset endpoint expects; the dataset
/// name goes into the URL, not the body.
#[derive(Debug, Clone, Serialize)]
pub struct Era5Request {
    #[serde(skip_serializing)]
    pub dataset: String,
    pub product_type: String,
    pub variable: Vec<String>,
    pub pressure_level: Vec<String>,
    pub year: String,
    pub month: String,
    pub day: String,
    pub time: String,
    pub format: String,
}

impl Era5Request {
    /// Request u, v and geopotential for one valid hour.
    pub fn for_key(key: &FieldKey, pressure_levels: &[String]) -> Self {
        Self {
            dataset: ERA5_PRESSURE_LEVELS.to_string(),
            product_type: "reanalysis".to_string(),
            variable: vec![
                "u_component_of_wind".to_string(),
                "v_component_of_wind".to_string(),
                "geopotential".to_string(),
            ],
            pressure_level: pressure_levels.to_vec(),
            year: key.date.format("%Y").to_string(),
            month: key.date.format("%m").to_string(),
            day: key.date.format("%d").to_string(),
            time: format!("{:02}:00", key.hour),
            format: "netcdf".to_string(),
        }
    }
}
