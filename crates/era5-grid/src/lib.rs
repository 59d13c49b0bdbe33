//! Gridded reanalysis field model.
//!
//! Provides the in-memory representation of ERA5 pressure-level fields,
//! NetCDF decoding for files retrieved from the archive, and regional
//! subsetting with antimeridian support.

pub mod error;
pub mod extract;
pub mod field;
pub mod netcdf;

pub use error::{GridError, GridResult};
pub use extract::{extract_field_set, extract_region};
pub use field::{FieldSet, GriddedField, LevelPair};
pub use self::netcdf::read_field_set;
