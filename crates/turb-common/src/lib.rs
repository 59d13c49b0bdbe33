//! Common types and utilities shared across the turbwx crates.

pub mod bbox;
pub mod error;
pub mod region;
pub mod request;
pub mod time;

pub use bbox::BoundingBox;
pub use error::{TurbError, TurbResult};
pub use region::RegionRegistry;
pub use request::{FieldKey, Product, RequestSpec};
pub use time::{parse_request_datetime, AvailabilityWindow};
