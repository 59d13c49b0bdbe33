//! Wind-shear derivation and turbulence classification.
//!
//! Pure numerics over extracted field sets:
//!
//! - **Vertical shear**: wind vector difference across the bracketing
//!   pressure levels over the geopotential-height thickness of that layer.
//! - **Horizontal shear**: finite-difference wind gradients along the grid
//!   on the lower level.
//! - **Combined shear**: Euclidean norm of the two.
//! - **Classification**: fixed ascending thresholds map combined shear to
//!   severity categories; NaN cells stay distinguishable as no-data.
//!
//! All values are m/s per km so the components combine dimensionally.
//! NaN inputs propagate; no function substitutes numeric values for gaps.

pub mod classify;
pub mod error;
pub mod shear;

pub use classify::{classify_field, ClassifiedField, Thresholds, TurbulenceCategory};
pub use error::{AnalysisError, AnalysisResult};
pub use shear::{combined_shear, horizontal_shear, vertical_shear, ShearField};
