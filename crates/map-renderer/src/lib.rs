//! Raster-to-PNG map rendering.
//!
//! Turns a 2-D data field plus its geographic extent into a finished chart:
//! resampled raster panel, graticule, frame, title and legend, encoded as
//! PNG. Two entry points cover the two product families:
//!
//! - [`render_continuous`] for magnitude fields with a gradient color scale
//!   and a labeled colorbar;
//! - [`render_categorical`] for classified fields with a fixed palette and
//!   a labeled swatch legend.
//!
//! No-data cells (NaN or `None`) render in a dedicated gray that appears in
//! the legend, never as a fake zero value. Text drawing needs a TrueType
//! font found at runtime; when none of the configured paths load, charts are
//! produced without labels and a warning is logged.

pub mod annotate;
pub mod colormap;
pub mod error;
pub mod map;
pub mod png;
pub mod resample;

pub use colormap::{CategoryScale, Color, ColorScale};
pub use error::{RenderError, RenderResult};
pub use map::{render_categorical, render_continuous, MapExtent, RenderOptions};
