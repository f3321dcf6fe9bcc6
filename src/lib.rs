//! Starcam: star-tracker spot extraction and Pyramid star identification
//!
//! Given a raw night-sky frame from a calibrated camera, this crate extracts
//! bright spots with sub-pixel weighted centroids, converts them to unit
//! line-of-sight vectors, and identifies them against a precomputed catalog
//! of star-pair angular separations searched through a K-vector index
//! (the Pyramid method of Mortari, 2004).

pub mod camera;
pub mod catalog;
pub mod distortion;
mod error;
pub mod extraction;
pub mod frame;
pub mod identify;
pub mod pipeline;
mod spot;

pub use camera::Calibration;
pub use catalog::{Feature, FeatureCatalog};
pub use distortion::DistortionCoefficients;
pub use error::{Error, Result};
pub use extraction::{extract_spots, Extraction};
pub use frame::{Frame, LabelMap};
pub use pipeline::{ExtractionConfig, FrameSolution, StarTracker};
pub use spot::*;

// Commonly used types
// Note: 32-bit floats carry the working precision end to end; moment
// accumulation in the labeller runs on integers and divides in f64.
pub type Vector2 = nalgebra::Vector2<f32>;
pub type Vector3 = nalgebra::Vector3<f32>;

/// Catalog identifier assigned to a spot; `UNIDENTIFIED` marks spots the
/// Pyramid search could not match.
pub const UNIDENTIFIED: i32 = -1;
