//! The full frame-to-identification pipeline.
//!
//! `StarTracker` owns the pieces that outlive a single frame — calibration,
//! feature catalog, extraction settings — and runs the per-frame sequence:
//! threshold, label, filter, line-of-sight conversion, Pyramid
//! identification. Everything per-frame is owned by the request; the
//! tracker itself is read-only during processing and can be shared by
//! reference.

use tracing::info;

use crate::camera::Calibration;
use crate::catalog::FeatureCatalog;
use crate::error::Result;
use crate::extraction::extract_spots;
use crate::frame::Frame;
use crate::spot::Spot;
use crate::{Vector3, UNIDENTIFIED};

/// Spot-extraction settings.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionConfig {
    /// Pixels at or below this value are background. Default: 64.
    pub threshold: u8,
    /// A component becomes a spot iff its pixel count strictly exceeds
    /// this. Default: 16.
    pub min_area: u32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            threshold: 64,
            min_area: 16,
        }
    }
}

/// Result of processing one frame. The three lists are parallel: index `i`
/// holds the `i`-th spot, its line-of-sight vector, and its catalog id
/// ([`UNIDENTIFIED`] when the Pyramid search found no unique match).
#[derive(Debug, Clone)]
pub struct FrameSolution {
    pub spots: Vec<Spot>,
    pub vectors: Vec<Vector3>,
    pub ids: Vec<i32>,
}

impl FrameSolution {
    /// Number of spots with a catalog identification.
    pub fn identified_count(&self) -> usize {
        self.ids.iter().filter(|&&id| id != UNIDENTIFIED).count()
    }

    /// Tab-separated statistics, one `x\ty\tarea\tid` line per spot.
    pub fn statistics(&self) -> String {
        let mut out = String::new();
        for (spot, id) in self.spots.iter().zip(&self.ids) {
            out.push_str(&format!(
                "{}\t{}\t{}\t{}\n",
                spot.center.0, spot.center.1, spot.area, id
            ));
        }
        out
    }
}

/// The pipeline orchestrator: calibration + catalog + extraction settings.
#[derive(Debug, Clone)]
pub struct StarTracker {
    pub calibration: Calibration,
    pub catalog: FeatureCatalog,
    pub config: ExtractionConfig,
}

impl StarTracker {
    /// Build a tracker with default extraction settings.
    pub fn new(calibration: Calibration, catalog: FeatureCatalog) -> Self {
        Self {
            calibration,
            catalog,
            config: ExtractionConfig::default(),
        }
    }

    /// Build a tracker with explicit extraction settings.
    pub fn with_config(
        calibration: Calibration,
        catalog: FeatureCatalog,
        config: ExtractionConfig,
    ) -> Self {
        Self {
            calibration,
            catalog,
            config,
        }
    }

    /// Run the full pipeline on one frame with angular tolerance `eps_deg`
    /// (degrees) for identification.
    ///
    /// Errors from any stage abort the frame and surface unchanged; the
    /// tracker state is untouched, so subsequent frames are unaffected.
    pub fn process(&self, frame: &Frame, eps_deg: f32) -> Result<FrameSolution> {
        let extraction = extract_spots(frame, self.config.threshold, self.config.min_area);
        let vectors = self.calibration.spot_vectors(&extraction.spots)?;
        let ids = self.catalog.identify(&vectors, eps_deg)?;

        info!(
            "Frame processed: {} spots, {} identified",
            extraction.spots.len(),
            ids.iter().filter(|&&id| id != UNIDENTIFIED).count()
        );

        Ok(FrameSolution {
            spots: extraction.spots,
            vectors,
            ids,
        })
    }
}
