//! Camera intrinsics: principal point, focal length, pixel skew, and lens
//! distortion, with the mapping from spot centroids to unit line-of-sight
//! vectors in the camera frame.
//!
//! # Coordinate conventions
//!
//! - **Pixel coordinates**: (column, row), 0-based, as produced by spot
//!   extraction.
//! - **Camera frame**: +X right, +Y down, +Z along the boresight.
//!
//! # Pixel → direction pipeline
//!
//! ```text
//! subtract principal point → divide by focal length → un-skew
//!   → undistort → lift to (x, y, 1) → normalise
//! ```

use std::path::Path;

use tracing::info;

use crate::distortion::DistortionCoefficients;
use crate::error::{Error, Result};
use crate::spot::Spot;
use crate::{Vector2, Vector3};

/// Camera calibration. Immutable after load; safe to share by reference
/// across any number of extraction requests.
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    /// Principal point (cx, cy) in pixels.
    pub principal_point: Vector2,
    /// Focal length (fx, fy) in pixels.
    pub focal_length: Vector2,
    /// Pixel skew coefficient.
    pub skew: f32,
    /// Lens distortion coefficients.
    pub distortion: DistortionCoefficients,
}

impl Calibration {
    /// Parse a calibration from its text form: ten whitespace-separated
    /// floats in the order `cx cy s k1 k2 p1 p2 k3 fx fy`.
    ///
    /// `source` labels the input in error messages (e.g. the file path).
    pub fn parse(text: &str, source: &str) -> Result<Self> {
        let mut tokens = text.split_whitespace();
        let mut next = |name: &str| -> Result<f32> {
            let tok = tokens.next().ok_or_else(|| Error::Parse {
                path: source.to_string(),
                message: format!("missing calibration value `{name}`"),
            })?;
            tok.parse::<f32>().map_err(|_| Error::Parse {
                path: source.to_string(),
                message: format!("invalid calibration value `{name}`: `{tok}`"),
            })
        };

        let cx = next("cx")?;
        let cy = next("cy")?;
        let skew = next("s")?;
        let k1 = next("k1")?;
        let k2 = next("k2")?;
        let p1 = next("p1")?;
        let p2 = next("p2")?;
        let k3 = next("k3")?;
        let fx = next("fx")?;
        let fy = next("fy")?;

        Ok(Self {
            principal_point: Vector2::new(cx, cy),
            focal_length: Vector2::new(fx, fy),
            skew,
            distortion: DistortionCoefficients::new(k1, k2, p1, p2, k3),
        })
    }

    /// Load a calibration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let cal = Self::parse(&text, &path.display().to_string())?;
        info!("Loaded calibration from {}", path.display());
        Ok(cal)
    }

    /// A pinhole calibration with no skew and no distortion.
    pub fn pinhole(cx: f32, cy: f32, fx: f32, fy: f32) -> Self {
        Self {
            principal_point: Vector2::new(cx, cy),
            focal_length: Vector2::new(fx, fy),
            skew: 0.0,
            distortion: DistortionCoefficients::default(),
        }
    }

    /// Unit line-of-sight vector for a centroid at pixel `(u, v)`.
    pub fn pixel_to_vector(&self, u: f32, v: f32) -> Vector3 {
        // 1. Subtract principal point, divide by focal length
        let mut xd = Vector2::new(
            (u - self.principal_point.x) / self.focal_length.x,
            (v - self.principal_point.y) / self.focal_length.y,
        );

        // 2. Undo skew
        xd.x -= self.skew * xd.y;

        // 3. Undistort (skipped entirely for a distortion-free calibration)
        if !self.distortion.is_zero() {
            xd = self.distortion.undistort(xd);
        }

        // 4. Lift to the unit sphere
        Vector3::new(xd.x, xd.y, 1.0).normalize()
    }

    /// Line-of-sight vectors for an extracted spot list, in spot order.
    ///
    /// The vector at index `i` is the direction of `spots[i]`; callers rely
    /// on this parallel ordering through identification.
    pub fn spot_vectors(&self, spots: &[Spot]) -> Result<Vec<Vector3>> {
        if spots.is_empty() {
            return Err(Error::EmptyInput("no extracted spots in list".into()));
        }
        Ok(spots
            .iter()
            .map(|s| self.pixel_to_vector(s.center.0, s.center.1))
            .collect())
    }
}
