//! Brown-Conrady radial + tangential lens distortion.
//!
//! The forward model maps an ideal normalised image point to where the lens
//! actually images it:
//!
//! ```text
//! r² = x² + y²
//! kR = 1 + k1·r² + k2·r⁴ + k3·r⁶
//! δ  = (2·p1·x·y + p2·(r² + 2·x²),  p1·(r² + 2·y²) + 2·p2·x·y)
//! Xd = Xc·kR + δ
//! ```
//!
//! Inversion is a fixed-point iteration with a fixed count of 20 and no
//! convergence test; that iteration count is part of the contract. All
//! coordinates are normalised (focal lengths divided out), so the
//! coefficients act on values of order one.

use crate::Vector2;

/// Number of fixed-point iterations used by [`DistortionCoefficients::undistort`].
const UNDISTORT_ITERATIONS: usize = 20;

/// Lens distortion coefficients in calibration-file storage order:
/// `k1 k2 p1 p2 k3`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DistortionCoefficients {
    /// First radial coefficient (barrel < 0, pincushion > 0).
    pub k1: f32,
    /// Second radial coefficient.
    pub k2: f32,
    /// First tangential coefficient.
    pub p1: f32,
    /// Second tangential coefficient.
    pub p2: f32,
    /// Third radial coefficient.
    pub k3: f32,
}

impl DistortionCoefficients {
    pub fn new(k1: f32, k2: f32, p1: f32, p2: f32, k3: f32) -> Self {
        Self { k1, k2, p1, p2, k3 }
    }

    /// Returns `true` when every coefficient is zero; the pipeline skips
    /// inversion entirely in that case.
    pub fn is_zero(&self) -> bool {
        self.k1 == 0.0 && self.k2 == 0.0 && self.p1 == 0.0 && self.p2 == 0.0 && self.k3 == 0.0
    }

    /// Forward distortion: ideal normalised point → observed (distorted)
    /// point.
    pub fn distort(&self, xc: Vector2) -> Vector2 {
        let r2 = xc.norm_squared();
        let r4 = r2 * r2;
        let k_radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r2 * r4;
        xc * k_radial + self.tangential(xc, r2)
    }

    /// Inverse distortion: observed normalised point → ideal point.
    ///
    /// Fixed-point iteration seeded with the observed point:
    /// `Xc ← (Xd − δ(Xc)) / kR(Xc)`, repeated a fixed 20 times.
    pub fn undistort(&self, xd: Vector2) -> Vector2 {
        let mut xc = xd; // initial guess
        for _ in 0..UNDISTORT_ITERATIONS {
            let r2 = xc.norm_squared();
            let r4 = r2 * r2;
            let k_radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r2 * r4;
            xc = (xd - self.tangential(xc, r2)) / k_radial;
        }
        xc
    }

    /// Tangential displacement δ at a point with the given squared radius.
    fn tangential(&self, x: Vector2, r2: f32) -> Vector2 {
        Vector2::new(
            2.0 * self.p1 * x.x * x.y + self.p2 * (r2 + 2.0 * x.x * x.x),
            self.p1 * (r2 + 2.0 * x.y * x.y) + 2.0 * self.p2 * x.x * x.y,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_coefficients_are_identity() {
        let d = DistortionCoefficients::default();
        assert!(d.is_zero());
        for &(x, y) in &[(0.0, 0.0), (0.3, -0.2), (-0.7, 0.5)] {
            let p = Vector2::new(x, y);
            assert_eq!(d.undistort(p), p);
            assert_eq!(d.distort(p), p);
        }
    }

    #[test]
    fn test_roundtrip_radial_tangential() {
        let d = DistortionCoefficients::new(-0.12, 0.05, 1.5e-3, -8.0e-4, 0.01);
        for &(x, y) in &[(0.05, 0.02), (0.2, -0.15), (-0.3, 0.25), (0.0, 0.3)] {
            let ideal = Vector2::new(x, y);
            let observed = d.distort(ideal);
            let recovered = d.undistort(observed);
            assert!(
                (recovered - ideal).norm() < 1e-6,
                "roundtrip failed for ({x}, {y}): got ({}, {})",
                recovered.x,
                recovered.y
            );
        }
    }

    #[test]
    fn test_origin_fixed_point_radial() {
        // With no tangential terms the origin maps to itself
        let d = DistortionCoefficients::new(-0.1, 0.02, 0.0, 0.0, 0.005);
        let p = d.undistort(Vector2::new(0.0, 0.0));
        assert_eq!(p, Vector2::new(0.0, 0.0));
    }

    #[test]
    fn test_barrel_pulls_points_outward() {
        // Barrel distortion (k1 < 0) images points closer to the center;
        // undistortion must push them back out
        let d = DistortionCoefficients::new(-0.2, 0.0, 0.0, 0.0, 0.0);
        let observed = Vector2::new(0.25, 0.0);
        let ideal = d.undistort(observed);
        assert!(ideal.x > observed.x);
        assert_eq!(ideal.y, 0.0);
    }
}
