//! Define a spot: a connected bright region in a thresholded frame,
//! reduced to its intensity-weighted centroid and pixel area.
//! Spots are the output of extraction and the input to line-of-sight
//! computation; list order is stable (ascending label).

/// A candidate star image.
#[derive(Debug, Clone, PartialEq)]
pub struct Spot {
    /// Intensity-weighted centroid, (column, row) in pixels, 0-based.
    /// Fractional: the first moment of a multi-pixel component rarely
    /// lands on a pixel center.
    pub center: (f32, f32),
    /// Number of pixels in the connected component.
    pub area: u32,
}
