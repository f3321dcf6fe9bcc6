//! Extract star spots from a frame.
//!
//! The extraction pipeline:
//! 1. Threshold to zero (pixels at or below the threshold are background)
//! 2. Label connected components with 8-connectivity (two-pass union-find)
//! 3. Accumulate intensity-weighted first moments per component
//! 4. Emit a spot for every component larger than the minimum area
//!
//! Moments are held as integers while scanning (`area`, Σx·p, Σy·p, Σp);
//! the centroid division happens once per emitted spot, in f64. This keeps
//! the inner loop free of rounding and makes the sums exact.

use tracing::debug;

use crate::frame::{Frame, LabelMap};
use crate::spot::Spot;

/// Integer sufficient statistics of one labelled component.
///
/// The intensity-weighted centroid is `(sum_xi / sum_i, sum_yi / sum_i)`;
/// x is the column index and y the row index, both 0-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelStats {
    /// Number of pixels in the component.
    pub area: u32,
    /// Σ xᵢ·pᵢ over component pixels.
    pub sum_xi: u64,
    /// Σ yᵢ·pᵢ over component pixels.
    pub sum_yi: u64,
    /// Σ pᵢ over component pixels.
    pub sum_i: u64,
}

/// Result of spot extraction on a single frame.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Compacted component labels, same shape as the frame.
    pub labels: LabelMap,
    /// Per-label statistics, indexed by compacted label. Index 0 is the
    /// background and always holds zero stats.
    pub stats: Vec<LabelStats>,
    /// Spots with `area > min_area`, in ascending label order (which is
    /// row-major first-touch order).
    pub spots: Vec<Spot>,
}

/// Threshold `frame`, label its connected components, and emit spots.
///
/// Pixels at or below `threshold` are treated as background. A component
/// becomes a spot iff its pixel count strictly exceeds `min_area`.
pub fn extract_spots(frame: &Frame, threshold: u8, min_area: u32) -> Extraction {
    let mut thresholded = Vec::new();
    frame.threshold_into(threshold, &mut thresholded);

    let (labels, stats) = label_components(&thresholded, frame.rows(), frame.cols());

    let spots: Vec<Spot> = stats
        .iter()
        .skip(1) // label 0 is background
        .filter(|s| s.area > min_area)
        .map(|s| Spot {
            center: (
                (s.sum_xi as f64 / s.sum_i as f64) as f32,
                (s.sum_yi as f64 / s.sum_i as f64) as f32,
            ),
            area: s.area,
        })
        .collect();

    debug!(
        "Extraction: {} components, {} spots above area {}",
        stats.len() - 1,
        spots.len(),
        min_area
    );

    Extraction {
        labels,
        stats,
        spots,
    }
}

/// Label connected components (8-connectivity) in a thresholded image and
/// accumulate intensity-weighted moments per component.
///
/// Two-pass union-find:
/// - Pass 1 scans row-major; each non-zero pixel takes the minimum label of
///   its already-seen 8-neighbours (NW, N, NE, W) after unioning them, or a
///   fresh provisional label when all four are background.
/// - Pass 2 resolves every pixel to its root, compacts roots to sequential
///   labels in first-touch order, and adds `(1, x·p, y·p, p)` to the root's
///   statistics.
///
/// Returns the compacted label map and the stats array indexed by compacted
/// label (`stats[0]` is the zeroed background entry).
pub fn label_components(pixels: &[u8], rows: usize, cols: usize) -> (LabelMap, Vec<LabelStats>) {
    assert_eq!(pixels.len(), rows * cols);

    let n = rows * cols;
    let mut provisional = vec![0u32; n];
    let mut parent: Vec<u32> = Vec::new();
    let mut next_label = 1u32;

    // Find root with path compression
    fn find(parent: &mut [u32], mut x: u32) -> u32 {
        while parent[x as usize] != x {
            parent[x as usize] = parent[parent[x as usize] as usize];
            x = parent[x as usize];
        }
        x
    }

    // Union two labels, keeping the lower root
    fn union(parent: &mut [u32], a: u32, b: u32) {
        let ra = find(parent, a);
        let rb = find(parent, b);
        if ra != rb {
            if ra < rb {
                parent[rb as usize] = ra;
            } else {
                parent[ra as usize] = rb;
            }
        }
    }

    // Reserve index 0 as background
    parent.push(0);

    // ── Pass 1: provisional labels ──
    for row in 0..rows {
        for col in 0..cols {
            let idx = row * cols + col;
            if pixels[idx] == 0 {
                continue;
            }

            let mut neighbor_labels = [0u32; 4];
            let mut num_neighbors = 0usize;
            let mut push = |l: u32| {
                if l > 0 {
                    neighbor_labels[num_neighbors] = l;
                    num_neighbors += 1;
                }
            };

            if col > 0 {
                push(provisional[idx - 1]); // W
            }
            if row > 0 {
                if col > 0 {
                    push(provisional[idx - cols - 1]); // NW
                }
                push(provisional[idx - cols]); // N
                if col + 1 < cols {
                    push(provisional[idx - cols + 1]); // NE
                }
            }

            if num_neighbors == 0 {
                parent.push(next_label);
                provisional[idx] = next_label;
                next_label += 1;
            } else {
                let min_label = *neighbor_labels[..num_neighbors].iter().min().unwrap();
                provisional[idx] = min_label;
                for &nl in &neighbor_labels[..num_neighbors] {
                    union(&mut parent, min_label, nl);
                }
            }
        }
    }

    // ── Pass 2: compact labels and accumulate moments ──
    // root -> sequential label, assigned in row-major first-touch order
    let mut root_map = std::collections::HashMap::new();
    let mut seq = 1u16;

    let mut labels = vec![0u16; n];
    let mut stats = vec![LabelStats::default()];

    for (idx, &prov) in provisional.iter().enumerate() {
        if prov == 0 {
            continue;
        }
        let root = find(&mut parent, prov);
        let label = *root_map.entry(root).or_insert_with(|| {
            debug_assert!(seq < u16::MAX, "component count exceeds label range");
            let s = seq;
            seq += 1;
            stats.push(LabelStats::default());
            s
        });
        labels[idx] = label;

        let col = (idx % cols) as u64;
        let row = (idx / cols) as u64;
        let p = pixels[idx] as u64;

        let st = &mut stats[label as usize];
        st.area += 1;
        st.sum_xi += col * p;
        st.sum_yi += row * p;
        st.sum_i += p;
    }

    (LabelMap::new(rows, cols, labels), stats)
}
