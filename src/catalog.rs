//! The angular-separation feature catalog and its K-vector range index.
//!
//! The catalog pairs stars with the angle between them (degrees) and is
//! sorted by angle. The K-vector turns a range query over the angle axis
//! into two array lookups: for the virtual line `y(j) = q + m·j`,
//! `kvector[j]` is the index of the last feature with `theta ≤ y(j)`
//! (−1 when no feature lies below the line), so the features inside
//! `[θmin, θmax]` sit in the contiguous index range
//! `[kvector[jb] + 1, kvector[jt]]` with `jb = ⌊(θmin − q)/m⌋` and
//! `jt = ⌊(θmax − q)/m⌋ + 1`. The query is O(1) in expectation and
//! returns a slight superset of the requested interval, which downstream
//! tolerance checks absorb.
//!
//! The interchange format is whitespace-separated ASCII (`q m` followed by
//! `k hip1 hip2 theta` quadruples); a binary rkyv image serves as a
//! load-time cache.

use std::path::Path;

use rkyv::{Archive, Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};

/// One catalog entry: two stars and their angular separation in degrees.
///
/// Endpoint order carries no meaning; queries must tolerate either
/// ordering.
#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
pub struct Feature {
    pub id1: i32,
    pub id2: i32,
    pub theta: f32,
}

impl Feature {
    pub fn new(id1: i32, id2: i32, theta: f32) -> Self {
        Self { id1, id2, theta }
    }

    /// Whether `hip` is one of the two endpoints.
    #[inline]
    pub fn involves(&self, hip: i32) -> bool {
        self.id1 == hip || self.id2 == hip
    }
}

/// The feature list together with its K-vector index. Loaded once,
/// immutable, safe to share by reference across identification requests.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
pub struct FeatureCatalog {
    /// K-vector line intercept, degrees.
    pub q: f32,
    /// K-vector line slope, degrees per bin.
    pub m: f32,
    /// Per-bin index of the last feature at or below the bin line.
    pub kvector: Vec<i32>,
    /// Features sorted by `theta`, non-decreasing.
    pub features: Vec<Feature>,
}

impl FeatureCatalog {
    /// Parse a catalog from its ASCII form: `q m` followed by repeated
    /// `k hip1 hip2 theta` quadruples until end of input.
    ///
    /// `source` labels the input in error messages. Rejects non-positive
    /// slopes, incomplete trailing records, and features out of theta
    /// order.
    pub fn parse(text: &str, source: &str) -> Result<Self> {
        let parse_err = |message: String| Error::Parse {
            path: source.to_string(),
            message,
        };

        let mut tokens = text.split_whitespace();
        let next_f32 = |name: &str, tokens: &mut std::str::SplitWhitespace| -> Result<f32> {
            let tok = tokens
                .next()
                .ok_or_else(|| parse_err(format!("missing value `{name}`")))?;
            tok.parse::<f32>()
                .map_err(|_| parse_err(format!("invalid value `{name}`: `{tok}`")))
        };
        let next_i32 = |name: &str, tok: &str| -> Result<i32> {
            tok.parse::<i32>()
                .map_err(|_| parse_err(format!("invalid value `{name}`: `{tok}`")))
        };

        let q = next_f32("q", &mut tokens)?;
        let m = next_f32("m", &mut tokens)?;
        if m <= 0.0 {
            return Err(parse_err(format!("non-positive K-vector slope m = {m}")));
        }

        let mut kvector = Vec::new();
        let mut features: Vec<Feature> = Vec::new();

        while let Some(tok) = tokens.next() {
            let k = next_i32("k", tok)?;
            let hip1 = next_i32(
                "hip1",
                tokens
                    .next()
                    .ok_or_else(|| parse_err("truncated record: missing `hip1`".into()))?,
            )?;
            let hip2 = next_i32(
                "hip2",
                tokens
                    .next()
                    .ok_or_else(|| parse_err("truncated record: missing `hip2`".into()))?,
            )?;
            let theta = next_f32("theta", &mut tokens)?;

            if let Some(prev) = features.last() {
                if theta < prev.theta {
                    return Err(parse_err(format!(
                        "features out of order: theta {theta} after {}",
                        prev.theta
                    )));
                }
            }

            kvector.push(k);
            features.push(Feature::new(hip1, hip2, theta));
        }

        Ok(Self {
            q,
            m,
            kvector,
            features,
        })
    }

    /// Load the ASCII catalog file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let catalog = Self::parse(&text, &path.display().to_string())?;
        info!(
            "Loaded {} features from {}",
            catalog.features.len(),
            path.display()
        );
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty() || self.kvector.is_empty()
    }

    /// All features whose `theta` may lie in `[theta_min, theta_max]`.
    ///
    /// The returned slice is contiguous in the sorted feature list and is a
    /// superset of the exact interval: the K-vector bins quantise the angle
    /// axis, so up to one bin's worth of features on either side comes
    /// along. Every feature actually inside the interval is included.
    /// Returns an empty slice when the requested range misses the
    /// catalog's theta span entirely.
    pub fn range_query(&self, theta_min: f32, theta_max: f32) -> &[Feature] {
        let len = self.features.len();
        if len == 0 || self.kvector.is_empty() {
            return &[];
        }
        if theta_max < self.features[0].theta || theta_min > self.features[len - 1].theta {
            return &[];
        }

        // jb and jt in Mortari's notation; jt always rounds up
        let last_bin = (self.kvector.len() - 1) as i64;
        let jb = (((theta_min - self.q) / self.m).floor() as i64).clamp(0, last_bin);
        let jt = (((theta_max - self.q) / self.m).floor() as i64 + 1).clamp(0, last_bin);

        let kb = self.kvector[jb as usize] + 1;
        let kt = self.kvector[jt as usize];
        if kt < kb || kt < 0 {
            return &[];
        }

        let kb = kb.max(0) as usize;
        let kt = (kt as usize).min(len - 1);
        &self.features[kb..=kt]
    }

    /// [`range_query`](Self::range_query) narrowed to features with `hip`
    /// as either endpoint.
    pub fn range_query_with_star(&self, theta_min: f32, theta_max: f32, hip: i32) -> Vec<Feature> {
        self.range_query(theta_min, theta_max)
            .iter()
            .copied()
            .filter(|f| f.involves(hip))
            .collect()
    }

    // ── Binary cache ────────────────────────────────────────────────────

    /// Serialize the catalog to bytes using rkyv.
    pub fn to_rkyv_bytes(&self) -> Vec<u8> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .expect("rkyv serialization failed")
            .to_vec()
    }

    /// Save the catalog to a binary cache file.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.to_rkyv_bytes();
        std::fs::write(path.as_ref(), &bytes)?;
        info!(
            "Saved catalog to {} ({} bytes)",
            path.as_ref().display(),
            bytes.len()
        );
        Ok(())
    }

    /// Load a catalog from a binary cache file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let catalog =
            rkyv::from_bytes::<Self, rkyv::rancor::Error>(&bytes).map_err(|e| Error::Parse {
                path: path.display().to_string(),
                message: format!("rkyv deserialization failed: {e}"),
            })?;
        info!(
            "Loaded {} features from cache {}",
            catalog.features.len(),
            path.display()
        );
        Ok(catalog)
    }
}

/// Build a catalog for tests: sorts `features` by theta and constructs a
/// consistent K-vector over them.
#[cfg(test)]
pub(crate) fn synthetic_catalog(mut features: Vec<Feature>) -> FeatureCatalog {
    assert!(!features.is_empty());
    features.sort_by(|a, b| a.theta.partial_cmp(&b.theta).unwrap());

    let len = features.len();
    let theta_lo = features[0].theta;
    let theta_hi = features[len - 1].theta;
    let pad = 1e-3_f32.max((theta_hi - theta_lo) * 1e-3);
    let q = theta_lo - pad;
    let m = if len > 1 {
        (theta_hi + pad - q) / (len - 1) as f32
    } else {
        2.0 * pad
    };

    let kvector: Vec<i32> = (0..len)
        .map(|j| {
            let line = q + m * j as f32;
            features.iter().take_while(|f| f.theta <= line).count() as i32 - 1
        })
        .collect();

    FeatureCatalog {
        q,
        m,
        kvector,
        features,
    }
}
