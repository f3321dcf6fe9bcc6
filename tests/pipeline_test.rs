//! Integration tests: render a synthetic star field into a raw camera dump,
//! write a matching K-vector catalog, and verify the full pipeline (load →
//! threshold → label → centroid → line-of-sight → Pyramid identification)
//! recovers the catalog ids.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use starcam::{
    Calibration, FeatureCatalog, Frame, FrameSolution, StarTracker, UNIDENTIFIED,
};

// ── Synthetic scene ──────────────────────────────────────────────────────────

const COLS: usize = 640;
const ROWS: usize = 480;
const CX: f64 = 320.0;
const CY: f64 = 240.0;
const F: f64 = 2000.0;

/// Star pixel positions (u = column, v = row) and their catalog ids.
/// Positions are chosen so all 15 pairwise angles are mutually separated
/// by ~0.5°, comfortably more than the 0.15° identification tolerance.
fn star_field() -> Vec<(f64, f64, i32)> {
    vec![
        (181.0, 342.0, 27989),
        (360.0, 218.0, 24436),
        (549.0, 401.0, 25336),
        (164.0, 194.0, 26727),
        (87.0, 291.0, 25930),
        (486.0, 337.0, 21421),
    ]
}

/// True line-of-sight direction of a pixel for the test pinhole camera,
/// computed in f64 independently of the library's f32 path.
fn direction(u: f64, v: f64) -> [f64; 3] {
    let x = (u - CX) / F;
    let y = (v - CY) / F;
    let n = (x * x + y * y + 1.0).sqrt();
    [x / n, y / n, 1.0 / n]
}

fn angle_deg(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dot = a[0] * b[0] + a[1] * b[1] + a[2] * b[2];
    dot.acos().to_degrees()
}

/// All pairwise features of the star field (minus stars in `skip`), plus a
/// dense band of filler pairs that keeps the K-vector bins fine and the
/// range queries tight.
fn scene_features(skip: &[i32], theta_noise_deg: f32, rng: &mut StdRng) -> Vec<(i32, i32, f64)> {
    let stars = star_field();
    let noise = Normal::new(0.0f32, theta_noise_deg.max(1e-12)).unwrap();

    let mut features: Vec<(i32, i32, f64)> = Vec::new();
    for a in 0..stars.len() {
        for b in a + 1..stars.len() {
            let (ua, va, hip_a) = stars[a];
            let (ub, vb, hip_b) = stars[b];
            if skip.contains(&hip_a) || skip.contains(&hip_b) {
                continue;
            }
            let mut theta = angle_deg(&direction(ua, va), &direction(ub, vb));
            if theta_noise_deg > 0.0 {
                theta += noise.sample(rng) as f64;
            }
            features.push((hip_a, hip_b, theta));
        }
    }

    // Filler band: 2.3°..14.0° in 0.05° steps, unrelated star pairs
    let mut i = 0;
    loop {
        let theta = 2.3 + 0.05 * i as f64;
        if theta > 14.0 {
            break;
        }
        features.push((90_000 + i, 95_000 + i, theta));
        i += 1;
    }

    features
}

/// Serialize features as a K-vector catalog text file: `q m` then
/// `k hip1 hip2 theta` quadruples, sorted by theta.
fn kvector_text(mut features: Vec<(i32, i32, f64)>) -> String {
    features.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap());
    let len = features.len();
    let pad = 0.01;
    let q = features[0].2 - pad;
    let m = (features[len - 1].2 + pad - q) / (len - 1) as f64;

    let mut text = format!("{q:.6} {m:.6}\n");
    for (j, &(hip1, hip2, theta)) in features.iter().enumerate() {
        let line = q + m * j as f64;
        let k = features.iter().take_while(|f| f.2 <= line).count() as i64 - 1;
        text.push_str(&format!("{k} {hip1} {hip2} {theta:.6}\n"));
    }
    text
}

/// Render the star field as a raw 12-bit camera dump: little-endian u16
/// words whose top 8 bits hold the pixel value. Each star is a uniform
/// 5×5 square of 200, so its weighted centroid is exactly the star pixel.
fn raw_frame_bytes() -> Vec<u8> {
    let mut pixels = vec![0u8; ROWS * COLS];
    for (u, v, _) in star_field() {
        let (c0, r0) = (u as usize - 2, v as usize - 2);
        for r in r0..r0 + 5 {
            for c in c0..c0 + 5 {
                pixels[r * COLS + c] = 200;
            }
        }
    }
    pixels
        .iter()
        .flat_map(|&p| ((p as u16) << 4).to_le_bytes())
        .collect()
}

/// Write the scene to disk and run the full pipeline.
fn run_pipeline(tag: &str, skip: &[i32], theta_noise_deg: f32) -> Result<FrameSolution> {
    let _ = tracing_subscriber::fmt().with_env_filter("info").try_init();

    let dir = std::env::temp_dir();
    let frame_path = dir.join(format!("starcam_it_{tag}.raw"));
    let catalog_path = dir.join(format!("starcam_it_{tag}.kvec"));

    std::fs::write(&frame_path, raw_frame_bytes())?;
    let mut rng = StdRng::seed_from_u64(0x5747);
    std::fs::write(
        &catalog_path,
        kvector_text(scene_features(skip, theta_noise_deg, &mut rng)),
    )?;

    let frame = Frame::from_raw_file(&frame_path, ROWS, COLS)?;
    let catalog = FeatureCatalog::from_file(&catalog_path)?;
    let calibration = Calibration::pinhole(CX as f32, CY as f32, F as f32, F as f32);

    let tracker = StarTracker::new(calibration, catalog);
    let solution = tracker.process(&frame, 0.15)?;

    std::fs::remove_file(&frame_path).ok();
    std::fs::remove_file(&catalog_path).ok();
    Ok(solution)
}

/// Map each spot back to the star it was rendered from (within a pixel).
fn expected_id(spot_center: (f32, f32)) -> i32 {
    for (u, v, hip) in star_field() {
        let du = spot_center.0 as f64 - u;
        let dv = spot_center.1 as f64 - v;
        if du.abs() < 1.0 && dv.abs() < 1.0 {
            return hip;
        }
    }
    panic!("spot at {spot_center:?} matches no rendered star");
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn test_end_to_end_identification() -> Result<()> {
    let solution = run_pipeline("full", &[], 0.0)?;

    assert_eq!(solution.spots.len(), 6);
    assert_eq!(solution.vectors.len(), solution.spots.len());
    assert_eq!(solution.ids.len(), solution.spots.len());

    // Every spot centroid is exact and every star is in the catalog, so
    // all six must be identified with their own ids
    for (spot, &id) in solution.spots.iter().zip(&solution.ids) {
        assert_eq!(id, expected_id(spot.center), "spot at {:?}", spot.center);
        assert_eq!(spot.area, 25);
    }

    // Line-of-sight vectors are unit length
    for v in &solution.vectors {
        assert!((v.norm() - 1.0).abs() < 1e-6);
    }
    Ok(())
}

#[test]
fn test_missing_catalog_star_leaves_spot_unidentified() -> Result<()> {
    let solution = run_pipeline("missing", &[21421], 0.0)?;

    assert_eq!(solution.ids.len(), 6);
    assert_eq!(solution.identified_count(), 5);
    for (spot, &id) in solution.spots.iter().zip(&solution.ids) {
        let expected = expected_id(spot.center);
        if expected == 21421 {
            assert_eq!(id, UNIDENTIFIED);
        } else {
            assert_eq!(id, expected);
        }
    }
    Ok(())
}

#[test]
fn test_noisy_catalog_within_tolerance() -> Result<()> {
    // Perturb catalog angles with 0.01° Gaussian noise; well inside the
    // 0.15° tolerance, so identification must still succeed
    let solution = run_pipeline("noisy", &[], 0.01)?;
    assert_eq!(solution.identified_count(), 6);
    for (spot, &id) in solution.spots.iter().zip(&solution.ids) {
        assert_eq!(id, expected_id(spot.center));
    }
    Ok(())
}

#[test]
fn test_processing_is_deterministic() -> Result<()> {
    let first = run_pipeline("det_a", &[], 0.0)?;
    let second = run_pipeline("det_b", &[], 0.0)?;

    assert_eq!(first.ids, second.ids);
    for (a, b) in first.spots.iter().zip(&second.spots) {
        assert_eq!(a.center, b.center);
        assert_eq!(a.area, b.area);
    }
    for (a, b) in first.vectors.iter().zip(&second.vectors) {
        assert_eq!(a, b);
    }
    Ok(())
}
