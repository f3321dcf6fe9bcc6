//! Pyramid star identification (Mortari 2004) over the K-vector catalog.
//!
//! The algorithm:
//! 1. Take 3 spots in the Mortari index order (smallest index spreads
//!    first, so early triads reuse low-index spots).
//! 2. Compute the 3 pairwise angles and query the catalog for each.
//! 3. Search the three candidate lists for a single consistent triad of
//!    catalog stars sharing endpoints.
//!    - On success, take each remaining spot as a 4th star, query the
//!      hip-filtered catalog with its 3 angles to the triad, and accept a
//!      unique common endpoint.
//!    - The first 4th-star confirmation seals the identification: the
//!      remaining spots are labelled in the same pass and the triad loop
//!      exits.
//! 4. Otherwise move on to the next index triple.
//!
//! Spots the search cannot pin down keep the `-1` marker. Exhausting the
//! search space is not an error; the caller receives whatever the final
//! pass assigned.

use tracing::debug;

use crate::catalog::{Feature, FeatureCatalog};
use crate::error::{Error, Result};
use crate::{Vector3, UNIDENTIFIED};

impl FeatureCatalog {
    /// Identify `star_vectors` against the catalog with angular tolerance
    /// `eps_deg` (degrees).
    ///
    /// Returns one catalog id per input vector, in input order;
    /// [`UNIDENTIFIED`] marks spots without a unique match. The Pyramid
    /// method needs at least 4 vectors (`EmptyInput` otherwise) and a
    /// non-empty catalog (`EmptyCatalog`).
    pub fn identify(&self, star_vectors: &[Vector3], eps_deg: f32) -> Result<Vec<i32>> {
        if self.is_empty() {
            return Err(Error::EmptyCatalog);
        }
        let n = star_vectors.len();
        if n < 4 {
            return Err(Error::EmptyInput(format!(
                "Pyramid identification needs at least 4 star spots, got {n}"
            )));
        }

        let mut id_list = vec![UNIDENTIFIED; n];

        // Index triples in the order suggested by Mortari 2004
        for dj in 1..n - 1 {
            for dk in 1..n - dj {
                for i in 0..n - dj - dk {
                    let j = i + dj;
                    let k = j + dk;
                    id_list.fill(UNIDENTIFIED);

                    // Pairwise angles of the candidate triad
                    let theta_ij = angle_deg(&star_vectors[i], &star_vectors[j]);
                    let theta_ik = angle_deg(&star_vectors[i], &star_vectors[k]);
                    let theta_jk = angle_deg(&star_vectors[j], &star_vectors[k]);

                    // Candidate features for each angle; an empty list rules
                    // the triple out immediately
                    let list_ij = self.range_query(theta_ij - eps_deg, theta_ij + eps_deg);
                    if list_ij.is_empty() {
                        continue;
                    }
                    let list_ik = self.range_query(theta_ik - eps_deg, theta_ik + eps_deg);
                    if list_ik.is_empty() {
                        continue;
                    }
                    let list_jk = self.range_query(theta_jk - eps_deg, theta_jk + eps_deg);
                    if list_jk.is_empty() {
                        continue;
                    }

                    let Some((hip_i, hip_j, hip_k)) = unique_triad(list_ij, list_ik, list_jk)
                    else {
                        continue;
                    };

                    debug!(
                        "Triad candidate ({i},{j},{k}) -> ({hip_i},{hip_j},{hip_k}), \
                         angles ({theta_ij:.4}, {theta_ik:.4}, {theta_jk:.4})"
                    );

                    id_list[i] = hip_i;
                    id_list[j] = hip_j;
                    id_list[k] = hip_k;

                    // Look for a confirming 4th star; on confirmation,
                    // label every remaining spot in the same pass
                    let mut complete = false;
                    for r in 0..n {
                        if r == i || r == j || r == k {
                            continue;
                        }

                        let theta_ir = angle_deg(&star_vectors[i], &star_vectors[r]);
                        let theta_jr = angle_deg(&star_vectors[j], &star_vectors[r]);
                        let theta_kr = angle_deg(&star_vectors[k], &star_vectors[r]);

                        let list_ir =
                            self.range_query_with_star(theta_ir - eps_deg, theta_ir + eps_deg, hip_i);
                        if list_ir.is_empty() {
                            continue;
                        }
                        let list_jr =
                            self.range_query_with_star(theta_jr - eps_deg, theta_jr + eps_deg, hip_j);
                        if list_jr.is_empty() {
                            continue;
                        }
                        let list_kr =
                            self.range_query_with_star(theta_kr - eps_deg, theta_kr + eps_deg, hip_k);
                        if list_kr.is_empty() {
                            continue;
                        }

                        if let Some(id) = unique_fourth(&list_ir, &list_jr, &list_kr, hip_i) {
                            id_list[r] = id;
                            // The triad is confirmed; finish labelling the
                            // remaining spots, then stop searching
                            complete = true;
                        }
                    }

                    if complete {
                        debug!(
                            "Identification complete: {} of {n} spots labelled",
                            id_list.iter().filter(|&&id| id != UNIDENTIFIED).count()
                        );
                        return Ok(id_list);
                    }
                }
            }
        }

        // Search space exhausted without a confirmed pyramid
        debug!("Triad search exhausted without 4th-star confirmation");
        Ok(id_list)
    }
}

/// Angle between two line-of-sight vectors, degrees.
///
/// The vectors are unit length, so the norm division is redundant; it is
/// kept so measured and catalog angles go through identical arithmetic.
fn angle_deg(a: &Vector3, b: &Vector3) -> f32 {
    (a.dot(b) / (a.norm() * b.norm())).acos().to_degrees()
}

/// Search the three candidate lists for a triad `(hip_i, hip_j, hip_k)`
/// such that the IJ feature joins `hip_i`–`hip_j`, the IK feature joins
/// `hip_i`–`hip_k`, and some JK feature joins `hip_j`–`hip_k`. Returns the
/// triad only when exactly one consistent assignment exists.
fn unique_triad(
    list_ij: &[Feature],
    list_ik: &[Feature],
    list_jk: &[Feature],
) -> Option<(i32, i32, i32)> {
    let mut found = None;
    let mut count = 0usize;

    for f_ij in list_ij {
        for f_ik in list_ik {
            // The shared endpoint of the IJ and IK features is star I
            let (hip_i, hip_k) = if f_ij.involves(f_ik.id1) {
                (f_ik.id1, f_ik.id2)
            } else if f_ij.involves(f_ik.id2) {
                (f_ik.id2, f_ik.id1)
            } else {
                continue;
            };
            let hip_j = if f_ij.id1 == hip_i { f_ij.id2 } else { f_ij.id1 };

            if list_jk
                .iter()
                .any(|f| f.involves(hip_k) && f.involves(hip_j))
            {
                found = Some((hip_i, hip_j, hip_k));
                count += 1;
            }
        }
    }

    if count == 1 {
        found
    } else {
        None
    }
}

/// From the hip-filtered candidate lists of a prospective 4th star, find
/// the unique catalog id present in all three. Each IR feature proposes its
/// non-`hip_i` endpoint; a proposal is accepted when the JR and KR lists
/// both contain it. Exactly one distinct accepted id confirms the star.
fn unique_fourth(
    list_ir: &[Feature],
    list_jr: &[Feature],
    list_kr: &[Feature],
    hip_i: i32,
) -> Option<i32> {
    let mut accepted: Vec<i32> = Vec::new();

    for f in list_ir {
        let id_check = if f.id1 == hip_i { f.id2 } else { f.id1 };
        if accepted.contains(&id_check) {
            continue;
        }
        if list_jr.iter().any(|g| g.involves(id_check))
            && list_kr.iter().any(|g| g.involves(id_check))
        {
            accepted.push(id_check);
        }
    }

    if accepted.len() == 1 {
        Some(accepted[0])
    } else {
        None
    }
}
