//! Assignment of a raw cluster's crystals to its settled bumps.
//!
//! Every bump grows outward from its dominant crystal one neighbour layer at a
//! time. A crystal first reached by a single bump belongs to it; a crystal
//! reached by several bumps in the same layer is shared, and its energy is
//! divided according to each bump's pull on it.

use crate::bump::Bump;
use crate::components::RawCluster;
use crate::crystal::{CentroidAccumulator, Crystal};
use calopix_core::geometry::Vec3;

/// Bump indices claiming each crystal, from the layered expansion.
///
/// Claim lists are sorted by bump index. A crystal the expansion never reached
/// (only possible with one-sided neighbour lists) has an empty claim list.
pub(crate) fn expand_claims(cluster: &RawCluster<'_>, bumps: &[Bump]) -> Vec<Vec<usize>> {
    let mut claims: Vec<Vec<usize>> = vec![Vec::new(); cluster.len()];
    let mut frontiers: Vec<Vec<usize>> = Vec::with_capacity(bumps.len());
    for (b, bump) in bumps.iter().enumerate() {
        claims[bump.max_index].push(b);
        frontiers.push(vec![bump.max_index]);
    }

    loop {
        let mut next_claims = claims.clone();
        let mut next_frontiers: Vec<Vec<usize>> = vec![Vec::new(); bumps.len()];
        let mut grown = false;

        for (b, frontier) in frontiers.iter().enumerate() {
            for &seed in frontier {
                for &j in &cluster.adjacency[seed] {
                    // Only crystals unclaimed before this layer can be reached
                    if !claims[j].is_empty() || next_claims[j].contains(&b) {
                        continue;
                    }
                    next_claims[j].push(b);
                    next_frontiers[b].push(j);
                    grown = true;
                }
            }
        }

        if !grown {
            return claims;
        }
        claims = next_claims;
        frontiers = next_frontiers;
    }
}

/// Splits the cluster's crystals into one group per bump.
///
/// Exclusively claimed crystals keep their full energy. Shared crystals are
/// copied into every claiming bump with energy scaled by the normalised pull
/// `E_b * exp(-|x - X_b| / R_M)`, where `E_b` and `X_b` are the bump's energy
/// and position from its exclusive crystals alone.
pub(crate) fn assign_crystals<'g>(
    cluster: &RawCluster<'g>,
    bumps: &[Bump],
    offset: f64,
) -> Vec<Vec<Crystal<'g>>> {
    let mut claims = expand_claims(cluster, bumps);
    let all_bumps: Vec<usize> = (0..bumps.len()).collect();
    for claim in &mut claims {
        if claim.is_empty() {
            log::trace!("crystal unreachable from any bump, sharing among all");
            claim.clone_from(&all_bumps);
        }
    }

    let mut groups: Vec<Vec<Crystal<'g>>> = vec![Vec::new(); bumps.len()];
    let mut energies = vec![0.0; bumps.len()];
    for (crystal, claim) in cluster.crystals.iter().zip(&claims) {
        if let [b] = claim.as_slice() {
            groups[*b].push(*crystal);
            energies[*b] += crystal.energy;
        }
    }

    let positions: Vec<Vec3> = groups
        .iter()
        .zip(&energies)
        .map(|(group, &energy)| {
            let mut centroid = CentroidAccumulator::new(energy, offset);
            for crystal in group {
                centroid.add(crystal.position(), crystal.energy);
            }
            centroid.finish()
        })
        .collect();

    for (crystal, claim) in cluster.crystals.iter().zip(&claims) {
        if claim.len() < 2 {
            continue;
        }
        let pulls: Vec<f64> = claim
            .iter()
            .map(|&b| {
                let r = crystal.position().distance(&positions[b]);
                energies[b] * (-r / crystal.element.moliere_radius).exp()
            })
            .collect();
        for (&b, (energy, share)) in claim.iter().zip(divide(crystal.energy, &pulls)) {
            groups[b].push(crystal.attenuated(energy, share));
        }
    }

    groups
}

/// Divides `energy` in proportion to `pulls`.
///
/// Returns `(energy, share)` per pull. The last entry takes the remainder so
/// the energies add up to `energy` exactly. Degenerate pulls split evenly.
#[allow(clippy::cast_precision_loss)]
fn divide(energy: f64, pulls: &[f64]) -> Vec<(f64, f64)> {
    let sum: f64 = pulls.iter().sum();
    let shares: Vec<f64> = if sum > 0.0 && sum.is_finite() {
        pulls.iter().map(|p| p / sum).collect()
    } else {
        vec![1.0 / pulls.len() as f64; pulls.len()]
    };

    let mut allocated = 0.0;
    let mut result = Vec::with_capacity(shares.len());
    for (i, &share) in shares.iter().enumerate() {
        let part = if i + 1 == shares.len() {
            (energy - allocated).max(0.0)
        } else {
            energy * share
        };
        allocated += part;
        result.push((part, share));
    }
    result
}
