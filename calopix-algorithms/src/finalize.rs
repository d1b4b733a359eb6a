//! Conversion of a crystal group into an output cluster.

use calopix_core::cluster::{Cluster, ClusterFlags, Constituent};
use calopix_core::geometry::DetectorType;
use calopix_core::hit::ClusterHit;

use crate::crystal::{sort_by_energy, total_energy, CentroidAccumulator, Crystal};

/// Builds the cluster record for one group of crystals.
///
/// Returns `None` when the group carries no energy; such a cluster has no
/// meaningful position.
pub(crate) fn finalize(
    mut crystals: Vec<Crystal<'_>>,
    hits: &[ClusterHit],
    detector: DetectorType,
    split: bool,
    offset: f64,
) -> Option<Cluster> {
    sort_by_energy(&mut crystals);
    let energy = total_energy(&crystals);
    if energy <= 0.0 || !energy.is_finite() {
        return None;
    }

    let mut centroid = CentroidAccumulator::new(energy, offset);
    for crystal in &crystals {
        centroid.add(crystal.position(), crystal.energy);
    }

    let central = crystals.first()?;
    let time_of = |crystal: &Crystal<'_>| hits.get(crystal.hit.get()).map_or(f64::NAN, |h| h.time);

    let mut flags = ClusterFlags::NONE;
    flags.set(ClusterFlags::SPLIT, split);
    flags.set(ClusterFlags::TOUCHES_HOLE_CENTRAL, central.element.touches_hole);
    flags.set(
        ClusterFlags::TOUCHES_HOLE_CRYSTAL,
        crystals.iter().any(|c| c.element.touches_hole),
    );

    let constituents = crystals
        .iter()
        .map(|crystal| Constituent {
            hit: crystal.hit,
            channel: crystal.channel(),
            energy: crystal.energy,
            fraction: crystal.fraction,
            time: time_of(crystal),
        })
        .collect();

    Some(Cluster {
        position: centroid.finish(),
        energy,
        time: time_of(central),
        detector,
        central_element: central.channel(),
        flags,
        hits: constituents,
    })
}
