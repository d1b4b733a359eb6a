//! Connected-component extraction over the detector neighbour graph.
//!
//! Crystals of one event are grouped into raw clusters: maximal sets that are
//! connected through the geometry's neighbour lists, restricted to crystals
//! that are present in the event.

use std::collections::{HashMap, VecDeque};

use crate::crystal::{sort_by_energy, Crystal};

/// One connected group of crystals, sorted by decreasing energy.
#[derive(Debug, Clone)]
pub(crate) struct RawCluster<'g> {
    pub crystals: Vec<Crystal<'g>>,
    /// For each crystal, the in-cluster indices listed as its neighbours,
    /// in ascending (decreasing-energy) order.
    pub adjacency: Vec<Vec<usize>>,
}

impl<'g> RawCluster<'g> {
    /// Builds the local adjacency for crystals that are already sorted.
    pub fn new(crystals: Vec<Crystal<'g>>) -> Self {
        let lookup = channel_lookup(&crystals);
        let adjacency = crystals
            .iter()
            .map(|crystal| {
                let mut neighbours: Vec<usize> = crystal
                    .element
                    .neighbours
                    .iter()
                    .filter_map(|channel| lookup.get(channel))
                    .flatten()
                    .copied()
                    .collect();
                neighbours.sort_unstable();
                neighbours.dedup();
                neighbours
            })
            .collect();
        Self {
            crystals,
            adjacency,
        }
    }

    pub fn len(&self) -> usize {
        self.crystals.len()
    }

    pub fn energies(&self) -> impl Iterator<Item = f64> + '_ {
        self.crystals.iter().map(|c| c.energy)
    }
}

/// Maps channel ids to crystal indices. A channel may carry several hits.
fn channel_lookup(crystals: &[Crystal<'_>]) -> HashMap<u32, Vec<usize>> {
    let mut lookup: HashMap<u32, Vec<usize>> = HashMap::with_capacity(crystals.len());
    for (i, crystal) in crystals.iter().enumerate() {
        lookup.entry(crystal.channel()).or_default().push(i);
    }
    lookup
}

/// Splits the event's crystals into raw clusters, highest-energy seed first.
///
/// Each cluster is grown breadth-first from the most energetic crystal not yet
/// assigned; every crystal ends up in exactly one cluster.
pub(crate) fn raw_clusters(mut crystals: Vec<Crystal<'_>>) -> Vec<RawCluster<'_>> {
    sort_by_energy(&mut crystals);
    let lookup = channel_lookup(&crystals);

    let mut assigned = vec![false; crystals.len()];
    let mut queue = VecDeque::new();
    let mut clusters = Vec::new();

    for seed in 0..crystals.len() {
        if assigned[seed] {
            continue;
        }
        assigned[seed] = true;
        queue.push_back(seed);

        let mut members = Vec::new();
        while let Some(current) = queue.pop_front() {
            members.push(current);
            for channel in &crystals[current].element.neighbours {
                let Some(candidates) = lookup.get(channel) else {
                    continue;
                };
                for &next in candidates {
                    if !assigned[next] {
                        assigned[next] = true;
                        queue.push_back(next);
                    }
                }
            }
        }

        // Indices follow the global energy order, so this restores it
        members.sort_unstable();
        clusters.push(RawCluster::new(
            members.into_iter().map(|i| crystals[i]).collect(),
        ));
    }

    clusters
}
