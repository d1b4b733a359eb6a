//! Bump discovery: decides whether a raw cluster holds several showers.
//!
//! 1. Vote: every crystal climbs the energy gradient over the in-cluster
//!    neighbour graph and votes for the crystal where the climb stops.
//! 2. Seed: each crystal that received a vote seeds a bump with exponential
//!    distance weights over all crystals of the cluster.
//! 3. Converge: bump positions and weights are iterated until the position
//!    settles (or the iteration cap is hit).
//! 4. Merge: settled bumps with the same dominant crystal are averaged and the
//!    merged set converges again, until all dominant crystals differ.

use std::collections::BTreeMap;

use calopix_core::clustering::{ClusteringConfig, ClusteringStatistics, NonConvergencePolicy};
use calopix_core::geometry::Vec3;

use crate::components::RawCluster;
use crate::crystal::CentroidAccumulator;

/// Candidate sub-shower inside a raw cluster.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Bump {
    pub position: Vec3,
    /// One weight per crystal of the raw cluster, summing to one.
    pub weights: Vec<f64>,
    /// Index of the highest weight.
    pub max_index: usize,
}

impl Bump {
    /// Seeds a bump at a crystal's position.
    fn seeded_at(cluster: &RawCluster<'_>, index: usize, decay: f64) -> Option<Self> {
        let mut bump = Self {
            position: cluster.crystals[index].position(),
            weights: vec![0.0; cluster.len()],
            max_index: index,
        };
        bump.update_weights(cluster, decay).then_some(bump)
    }

    /// Recomputes `E_j * exp(-decay * r_j / R_M)` for the current position,
    /// normalises and records the dominant crystal.
    ///
    /// Returns false if every weight vanished.
    fn update_weights(&mut self, cluster: &RawCluster<'_>, decay: f64) -> bool {
        let mut sum = 0.0;
        for (weight, crystal) in self.weights.iter_mut().zip(&cluster.crystals) {
            let r = self.position.distance(&crystal.position());
            *weight = crystal.energy * (-decay * r / crystal.element.moliere_radius).exp();
            sum += *weight;
        }
        if !(sum > 0.0 && sum.is_finite()) {
            return false;
        }
        for weight in &mut self.weights {
            *weight /= sum;
        }
        self.max_index = argmax(&self.weights);
        true
    }

    /// Moves the bump to the log-energy weighted centroid of its share of the
    /// cluster and returns the distance moved.
    fn update_position(&mut self, cluster: &RawCluster<'_>, offset: f64) -> f64 {
        let bump_energy: f64 = self
            .weights
            .iter()
            .zip(cluster.energies())
            .map(|(w, e)| w * e)
            .sum();

        let mut centroid = CentroidAccumulator::new(bump_energy, offset);
        for (weight, crystal) in self.weights.iter().zip(&cluster.crystals) {
            centroid.add(crystal.position(), weight * crystal.energy);
        }

        let old = self.position;
        self.position = centroid.finish();
        old.distance(&self.position)
    }
}

/// First index of the largest value.
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    let mut best_value = 0.0;
    for (i, &value) in values.iter().enumerate() {
        if value > best_value {
            best = i;
            best_value = value;
        }
    }
    best
}

/// Outcome of bump discovery for one raw cluster.
#[derive(Debug)]
pub(crate) enum Discovery {
    /// Only one maximum; keep the raw cluster whole.
    Single,
    /// Splitting was attempted but no usable bump set was found.
    Fallback,
    /// Two or more settled bumps with distinct dominant crystals.
    Split(Vec<Bump>),
}

/// Climbs from `start` towards higher energy and returns where it stops.
///
/// Each step goes to the most energetic neighbour of the current crystal if
/// that energy beats the best seen so far. The best starts at zero, so the
/// first step always leaves `start` unless it has no energetic neighbour.
fn climb(cluster: &RawCluster<'_>, start: usize) -> usize {
    let mut current = start;
    let mut best = 0.0;
    loop {
        let mut next = current;
        for &j in &cluster.adjacency[current] {
            let energy = cluster.crystals[j].energy;
            if energy > best {
                best = energy;
                next = j;
            }
        }
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Counts votes per crystal. The most energetic crystal votes for itself.
pub(crate) fn vote(cluster: &RawCluster<'_>) -> Vec<u32> {
    let mut votes = vec![0u32; cluster.len()];
    if cluster.crystals.is_empty() {
        return votes;
    }
    votes[0] = 1;
    for i in 1..cluster.len() {
        votes[climb(cluster, i)] += 1;
    }
    votes
}

/// Result of one settle phase.
#[derive(Debug)]
pub(crate) struct Convergence {
    pub stable: Vec<Bump>,
    pub unstable: usize,
    pub rounds: usize,
}

/// Iterates every bump until its position settles or the round cap is hit.
pub(crate) fn converge(
    cluster: &RawCluster<'_>,
    mut pending: Vec<Bump>,
    config: &ClusteringConfig,
) -> Convergence {
    let mut stable = Vec::with_capacity(pending.len());
    let mut unstable = 0;
    let mut rounds = 0;

    while !pending.is_empty() && rounds < config.max_iterations {
        rounds += 1;
        let mut still_moving = Vec::with_capacity(pending.len());
        for mut bump in pending {
            let moved = bump.update_position(cluster, config.energy_weight_offset);
            if moved < config.position_epsilon {
                stable.push(bump);
            } else if bump.update_weights(cluster, config.moliere_decay) {
                still_moving.push(bump);
            } else {
                unstable += 1;
            }
        }
        pending = still_moving;
    }
    unstable += pending.len();

    Convergence {
        stable,
        unstable,
        rounds,
    }
}

/// Averages bumps that share a dominant crystal.
///
/// Returns the resulting bumps ordered by dominant crystal index, and whether
/// any merge happened.
pub(crate) fn merge_overlapping(bumps: Vec<Bump>) -> (Vec<Bump>, bool) {
    let mut by_max: BTreeMap<usize, Vec<Bump>> = BTreeMap::new();
    for bump in bumps {
        by_max.entry(bump.max_index).or_default().push(bump);
    }

    let mut merged_any = false;
    let mut result = Vec::with_capacity(by_max.len());
    for group in by_max.into_values() {
        let count = group.len();
        if let Some(merged) = average(group) {
            merged_any |= count > 1;
            result.push(merged);
        }
    }
    (result, merged_any)
}

/// Element-wise mean of the weight vectors; keeps the first bump's position.
///
/// A group of one comes back unchanged, an empty group gives `None`.
#[allow(clippy::cast_precision_loss)]
fn average(group: Vec<Bump>) -> Option<Bump> {
    let count = group.len();
    let mut merged = group.into_iter().reduce(|mut sum, bump| {
        for (w, other) in sum.weights.iter_mut().zip(&bump.weights) {
            *w += other;
        }
        sum
    })?;
    if count > 1 {
        for w in &mut merged.weights {
            *w /= count as f64;
        }
        merged.max_index = argmax(&merged.weights);
    }
    Some(merged)
}

/// Runs vote, seeding, convergence and merging for one raw cluster.
pub(crate) fn discover(
    cluster: &RawCluster<'_>,
    config: &ClusteringConfig,
    statistics: &mut ClusteringStatistics,
) -> Discovery {
    if cluster.len() < 2 {
        return Discovery::Single;
    }
    // Nothing to distribute if no crystal carries energy
    if cluster.crystals[0].energy <= 0.0 {
        return Discovery::Single;
    }

    let votes = vote(cluster);
    if votes[0] as usize == cluster.len() {
        return Discovery::Single;
    }

    let seeds: Option<Vec<Bump>> = votes
        .iter()
        .enumerate()
        .filter(|(_, &v)| v > 0)
        .map(|(i, _)| Bump::seeded_at(cluster, i, config.moliere_decay))
        .collect();
    let Some(mut bumps) = seeds else {
        log::debug!("bump seed without weight in cluster of {} crystals", cluster.len());
        return Discovery::Fallback;
    };
    log::trace!(
        "{} bump seeds in cluster of {} crystals",
        bumps.len(),
        cluster.len()
    );

    loop {
        let outcome = converge(cluster, bumps, config);
        statistics.max_convergence_rounds = statistics.max_convergence_rounds.max(outcome.rounds);

        if outcome.unstable > 0 {
            log::debug!(
                "{} of {} bumps did not settle within {} rounds",
                outcome.unstable,
                outcome.unstable + outcome.stable.len(),
                config.max_iterations
            );
            if config.non_convergence == NonConvergencePolicy::Unsplit {
                return Discovery::Fallback;
            }
        }
        if outcome.stable.is_empty() {
            return Discovery::Fallback;
        }

        let before = outcome.stable.len();
        let (merged, overlapped) = merge_overlapping(outcome.stable);
        statistics.bumps_merged += before - merged.len();

        if !overlapped {
            return if merged.len() > 1 {
                Discovery::Split(merged)
            } else {
                Discovery::Single
            };
        }
        bumps = merged;
    }
}
