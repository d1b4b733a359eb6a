//! Clustering traits, configuration and statistics.

use std::ops::AddAssign;

use crate::cluster::Cluster;
use crate::error::ConfigError;
use crate::geometry::ClusterGeometry;
use crate::hit::ClusterHit;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What to do when a bump does not settle within the iteration cap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NonConvergencePolicy {
    /// Give up splitting and emit the connected group as one cluster.
    #[default]
    Unsplit,
    /// Discard the unsettled bumps and split among the settled ones.
    DropUnstable,
}

/// Configuration for bump splitting.
///
/// The defaults are the tuned physics constants; changing them changes the
/// reconstructed energies and positions.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct ClusteringConfig {
    /// A bump is settled once its position moves less than this between rounds.
    pub position_epsilon: f64,
    /// Maximum convergence rounds per settle phase.
    pub max_iterations: usize,
    /// Decay factor `k` in the bump weight `E * exp(-k * r / R_M)`.
    pub moliere_decay: f64,
    /// Offset `c` in the position weight `max(0, c + ln(E / E_total))`.
    pub energy_weight_offset: f64,
    /// Behaviour when the iteration cap is hit.
    pub non_convergence: NonConvergencePolicy,
    /// Process connected groups of one event in parallel.
    pub parallel: bool,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            position_epsilon: 0.01,
            max_iterations: 100,
            moliere_decay: 2.5,
            energy_weight_offset: 4.0,
            non_convergence: NonConvergencePolicy::Unsplit,
            parallel: true,
        }
    }
}

impl ClusteringConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the position convergence epsilon.
    #[must_use]
    pub fn with_position_epsilon(mut self, epsilon: f64) -> Self {
        self.position_epsilon = epsilon;
        self
    }

    /// Sets the iteration cap.
    #[must_use]
    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Sets the Moliere decay factor.
    #[must_use]
    pub fn with_moliere_decay(mut self, decay: f64) -> Self {
        self.moliere_decay = decay;
        self
    }

    /// Sets the log-energy weight offset.
    #[must_use]
    pub fn with_energy_weight_offset(mut self, offset: f64) -> Self {
        self.energy_weight_offset = offset;
        self
    }

    /// Sets the non-convergence policy.
    #[must_use]
    pub fn with_non_convergence(mut self, policy: NonConvergencePolicy) -> Self {
        self.non_convergence = policy;
        self
    }

    /// Enables or disables parallel processing.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Checks that all parameters are usable.
    ///
    /// # Errors
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.position_epsilon.is_finite() && self.position_epsilon > 0.0) {
            return Err(ConfigError::InvalidEpsilon(self.position_epsilon));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidIterations);
        }
        if !(self.moliere_decay.is_finite() && self.moliere_decay > 0.0) {
            return Err(ConfigError::InvalidDecay(self.moliere_decay));
        }
        if !self.energy_weight_offset.is_finite() {
            return Err(ConfigError::InvalidWeightOffset(self.energy_weight_offset));
        }
        Ok(())
    }
}

/// Counters collected while clustering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusteringStatistics {
    /// Hits offered to the clustering.
    pub hits_processed: usize,
    /// Hits dropped for missing, non-finite or negative energy.
    pub hits_rejected: usize,
    /// Hits whose channel is unknown to the geometry.
    pub hits_unknown_channel: usize,
    /// Connected groups of crystals found.
    pub raw_clusters: usize,
    /// Connected groups that were split into several clusters.
    pub split_clusters: usize,
    /// Connected groups emitted unsplit because bumps did not settle.
    pub convergence_fallbacks: usize,
    /// Bumps removed by merging bumps with a common dominant crystal.
    pub bumps_merged: usize,
    /// Largest number of convergence rounds used by a single settle phase.
    pub max_convergence_rounds: usize,
    /// Clusters not emitted because their energy was zero.
    pub empty_clusters_dropped: usize,
    /// Clusters emitted.
    pub clusters_found: usize,
}

impl ClusteringStatistics {
    /// Folds another set of counters into this one.
    pub fn merge(&mut self, other: &Self) {
        self.hits_processed += other.hits_processed;
        self.hits_rejected += other.hits_rejected;
        self.hits_unknown_channel += other.hits_unknown_channel;
        self.raw_clusters += other.raw_clusters;
        self.split_clusters += other.split_clusters;
        self.convergence_fallbacks += other.convergence_fallbacks;
        self.bumps_merged += other.bumps_merged;
        self.max_convergence_rounds = self.max_convergence_rounds.max(other.max_convergence_rounds);
        self.empty_clusters_dropped += other.empty_clusters_dropped;
        self.clusters_found += other.clusters_found;
    }
}

impl AddAssign<&ClusteringStatistics> for ClusteringStatistics {
    fn add_assign(&mut self, rhs: &ClusteringStatistics) {
        self.merge(rhs);
    }
}

/// Trait for shower clustering algorithms.
///
/// A builder turns the hits of one detector in one event into clusters. It
/// must always produce a result; unusable hits are skipped and counted.
pub trait ClusterBuilder: Send + Sync {
    /// Algorithm name.
    fn name(&self) -> &'static str;

    /// Replaces the configuration.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] and keeps the old configuration if `config` is invalid.
    fn configure(&mut self, config: ClusteringConfig) -> Result<(), ConfigError>;

    /// Current configuration.
    fn config(&self) -> &ClusteringConfig;

    /// Clusters the hits of one detector.
    fn build<G: ClusterGeometry + ?Sized>(
        &self,
        geometry: &G,
        hits: &[ClusterHit],
        statistics: &mut ClusteringStatistics,
    ) -> Vec<Cluster>;
}
