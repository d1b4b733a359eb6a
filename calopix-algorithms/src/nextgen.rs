//! Shower clustering with bump splitting.
//!
//! Hits are grouped into connected raw clusters over the detector's neighbour
//! graph. Each raw cluster is checked for several energy maxima; if it holds
//! more than one settled bump its crystals are divided between the bumps,
//! sharing the energy of crystals that lie between them.

use calopix_core::cluster::Cluster;
use calopix_core::clustering::{ClusterBuilder, ClusteringConfig, ClusteringStatistics};
use calopix_core::error::ConfigError;
use calopix_core::geometry::{ClusterGeometry, DetectorType};
use calopix_core::hit::{ClusterHit, HitIndex};
use rayon::prelude::*;

use crate::bump::{discover, Discovery};
use crate::components::{raw_clusters, RawCluster};
use crate::crystal::Crystal;
use crate::finalize::finalize;
use crate::sharing::assign_crystals;

/// Connected-component clustering with bump splitting.
///
/// # Example
///
/// ```
/// use calopix_algorithms::NextGenClustering;
/// use calopix_core::{
///     ClusterBuilder, ClusterHit, ClusteringStatistics, DetectorType, StaticGeometry,
/// };
///
/// let geometry = StaticGeometry::square_grid(DetectorType::Taps, 8, 8, 1.0, 2.0).unwrap();
/// let hits = vec![ClusterHit::new(9, 120.0, 0.0), ClusterHit::new(10, 15.0, 0.0)];
///
/// let builder = NextGenClustering::default();
/// let mut statistics = ClusteringStatistics::default();
/// let clusters = builder.build(&geometry, &hits, &mut statistics);
/// assert_eq!(clusters.len(), 1);
/// assert_eq!(clusters[0].central_element, 9);
/// ```
#[derive(Debug, Clone, Default)]
pub struct NextGenClustering {
    config: ClusteringConfig,
}

impl NextGenClustering {
    /// Create with custom configuration.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the configuration is invalid.
    pub fn new(config: ClusteringConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Pairs each usable hit with its geometry element.
    fn collect_crystals<'g, G: ClusterGeometry + ?Sized>(
        geometry: &'g G,
        hits: &[ClusterHit],
        statistics: &mut ClusteringStatistics,
    ) -> Vec<Crystal<'g>> {
        statistics.hits_processed += hits.len();
        let mut unknown = 0;
        let mut crystals = Vec::with_capacity(hits.len());
        for (i, hit) in hits.iter().enumerate() {
            if !hit.has_energy() {
                statistics.hits_rejected += 1;
                continue;
            }
            let Some(element) = geometry.element(hit.channel) else {
                log::debug!("no element for channel {}", hit.channel);
                unknown += 1;
                continue;
            };
            crystals.push(Crystal::new(hit.energy, element, HitIndex(i)));
        }
        if unknown > 0 {
            log::warn!(
                "skipped {unknown} hits on channels unknown to the {:?} geometry",
                geometry.detector_type()
            );
        }
        statistics.hits_unknown_channel += unknown;
        crystals
    }

    /// Turns one raw cluster into output clusters.
    fn build_raw(
        &self,
        cluster: &RawCluster<'_>,
        hits: &[ClusterHit],
        detector: DetectorType,
    ) -> (Vec<Cluster>, ClusteringStatistics) {
        let mut statistics = ClusteringStatistics::default();
        let offset = self.config.energy_weight_offset;

        let (groups, split) = match discover(cluster, &self.config, &mut statistics) {
            Discovery::Single => (vec![cluster.crystals.clone()], false),
            Discovery::Fallback => {
                statistics.convergence_fallbacks += 1;
                (vec![cluster.crystals.clone()], false)
            }
            Discovery::Split(bumps) => {
                statistics.split_clusters += 1;
                log::trace!(
                    "splitting {} crystals into {} clusters",
                    cluster.len(),
                    bumps.len()
                );
                (assign_crystals(cluster, &bumps, offset), true)
            }
        };

        let mut clusters = Vec::with_capacity(groups.len());
        for group in groups {
            match finalize(group, hits, detector, split, offset) {
                Some(found) => clusters.push(found),
                None => statistics.empty_clusters_dropped += 1,
            }
        }
        statistics.clusters_found += clusters.len();
        (clusters, statistics)
    }
}

impl ClusterBuilder for NextGenClustering {
    fn name(&self) -> &'static str {
        "NextGen"
    }

    fn configure(&mut self, config: ClusteringConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    fn build<G: ClusterGeometry + ?Sized>(
        &self,
        geometry: &G,
        hits: &[ClusterHit],
        statistics: &mut ClusteringStatistics,
    ) -> Vec<Cluster> {
        let detector = geometry.detector_type();
        let raw = raw_clusters(Self::collect_crystals(geometry, hits, statistics));
        statistics.raw_clusters += raw.len();

        // Indexed collect keeps the sequential order
        let outcomes: Vec<(Vec<Cluster>, ClusteringStatistics)> = if self.config.parallel {
            raw.par_iter()
                .map(|cluster| self.build_raw(cluster, hits, detector))
                .collect()
        } else {
            raw.iter()
                .map(|cluster| self.build_raw(cluster, hits, detector))
                .collect()
        };

        let mut clusters = Vec::with_capacity(outcomes.len());
        for (found, partial) in outcomes {
            *statistics += &partial;
            clusters.extend(found);
        }

        log::debug!(
            "{:?}: {} hits, {} raw clusters, {} clusters",
            detector,
            hits.len(),
            raw.len(),
            clusters.len()
        );
        clusters
    }
}
