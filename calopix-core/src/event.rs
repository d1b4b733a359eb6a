//! Per-event containers spanning several clustering detectors.

use std::collections::BTreeMap;

use crate::cluster::Cluster;
use crate::geometry::DetectorType;
use crate::hit::ClusterHit;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Calibrated hits of one event, grouped by detector.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventHits {
    /// Event number.
    pub id: u64,
    /// Hits per detector.
    pub hits: BTreeMap<DetectorType, Vec<ClusterHit>>,
}

impl EventHits {
    /// Creates an empty event.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self {
            id,
            hits: BTreeMap::new(),
        }
    }

    /// Adds the hits of one detector, replacing earlier ones.
    #[must_use]
    pub fn with_detector(mut self, detector: DetectorType, hits: Vec<ClusterHit>) -> Self {
        self.hits.insert(detector, hits);
        self
    }

    /// Hits of one detector.
    #[must_use]
    pub fn detector(&self, detector: DetectorType) -> &[ClusterHit] {
        self.hits.get(&detector).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Clusters of one event, grouped by detector.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventClusters {
    /// Event number.
    pub id: u64,
    /// Clusters per detector.
    pub clusters: BTreeMap<DetectorType, Vec<Cluster>>,
}

impl EventClusters {
    /// Creates an empty result for an event.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self {
            id,
            clusters: BTreeMap::new(),
        }
    }

    /// Clusters of one detector.
    #[must_use]
    pub fn detector(&self, detector: DetectorType) -> &[Cluster] {
        self.clusters.get(&detector).map(Vec::as_slice).unwrap_or_default()
    }

    /// Total number of clusters over all detectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clusters.values().map(Vec::len).sum()
    }

    /// Returns true if no detector produced a cluster.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over all clusters, detector by detector.
    pub fn iter(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.values().flatten()
    }
}
