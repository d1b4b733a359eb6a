//! calopix-core: Core traits and types for calorimeter shower clustering.
//!
//! This crate provides the detector geometry seam, hit and cluster records,
//! and the configuration shared by the clustering algorithms.
//!

pub mod cluster;
pub mod clustering;
pub mod error;
pub mod event;
pub mod geometry;
pub mod hit;

pub use cluster::{Cluster, ClusterFlags, Constituent};
pub use clustering::{
    ClusterBuilder, ClusteringConfig, ClusteringStatistics, NonConvergencePolicy,
};
pub use error::{ConfigError, Error, GeometryError, Result};
pub use event::{EventClusters, EventHits};
pub use geometry::{
    ClusterGeometry, DetectorType, Element, GeometryDescription, StaticGeometry, Vec3,
};
pub use hit::{ClusterHit, HitIndex};
