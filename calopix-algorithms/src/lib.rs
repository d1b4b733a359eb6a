//! calopix-algorithms: Shower clustering for segmented calorimeters.
//!
//! This crate provides the **NextGen** cluster builder: connected-component
//! grouping over the detector neighbour graph, followed by bump splitting of
//! groups that contain several showers.
//!
//! - [`NextGenClustering`] - [`ClusterBuilder`] implementation for one detector
//! - [`cluster_event`] / [`cluster_events`] - run a builder over whole events
//!
#![warn(missing_docs)]

mod bump;
mod components;
mod crystal;
mod finalize;
mod nextgen;
mod processing;
mod sharing;

pub use nextgen::NextGenClustering;
pub use processing::{cluster_event, cluster_events};

// Re-export core clustering traits
pub use calopix_core::clustering::{
    ClusterBuilder, ClusteringConfig, ClusteringStatistics, NonConvergencePolicy,
};
