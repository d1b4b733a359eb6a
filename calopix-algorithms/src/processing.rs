//! High-level helpers that run a cluster builder over whole events.

use calopix_core::clustering::{ClusterBuilder, ClusteringStatistics};
use calopix_core::event::{EventClusters, EventHits};
use calopix_core::geometry::ClusterGeometry;
use rayon::prelude::*;

/// Clusters every detector of one event.
///
/// Each detector's hits are clustered with the geometry whose
/// [`ClusterGeometry::detector_type`] matches. Hits of detectors without a
/// geometry are counted as unknown channels and skipped.
pub fn cluster_event<B, G>(
    builder: &B,
    geometries: &[G],
    event: &EventHits,
    statistics: &mut ClusteringStatistics,
) -> EventClusters
where
    B: ClusterBuilder,
    G: ClusterGeometry,
{
    let mut result = EventClusters::new(event.id);
    for (&detector, hits) in &event.hits {
        let Some(geometry) = geometries.iter().find(|g| g.detector_type() == detector) else {
            log::warn!(
                "event {}: no geometry for {detector:?}, skipping {} hits",
                event.id,
                hits.len()
            );
            statistics.hits_processed += hits.len();
            statistics.hits_unknown_channel += hits.len();
            continue;
        };
        let clusters = builder.build(geometry, hits, statistics);
        result.clusters.insert(detector, clusters);
    }
    result
}

/// Clusters a batch of events.
///
/// Events are processed in parallel when the builder's configuration asks for
/// it. Results keep the input order and the statistics are summed over all
/// events.
pub fn cluster_events<B, G>(
    builder: &B,
    geometries: &[G],
    events: &[EventHits],
) -> (Vec<EventClusters>, ClusteringStatistics)
where
    B: ClusterBuilder,
    G: ClusterGeometry,
{
    let run = |event: &EventHits| {
        let mut statistics = ClusteringStatistics::default();
        let clusters = cluster_event(builder, geometries, event, &mut statistics);
        (clusters, statistics)
    };

    let outcomes: Vec<(EventClusters, ClusteringStatistics)> = if builder.config().parallel {
        events.par_iter().map(run).collect()
    } else {
        events.iter().map(run).collect()
    };

    let mut total = ClusteringStatistics::default();
    let mut results = Vec::with_capacity(outcomes.len());
    for (clusters, statistics) in outcomes {
        total += &statistics;
        results.push(clusters);
    }
    (results, total)
}
