use std::sync::Arc;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use calopix_algorithms::{
    cluster_event, ClusterBuilder, ClusteringConfig, ClusteringStatistics, NextGenClustering,
    NonConvergencePolicy,
};
use calopix_core::{
    ClusterFlags, ClusterHit, DetectorType, Element, EventHits, StaticGeometry, Vec3,
};

fn line(n: u32, moliere_radius: f64) -> StaticGeometry {
    StaticGeometry::square_grid(DetectorType::Taps, n, 1, 1.0, moliere_radius).unwrap()
}

fn line_hits(energies: &[f64]) -> Vec<ClusterHit> {
    (0u32..)
        .zip(energies)
        .map(|(channel, &energy)| ClusterHit::new(channel, energy, 0.0))
        .collect()
}

#[test]
fn test_two_peak_split() {
    let geometry = line(5, 1.0);
    let hits = line_hits(&[100.0, 20.0, 5.0, 18.0, 90.0]);
    let mut stats = ClusteringStatistics::default();
    let clusters = NextGenClustering::default().build(&geometry, &hits, &mut stats);

    assert_eq!(clusters.len(), 2, "expected one cluster per peak");
    let (a, b) = (&clusters[0], &clusters[1]);
    assert!(a.is_split() && b.is_split());
    assert_eq!(a.len(), 3);
    assert_eq!(b.len(), 3);

    // Each peak keeps its exclusive crystals whole
    assert_relative_eq!(a.constituent(1).unwrap().energy, 20.0);
    assert_relative_eq!(b.constituent(3).unwrap().energy, 18.0);
    assert!(a.constituent(3).is_none());
    assert!(b.constituent(1).is_none());

    let (shared_a, shared_b) = (a.constituent(2).unwrap(), b.constituent(2).unwrap());
    assert_eq!(shared_a.hit, shared_b.hit);
    assert!(shared_a.energy > shared_b.energy);
    assert_abs_diff_eq!(shared_a.energy + shared_b.energy, 5.0, epsilon = 1e-12);
    assert_abs_diff_eq!(a.energy + b.energy, 233.0, epsilon = 1e-9);
}

#[test]
fn test_chain_without_second_maximum() {
    let geometry = line(3, 1.0);
    let hits = line_hits(&[100.0, 10.0, 90.0]);
    let mut stats = ClusteringStatistics::default();
    let clusters = NextGenClustering::default().build(&geometry, &hits, &mut stats);

    assert_eq!(clusters.len(), 1);
    assert!(clusters[0].iter().all(|c| !c.is_shared()));
    assert_eq!(clusters[0].flags, ClusterFlags::NONE);
}

#[test]
fn test_touches_hole_flags() {
    let elements = vec![
        Element::new(0, Vec3::new(0.0, 0.0, 0.0), 1.0).with_neighbours(vec![1]),
        Element::new(1, Vec3::new(1.0, 0.0, 0.0), 1.0).with_neighbours(vec![0, 2]),
        Element::new(2, Vec3::new(2.0, 0.0, 0.0), 1.0)
            .with_neighbours(vec![1])
            .with_touches_hole(true),
        Element::new(5, Vec3::new(5.0, 0.0, 0.0), 1.0).with_touches_hole(true),
    ];
    let geometry = StaticGeometry::new(DetectorType::CrystalBall, elements).unwrap();
    let hits = vec![
        ClusterHit::new(0, 50.0, 0.0),
        ClusterHit::new(1, 10.0, 0.0),
        ClusterHit::new(2, 1.0, 0.0),
        ClusterHit::new(5, 4.0, 0.0),
    ];
    let mut stats = ClusteringStatistics::default();
    let clusters = NextGenClustering::default().build(&geometry, &hits, &mut stats);

    assert_eq!(clusters.len(), 2);
    assert_eq!(clusters[0].central_element, 0);
    assert_eq!(clusters[0].flags, ClusterFlags::TOUCHES_HOLE_CRYSTAL);
    assert_eq!(clusters[1].central_element, 5);
    assert_eq!(
        clusters[1].flags,
        ClusterFlags::TOUCHES_HOLE_CENTRAL | ClusterFlags::TOUCHES_HOLE_CRYSTAL
    );
}

#[test]
fn test_drop_unstable_without_settled_bumps_stays_whole() {
    let geometry = line(5, 10.0);
    let hits = line_hits(&[100.0, 20.0, 5.0, 18.0, 90.0]);
    let config = ClusteringConfig::default()
        .with_max_iterations(1)
        .with_position_epsilon(1e-300)
        .with_non_convergence(NonConvergencePolicy::DropUnstable);
    let mut stats = ClusteringStatistics::default();
    let clusters = NextGenClustering::new(config)
        .unwrap()
        .build(&geometry, &hits, &mut stats);

    assert_eq!(clusters.len(), 1);
    assert!(!clusters[0].is_split());
    assert_eq!(stats.convergence_fallbacks, 1);
}

/// Three peaks at channels 0, 4 and 8; the wide crystal at channel 5 keeps
/// the middle bump moving.
fn three_peak_line() -> StaticGeometry {
    let elements = (0u32..9)
        .map(|channel| {
            let rm = if channel == 5 { 10.0 } else { 1.0 };
            let neighbours = [channel.checked_sub(1), Some(channel + 1).filter(|&c| c < 9)];
            Element::new(channel, Vec3::new(f64::from(channel), 0.0, 0.0), rm)
                .with_neighbours(neighbours.into_iter().flatten().collect())
        })
        .collect();
    StaticGeometry::new(DetectorType::Taps, elements).unwrap()
}

#[test]
fn test_drop_unstable_splits_among_settled_bumps() {
    let geometry = three_peak_line();
    let hits = line_hits(&[100.0, 20.0, 5.0, 18.0, 90.0, 18.0, 5.0, 20.0, 100.0]);
    let config = ClusteringConfig::default()
        .with_max_iterations(1)
        .with_non_convergence(NonConvergencePolicy::DropUnstable);
    let mut stats = ClusteringStatistics::default();
    let clusters = NextGenClustering::new(config)
        .unwrap()
        .build(&geometry, &hits, &mut stats);

    assert_eq!(clusters.len(), 2);
    assert!(clusters.iter().all(|c| c.is_split()));
    let mut centres: Vec<u32> = clusters.iter().map(|c| c.central_element).collect();
    centres.sort_unstable();
    assert_eq!(centres, vec![0, 8]);

    // The middle peak has no bump of its own and is shared evenly
    let (a, b) = (&clusters[0], &clusters[1]);
    let (shared_a, shared_b) = (a.constituent(4).unwrap(), b.constituent(4).unwrap());
    assert!(shared_a.is_shared() && shared_b.is_shared());
    assert_abs_diff_eq!(shared_a.energy, 45.0, epsilon = 1e-9);
    assert_abs_diff_eq!(shared_b.energy, 45.0, epsilon = 1e-9);
    assert_abs_diff_eq!(a.energy + b.energy, 376.0, epsilon = 1e-9);

    assert_eq!(stats.split_clusters, 1);
    assert_eq!(stats.convergence_fallbacks, 0);
    assert_eq!(stats.max_convergence_rounds, 1);
}

#[test]
fn test_unsplit_policy_keeps_partially_settled_cluster_whole() {
    let geometry = three_peak_line();
    let hits = line_hits(&[100.0, 20.0, 5.0, 18.0, 90.0, 18.0, 5.0, 20.0, 100.0]);
    let config = ClusteringConfig::default().with_max_iterations(1);
    let mut stats = ClusteringStatistics::default();
    let clusters = NextGenClustering::new(config)
        .unwrap()
        .build(&geometry, &hits, &mut stats);

    assert_eq!(clusters.len(), 1);
    assert!(!clusters[0].is_split());
    assert_relative_eq!(clusters[0].energy, 376.0);
    assert_eq!(stats.split_clusters, 0);
    assert_eq!(stats.convergence_fallbacks, 1);
}

#[test]
fn test_drop_unstable_matches_default_when_all_settle() {
    let geometry = line(5, 1.0);
    let hits = line_hits(&[100.0, 20.0, 5.0, 18.0, 90.0]);
    let config =
        ClusteringConfig::default().with_non_convergence(NonConvergencePolicy::DropUnstable);

    let mut stats = ClusteringStatistics::default();
    let dropping = NextGenClustering::new(config)
        .unwrap()
        .build(&geometry, &hits, &mut stats);
    let default = NextGenClustering::default().build(&geometry, &hits, &mut stats);
    assert_eq!(dropping, default);
}

#[test]
fn test_event_with_shared_geometry() {
    let _ = env_logger::builder().is_test(true).try_init();
    let geometries = vec![
        Arc::new(line(5, 1.0)),
        Arc::new(
            StaticGeometry::square_grid(DetectorType::CrystalBall, 3, 3, 1.0, 1.0).unwrap(),
        ),
    ];
    let event = EventHits::new(9)
        .with_detector(DetectorType::Taps, line_hits(&[100.0, 20.0, 5.0, 18.0, 90.0]))
        .with_detector(DetectorType::CrystalBall, vec![ClusterHit::new(4, 12.0, 3.0)])
        .with_detector(DetectorType::Other(7), vec![ClusterHit::new(0, 1.0, 0.0)]);

    let mut stats = ClusteringStatistics::default();
    let result = cluster_event(&NextGenClustering::default(), &geometries, &event, &mut stats);

    assert_eq!(result.detector(DetectorType::Taps).len(), 2);
    assert_eq!(result.detector(DetectorType::CrystalBall).len(), 1);
    assert!(result.detector(DetectorType::Other(7)).is_empty());
    assert_eq!(result.len(), 3);
    assert_eq!(stats.hits_unknown_channel, 1);
    assert_eq!(stats.split_clusters, 1);
}
