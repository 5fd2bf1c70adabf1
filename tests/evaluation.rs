//! Tests for evaluation module

use flowclus::evaluation::{
    average_min_distance, directed_hausdorff, silhouette, DistanceMatrix, TrajectoryDistance,
    TrajectoryMetric,
};
use flowclus::geo_utils::haversine_distance;
use flowclus::{FlowError, GpsPoint};

fn line(lat: f64, lng_start: f64, n: usize) -> Vec<GpsPoint> {
    (0..n)
        .map(|i| GpsPoint::new(lat, lng_start + i as f64 * 0.01))
        .collect()
}

fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}

#[test]
fn test_directed_hausdorff_is_directed() {
    let short = line(1.0, 103.0, 2);
    let long = line(1.0, 103.0, 10);

    // Every point of `short` lies on `long`
    assert_eq!(directed_hausdorff(&short, &long), 0.0);
    let expected = haversine_distance(&long[9], &short[1]);
    assert!(approx_eq(directed_hausdorff(&long, &short), expected, 1e-6));
}

#[test]
fn test_metrics_are_symmetric_and_non_negative() {
    let a = line(1.0, 103.0, 5);
    let b = line(1.05, 103.02, 7);
    for metric in [
        TrajectoryMetric::DirectedHausdorff,
        TrajectoryMetric::AverageMinDistance,
    ] {
        let ab = metric.distance(&a, &b);
        let ba = metric.distance(&b, &a);
        assert!(ab >= 0.0);
        assert!(approx_eq(ab, ba, 1e-9), "{metric:?} not symmetric");
        assert_eq!(metric.distance(&a, &a), 0.0);
    }
}

#[test]
fn test_average_min_distance_parallel_lines() {
    let a = line(1.0, 103.0, 5);
    let b = line(1.01, 103.0, 5);
    let offset = haversine_distance(&a[0], &b[0]);
    assert!(approx_eq(average_min_distance(&a, &b), offset, 1.0));
}

#[test]
fn test_empty_trajectories_have_zero_distance() {
    assert_eq!(directed_hausdorff(&[], &line(1.0, 103.0, 3)), 0.0);
    assert_eq!(average_min_distance(&line(1.0, 103.0, 3), &[]), 0.0);
}

#[test]
fn test_matrix_symmetric_with_zero_diagonal() {
    let trajectories = vec![
        line(1.0, 103.0, 5),
        line(1.2, 103.0, 5),
        line(1.4, 103.1, 6),
        line(0.8, 102.9, 4),
    ];
    let matrix = DistanceMatrix::build(&trajectories, &TrajectoryMetric::DirectedHausdorff);

    assert_eq!(matrix.len(), 4);
    for i in 0..4 {
        assert_eq!(matrix.get(i, i), 0.0);
        for j in 0..4 {
            assert_eq!(matrix.get(i, j), matrix.get(j, i));
            assert!(matrix.get(i, j) >= 0.0);
        }
    }
    assert!(matrix.get(0, 1) > 0.0);
}

struct Constant(f64);

impl TrajectoryDistance for Constant {
    fn distance(&self, _a: &[GpsPoint], _b: &[GpsPoint]) -> f64 {
        self.0
    }
}

#[test]
fn test_matrix_with_custom_metric() {
    let trajectories = vec![line(1.0, 103.0, 2); 3];
    let matrix = DistanceMatrix::build(&trajectories, &Constant(7.0));
    assert_eq!(matrix.get(0, 2), 7.0);
    assert_eq!(matrix.get(1, 1), 0.0);
}

#[test]
fn test_from_rows_requires_square() {
    assert!(DistanceMatrix::from_rows(vec![vec![0.0, 1.0], vec![1.0]]).is_err());
    assert!(DistanceMatrix::from_rows(vec![vec![0.0, 1.0], vec![1.0, 0.0]]).is_ok());
}

fn two_tight_clusters() -> DistanceMatrix {
    // {0,1,2} close together, {3,4} close together, far apart otherwise
    let mut rows = vec![vec![10.0; 5]; 5];
    for group in [vec![0, 1, 2], vec![3, 4]] {
        for &i in &group {
            for &j in &group {
                rows[i][j] = 1.0;
            }
        }
    }
    for (i, row) in rows.iter_mut().enumerate() {
        row[i] = 0.0;
    }
    DistanceMatrix::from_rows(rows).unwrap()
}

#[test]
fn test_silhouette_well_separated() {
    let matrix = two_tight_clusters();
    let score = silhouette(&matrix, &[0, 0, 0, 1, 1]).unwrap();
    assert!(approx_eq(score, 0.9, 1e-9), "got {score}");
}

#[test]
fn test_silhouette_bad_labelling_is_negative() {
    let matrix = two_tight_clusters();
    let score = silhouette(&matrix, &[0, 1, 0, 1, 0]).unwrap();
    assert!(score < 0.0);
    assert!(score >= -1.0);
}

#[test]
fn test_silhouette_scores_noise_as_a_label() {
    let matrix = two_tight_clusters();
    // Noise {2} is a singleton (0) and sits 1.0 from cluster 0, so records
    // 0 and 1 get a = b = 1 (0); records 3 and 4 get (10 - 1) / 10 = 0.9.
    // Mean over all five records: 1.8 / 5.
    let score = silhouette(&matrix, &[0, 0, -1, 1, 1]).unwrap();
    assert!(approx_eq(score, 0.36, 1e-9), "got {score}");
}

#[test]
fn test_silhouette_noise_majority_is_scored() {
    let matrix = two_tight_clusters();
    // Noise {0,1,3}: records 0 and 1 score (1 - 5.5) / 5.5, record 3 scores
    // (1 - 10) / 10; clusters {2} and {4} are singletons.
    let score = silhouette(&matrix, &[-1, -1, 0, -1, 1]).unwrap();
    let expected = (2.0 * (-4.5 / 5.5) - 0.9) / 5.0;
    assert!(approx_eq(score, expected, 1e-9), "got {score}");
}

#[test]
fn test_silhouette_within_bounds() {
    let trajectories: Vec<Vec<GpsPoint>> = (0..8)
        .map(|i| line(1.0 + (i % 4) as f64 * 0.07, 103.0 + i as f64 * 0.01, 4 + i % 3))
        .collect();
    let matrix = DistanceMatrix::build(&trajectories, &TrajectoryMetric::AverageMinDistance);
    for labels in [
        [0, 0, 1, 1, 0, 0, 1, 1],
        [0, 1, 2, 0, 1, 2, 0, 1],
        [0, 0, 0, 0, 0, 0, 0, 1],
        [-1, 0, 1, -1, 0, 1, -1, 0],
    ] {
        let score = silhouette(&matrix, &labels).unwrap();
        assert!((-1.0..=1.0).contains(&score), "{score} for {labels:?}");
    }
}

#[test]
fn test_silhouette_undefined() {
    let matrix = two_tight_clusters();
    assert!(matches!(
        silhouette(&matrix, &[0, 0, 0, 0, 0]),
        Err(FlowError::SilhouetteUndefined { .. })
    ));
    assert!(matches!(
        silhouette(&matrix, &[-1, -1, -1, -1, 0]),
        Err(FlowError::SilhouetteUndefined { .. })
    ));
    // Noise counts towards the labels: five labels over five records
    assert!(matches!(
        silhouette(&matrix, &[0, 1, 2, 3, -1]),
        Err(FlowError::SilhouetteUndefined {
            non_noise_labels: 4,
            labels: 5,
            samples: 5,
        })
    ));
    assert!(matches!(
        silhouette(&matrix, &[-1, -1, -1, -1, -1]),
        Err(FlowError::SilhouetteUndefined { .. })
    ));
    assert!(matches!(
        silhouette(&matrix, &[0, 1]),
        Err(FlowError::InvalidParameter { .. })
    ));
}
