//! Tests for pipeline module

use std::collections::HashMap;
use std::sync::Arc;

use flowclus::buckets::reduce;
use flowclus::lsh::optimal_bands;
use flowclus::pipeline::{
    find_candidates, pool_entrance_points, sign_flights, simplify_flights, TokenizedFlight,
};
use flowclus::synthetic::ApproachScenario;
use flowclus::{
    ClusteringConfig, Evaluation, Flight, FlowError, GpsPoint, LshIndex, MemoryLog, MinHasher,
    NoopLog, Pipeline, ReductionStrategy, NOISE,
};

fn three_stream_config() -> ClusteringConfig {
    ClusteringConfig {
        corridor_count: 3,
        ..ClusteringConfig::default()
    }
}

#[test]
fn test_identical_token_sets_share_a_cluster() {
    let mut tokenized: Vec<TokenizedFlight> = [
        ["G1", "G2", "G3"],
        ["G3", "G2", "G1"],
        ["G2", "G1", "G3"],
        ["G1", "G3", "G2"],
        ["G1", "G2", "G3"],
        ["G3", "G1", "G2"],
    ]
    .iter()
    .enumerate()
    .map(|(i, tokens)| TokenizedFlight::from_tokens(&format!("F{i}"), tokens))
    .collect();
    tokenized.push(TokenizedFlight::from_tokens("LONER", &["G9"]));

    let hasher = MinHasher::new(128, 1).unwrap();
    let signed = sign_flights(&tokenized, &hasher);
    let mut index = LshIndex::new(0.6, 128).unwrap();
    let candidates = find_candidates(&signed, &mut index).unwrap();

    assert_eq!(candidates[0].candidates, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(candidates[6].candidates, vec![6]);

    let assignments = reduce(&candidates, ReductionStrategy::CandidateSetEquality, 5);
    let first = assignments[0].cluster;
    assert_ne!(first, NOISE);
    assert!(assignments[..6].iter().all(|a| a.cluster == first));
    assert_eq!(assignments[6].flight_id, "LONER");
    assert_eq!(assignments[6].cluster, NOISE);
}

#[test]
fn test_invalid_algorithm_fails_before_running() {
    let config = ClusteringConfig {
        corridor_algorithm: "spectral".to_string(),
        ..ClusteringConfig::default()
    };
    assert!(matches!(
        Pipeline::new(config),
        Err(FlowError::InvalidAlgorithm { .. })
    ));
}

#[test]
fn test_invalid_threshold_fails_before_running() {
    let config = ClusteringConfig {
        lsh_threshold: 1.0,
        ..ClusteringConfig::default()
    };
    assert!(matches!(
        Pipeline::new(config),
        Err(FlowError::InvalidParameter { .. })
    ));

    let config = ClusteringConfig {
        max_flights: 0,
        ..ClusteringConfig::default()
    };
    assert!(Pipeline::new(config).is_err());
}

#[test]
fn test_band_layout_fixed_at_construction() {
    let config = ClusteringConfig {
        lsh_threshold: 0.6,
        num_perm: 128,
        ..ClusteringConfig::default()
    };
    let pipeline = Pipeline::with_log(config, Arc::new(NoopLog)).unwrap();
    let tuned = LshIndex::new(0.6, 128).unwrap();
    assert_eq!(pipeline.band_layout(), (tuned.bands(), tuned.rows()));
    assert_eq!(pipeline.band_layout(), optimal_bands(0.6, 128));

    let log = Arc::new(MemoryLog::new());
    let pipeline = Pipeline::with_log(three_stream_config(), log.clone()).unwrap();
    let (bands, rows) = pipeline.band_layout();
    pipeline
        .run_records(&ApproachScenario::with_flight_count(20).generate().records)
        .unwrap();
    let layout = format!("{bands} bands x {rows} rows");
    assert!(log
        .entries()
        .iter()
        .any(|e| e.starts_with("candidate_search ") && e.contains(&layout)));
}

#[test]
fn test_three_streams_recovered() {
    let dataset = ApproachScenario::three_streams().generate();
    let pipeline = Pipeline::with_log(three_stream_config(), Arc::new(NoopLog)).unwrap();
    let result = pipeline.run_records(&dataset.records).unwrap();

    assert_eq!(result.algorithm, "k-means");
    assert_eq!(result.corridors.len(), 3);
    assert_eq!(result.assignments.len(), dataset.stream_of.len());

    // Same stream <=> same cluster
    let mut cluster_of_stream: HashMap<usize, i32> = HashMap::new();
    for assignment in &result.assignments {
        let stream = dataset.stream_of[&assignment.flight_id];
        let cluster = *cluster_of_stream
            .entry(stream)
            .or_insert(assignment.cluster);
        assert_eq!(cluster, assignment.cluster, "{}", assignment.flight_id);
    }
    let mut clusters: Vec<i32> = cluster_of_stream.values().copied().collect();
    clusters.sort();
    clusters.dedup();
    assert_eq!(clusters.len(), 3);
    assert!(clusters.iter().all(|&c| c != NOISE));

    assert_eq!(result.summary.cluster_count, 3);
    assert_eq!(result.summary.noise_count, 0);
    let score = result.evaluation.score().unwrap();
    assert!(score > 0.5 && score <= 1.0, "silhouette {score}");
}

#[test]
fn test_density_detector_on_three_streams() {
    let dataset = ApproachScenario::three_streams().generate();
    let config = ClusteringConfig {
        corridor_algorithm: "dbscan".to_string(),
        ..ClusteringConfig::default()
    };
    let pipeline = Pipeline::with_log(config, Arc::new(NoopLog)).unwrap();
    let result = pipeline.run_records(&dataset.records).unwrap();

    assert_eq!(result.algorithm, "dbscan");
    assert_eq!(result.corridors.len(), 3);
    assert_eq!(result.summary.cluster_count, 3);
}

#[test]
fn test_reruns_are_identical() {
    let records = ApproachScenario::with_flight_count(30).generate().records;
    let pipeline = Pipeline::with_log(three_stream_config(), Arc::new(NoopLog)).unwrap();

    let first = pipeline.run_records(&records).unwrap();
    let second = pipeline.run_records(&records).unwrap();
    assert_eq!(first, second);

    let fresh = Pipeline::with_log(three_stream_config(), Arc::new(NoopLog)).unwrap();
    assert_eq!(first, fresh.run_records(&records).unwrap());
}

#[test]
fn test_run_log_brackets_every_run() {
    let log = Arc::new(MemoryLog::new());
    let pipeline = Pipeline::with_log(three_stream_config(), log.clone()).unwrap();

    let records = ApproachScenario::with_flight_count(20).generate().records;
    pipeline.run_records(&records).unwrap();

    let entries = log.entries();
    assert!(entries.first().unwrap().starts_with("open "));
    assert!(entries.last().unwrap().starts_with("close "));
    assert!(entries.iter().any(|e| e.starts_with("corridor_detection ")));
    assert!(entries.iter().any(|e| e.starts_with("reduction ")));
    assert_eq!(entries.iter().filter(|e| e.starts_with("open ")).count(), 1);
}

#[test]
fn test_run_log_closed_on_failure() {
    let log = Arc::new(MemoryLog::new());
    let pipeline = Pipeline::with_log(ClusteringConfig::default(), log.clone()).unwrap();

    assert!(matches!(
        pipeline.run_records(&[]),
        Err(FlowError::EmptyInput { .. })
    ));

    let entries = log.entries();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].starts_with("open "));
    assert!(entries[1].starts_with("close "));
    assert!(entries[1].contains("failed"));
}

/// `count` flights entering through the same narrow gate.
fn single_gate_flights(count: usize) -> Vec<Flight> {
    (0..count)
        .map(|i| {
            let jitter = i as f64 * 0.001;
            let trajectory: Vec<GpsPoint> = (0..10)
                .map(|s| GpsPoint::new(3.0 - s as f64 * 0.25 + jitter, 104.0 + jitter))
                .collect();
            let entrance = trajectory[..4].to_vec();
            Flight::new(&format!("F{i}"), trajectory, entrance)
        })
        .collect()
}

#[test]
fn test_evaluation_failure_keeps_assignments() {
    let config = ClusteringConfig {
        corridor_count: 1,
        ..ClusteringConfig::default()
    };
    let pipeline = Pipeline::with_log(config, Arc::new(NoopLog)).unwrap();
    let result = pipeline.run(&single_gate_flights(8)).unwrap();

    assert_eq!(result.labels(), vec![0; 8]);
    assert_eq!(result.cluster_of("F3"), Some(0));
    assert!(matches!(result.evaluation, Evaluation::Failed { .. }));
    assert_eq!(result.evaluation.score(), None);
}

#[test]
fn test_evaluation_can_be_skipped() {
    let config = ClusteringConfig {
        corridor_count: 1,
        evaluate: false,
        ..ClusteringConfig::default()
    };
    let pipeline = Pipeline::with_log(config, Arc::new(NoopLog)).unwrap();
    let result = pipeline.run(&single_gate_flights(8)).unwrap();
    assert_eq!(result.evaluation, Evaluation::Skipped);
}

#[test]
fn test_small_population_is_all_noise() {
    let config = ClusteringConfig {
        corridor_count: 1,
        ..ClusteringConfig::default()
    };
    let pipeline = Pipeline::with_log(config, Arc::new(NoopLog)).unwrap();
    let result = pipeline.run(&single_gate_flights(5)).unwrap();

    assert!(result.labels().iter().all(|&c| c == NOISE));
    assert_eq!(result.summary.cluster_count, 0);
    assert!(matches!(result.evaluation, Evaluation::Failed { .. }));
}

#[test]
fn test_run_rejects_empty_flights() {
    let pipeline = Pipeline::with_log(ClusteringConfig::default(), Arc::new(NoopLog)).unwrap();
    assert!(matches!(
        pipeline.run(&[]),
        Err(FlowError::EmptyInput { .. })
    ));
}

#[test]
fn test_max_flights_caps_run() {
    let config = ClusteringConfig {
        corridor_count: 1,
        max_flights: 6,
        ..ClusteringConfig::default()
    };
    let pipeline = Pipeline::with_log(config, Arc::new(NoopLog)).unwrap();
    let result = pipeline.run(&single_gate_flights(10)).unwrap();
    assert_eq!(result.assignments.len(), 6);
    assert_eq!(result.flights.len(), 6);
}

#[test]
fn test_stage_functions_keep_flight_order() {
    let flights = single_gate_flights(4);
    let simplified = simplify_flights(&flights, 0.0001);
    let ids: Vec<&str> = simplified.iter().map(|f| f.flight_id.as_str()).collect();
    assert_eq!(ids, vec!["F0", "F1", "F2", "F3"]);

    // Collinear points reduce to their endpoints
    assert_eq!(simplified[0].trajectory.len(), 2);
    assert_eq!(simplified[0].raw.len(), 10);
    assert_eq!(pool_entrance_points(&simplified).len(), 8);
}

#[test]
fn test_evaluation_serializes_with_status_tag() {
    let json = serde_json::to_string(&Evaluation::Skipped).unwrap();
    assert_eq!(json, r#"{"status":"skipped"}"#);

    let json = serde_json::to_string(&Evaluation::Scored { silhouette: 0.5 }).unwrap();
    assert_eq!(json, r#"{"status":"scored","silhouette":0.5}"#);
}
