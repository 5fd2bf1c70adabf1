//! flowclus CLI - Debug tool for approach-flow clustering
//!
//! Usage:
//!   flowclus-cli cluster <tracks.csv> [--config <json>] [--output <json>]
//!   flowclus-cli corridors <tracks.csv> [--config <json>]
//!
//! The CSV needs the columns `Flight_ID`, `Latitude`, `Longitude` and
//! `DRemains`; an optional `Destination` column is matched against the
//! configured airport.

use clap::{Parser, Subcommand};
use flowclus::{
    pipeline::{pool_entrance_points, simplify_flights},
    ClusteringConfig, CorridorDetector, FlightRecord, Pipeline, PipelineResult,
};
use log::{info, warn};
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "flowclus-cli")]
#[command(about = "Debug tool for approach-flow clustering", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration file (missing fields use defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the destination airport
    #[arg(short, long, global = true)]
    airport: Option<String>,

    /// Override the corridor detection algorithm ("k-means" or "dbscan")
    #[arg(long, global = true)]
    algorithm: Option<String>,

    /// Override the maximum number of flights
    #[arg(long, global = true)]
    max_flights: Option<usize>,

    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and print cluster statistics
    Cluster {
        /// CSV file of track points
        input: PathBuf,

        /// Write the full result as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Detect entrance corridors only
    Corridors {
        /// CSV file of track points
        input: PathBuf,
    },
}

#[derive(Debug, Deserialize)]
struct TrackRow {
    #[serde(rename = "Flight_ID")]
    flight_id: String,
    #[serde(rename = "Latitude")]
    latitude: f64,
    #[serde(rename = "Longitude")]
    longitude: f64,
    #[serde(rename = "DRemains")]
    distance_remaining: f64,
    #[serde(rename = "Destination", default)]
    destination: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let outcome = match &cli.command {
        Commands::Cluster { input, output } => run_cluster(input, output.as_deref(), config),
        Commands::Corridors { input } => run_corridors(input, config),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<ClusteringConfig, String> {
    let mut config = match &cli.config {
        Some(path) => {
            let json = fs::read_to_string(path).map_err(|e| e.to_string())?;
            ClusteringConfig::from_json(&json).map_err(|e| e.to_string())?
        }
        None => ClusteringConfig::default(),
    };

    if let Some(airport) = &cli.airport {
        config.airport = airport.clone();
    }
    if let Some(algorithm) = &cli.algorithm {
        config.corridor_algorithm = algorithm.clone();
    }
    if let Some(max_flights) = cli.max_flights {
        config.max_flights = max_flights;
    }
    Ok(config)
}

/// Read track rows, keeping those bound for `airport`.
fn load_records(path: &Path, airport: &str) -> Result<Vec<FlightRecord>, String> {
    println!("\n{}", "=".repeat(60));
    println!("Loading tracks from: {}", path.display());
    println!("{}", "=".repeat(60));

    let file = File::open(path).map_err(|e| e.to_string())?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for row in reader.deserialize::<TrackRow>() {
        let row = match row {
            Ok(r) => r,
            Err(e) => {
                warn!("Skipping malformed row: {}", e);
                skipped += 1;
                continue;
            }
        };
        if let Some(destination) = &row.destination {
            if !destination.eq_ignore_ascii_case(airport) {
                continue;
            }
        }
        records.push(FlightRecord {
            flight_id: row.flight_id,
            latitude: row.latitude,
            longitude: row.longitude,
            distance_remaining: row.distance_remaining,
        });
    }

    println!(
        "Loaded {} points for {} ({} malformed rows skipped)",
        records.len(),
        airport,
        skipped
    );
    Ok(records)
}

fn run_cluster(input: &Path, output: Option<&Path>, config: ClusteringConfig) -> Result<(), String> {
    let records = load_records(input, &config.airport)?;
    let pipeline = Pipeline::new(config).map_err(|e| e.to_string())?;
    let result = pipeline.run_records(&records).map_err(|e| e.to_string())?;

    print_summary(&result);

    if let Some(path) = output {
        let file = File::create(path).map_err(|e| e.to_string())?;
        serde_json::to_writer_pretty(BufWriter::new(file), &result).map_err(|e| e.to_string())?;
        info!("Wrote result to {}", path.display());
    }
    Ok(())
}

fn run_corridors(input: &Path, config: ClusteringConfig) -> Result<(), String> {
    let records = load_records(input, &config.airport)?;
    let detector = CorridorDetector::from_config(&config).map_err(|e| e.to_string())?;
    let flights = flowclus::assemble(
        &records,
        config.trajectory_window,
        config.entrance_window,
        config.max_flights,
    )
    .map_err(|e| e.to_string())?;

    let simplified = simplify_flights(&flights, config.simplification_tolerance);
    let pool = pool_entrance_points(&simplified);
    let corridors = detector.detect(&pool).map_err(|e| e.to_string())?;

    println!("\n{}", "=".repeat(60));
    println!(
        "{} corridors ({}) from {} entrance points",
        corridors.len(),
        detector.name(),
        pool.len()
    );
    println!("{}", "=".repeat(60));
    for corridor in corridors.corridors() {
        println!(
            "  G{:<3} {:>10.5} {:>11.5}",
            corridor.id, corridor.center.latitude, corridor.center.longitude
        );
    }
    Ok(())
}

fn print_summary(result: &PipelineResult) {
    println!("\n{}", "=".repeat(60));
    println!("RESULTS for {} ({})", result.airport, result.algorithm);
    println!("{}", "=".repeat(60));
    println!("  Flights:   {}", result.assignments.len());
    println!("  Corridors: {}", result.corridors.len());
    println!("  Buckets:   {}", result.summary.bucket_count);
    println!("  Clusters:  {}", result.summary.cluster_count);
    println!("  Noise:     {}", result.summary.noise_count);

    for (cluster, size) in result.summary.cluster_sizes.iter().enumerate() {
        println!("    cluster {:>3}: {} flights", cluster, size);
    }

    match result.evaluation.score() {
        Some(score) => println!("  Silhouette: {:.4}", score),
        None => println!("  Silhouette: {:?}", result.evaluation),
    }
}
