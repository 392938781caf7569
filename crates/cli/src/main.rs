use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use smoke_cloud_core::obstacles::{Obstacle, ObstacleFactory, ObstacleField};
use smoke_cloud_core::{CloudConfig, Phase, RunSummary, SmokeCloud};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Instant;

const ANCHOR: [f64; 3] = [0.0, 0.0, 0.0];
const SAMPLE_EVERY_SECONDS: f64 = 0.5;
const BENCHMARK_ROUNDS: usize = 20;

#[derive(Parser)]
#[command(name = "smoke-cloud")]
#[command(about = "Voxel smoke cloud simulation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate one cloud from throw to despawn
    Run {
        /// Path to config file (JSON)
        #[arg(long)]
        config: PathBuf,

        /// Output directory for summary.json (optional)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Frames per simulated second
        #[arg(long, default_value_t = 60)]
        fps: u32,

        /// Stop after this many simulated seconds even if the cloud is alive
        #[arg(long, default_value_t = 120.0)]
        max_seconds: f64,

        /// Number of random obstacle boxes scattered around the anchor
        #[arg(long, default_value_t = 0)]
        obstacles: usize,

        /// Seed for obstacle placement
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Time full growth for a few cloud sizes
    Benchmark,
    /// Dump the default configuration to stdout
    DumpDefaultConfig,
}

/// Scatter `count` boxes inside the cloud's footprint, resting on the ground.
fn random_obstacles(config: &CloudConfig, count: usize, seed: u64) -> Result<ObstacleField> {
    let mut rng = ChaCha12Rng::seed_from_u64(seed);
    let [width, height, _] = config.grid_dims();
    let reach = width as f64 * config.scale / 2.0;
    let mut obstacles = Vec::with_capacity(count);
    for i in 0..count {
        let id = u32::try_from(i).context("obstacle id overflow")?;
        let size = [
            rng.random_range(0.5..3.0) * config.scale,
            rng.random_range(0.5..height as f64 + 1.0) * config.scale,
            rng.random_range(0.5..3.0) * config.scale,
        ];
        let center = [
            ANCHOR[0] + rng.random_range(-reach..=reach),
            ANCHOR[1] + size[1] / 2.0,
            ANCHOR[2] + rng.random_range(-reach..=reach),
        ];
        obstacles.push(Obstacle::centered(id, center, size));
    }
    Ok(ObstacleField::new(obstacles))
}

fn simulate(
    config: CloudConfig,
    field: ObstacleField,
    fps: u32,
    max_seconds: f64,
) -> Result<RunSummary> {
    let dt = 1.0 / f64::from(fps);
    let max_frames = (max_seconds * f64::from(fps)).ceil() as usize;
    let sample_every = ((SAMPLE_EVERY_SECONDS * f64::from(fps)).round() as usize).max(1);

    let mut cloud = SmokeCloud::new(config, ObstacleFactory::new(field), ANCHOR)
        .context("failed to build smoke cloud")?;
    cloud.trigger();

    let mut summary = RunSummary::new();
    summary.sample(cloud.phase(), cloud.occupied_count());
    for frame in 1..=max_frames {
        let report = cloud.advance(dt);
        let occupied = cloud.occupied_count();
        summary.record(dt, &report, occupied);
        if report.transitioned() {
            println!(
                "[{:7.3}s] {:?} -> {:?} ({occupied} cells)",
                summary.elapsed, report.phase_before, report.phase_after
            );
            summary.sample(report.phase_after, occupied);
        } else if frame % sample_every == 0 {
            summary.sample(report.phase_after, occupied);
        }
        if report.phase_after == Phase::Decayed {
            break;
        }
    }

    if cloud.phase() != Phase::Decayed {
        log::warn!(
            "time limit reached in {:?} with {} cells alive",
            cloud.phase(),
            cloud.occupied_count()
        );
    }
    cloud.teardown();
    let factory = cloud.factory();
    summary.cells_instantiated = factory.instantiated();
    summary.cells_destroyed = factory.destroyed();
    if factory.live_count() != 0 || factory.double_destroys() != 0 {
        log::error!(
            "handle accounting mismatch: {} live, {} double destroys",
            factory.live_count(),
            factory.double_destroys()
        );
    }
    Ok(summary)
}

fn run_benchmark(volume: usize, height: usize) -> Result<()> {
    let config = CloudConfig {
        volume,
        height,
        fuse_delay: 0.0,
        ..CloudConfig::default()
    };
    config
        .validate()
        .context("Benchmark config validation error")?;

    let mut total_us = 0u128;
    let mut total_ticks = 0usize;
    let mut cells = 0usize;
    for _ in 0..BENCHMARK_ROUNDS {
        let mut cloud = SmokeCloud::new(config.clone(), ObstacleFactory::default(), ANCHOR)
            .context("failed to build smoke cloud")?;
        // First frame crosses the fuse and seeds.
        cloud.advance(f64::MIN_POSITIVE);
        let start = Instant::now();
        while cloud.phase() == Phase::Deploying {
            total_ticks += cloud.advance(1.0 / config.deploy_speed).growth_ticks;
        }
        total_us += start.elapsed().as_micros();
        cells = cloud.occupied_count();
    }

    let per_tick = total_us as f64 / total_ticks.max(1) as f64;
    let per_cloud = total_us as f64 / BENCHMARK_ROUNDS as f64;
    println!("--- volume {volume}, height {height} ---");
    println!("  Deployed cells: {cells}");
    println!("  Growth ticks:   {}", total_ticks / BENCHMARK_ROUNDS);
    println!("  Per tick:       {per_tick:.1} us");
    println!("  Per cloud:      {per_cloud:.1} us");
    println!();
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::DumpDefaultConfig => {
            let config = CloudConfig::default();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Benchmark => {
            if cfg!(debug_assertions) {
                eprintln!("WARNING: running in debug mode. Results are not representative.");
                eprintln!("         Use: cargo run -p smoke-cloud-cli --release -- benchmark");
                eprintln!();
            }
            println!("=== Smoke Cloud Growth Benchmark ===");
            println!("Rounds: {BENCHMARK_ROUNDS} per size");
            println!();

            let sizes = [
                (350, 4),     // default grenade
                (2_000, 8),   // large cloud
                (10_000, 16), // stress test
                (2_000, 1),   // flat sheet
            ];
            for (volume, height) in sizes {
                run_benchmark(volume, height)?;
            }
        }
        Commands::Run {
            config,
            out,
            fps,
            max_seconds,
            obstacles,
            seed,
        } => {
            anyhow::ensure!(fps > 0, "--fps must be positive");
            anyhow::ensure!(
                max_seconds.is_finite() && max_seconds > 0.0,
                "--max-seconds must be positive"
            );
            let file = File::open(&config).context("failed to open config file")?;
            let reader = BufReader::new(file);
            let cloud_config: CloudConfig =
                serde_json::from_reader(reader).context("failed to parse config")?;

            cloud_config.validate().context("Config validation error")?;

            println!("Loaded config from {:?}", config);
            println!(
                "Simulating at {fps} fps for up to {max_seconds}s with {obstacles} obstacles..."
            );

            let field = random_obstacles(&cloud_config, obstacles, seed)?;
            let summary = simulate(cloud_config, field, fps, max_seconds)?;

            if let Some(out_dir) = out {
                std::fs::create_dir_all(&out_dir).context("failed to create output directory")?;
                let summary_path = out_dir.join("summary.json");
                let file = File::create(summary_path).context("failed to create summary file")?;
                serde_json::to_writer_pretty(file, &summary).context("failed to write summary")?;
                println!("Run complete. Results saved to {:?}", out_dir);
            } else {
                println!(
                    "Run complete. Final phase: {:?}, peak cells: {}",
                    summary.final_phase, summary.peak_occupied
                );
            }
        }
    }
    Ok(())
}
