//! Balance Board Analytics CLI
//!
//! Replays recorded balance board readings through the direction classifier.

use anyhow::{anyhow, Context};
use balance_board_analytics::{
    collector::{CollectorError, ReplayCollector},
    config::Config,
    device::{spawn_device, spawn_sink_writer, DeviceSpec},
    sink::JsonlSink,
    stats::{create_shared_stats_with_persistence, SharedSessionStats},
    VERSION,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bboard")]
#[command(version = VERSION)]
#[command(about = "Streaming direction classifier for balance boards", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded readings (JSON lines) and classify directions
    Run {
        /// Input files, one device per file ("-" reads stdin)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output file for committed events (JSON lines)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Device identifier (only with a single input)
        #[arg(long)]
        device: Option<String>,

        /// Decisions a direction needs before it is committed
        #[arg(long)]
        threshold_count: Option<u32>,

        /// Total load below which the board counts as empty
        #[arg(long)]
        mass_threshold: Option<u32>,
    },

    /// Show statistics from previous runs
    Status,

    /// Show configuration
    Config {
        /// Write the current configuration to the config file
        #[arg(long)]
        save: bool,
    },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            inputs,
            output,
            device,
            threshold_count,
            mass_threshold,
        } => cmd_run(inputs, output, device, threshold_count, mass_threshold),
        Commands::Status => cmd_status(),
        Commands::Config { save } => cmd_config(save),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load configuration, using defaults: {e}");
        Config::default()
    })
}

fn device_id_for(input: &Path, explicit: Option<&str>) -> String {
    if let Some(id) = explicit {
        return id.to_string();
    }
    if input == Path::new("-") {
        return "stdin".to_string();
    }
    input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| input.display().to_string())
}

/// Open every input before any worker starts, so a bad path fails the run
/// cleanly. Readers already started are stopped on error.
fn open_collectors(
    inputs: &[PathBuf],
    stats: &SharedSessionStats,
) -> Result<Vec<ReplayCollector>, CollectorError> {
    let mut collectors = Vec::with_capacity(inputs.len());
    for input in inputs {
        let opened = if input == Path::new("-") {
            ReplayCollector::spawn(BufReader::new(std::io::stdin()), stats.clone())
        } else {
            ReplayCollector::open(input, stats.clone())
        };

        match opened {
            Ok(collector) => collectors.push(collector),
            Err(e) => {
                for collector in &collectors {
                    collector.stop();
                }
                return Err(e);
            }
        }
    }
    Ok(collectors)
}

fn cmd_run(
    inputs: Vec<PathBuf>,
    output: Option<PathBuf>,
    device: Option<String>,
    threshold_count: Option<u32>,
    mass_threshold: Option<u32>,
) -> anyhow::Result<()> {
    if device.is_some() && inputs.len() > 1 {
        return Err(anyhow!("--device can only be used with a single input"));
    }

    let mut config = load_config();
    if let Some(count) = threshold_count {
        config.analytics.threshold_count = count;
    }
    if let Some(threshold) = mass_threshold {
        config.analytics.mass_threshold = threshold;
    }
    config.validate()?;
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    println!("Balance Board Analytics v{VERSION}");
    println!();
    println!("  Mass threshold: {}", config.analytics.mass_threshold);
    println!("  Threshold count: {}", config.analytics.threshold_count);
    println!("  Window capacity: {}", config.analytics.window_capacity);
    println!(
        "  Calibration capacity: {}",
        config.analytics.calibration_capacity
    );

    let stats = create_shared_stats_with_persistence(config.stats_path());

    let output = output.unwrap_or_else(|| {
        config.export_path.join(format!(
            "events_{}.jsonl",
            Utc::now().format("%Y%m%d_%H%M%S")
        ))
    });
    let sink = JsonlSink::open(&output)
        .with_context(|| format!("could not open output {}", output.display()))?;
    println!("  Output: {}", output.display());
    println!();

    let collectors = open_collectors(&inputs, &stats).context("could not open input")?;

    // Ctrl+C stops readers and devices; a second Ctrl+C exits at once
    let running = Arc::new(AtomicBool::new(true));
    let interrupted = Arc::new(AtomicBool::new(false));
    let mut stop_handles: Vec<Arc<AtomicBool>> =
        collectors.iter().map(ReplayCollector::stop_handle).collect();
    stop_handles.push(running.clone());
    let interrupted_flag = interrupted.clone();
    ctrlc::set_handler(move || {
        if interrupted_flag.swap(true, Ordering::SeqCst) {
            eprintln!("Interrupted again, exiting");
            std::process::exit(130);
        }
        for handle in &stop_handles {
            handle.store(false, Ordering::SeqCst);
        }
    })
    .context("could not set Ctrl+C handler")?;

    let (record_tx, record_rx) = crossbeam_channel::unbounded();
    let writer = spawn_sink_writer(sink, record_rx, stats.clone())?;

    let mut devices = Vec::new();
    for (input, collector) in inputs.iter().zip(&collectors) {
        let mut spec = DeviceSpec::new(
            device_id_for(input, device.as_deref()),
            config.analytics.clone(),
        )
        .with_running(running.clone());
        spec.bucket = config.bucket();
        println!("Device {}: {}", spec.device_id, input.display());

        devices.push(spawn_device(
            spec,
            collector.receiver().clone(),
            record_tx.clone(),
            stats.clone(),
        )?);
    }
    drop(record_tx);

    println!();
    println!("Press Ctrl+C to stop");
    println!();

    for handle in devices {
        let report = handle
            .join()
            .map_err(|_| anyhow!("device thread panicked"))?;
        println!(
            "[{}] {} frames, {} calibration samples, {} events",
            report.device_id, report.frames, report.calibration_samples, report.events
        );
    }

    // a reader blocked on an idle terminal never returns, so skip the join
    let interrupted = interrupted.load(Ordering::SeqCst);
    if interrupted {
        eprintln!("Interrupted, unread input discarded");
    }
    for mut collector in collectors.into_iter().filter(|_| !interrupted) {
        let report = match collector.join() {
            Ok(report) => report,
            Err(e) => {
                eprintln!("Warning: {e}");
                continue;
            }
        };
        if report.rejected > 0 {
            eprintln!("Warning: {} invalid readings skipped", report.rejected);
        }
        if let Some(e) = report.error {
            eprintln!("Warning: Input stopped early: {e}");
        }
    }

    let sink_report = writer
        .join()
        .map_err(|_| anyhow!("sink writer thread panicked"))?;
    println!(
        "Wrote {} events to {:?} ({} failed)",
        sink_report.written, output, sink_report.failed
    );

    if let Err(e) = stats.save() {
        eprintln!("Warning: Could not save session stats: {e}");
    }

    println!();
    println!("{}", stats.summary());
    Ok(())
}

fn cmd_status() -> anyhow::Result<()> {
    let config = load_config();

    println!("Balance Board Analytics Status");
    println!("==============================");
    println!();

    let stats_path = config.stats_path();
    if !stats_path.exists() {
        println!("No previous session data found.");
        return Ok(());
    }

    let content = std::fs::read_to_string(&stats_path)
        .with_context(|| format!("could not read {}", stats_path.display()))?;
    let stats: serde_json::Value = serde_json::from_str(&content)?;

    println!("Cumulative Statistics:");
    for (key, label) in [
        ("frames_processed", "Frames processed"),
        ("calibration_samples", "Calibration samples"),
        ("frames_rejected", "Frames rejected"),
        ("events_emitted", "Direction events"),
        ("sink_writes", "Sink writes"),
        ("sink_failures", "Sink failures"),
        ("last_updated", "Last updated"),
    ] {
        if let Some(value) = stats.get(key) {
            println!("  {label}: {value}");
        }
    }
    Ok(())
}

fn cmd_config(save: bool) -> anyhow::Result<()> {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);

    if save {
        config.validate()?;
        config.save()?;
        println!();
        println!("Saved.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use balance_board_analytics::stats::create_shared_stats;

    #[test]
    fn test_device_id_for() {
        assert_eq!(device_id_for(Path::new("-"), None), "stdin");
        assert_eq!(device_id_for(Path::new("/data/board-7.jsonl"), None), "board-7");
        assert_eq!(device_id_for(Path::new("a.jsonl"), Some("00:1e:35")), "00:1e:35");
    }

    #[test]
    fn test_open_collectors_fails_before_spawning_workers() {
        let dir = std::env::temp_dir().join(format!("bboard-main-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let good = dir.join("board-1.jsonl");
        std::fs::write(
            &good,
            "{\"timestamp\":\"2014-06-01T12:00:00Z\",\"channels\":[1,2,3,4]}\n",
        )
        .unwrap();
        let missing = dir.join("board-2.jsonl");

        let stats = create_shared_stats();
        let result = open_collectors(&[good.clone(), missing], &stats);
        assert!(matches!(result, Err(CollectorError::Io(_))));

        let mut collectors = open_collectors(&[good], &stats).unwrap();
        assert_eq!(collectors.len(), 1);
        let report = collectors[0].join().unwrap();
        assert_eq!(report.frames, 1);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
