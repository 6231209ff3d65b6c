use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tokio::time::{interval, Duration, Instant};

use air_monitor_rs::console::{format_report, ts_now, ts_now_clean};
use air_monitor_rs::live_status::LiveStatus;
use air_monitor_rs::sensors::{save_log, ContaminationEvent, RecordingSource, SimulatedSource};
use air_monitor_rs::state_store::StateStore;
use air_monitor_rs::{AirMonitor, MonitorConfig};

#[derive(Parser, Debug)]
#[command(name = "air_monitor")]
#[command(about = "BME688 air-quality monitor with gas-baseline VOC fallback", long_about = None)]
struct Args {
    /// Duration in seconds (0 = continuous)
    #[arg(value_name = "SECONDS", default_value = "0")]
    duration: u64,

    /// JSON config file (missing fields use defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding persisted fusion state
    #[arg(long, default_value = "air_monitor_state")]
    state_dir: PathBuf,

    /// Output directory for live status and recorded sessions
    #[arg(long, default_value = "air_monitor_sessions")]
    output_dir: PathBuf,

    /// How often the fusion source is run
    #[arg(long, default_value = "100")]
    poll_ms: u64,

    /// Simulated sensor output period
    #[arg(long, default_value = "3000")]
    period_ms: u64,

    /// Simulated clean-air gas resistance (Ohm)
    #[arg(long, default_value = "50000")]
    clean_air_ohm: f64,

    /// Simulated contamination as START_S:DURATION_S:DROP (repeatable)
    #[arg(long = "event", value_parser = parse_event)]
    events: Vec<ContaminationEvent>,

    /// Save every fusion output to a replayable session log on exit
    #[arg(long)]
    record: bool,
}

fn parse_event(s: &str) -> Result<ContaminationEvent, String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return Err(format!("expected START_S:DURATION_S:DROP, got {:?}", s));
    }
    let start_s: u64 = parts[0].parse().map_err(|e| format!("start: {}", e))?;
    let duration_s: u64 = parts[1].parse().map_err(|e| format!("duration: {}", e))?;
    let drop_fraction: f64 = parts[2].parse().map_err(|e| format!("drop: {}", e))?;
    if !(0.0..=1.0).contains(&drop_fraction) {
        return Err(format!("drop must be within 0..1, got {}", drop_fraction));
    }
    Ok(ContaminationEvent {
        start_ms: start_s * 1000,
        duration_ms: duration_s * 1000,
        drop_fraction,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match args.config.as_ref() {
        Some(path) => MonitorConfig::load(path)?,
        None => MonitorConfig::default(),
    };

    println!("[{}] Air Monitor RS Starting", ts_now());
    println!("  Duration: {} seconds (0=continuous)", args.duration);
    println!("  Update interval: {} ms", config.update_interval_ms);
    println!("  Baseline delay: {} ms", config.baseline_delay_ms);
    println!("  State dir: {}", args.state_dir.display());
    println!("  Output dir: {}", args.output_dir.display());

    std::fs::create_dir_all(&args.output_dir)?;
    let store = StateStore::open(
        &args.state_dir,
        &config.state_namespace,
        config.max_state_blob_size,
    )?;

    let mut sensor = SimulatedSource::new(args.period_ms, args.clean_air_ohm);
    for event in &args.events {
        sensor = sensor.with_event(*event);
    }

    let start = Instant::now();
    let mut monitor = AirMonitor::new(RecordingSource::new(sensor), config, Some(store), 0);
    let mut live_status = LiveStatus::new();
    let status_path = args.output_dir.join("live_status.json");
    let mut ticker = interval(Duration::from_millis(args.poll_ms.max(1)));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut ctrl_c => {
                println!("[{}] Interrupted, stopping...", ts_now());
                break;
            }
        }

        let now_ms = start.elapsed().as_millis() as u64;
        if args.duration > 0 && now_ms >= args.duration * 1000 {
            println!("[{}] Duration reached, stopping...", ts_now());
            break;
        }

        match monitor.poll(now_ms) {
            Ok(Some(report)) => {
                println!("{}", format_report(&report));
                live_status.update(&report, now_ms / 1000);
                if let Err(e) = live_status.save(&status_path.to_string_lossy()) {
                    log::warn!("Failed to write live status: {}", e);
                }
            }
            Ok(None) => {}
            Err(e) => log::error!("Poll failed: {}", e),
        }
    }

    if args.record {
        let path = args
            .output_dir
            .join(format!("session_{}.json.gz", ts_now_clean()));
        save_log(&path, monitor.source().log())?;
        println!(
            "[{}] Recorded {} fusion outputs to {}",
            ts_now(),
            monitor.source().log().records.len(),
            path.display()
        );
    }

    println!("\n=== Final Stats ===");
    println!("Published cycles: {}", monitor.cycles());
    match monitor.estimator().baseline_kohm() {
        Some(b) => println!("Gas baseline: {:.2} kOhm", b),
        None => println!("Gas baseline: not established"),
    }

    Ok(())
}
