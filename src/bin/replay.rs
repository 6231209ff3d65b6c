use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use air_monitor_rs::console::format_report;
use air_monitor_rs::{AirMonitor, MonitorConfig, ReplaySource};
use clap::Parser;
use serde_json::json;

#[derive(Parser, Debug)]
struct Args {
    /// Path to session_*.json[.gz] log
    #[arg(long, conflicts_with = "golden_dir")]
    log: Option<PathBuf>,

    /// Directory of recorded sessions to batch replay (processes session_*.json[.gz])
    #[arg(long)]
    golden_dir: Option<PathBuf>,

    /// JSON config file (missing fields use defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the update interval (0 = publish every recorded output)
    #[arg(long)]
    update_interval_ms: Option<u64>,

    /// Print the console block for every published cycle
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

fn run_once(
    path: &Path,
    config: &MonitorConfig,
    verbose: bool,
) -> anyhow::Result<serde_json::Value> {
    let source = ReplaySource::from_path(path)?;
    let mut monitor = AirMonitor::new(source, config.clone(), None, 0);

    let mut categories: BTreeMap<String, u64> = BTreeMap::new();
    let mut fallback_cycles = 0u64;
    let mut fused_cycles = 0u64;
    let mut baseline_at_ms: Option<u64> = None;
    let mut max_index = 0.0_f64;
    let mut max_index_ts = 0u64;

    while let Some(ts) = monitor.source().next_timestamp() {
        let Some(report) = monitor.poll(ts)? else {
            continue;
        };
        if verbose {
            println!("{}", format_report(&report));
        }

        *categories.entry(report.category.label().to_string()).or_insert(0) += 1;
        if report.indicator.is_fallback() {
            fallback_cycles += 1;
        } else {
            fused_cycles += 1;
        }
        if baseline_at_ms.is_none() && report.estimator.baseline_established {
            baseline_at_ms = Some(ts);
            println!(
                "[BASELINE] t={:.1}s baseline={:.2} kOhm",
                ts as f64 / 1000.0,
                report.estimator.baseline_kohm.unwrap_or(f64::NAN)
            );
        }
        if let Some(index) = report.fallback_index {
            if index > max_index {
                max_index = index;
                max_index_ts = ts;
            }
        }
    }

    Ok(json!({
        "log": path.display().to_string(),
        "records": monitor.source().emitted(),
        "cycles": monitor.cycles(),
        "update_interval_ms": config.update_interval_ms,
        "baseline_kohm": monitor.estimator().baseline_kohm(),
        "baseline_at_ms": baseline_at_ms,
        "final_window_min_kohm": monitor.estimator().window_min_kohm(),
        "max_index": max_index,
        "max_index_ts": max_index_ts,
        "fallback_cycles": fallback_cycles,
        "fused_cycles": fused_cycles,
        "categories": categories,
    }))
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let mut config = match args.config.as_ref() {
        Some(path) => MonitorConfig::load(path)?,
        None => MonitorConfig::default(),
    };
    if let Some(interval) = args.update_interval_ms {
        config.update_interval_ms = interval;
    }

    let mut results = Vec::new();
    if let Some(dir) = args.golden_dir.as_ref() {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            let is_session = name.starts_with("session_")
                && (name.ends_with(".json") || name.ends_with(".json.gz"));
            if !is_session {
                continue;
            }
            match run_once(&path, &config, args.verbose) {
                Ok(res) => results.push(res),
                Err(e) => eprintln!("Failed {}: {}", path.display(), e),
            }
        }
    } else if let Some(log) = args.log.as_ref() {
        results.push(run_once(log, &config, args.verbose)?);
    } else {
        anyhow::bail!("Provide --log or --golden-dir");
    }

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
