//! BarVault CLI — maintain the on-disk daily bar archive.
//!
//! Commands:
//! - `run` — resolve the universe, update every series, rebuild windows and sector mirrors
//! - `status` — report file counts per asset root and window, registry totals, last run

use anyhow::{bail, Context, Result};
use barvault_core::classify::{EdgarClient, SectorClassifier};
use barvault_core::data::{FileListingSource, HttpListingSource, ListingSource, YahooProvider};
use barvault_core::domain::WindowPolicy;
use barvault_runner::{
    run_pipeline, Layout, PipelineConfig, PipelineError, Registry, RunSummary, Sources,
    StdoutProgress,
};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_CONFIG: &str = "barvault.toml";

#[derive(Parser)]
#[command(
    name = "barvault",
    version,
    about = "BarVault — incremental daily price archive for the US-listed universe"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonArgs {
    /// Path to a TOML config file. Defaults to ./barvault.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory (overrides `output_dir`).
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline once.
    Run {
        #[command(flatten)]
        common: CommonArgs,

        /// Worker threads (overrides `concurrency`).
        #[arg(long)]
        concurrency: Option<usize>,

        /// Read the listing feed from a file instead of the network.
        #[arg(long)]
        universe_file: Option<PathBuf>,

        /// Window mirrored into SECTORS/: 1yr, 5yr, 10yr or alltime.
        #[arg(long)]
        sector_window: Option<WindowPolicy>,

        /// Skip sector lookups; keep previous assignments.
        #[arg(long, default_value_t = false)]
        no_classify: bool,

        /// Write Parquet companions next to every CSV.
        #[arg(long, default_value_t = false)]
        parquet: bool,

        /// Stop starting new symbols after this many minutes.
        #[arg(long)]
        max_minutes: Option<u64>,
    },
    /// Report what is on disk.
    Status {
        #[command(flatten)]
        common: CommonArgs,

        /// Print JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            common,
            concurrency,
            universe_file,
            sector_window,
            no_classify,
            parquet,
            max_minutes,
        } => {
            let mut config = load_config(&common)?;
            if let Some(n) = concurrency {
                config.concurrency = n;
            }
            if let Some(path) = universe_file {
                config.universe.file = Some(path);
            }
            if let Some(window) = sector_window {
                config.sector_window = window;
            }
            if no_classify {
                config.classify.enabled = false;
            }
            if parquet {
                config.parquet_mirror = true;
            }
            config.validate()?;
            config.logging.init();
            run_cmd(&config, max_minutes)
        }
        Commands::Status { common, json } => {
            let config = load_config(&common)?;
            config.logging.init();
            status_cmd(&config, json)
        }
    }
}

fn load_config(common: &CommonArgs) -> Result<PipelineConfig> {
    let mut config = match &common.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => {
            PipelineConfig::from_file(Path::new(DEFAULT_CONFIG))?
        }
        None => PipelineConfig::default(),
    };
    if let Some(dir) = &common.output_dir {
        config.output_dir = dir.clone();
    }
    Ok(config)
}

fn run_cmd(config: &PipelineConfig, max_minutes: Option<u64>) -> Result<()> {
    let timeout = config.fetch.timeout();

    let listing: Box<dyn ListingSource> = match &config.universe.file {
        Some(path) => Box::new(FileListingSource::new(path)),
        None => Box::new(HttpListingSource::new(&config.universe.url, timeout)?),
    };

    let circuit_breaker = Arc::new(config.fetch.circuit_breaker());
    let prices = YahooProvider::new(circuit_breaker, timeout)?;

    let classifier = if config.classify.enabled {
        let edgar = EdgarClient::new(&config.classify.user_agent, timeout)?;
        SectorClassifier::new(Arc::new(edgar))
    } else {
        SectorClassifier::disabled()
    };

    let cancel = Arc::new(AtomicBool::new(false));
    if let Some(minutes) = max_minutes {
        let flag = Arc::clone(&cancel);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs(minutes * 60));
            tracing::warn!(minutes, "time limit reached, no new symbols will start");
            flag.store(true, Ordering::Relaxed);
        });
    }

    let sources = Sources {
        listing: listing.as_ref(),
        prices: &prices,
        classifier: &classifier,
    };

    let summary = match run_pipeline(config, &sources, &cancel, &StdoutProgress) {
        Ok(summary) => summary,
        Err(PipelineError::UniverseUnavailable(e)) => {
            bail!("aborting run, nothing was written: {e}")
        }
        Err(e) => return Err(e.into()),
    };

    let layout = Layout::new(&config.output_dir, config.parquet_mirror);
    for failure in summary.failures.iter().take(20) {
        eprintln!("  {}: {}", failure.symbol, failure.reason);
    }
    if summary.failures.len() > 20 {
        eprintln!("  ... and {} more", summary.failures.len() - 20);
    }
    println!("Report saved to: {}", layout.report_path().display());
    Ok(())
}

fn status_cmd(config: &PipelineConfig, json: bool) -> Result<()> {
    let layout = Layout::new(&config.output_dir, config.parquet_mirror);
    if !layout.root().exists() {
        println!("Output directory does not exist: {}", layout.root().display());
        return Ok(());
    }

    let counts = layout.file_counts();
    let registry = Registry::load(&layout.registry_path())
        .with_context(|| format!("reading {}", layout.registry_path().display()))?;
    let totals = registry.totals();
    let last_run = RunSummary::load(&layout.report_path());

    if json {
        let report = serde_json::json!({
            "output_dir": layout.root(),
            "files": counts,
            "registry": totals,
            "last_run": last_run,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Output: {}", layout.root().display());
    println!();
    println!("{:<16} {:>8}", "Window", "Files");
    println!("{}", "-".repeat(25));
    for (window, n) in &counts.windows {
        println!("{window:<16} {n:>8}");
    }

    println!();
    println!("{:<24} {:>8}", "Sector", "Files");
    println!("{}", "-".repeat(33));
    for (sector, n) in &counts.sectors {
        println!("{sector:<24} {n:>8}");
    }

    println!();
    println!(
        "Registry: {} instruments, {} active, {} delisted",
        totals.instruments, totals.active, totals.delisted
    );

    match last_run {
        Some(run) => {
            let age = run
                .finished_at
                .map(|t| chrono::Utc::now() - t)
                .map(|d| format!("{}h{:02}m ago", d.num_hours(), d.num_minutes() % 60))
                .unwrap_or_else(|| "unfinished".into());
            println!(
                "Last run: {} ({age}): {} updated, {} unchanged, {} failed, \
                 {} delisted, {} cancelled",
                run.started_at.format("%Y-%m-%d %H:%M UTC"),
                run.updated,
                run.unchanged,
                run.failed,
                run.delisted,
                run.cancelled
            );
        }
        None => println!("Last run: none recorded"),
    }
    Ok(())
}
