//! Beatmap Features CLI
//!
//! Ingest scorepoint files, query the feature store and maintain it.

use anyhow::{bail, Context, Result};
use beatmap_features::{
    config::Config,
    core::{summarize, FeatureTableAssembler},
    history::ScorepointHistory,
    ingest::{
        collect_plays, create_shared_log_with_persistence, rebuild_from_history,
        ExtractionWorker, IngestReport, Ingestor,
    },
    store::{FeatureStore, KeyRange, PlayFilter, StoreError, FEATURE_SCHEMA_VERSION},
    VERSION,
};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "beatmap-features")]
#[command(version = VERSION)]
#[command(about = "Difficulty features from aligned gameplay scorepoints", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the per-user config location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Feature store to use instead of the configured one
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract features from scorepoint files and append them to the store
    Ingest {
        /// Scorepoint files (.json array or .jsonl)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Extract on the current thread instead of the worker
        #[arg(long)]
        no_worker: bool,

        /// Do not archive the ingested scorepoints
        #[arg(long)]
        no_history: bool,
    },

    /// Query stored feature records
    Query {
        /// Exact map hash
        #[arg(long)]
        map_hash: Option<String>,

        /// Exact play timestamp
        #[arg(long, conflicts_with_all = ["since", "until"])]
        timestamp: Option<i64>,

        /// Earliest play timestamp (inclusive)
        #[arg(long)]
        since: Option<i64>,

        /// Latest play timestamp (inclusive)
        #[arg(long)]
        until: Option<i64>,

        /// Exact mod mask
        #[arg(long)]
        mods: Option<u32>,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,

        /// Write records to this file instead of stdout
        #[arg(long, short, conflicts_with = "export")]
        output: Option<PathBuf>,

        /// Write records to a timestamped file in the export directory
        #[arg(long)]
        export: bool,

        /// Print per-feature statistics instead of records
        #[arg(long)]
        summary: bool,
    },

    /// Drop the store and recompute it from the scorepoint history
    Rebuild,

    /// Rebuild the store index and compact the file
    Reindex,

    /// Show store and ingest status
    Status {
        /// Zero the persisted ingest statistics after printing them
        #[arg(long)]
        reset_stats: bool,
    },

    /// Show configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        save: bool,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Jsonl,
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;
    if let Some(store) = cli.store {
        config.store_path = store;
    }

    match cli.command {
        Commands::Ingest {
            files,
            no_worker,
            no_history,
        } => cmd_ingest(&config, &files, no_worker, no_history),
        Commands::Query {
            map_hash,
            timestamp,
            since,
            until,
            mods,
            format,
            output,
            export,
            summary,
        } => {
            let mut filter = PlayFilter::all();
            if let Some(hash) = map_hash {
                filter = filter.map_hash(KeyRange::exact(hash));
            }
            filter = filter.timestamp(match timestamp {
                Some(ts) => KeyRange::exact(ts),
                None => KeyRange {
                    min: since,
                    max: until,
                },
            });
            if let Some(mods) = mods {
                filter = filter.mod_mask(KeyRange::exact(mods));
            }

            let destination = if export {
                Some(config.export_path.join(format!(
                    "features_{}.{}",
                    Utc::now().format("%Y%m%d_%H%M%S"),
                    if format == Format::Jsonl { "jsonl" } else { "json" }
                )))
            } else {
                output
            };
            cmd_query(&config, &filter, format, destination.as_deref(), summary)
        }
        Commands::Rebuild => cmd_rebuild(&config),
        Commands::Reindex => cmd_reindex(&config),
        Commands::Status { reset_stats } => cmd_status(&config, reset_stats),
        Commands::Config { save } => cmd_config(&config, cli.config.as_deref(), save),
    }
}

fn assembler(config: &Config) -> FeatureTableAssembler {
    FeatureTableAssembler::new().with_fallback_window(config.default_approach_window_ms)
}

/// Open the configured store, explaining how to recover when it is unusable.
fn open_store(config: &Config) -> Result<FeatureStore> {
    match FeatureStore::open_at(&config.store_path) {
        Ok(store) => Ok(store),
        Err(e) if e.is_recoverable() => {
            bail!("{e}\nRun 'beatmap-features rebuild' to recompute the store from history.")
        }
        Err(e) => Err(e).with_context(|| {
            format!("failed to open feature store {}", config.store_path.display())
        }),
    }
}

fn print_report(report: &IngestReport) {
    println!("Plays appended:   {}", report.plays_appended);
    println!("Records appended: {}", report.records_appended);
    if !report.failed.is_empty() {
        println!("Plays skipped:    {}", report.failed.len());
        for failed in &report.failed {
            println!("  {}: {}", failed.key, failed.reason);
        }
    }
}

fn cmd_ingest(config: &Config, files: &[PathBuf], no_worker: bool, no_history: bool) -> Result<()> {
    if let Err(e) = config.ensure_directories() {
        warn!("Could not create directories: {e}");
    }

    let plays = collect_plays(files).context("failed to read scorepoints")?;
    println!("Read {} play(s) from {} file(s)", plays.len(), files.len());

    let mut store = open_store(config)?;
    let log = create_shared_log_with_persistence(config.stats_path());
    let history = ScorepointHistory::new(&config.history_path);

    let mut ingestor = Ingestor::new(&mut store, log.clone());
    if !no_history {
        ingestor = ingestor.with_history(&history);
    }

    let report = if no_worker {
        ingestor.run(&assembler(config), plays)?
    } else {
        let worker = ExtractionWorker::spawn(assembler(config), config.worker_queue_capacity)?;
        ingestor.run_on_worker(&worker, plays)?
    };

    print_report(&report);
    log.save().context("failed to save ingest statistics")?;
    store.close()?;
    Ok(())
}

fn cmd_query(
    config: &Config,
    filter: &PlayFilter,
    format: Format,
    output: Option<&Path>,
    summary: bool,
) -> Result<()> {
    let mut store = open_store(config)?;
    let table = store.query(filter)?;
    store.close()?;

    let text = if summary {
        serde_json::to_string_pretty(&summarize(&table))?
    } else {
        match format {
            Format::Json => serde_json::to_string_pretty(&table)?,
            Format::Jsonl => {
                let mut lines = String::new();
                for record in &table {
                    lines.push_str(&serde_json::to_string(record)?);
                    lines.push('\n');
                }
                lines
            }
        }
    };

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("Wrote {} record(s) to {}", table.len(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", text.trim_end())?;
        }
    }
    Ok(())
}

fn cmd_rebuild(config: &Config) -> Result<()> {
    let history = ScorepointHistory::new(&config.history_path);
    if !history.exists() {
        bail!(
            "no scorepoint history at {}; nothing to rebuild from",
            history.path().display()
        );
    }

    let log = create_shared_log_with_persistence(config.stats_path());
    let mut store = FeatureStore::new(&config.store_path);
    let report = rebuild_from_history(&mut store, &history, &assembler(config), log.clone())?;

    println!("Rebuilt {}", config.store_path.display());
    print_report(&report);
    log.save().context("failed to save ingest statistics")?;
    store.close()?;
    Ok(())
}

fn cmd_reindex(config: &Config) -> Result<()> {
    let mut store = open_store(config)?;
    store.reindex()?;
    println!("Reindexed {}", config.store_path.display());
    store.close()?;
    Ok(())
}

fn cmd_status(config: &Config, reset_stats: bool) -> Result<()> {
    println!("Beatmap Features Status");
    println!("=======================");
    println!();
    println!("Store: {}", config.store_path.display());

    if !config.store_path.exists() {
        println!("  Not created yet. Run 'beatmap-features ingest <files>' to start.");
    } else {
        match FeatureStore::open_at(&config.store_path) {
            Ok(mut store) => {
                let plays = store.plays()?;
                println!("  State: {}", store.state());
                println!(
                    "  Feature schema: v{} (current v{FEATURE_SCHEMA_VERSION})",
                    store
                        .schema_version()?
                        .map_or_else(|| "?".to_string(), |v| v.to_string())
                );
                println!("  Records: {}", store.entry_count()?);
                println!("  Plays: {}", plays.len());
                for play in plays.iter().take(10) {
                    println!("    {} ({} records)", play.key, play.records);
                }
                if plays.len() > 10 {
                    println!("    ...");
                }
                store.close()?;
            }
            Err(e @ (StoreError::Corruption { .. } | StoreError::StaleSchema { .. })) => {
                println!("  Unusable: {e}");
                println!("  Run 'beatmap-features rebuild' to recompute it from history.");
            }
            Err(e) => return Err(e.into()),
        }
    }
    println!();

    let history = ScorepointHistory::new(&config.history_path);
    println!(
        "History: {} ({})",
        history.path().display(),
        if history.exists() { "present" } else { "absent" }
    );
    println!();

    let log = create_shared_log_with_persistence(config.stats_path());
    println!("{}", log.summary());
    if reset_stats {
        log.reset();
        log.save().context("failed to save ingest statistics")?;
        println!();
        println!("Ingest statistics reset.");
    }
    Ok(())
}

fn cmd_config(config: &Config, path: Option<&Path>, save: bool) -> Result<()> {
    let path = path.map_or_else(Config::config_path, Path::to_path_buf);

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", path);
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);

    if save {
        config
            .save_to(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!();
        println!("Saved to {}", path.display());
    }
    Ok(())
}
