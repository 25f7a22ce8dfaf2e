//! Mediasweep CLI - find used and unused image assets in a content store

use clap::{Parser, Subcommand, ValueEnum};
use mediasweep::config::{self, MediasweepConfig};
use mediasweep::scan::{BatchErrorPolicy, ScanReport, ScanStats, Scanner};
use mediasweep::storage::SqliteStore;
use mediasweep::ui::{self, Icons, ProgressManager, Spinner};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "mediasweep")]
#[command(version)]
#[command(about = "Media reachability scanner - classify image assets as used or unused")]
#[command(long_about = r#"
Mediasweep scans a content store for references to image assets:
  • Featured images and gallery lists
  • Custom fields holding a raw asset id
  • Image and gallery blocks in structured content
  • wp-image-<id> class markers and local <img> URLs

Nothing is deleted. The report is meant to be reviewed before cleanup.

Example usage:
  mediasweep scan --database site.db
  mediasweep scan --database site.db --format json > report.json
  mediasweep stats --database site.db
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the store and classify every image asset
    Scan {
        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Content records fetched per batch
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Disable the bare-integer custom field heuristic
        #[arg(long)]
        no_direct_meta: bool,

        /// Skip content batches that fail instead of aborting (report is flagged incomplete)
        #[arg(long)]
        skip_failed_batches: bool,

        /// Abort the scan after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Print the used and unused id lists
        #[arg(short, long)]
        list: bool,

        /// Print scan diagnostics
        #[arg(long)]
        stats: bool,
    },

    /// Show inventory counts of the store
    Stats {
        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Write a config file
    Init {
        /// Path to the database file to record
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

fn resolve_database(flag: Option<PathBuf>, config: &MediasweepConfig) -> PathBuf {
    flag.or_else(|| config.database.as_ref().map(PathBuf::from))
        .unwrap_or_else(config::default_database_path)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let file_config = config::load_config(Some(&config_path))?.unwrap_or_default();

    match cli.command {
        Commands::Scan {
            database,
            batch_size,
            format,
            no_direct_meta,
            skip_failed_batches,
            timeout,
            list,
            stats,
        } => {
            let database = resolve_database(database, &file_config);
            let mut options = file_config.scan_options()?;
            if let Some(size) = batch_size {
                options.batch_size = size;
            }
            if no_direct_meta {
                options.direct_meta_field = false;
            }
            if skip_failed_batches {
                options.batch_errors = BatchErrorPolicy::Skip;
            }
            if let Some(secs) = timeout {
                options.deadline = Some(Duration::from_secs(secs));
            }

            if !database.exists() {
                anyhow::bail!("database not found: {}", database.display());
            }
            let store = SqliteStore::open(&database)?;
            let human = format == OutputFormat::Text;
            let decorated = human && !mediasweep::output::is_quiet();

            if decorated {
                ui::header("Scanning media references");
                ui::info("Database", &database.display().to_string());
                ui::info("Batch size", &options.batch_size.to_string());
                if !options.direct_meta_field {
                    ui::info("Direct meta ids", "disabled");
                }
            }

            let started = Instant::now();
            let scanner = Scanner::new(&store, options);
            let (report, scan_stats) = if decorated {
                let (progress, tx) = ProgressManager::new();
                let result = scanner.with_progress(tx).run_with_stats();
                match result {
                    Ok(outcome) => {
                        progress.finish_with_summary(started.elapsed(), &outcome.0.summary);
                        outcome
                    }
                    Err(e) => {
                        progress.clear();
                        return Err(e.into());
                    }
                }
            } else {
                scanner.run_with_stats()?
            };

            if human {
                print_report(&report, &scan_stats, list, stats);
            } else {
                let json = if stats {
                    serde_json::json!({ "report": report, "stats": scan_stats })
                } else {
                    serde_json::to_value(&report)?
                };
                println!("{}", serde_json::to_string_pretty(&json)?);
                if !report.complete {
                    ui::warn("Some content batches were skipped; unused ids may include used assets");
                }
            }
        }

        Commands::Stats { database } => {
            let database = resolve_database(database, &file_config);
            if !database.exists() {
                anyhow::bail!("database not found: {}", database.display());
            }
            let spinner = Spinner::new("Reading store inventory");
            let store = SqliteStore::open(&database)?;
            let stats = store.stats()?;
            spinner.finish_with_message("Done");

            println!("{} Mediasweep Statistics ({:?})", Icons::STATS, database);
            println!(
                "{}",
                ui::table::stats_table(&[
                    ("Posts", stats.posts.to_string()),
                    ("Attachments", stats.attachments.to_string()),
                    ("Image assets", stats.image_assets.to_string()),
                    ("Scannable content", stats.scannable.to_string()),
                    ("Meta rows", stats.meta_rows.to_string()),
                ])
            );
        }

        Commands::Init { database, force } => {
            let new_config = MediasweepConfig {
                database: Some(
                    database
                        .unwrap_or_else(config::default_database_path)
                        .display()
                        .to_string(),
                ),
                batch_size: Some(mediasweep::scan::DEFAULT_BATCH_SIZE),
                direct_meta_field: Some(true),
                skip_failed_batches: Some(false),
                ..Default::default()
            };
            config::write_config(&config_path, &new_config, force)?;
            ui::success(&format!("Wrote {}", config_path.display()));
        }
    }

    Ok(())
}

fn print_report(report: &ScanReport, stats: &ScanStats, list: bool, show_stats: bool) {
    let summary = &report.summary;
    ui::section("Summary");
    println!(
        "{}",
        ui::table::stats_table(&[
            ("Total images", summary.total_images.to_string()),
            ("Used", summary.used.to_string()),
            ("Unused", summary.unused.to_string()),
        ])
    );

    if list {
        ui::section("Used");
        println!("{}", ui::id_list(&report.used_ids));
        ui::section("Unused");
        println!("{}", ui::id_list(&report.unused_ids));
    }

    if show_stats {
        ui::section("Diagnostics");
        print!("{}", stats);
    }

    if report.complete {
        ui::success("Scan complete");
    } else {
        ui::warn(&format!(
            "Skipped content batches {:?}; unused ids may include used assets",
            stats.skipped_batches
        ));
    }
}
