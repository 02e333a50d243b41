use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use picnamer::core::batch::{BatchConfig, BatchRenamer};
use picnamer::core::dedup;
use picnamer::core::progress::{ProgressSnapshot, ProgressTracker};
use picnamer::core::scanner;
use picnamer::core::tracker::NameTracker;
use picnamer::core::vision::{VisionClient, VisionConfig, DEFAULT_ENDPOINT, DEFAULT_MODEL};
use picnamer::session::{self, SessionPaths};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "picnamer",
    version,
    about = "Deduplicate downloaded images and rename them with a local vision model"
)]
struct Cli {
    /// Directory for reports, checkpoints and progress files
    #[arg(long, global = true, env = "PICNAMER_SESSION_DIR")]
    session_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Find byte-identical images and delete the older copies
    Dedup {
        /// Directory to scan
        #[arg(long, default_value = ".", value_name = "DIR")]
        target_dir: PathBuf,

        /// Glob patterns for files to leave alone
        #[arg(long = "exclude", value_name = "PATTERN")]
        exclude: Vec<String>,

        /// Only show what would be deleted
        #[arg(long)]
        dry_run: bool,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Analyze images with the vision model and rename them in batches
    Rename {
        /// Directory to process
        #[arg(long, default_value = ".", value_name = "DIR")]
        target_dir: PathBuf,

        /// Re-analyze files that are already named
        #[arg(long, alias = "override")]
        force_rename: bool,

        /// Acknowledge that renaming replaces the original files
        #[arg(long)]
        delete_original: bool,

        /// Images per batch between checkpoints
        #[arg(long, default_value_t = 10)]
        batch_size: usize,

        /// Chat-completions endpoint of the local model server
        #[arg(long, env = "PICNAMER_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
        endpoint: String,

        /// Model name to request
        #[arg(long, env = "PICNAMER_MODEL", default_value = DEFAULT_MODEL)]
        model: String,

        /// Per-attempt timeout for the analysis call, in seconds
        #[arg(long, default_value_t = 60)]
        timeout: u64,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Print the latest progress snapshot
    Status {
        /// Operation the snapshot belongs to
        #[arg(long, default_value = "rename")]
        operation: String,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let session_root = cli
        .session_dir
        .clone()
        .unwrap_or_else(session::default_session_root);
    let paths = SessionPaths::new(&session_root).with_context(|| {
        format!(
            "failed to prepare session directory {}",
            session_root.display()
        )
    })?;

    match cli.command {
        Commands::Dedup {
            target_dir,
            exclude,
            dry_run,
            yes,
        } => run_dedup(&paths, &target_dir, &exclude, dry_run, yes),
        Commands::Rename {
            target_dir,
            force_rename,
            delete_original,
            batch_size,
            endpoint,
            model,
            timeout,
            yes,
        } => run_rename(
            &paths,
            &target_dir,
            RenameOptions {
                force_rename,
                delete_original,
                batch_size,
                endpoint,
                model,
                timeout,
                yes,
            },
        ),
        Commands::Status { operation } => run_status(&paths, &operation),
    }
}

fn run_dedup(
    paths: &SessionPaths,
    target_dir: &PathBuf,
    exclude: &[String],
    dry_run: bool,
    yes: bool,
) -> Result<()> {
    println!(
        "▶ Scanning for duplicate images in: {}",
        target_dir.display()
    );
    let excludes = scanner::compile_excludes(exclude)?;

    if !dry_run && !yes {
        let proceed = Confirm::new()
            .with_prompt(format!(
                "Delete duplicate copies under {}? This cannot be undone",
                target_dir.display()
            ))
            .default(false)
            .interact()?;
        if !proceed {
            println!("Aborted; no files were changed.");
            return Ok(());
        }
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    spinner.set_message("Hashing images…");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let report = dedup::deduplicate(target_dir, &excludes, dry_run)?;
    spinner.finish_and_clear();

    if report.duplicate_details.is_empty() {
        println!(
            "✅ No duplicates found among {} images.",
            report.original_count
        );
    } else {
        let verb = if dry_run {
            "[dry-run] would delete"
        } else {
            "deleted"
        };
        for detail in report.duplicate_details.iter().take(10) {
            println!("   🏆 keep {}  🗑️ {} {}", detail.keep, verb, detail.delete);
        }
        if report.duplicate_details.len() > 10 {
            println!("   … and {} more", report.duplicate_details.len() - 10);
        }
    }

    let report_path = paths.cleanup_report_file();
    fs::write(&report_path, serde_json::to_string_pretty(&report)?)
        .with_context(|| format!("failed to write {}", report_path.display()))?;

    println!();
    println!(
        "📊 {} scanned | {} duplicates | {} remaining | {} deleted",
        report.original_count,
        report.duplicates_found,
        report.remaining_count,
        report.deleted_count
    );
    for failure in &report.delete_failures {
        println!("   ❌ could not delete {}: {}", failure.file, failure.error);
    }
    println!("📝 Report written to {}", report_path.display());
    Ok(())
}

struct RenameOptions {
    force_rename: bool,
    delete_original: bool,
    batch_size: usize,
    endpoint: String,
    model: String,
    timeout: u64,
    yes: bool,
}

fn run_rename(paths: &SessionPaths, target_dir: &PathBuf, options: RenameOptions) -> Result<()> {
    println!("🚀 Image smart-naming: batch analysis and rename");
    println!("   Target: {}", target_dir.display());
    if options.force_rename {
        println!("📌 Mode: force (re-analyzing every file)");
    } else {
        println!("📌 Mode: incremental (already-named files are skipped)");
    }

    if options.delete_original && !options.yes {
        let proceed = Confirm::new()
            .with_prompt("Renaming replaces the original files and cannot be undone. Continue?")
            .default(false)
            .interact()?;
        if !proceed {
            println!("Aborted; no files were changed.");
            return Ok(());
        }
    }

    let client = VisionClient::new(VisionConfig {
        endpoint: options.endpoint,
        model: options.model,
        timeout: Duration::from_secs(options.timeout),
        ..VisionConfig::default()
    })?;
    let tracker = NameTracker::new(session::default_tracker_file());
    let config = BatchConfig {
        batch_size: options.batch_size,
        force: options.force_rename,
        delete_original: options.delete_original,
        ..BatchConfig::default()
    };

    let renamer = BatchRenamer::new(&client, &tracker, paths, config);
    let mut progress = ProgressTracker::new(paths, "rename");
    let report = renamer
        .run(target_dir, &mut progress)
        .context("rename run failed")?;

    println!();
    println!("✨ Run complete");
    println!(
        "   analyzed {} | success {} | failed {}",
        report.analyzed, report.successful_analysis, report.failed_analysis
    );
    println!(
        "   renamed {} | errors {} | skipped {}",
        report.renamed, report.rename_errors, report.skipped_renamed
    );
    println!("📝 Final report: {}", paths.final_report_file().display());
    Ok(())
}

fn run_status(paths: &SessionPaths, operation: &str) -> Result<()> {
    let snapshot_path = paths.progress_file(operation);
    let snapshot = ProgressSnapshot::load(&snapshot_path)
        .with_context(|| format!("no progress snapshot at {}", snapshot_path.display()))?;

    println!("Phase:     {}", snapshot.phase);
    println!(
        "Progress:  {}% ({}/{})",
        snapshot.progress_percent, snapshot.processed_files, snapshot.total_files
    );
    println!(
        "Outcomes:  {} succeeded, {} failed",
        snapshot.successful_files, snapshot.failed_files
    );
    println!("Elapsed:   {:.0}s", snapshot.elapsed_seconds);
    println!("ETA:       {:.0}s", snapshot.eta_seconds);
    println!("Updated:   {}", snapshot.timestamp);
    Ok(())
}
