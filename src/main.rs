mod annotate;
mod asset;
mod bagcheck;
mod batch;
mod checksum;
mod cli;
mod compare;
mod dir_list;
mod inventory;
mod inventory_file;
mod manifest;
mod partition;
mod report;
mod util;
mod verify;

use anyhow::bail;
use cli::{Cli, Command};
use compare::CompareKey;
use inventory::{InventoryOptions, InventoryOutcome, InventoryTarget};
use manifest::Manifest;
use partition::{PartitionMode, PartitionOptions};
use std::fmt as stdfmt;
use std::io::{IsTerminal, stderr};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{Event, Level, Subscriber, debug, error, info, warn};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt as tracing_fmt;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use verify::VerifyMode;

struct PreserveExitCode;

impl PreserveExitCode {
    /// Exit code used when `verify --strict` finds differences.
    fn differences() -> ExitCode {
        ExitCode::from(1)
    }

    /// Exit code used for other errors (I/O errors, invalid arguments, etc.).
    fn any_error() -> ExitCode {
        ExitCode::from(255)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_level);

    // Change working directory if -C was specified
    if let Some(directory) = cli.directory
        && let Err(e) = std::env::set_current_dir(&directory)
    {
        error!(
            "Failed to change directory to {}: {}",
            directory.display(),
            e
        );
        return PreserveExitCode::any_error();
    }

    let result: anyhow::Result<ExitCode> = match cli.command {
        Command::Inventory {
            path,
            batch,
            output,
            existing,
            algorithms,
            label,
            etag_chunk_size,
        } => handle_inventory(
            &path,
            batch,
            inventory_target(output, existing),
            &algorithms,
            label,
            etag_chunk_size,
        ),
        Command::Verify {
            first,
            second,
            checksums,
            relpaths,
            filenames,
            strict,
        } => handle_verify(
            &first,
            &second,
            &verify_modes(checksums, relpaths, filenames),
            strict,
        ),
        Command::Compare {
            first,
            others,
            relpath,
        } => handle_compare(first, others, relpath),
        Command::Bagcheck { inventory, bag } => handle_bagcheck(&inventory, &bag),
        Command::Partition {
            source,
            destination,
            mode,
        } => handle_partition(&source, &destination, &mode),
        Command::Annotate {
            inventory,
            output,
            root,
        } => handle_annotate(&inventory, &output, &root),
        Command::Batch { config } => handle_batch(&config),
    };

    match result {
        Ok(exit_code) => exit_code,
        Err(err) => {
            error!("{err}");
            PreserveExitCode::any_error()
        }
    }
}

fn inventory_target(output: Option<PathBuf>, existing: Option<PathBuf>) -> InventoryTarget {
    match (output, existing) {
        (_, Some(existing)) => InventoryTarget::Existing(existing),
        (Some(output), None) => InventoryTarget::New(output),
        (None, None) => InventoryTarget::Stdout,
    }
}

fn verify_modes(checksums: bool, relpaths: bool, filenames: bool) -> Vec<VerifyMode> {
    [
        (checksums, VerifyMode::Checksums),
        (relpaths, VerifyMode::Relpaths),
        (filenames, VerifyMode::Filenames),
    ]
    .into_iter()
    .filter_map(|(selected, mode)| selected.then_some(mode))
    .collect()
}

fn handle_inventory(
    path: &Path,
    batch: String,
    target: InventoryTarget,
    algorithms: &str,
    label: Option<String>,
    etag_chunk_size: u64,
) -> anyhow::Result<ExitCode> {
    if !path.is_dir() {
        bail!("Not a directory: {}", path.display());
    }
    if let InventoryTarget::Existing(existing) = &target
        && !existing.is_file()
    {
        bail!("Inventory to resume does not exist: {}", existing.display());
    }

    let mut options = InventoryOptions::new(batch);
    options.algorithms = checksum::parse_algorithms(algorithms)?;
    if options.algorithms.is_empty() {
        bail!("No checksum algorithms selected");
    }
    options.label = label;
    options.etag_chunk_size = etag_chunk_size;

    match inventory::build_inventory(path, &target, &options)? {
        InventoryOutcome::AlreadyComplete { recorded } => {
            info!("Inventory already complete: {} files recorded", recorded);
        }
        InventoryOutcome::Complete { recorded, added } => {
            info!(
                "Inventory complete: {} files added, {} already recorded",
                added, recorded
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn handle_verify(
    first: &Path,
    second: &Path,
    modes: &[VerifyMode],
    strict: bool,
) -> anyhow::Result<ExitCode> {
    let a = Manifest::load(first)?;
    info!("Loaded {} files from {} ({})", a.len(), first.display(), a.source.describe());
    let b = Manifest::load(second)?;
    info!("Loaded {} files from {} ({})", b.len(), second.display(), b.source.describe());

    for manifest in [&a, &b] {
        debug!("Relative paths of {} start at {:?}", manifest.origin.display(), manifest.root);
        for (signature, count) in verify::duplicate_signatures(manifest) {
            warn!(
                "{} files in {} share the signature {}",
                count,
                manifest.origin.display(),
                signature
            );
        }
    }

    let clean = if modes.is_empty() {
        let report = verify::reconcile(&a, &b);
        report::print_reconciliation(&report);
        report.is_clean()
    } else {
        let reports: Vec<_> = modes
            .iter()
            .map(|&mode| verify::compare_by_mode(&a, &b, mode))
            .collect();
        report::print_mode_reports(&reports);
        reports.iter().all(|r| r.is_clean())
    };

    if strict && !clean {
        return Ok(PreserveExitCode::differences());
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_compare(first: PathBuf, others: Vec<PathBuf>, relpath: bool) -> anyhow::Result<ExitCode> {
    let key = if relpath {
        CompareKey::Relpath
    } else {
        CompareKey::Filename
    };

    let paths: Vec<&Path> = std::iter::once(first.as_path())
        .chain(others.iter().map(PathBuf::as_path))
        .collect();
    let report = compare::compare_manifests(&paths, key)?;
    report::print_compare(&report);

    Ok(ExitCode::SUCCESS)
}

fn handle_bagcheck(inventory: &Path, bag: &Path) -> anyhow::Result<ExitCode> {
    let report = bagcheck::check_bag(inventory, bag)?;
    report::print_bag_report(&report);
    Ok(ExitCode::SUCCESS)
}

fn handle_partition(source: &Path, destination: &Path, mode: &str) -> anyhow::Result<ExitCode> {
    let mode: PartitionMode = mode.parse()?;
    let options = PartitionOptions::new(mode)?;

    let plan = partition::partition(source, destination, &options)?;
    report::print_partition_plan(&plan);

    if mode == PartitionMode::DryRun {
        info!("DRY RUN - no files were copied or moved");
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_annotate(inventory: &Path, output: &Path, root: &Path) -> anyhow::Result<ExitCode> {
    let summary = annotate::annotate(inventory, root, output)?;
    info!(
        "Annotated {} rows: {} matched, {} unmatched, {} skipped",
        summary.rows, summary.matched, summary.unmatched, summary.skipped
    );
    Ok(ExitCode::SUCCESS)
}

fn handle_batch(config: &Path) -> anyhow::Result<ExitCode> {
    let config = batch::BatchConfig::load(config)?;
    let mut statuses = batch::load_or_survey(&config)?;

    let completed = batch::run_batch(&config, &mut statuses)?;
    report::print_batch_table(&statuses);
    info!("Inventoried {} directories", completed);

    Ok(ExitCode::SUCCESS)
}

fn init_tracing(verbose: u8, log_level: Option<Level>) {
    let stderr_is_terminal = stderr().is_terminal();
    let formatter = EmojiFormatter { stderr_is_terminal };

    let flag_level = match (log_level, verbose) {
        (Some(level), _) => Some(level.as_str()),
        (None, 0) => None,
        (None, 1) => Some("info"),
        (None, _) => Some("debug"),
    };

    let filter = match flag_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    let fmt_layer = tracing_fmt::layer()
        .event_format(formatter)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

struct EmojiFormatter {
    stderr_is_terminal: bool,
}

impl<S, N> FormatEvent<S, N> for EmojiFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        if self.stderr_is_terminal {
            match *event.metadata().level() {
                Level::DEBUG => write!(writer, "ðŸ” ")?,
                Level::INFO => write!(writer, "â„¹ï¸ ")?,
                Level::WARN => write!(writer, "âš ï¸  ")?,
                Level::ERROR => write!(writer, "âŒï¸ ")?,
                _ => {}
            }
        } else {
            match *event.metadata().level() {
                Level::DEBUG => writer.write_str("DEBUG: ")?,
                Level::INFO => writer.write_str("INFO: ")?,
                Level::WARN => writer.write_str("WARN: ")?,
                Level::ERROR => writer.write_str("ERROR: ")?,
                _ => {}
            }
        }

        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
