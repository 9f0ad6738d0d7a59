//! gallery-index - rebuildable index over an image directory tree
//!
//! Keeps three kinds of derived data for a gallery in one SQLite file:
//! cached thumbnails (valid while the source mtime is unchanged), per-image
//! last-view timestamps for least-recently-viewed slideshows, and a ledger
//! of images moved into a recoverable quarantine directory. A reconciler
//! keeps all three consistent with a filesystem that changes underneath,
//! and the whole index can be deleted and rebuilt at any time.

pub mod actions;
pub mod cli;
pub mod config;
pub mod error;
pub mod gallery;
pub mod index;
pub mod logging;
pub mod output;
pub mod reconcile;
pub mod scanner;
pub mod signal;
pub mod thumbnail;

use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;

use anyhow::{bail, Context};
use bytesize::ByteSize;

use crate::cli::{Cli, Commands, ThumbnailArgs};
use crate::config::Config;
use crate::error::ExitCode;
use crate::gallery::Gallery;
use crate::output::{LedgerOutput, StatsOutput};

/// Run the CLI once and report the exit code.
///
/// Errors are returned to `main`, which maps them to [`ExitCode`] values.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => Config::load_from_path(path.clone()),
        None => Config::load(),
    };
    config.merge_cli(&cli);
    config.validate().context("invalid configuration")?;
    log::debug!("Configuration: {:?}", config);

    let gallery = Gallery::open(config).context("failed to open gallery")?;
    let quiet = cli.quiet;
    let mut stdout = io::stdout().lock();

    match cli.command {
        Commands::Reconcile => {
            let report = gallery.reconcile()?;
            if !quiet {
                writeln!(
                    stdout,
                    "{} image(s), {} quarantined; recovered {} ledger record(s), \
                     swept {} orphaned row(s)",
                    report.tree_images,
                    report.quarantined_images,
                    report.resynced,
                    report.swept.total()
                )?;
            }
        }
        Commands::Watch(args) => {
            return watch(&gallery, args.interval);
        }
        Commands::Thumbnail(args) => {
            thumbnail(&gallery, &args, &mut stdout, quiet)?;
        }
        Commands::Warm => {
            let report = gallery.warm();
            if !quiet {
                writeln!(
                    stdout,
                    "{} generated, {} already cached, {} failed",
                    report.generated, report.hits, report.failed
                )?;
            }
            if report.failed > 0 {
                return Ok(ExitCode::DecodeFailed);
            }
        }
        Commands::Next(args) => {
            let next = if args.random {
                gallery.next_random()?
            } else {
                gallery.next_in_slideshow()?
            };
            let Some(path) = next else {
                eprintln!("No images found in {}", gallery.root().display());
                return Ok(ExitCode::NotFound);
            };
            writeln!(stdout, "{}", path.display())?;
        }
        Commands::View(args) => {
            let path = gallery.view(&args.path)?;
            if !quiet {
                writeln!(stdout, "Viewed {}", path.display())?;
            }
        }
        Commands::Quarantine(args) => {
            let moved = gallery.quarantine(&args.path)?;
            writeln!(stdout, "{}", moved.display())?;
        }
        Commands::Restore(args) => {
            let restored = gallery.restore(&args.path)?;
            writeln!(stdout, "{}", restored.display())?;
        }
        Commands::Purge(args) => {
            let pending = gallery.ledger()?.len();
            if pending == 0 {
                if !quiet {
                    writeln!(stdout, "Quarantine is empty.")?;
                }
                return Ok(ExitCode::Success);
            }
            let prompt = format!("Permanently delete {pending} quarantined file(s)?");
            if !args.yes && !confirm(&prompt)? {
                writeln!(stdout, "Aborted.")?;
                return Ok(ExitCode::Success);
            }
            let purged = gallery.purge_all()?;
            if !quiet {
                writeln!(stdout, "Purged {purged} file(s)")?;
            }
        }
        Commands::Ledger(args) => {
            LedgerOutput::new(&gallery.ledger()?).write_to(&mut stdout, args.json)?;
        }
        Commands::Stats(args) => {
            StatsOutput::new(gallery.root(), gallery.index().path(), gallery.stats()?)
                .write_to(&mut stdout, args.json)?;
        }
    }

    Ok(ExitCode::Success)
}

/// Reconcile periodically until Ctrl+C.
fn watch(gallery: &Gallery, interval: Option<u64>) -> anyhow::Result<ExitCode> {
    let interval = interval.map_or_else(
        || gallery.config().reconcile_interval(),
        std::time::Duration::from_secs,
    );
    let handler = signal::install_handler()?;
    log::info!(
        "Watching {} (every {:?}, Ctrl+C to stop)",
        gallery.root().display(),
        interval
    );

    let worker = gallery
        .reconciler()
        .spawn_periodic(interval, handler.get_flag())
        .context("failed to start reconciler thread")?;
    if worker.join().is_err() {
        bail!("reconciler thread panicked");
    }
    if handler.is_shutdown_requested() {
        Ok(ExitCode::Interrupted)
    } else {
        Ok(ExitCode::Success)
    }
}

fn thumbnail<W: Write>(
    gallery: &Gallery,
    args: &ThumbnailArgs,
    stdout: &mut W,
    quiet: bool,
) -> anyhow::Result<()> {
    let bytes = match args.size {
        Some(size) => gallery.thumbnail_sized(&args.path, size)?,
        None => gallery.thumbnail(&args.path)?,
    };
    match args.output.as_deref() {
        Some(out) if out == Path::new("-") => stdout.write_all(&bytes)?,
        Some(out) => {
            fs::write(out, &bytes).with_context(|| format!("failed to write {}", out.display()))?;
            if !quiet {
                writeln!(stdout, "Wrote {} to {}", ByteSize::b(bytes.len() as u64), out.display())?;
            }
        }
        None => writeln!(
            stdout,
            "{}: {} {} thumbnail",
            args.path.display(),
            ByteSize::b(bytes.len() as u64),
            gallery.config().thumbnail.format.mime_type()
        )?,
    }
    Ok(())
}

/// Ask a yes/no question on the terminal. Non-interactive input never confirms.
fn confirm(prompt: &str) -> anyhow::Result<bool> {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        bail!("refusing to purge without --yes in non-interactive mode");
    }
    eprint!("{prompt} [y/N] ");
    io::stderr().flush()?;

    let mut answer = String::new();
    stdin.lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
