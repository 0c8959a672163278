#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! Command-line front end for the live-restore migration tool. The
//! `live-restore` binary mounts a destination home over a read-only
//! source home, runs the namespace-wide background fill, and reports how
//! much data was promoted. Once the pass finishes the destination is
//! self-sufficient and the source can be detached.
//!
//! The crate exposes [`run`] so the thin binary package and tests drive
//! the exact same code path with injected output streams.

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use livefs::{LiveRestoreFs, Options, migrate};
use tracing::error;

/// Usage-error exit code, matching the convention `clap` documents.
const EXIT_USAGE: u8 = 2;
/// Exit code for a failed restore pass.
const EXIT_FAILURE: u8 = 1;

#[derive(Debug, Parser)]
#[command(
    name = "live-restore",
    version,
    about = "Migrate a directory tree from a read-only source into a writable destination"
)]
struct Cli {
    /// Read-only source home to restore from.
    source: PathBuf,
    /// Writable destination home being restored into.
    destination: PathBuf,
    /// Cap on concurrent fill workers.
    #[arg(long, default_value_t = livefs::config::DEFAULT_THREADS_MAX)]
    threads: usize,
    /// Fill any remaining holes whenever a file handle closes.
    #[arg(long)]
    fill_on_close: bool,
    /// Increase log verbosity (-v: debug, -vv: trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Parses `args` and runs the migration, writing human-readable output to
/// the given streams. Returns the process exit code.
pub fn run<I, T>(args: I, stdout: &mut dyn Write, stderr: &mut dyn Write) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version arrive here too; they are successes.
            let rendered = err.render();
            if err.use_stderr() {
                let _ = write!(stderr, "{rendered}");
                return ExitCode::from(EXIT_USAGE);
            }
            let _ = write!(stdout, "{rendered}");
            return ExitCode::SUCCESS;
        }
    };

    init_tracing(cli.verbose);

    match restore(&cli) {
        Ok((files, bytes)) => {
            let _ = writeln!(
                stdout,
                "restored {files} file(s), {bytes} byte(s) promoted from {}",
                cli.source.display()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, "restore failed");
            let _ = writeln!(stderr, "live-restore: {err}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn restore(cli: &Cli) -> livefs::Result<(u64, u64)> {
    let options = Options::new(&cli.source)
        .threads_max(cli.threads)
        .fill_holes_on_close(cli.fill_on_close);
    let fs = LiveRestoreFs::mount(&cli.destination, options)?;
    let summary = migrate(&fs)?;
    fs.terminate()?;
    Ok((summary.files_filled, summary.bytes_copied))
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let default_directive = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    // A second init (tests, repeated runs in-process) keeps the first
    // subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
