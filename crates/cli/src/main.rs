//! svn-lfs-export command-line tool.
//!
//! Converts an on-disk SVN repository into git repositories under the
//! current working directory, per the mapping rules in the configuration
//! file. `--example-config` prints a commented sample configuration.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use svn_lfs_export_core::config::{Config, EXAMPLE_CONFIG};
use svn_lfs_export_core::engine::{self, RunStats};
use svn_lfs_export_core::writer::{MultiRepoWriter, Writer};

/// Convert SVN repository history into git repositories via fast-import.
#[derive(Parser, Debug)]
#[command(
    name = "svn-lfs-export",
    version,
    about = "Convert an on-disk SVN repository into git repositories, \
             optionally routing large files through Git LFS"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Revision range to convert: FIRST, FIRST:LAST, or FIRST:HEAD.
    #[arg(short = 'r', long = "revision")]
    revision: Option<String>,

    /// Print a commented sample configuration and exit.
    #[arg(long)]
    example_config: bool,
}

/// Parse `FIRST[:LAST|:HEAD]`. A bare `FIRST` converts that one revision;
/// `HEAD` (returned as `None`) means the youngest revision at run time.
fn parse_revision_range(arg: &str) -> Result<(i64, Option<i64>)> {
    let (first, last) = match arg.split_once(':') {
        None => (arg, None),
        Some((first, "HEAD")) => (first, None),
        Some((first, last)) => {
            let last: i64 = last
                .parse()
                .with_context(|| format!("invalid last revision '{last}'"))?;
            (first, Some(last))
        }
    };

    let first: i64 = first
        .parse()
        .with_context(|| format!("invalid first revision '{first}'"))?;
    if first < 1 {
        bail!("revisions start at 1, got {first}");
    }

    match (arg.contains(':'), last) {
        // Bare FIRST converts exactly one revision.
        (false, _) => Ok((first, Some(first))),
        (true, Some(last)) if last < first => {
            bail!("revision range {first}:{last} is backwards");
        }
        (true, last) => Ok((first, last)),
    }
}

fn run(cli: &Cli) -> Result<RunStats> {
    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    let (first, last) = match cli.revision.as_deref() {
        Some(arg) => parse_revision_range(arg)?,
        None => (1, None),
    };

    let output_root = std::env::current_dir().context("cannot determine working directory")?;
    let mut writer = Writer::MultiRepo(MultiRepoWriter::new(output_root));

    engine::run(&config, &mut writer, first, last).context("conversion failed")
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.example_config {
        print!("{EXAMPLE_CONFIG}");
        return ExitCode::SUCCESS;
    }

    match run(&cli) {
        Ok(stats) => {
            tracing::info!(
                revisions = stats.revisions,
                commits = stats.commits,
                "done"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_revision() {
        assert_eq!(parse_revision_range("12").unwrap(), (12, Some(12)));
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_revision_range("1:40").unwrap(), (1, Some(40)));
        assert_eq!(parse_revision_range("7:7").unwrap(), (7, Some(7)));
    }

    #[test]
    fn test_parse_head_range() {
        assert_eq!(parse_revision_range("12:HEAD").unwrap(), (12, None));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_revision_range("x").is_err());
        assert!(parse_revision_range("1:x").is_err());
        assert!(parse_revision_range("0").is_err());
        assert!(parse_revision_range("5:3").is_err());
    }
}
