//! The top-level conversion loop.

use tracing::{info, warn};

use crate::config::Config;
use crate::emitter::CommitEmitter;
use crate::errors::CoreError;
use crate::svn::Repository;
use crate::writer::Writer;

/// What one conversion run produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    /// Revisions read from the SVN repository.
    pub revisions: u64,
    /// Commit blocks delivered to fast-import streams.
    pub commits: u64,
}

/// Convert revisions `first..=last` of the configured SVN repository.
///
/// `last` defaults to the youngest revision and is clamped to it. Revisions
/// are processed in ascending order and the first error aborts the run;
/// commits already delivered to fast-import are not undone.
pub fn run(
    config: &Config,
    writer: &mut Writer,
    first: i64,
    last: Option<i64>,
) -> Result<RunStats, CoreError> {
    let repo = Repository::open(config.svn_repository.clone())?;
    let youngest = repo.youngest()?;

    let first = first.max(1);
    let last = last.unwrap_or(youngest).min(youngest);
    if last < first {
        warn!(first, last, youngest, "empty revision range, nothing to convert");
        return Ok(RunStats {
            revisions: 0,
            commits: 0,
        });
    }

    info!(first, last, youngest, "starting conversion");

    let mut emitter = CommitEmitter::new(config);
    let mut stats = RunStats {
        revisions: 0,
        commits: 0,
    };

    for rev_num in first..=last {
        let revision = repo.revision(rev_num)?;
        let commits = emitter.emit(&revision, &repo, writer)? as u64;
        stats.revisions += 1;
        stats.commits += commits;
        info!(rev = rev_num, commits, "converted revision");
    }

    info!(
        revisions = stats.revisions,
        commits = stats.commits,
        "conversion finished"
    );
    Ok(stats)
}
