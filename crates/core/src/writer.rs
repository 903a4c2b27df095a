//! Fast-import writers.
//!
//! The emitter only needs four capabilities from its output side: write
//! bytes for a repository, locate that repository's LFS root, and answer
//! whether the repository / a branch existed on disk before the run began.
//! [`Writer`] is a tagged enum over the three concrete implementations:
//!
//! - [`MultiRepoWriter`] — the real one; lazily creates target repositories
//!   and owns one `git fast-import` child per repository.
//! - [`StdoutWriter`] — dumps a single repository's stream to stdout for
//!   piping or inspection.
//! - [`DebugWriter`] — captures streams in memory for tests.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use git2::{BranchType, ErrorCode};
use tracing::{debug, info, warn};

use crate::errors::WriteError;

/// Marks file kept inside each target repository's git directory, so a
/// re-run can resolve previously imported commits.
const MARKS_FILE: &str = "./.git/svn_lfs_export_marks";

/// Tagged writer over the concrete implementations.
pub enum Writer {
    MultiRepo(MultiRepoWriter),
    Stdout(StdoutWriter),
    Debug(DebugWriter),
}

impl Writer {
    /// Append `bytes` to the fast-import stream of `repo`.
    pub fn write(&mut self, repo: &str, bytes: &[u8]) -> Result<(), WriteError> {
        match self {
            Writer::MultiRepo(w) => w.write(repo, bytes),
            Writer::Stdout(w) => w.write(repo, bytes),
            Writer::Debug(w) => w.write(repo, bytes),
        }
    }

    /// The directory under which `repo`'s LFS blobs are stored.
    pub fn lfs_root(&mut self, repo: &str) -> Result<PathBuf, WriteError> {
        match self {
            Writer::MultiRepo(w) => w.lfs_root(repo),
            Writer::Stdout(w) => w.lfs_root(),
            Writer::Debug(w) => Ok(w.lfs_root()),
        }
    }

    /// Whether `branch` already existed in `repo` when the run began.
    pub fn branch_exists_on_disk(&mut self, repo: &str, branch: &str) -> Result<bool, WriteError> {
        match self {
            Writer::MultiRepo(w) => w.branch_exists_on_disk(repo, branch),
            Writer::Stdout(_) | Writer::Debug(_) => Ok(false),
        }
    }

    /// Whether `repo` already existed on disk when the run began.
    pub fn repo_existed(&mut self, repo: &str) -> Result<bool, WriteError> {
        match self {
            Writer::MultiRepo(w) => w.repo_existed(repo),
            Writer::Stdout(_) | Writer::Debug(_) => Ok(false),
        }
    }
}

// ---------------------------------------------------------------------------
// Multi-repository writer
// ---------------------------------------------------------------------------

struct RepoState {
    /// Whether a git repository was already present when first probed.
    existed_before: bool,
    /// Local branch names enumerated at probe time.
    branches: HashSet<String>,
    /// Set once a fresh repository has been initialised this run.
    initialized: bool,
    child: Option<Child>,
}

/// Owns one `git fast-import` child per destination repository.
///
/// Repositories live directly under `output_root` and are created lazily:
/// probing caches the pre-run state (existence, branch list), the first
/// write initialises a missing repository and spawns its fast-import
/// process. Dropping the writer closes every pipe and waits for the
/// children to finish.
pub struct MultiRepoWriter {
    output_root: PathBuf,
    repos: HashMap<String, RepoState>,
}

impl MultiRepoWriter {
    pub fn new(output_root: PathBuf) -> Self {
        Self {
            output_root,
            repos: HashMap::new(),
        }
    }

    /// Probe (once) and return the cached state for `repo`.
    fn state(&mut self, repo: &str) -> Result<&mut RepoState, WriteError> {
        if !self.repos.contains_key(repo) {
            let path = self.output_root.join(repo);
            let state = match git2::Repository::open(&path) {
                Ok(git_repo) => {
                    let mut branches = HashSet::new();
                    for entry in git_repo.branches(Some(BranchType::Local))? {
                        let (branch, _) = entry?;
                        if let Some(name) = branch.name()? {
                            branches.insert(name.to_string());
                        }
                    }
                    debug!(repo, branches = branches.len(), "found existing git repository");
                    RepoState {
                        existed_before: true,
                        branches,
                        initialized: true,
                        child: None,
                    }
                }
                Err(e) if e.code() == ErrorCode::NotFound => RepoState {
                    existed_before: false,
                    branches: HashSet::new(),
                    initialized: false,
                    child: None,
                },
                Err(e) => return Err(WriteError::Git2Error(e)),
            };
            self.repos.insert(repo.to_string(), state);
        }

        // The entry was just inserted if it was missing.
        self.repos
            .get_mut(repo)
            .ok_or_else(|| WriteError::IoError(std::io::Error::other("repo state vanished")))
    }

    /// Make sure the repository exists on disk, creating it when fresh.
    fn ensure_repo(&mut self, repo: &str) -> Result<PathBuf, WriteError> {
        let path = self.output_root.join(repo);
        let state = self.state(repo)?;
        if !state.initialized {
            git2::Repository::init(&path)?;
            state.initialized = true;
            info!(repo, path = %path.display(), "initialised new git repository");
        }
        Ok(path)
    }

    pub fn write(&mut self, repo: &str, bytes: &[u8]) -> Result<(), WriteError> {
        let path = self.ensure_repo(repo)?;
        let repo_name = repo.to_string();
        let state = self.state(repo)?;

        if state.child.is_none() {
            let spawned = Command::new("git")
                .arg("fast-import")
                .arg(format!("--export-marks={MARKS_FILE}"))
                .arg(format!("--import-marks-if-exists={MARKS_FILE}"))
                .current_dir(&path)
                .stdin(Stdio::piped())
                .spawn()
                .map_err(|source| WriteError::SpawnFailed {
                    repo: repo_name.clone(),
                    source,
                })?;
            info!(repo = %repo_name, "spawned git fast-import");
            state.child = Some(spawned);
        }

        let stdin = state
            .child
            .as_mut()
            .and_then(|child| child.stdin.as_mut())
            .ok_or_else(|| {
                WriteError::IoError(std::io::Error::other("fast-import stdin already closed"))
            })?;
        stdin.write_all(bytes)?;
        Ok(())
    }

    pub fn lfs_root(&mut self, repo: &str) -> Result<PathBuf, WriteError> {
        // LFS blobs can precede the first stream write, so the repository
        // has to exist before anything lands under its git directory.
        let path = self.ensure_repo(repo)?;
        Ok(path.join(".git"))
    }

    pub fn branch_exists_on_disk(&mut self, repo: &str, branch: &str) -> Result<bool, WriteError> {
        Ok(self.state(repo)?.branches.contains(branch))
    }

    pub fn repo_existed(&mut self, repo: &str) -> Result<bool, WriteError> {
        Ok(self.state(repo)?.existed_before)
    }
}

impl Drop for MultiRepoWriter {
    fn drop(&mut self) {
        for (repo, state) in &mut self.repos {
            if let Some(mut child) = state.child.take() {
                // Closing stdin lets fast-import finish its checkpoint.
                drop(child.stdin.take());
                match child.wait() {
                    Ok(status) if status.success() => {
                        debug!(repo, "git fast-import finished");
                    }
                    Ok(status) => {
                        warn!(repo, %status, "git fast-import exited abnormally");
                    }
                    Err(e) => {
                        warn!(repo, error = %e, "failed to wait for git fast-import");
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Stdout writer
// ---------------------------------------------------------------------------

/// Writes a single repository's stream to stdout.
#[derive(Default)]
pub struct StdoutWriter {
    active_repo: Option<String>,
}

impl StdoutWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, repo: &str, bytes: &[u8]) -> Result<(), WriteError> {
        match &self.active_repo {
            None => self.active_repo = Some(repo.to_string()),
            Some(active) if active != repo => {
                return Err(WriteError::RepoMismatch {
                    active: active.clone(),
                    requested: repo.to_string(),
                });
            }
            Some(_) => {}
        }
        std::io::stdout().write_all(bytes)?;
        Ok(())
    }

    pub fn lfs_root(&self) -> Result<PathBuf, WriteError> {
        Ok(std::env::current_dir()?)
    }
}

// ---------------------------------------------------------------------------
// Debug writer
// ---------------------------------------------------------------------------

/// Captures every repository's stream in memory. Test-oriented.
pub struct DebugWriter {
    outputs: HashMap<String, Vec<u8>>,
    lfs_root: PathBuf,
}

impl DebugWriter {
    pub fn new(lfs_root: PathBuf) -> Self {
        Self {
            outputs: HashMap::new(),
            lfs_root,
        }
    }

    pub fn write(&mut self, repo: &str, bytes: &[u8]) -> Result<(), WriteError> {
        self.outputs
            .entry(repo.to_string())
            .or_default()
            .extend_from_slice(bytes);
        Ok(())
    }

    pub fn lfs_root(&self) -> PathBuf {
        self.lfs_root.clone()
    }

    /// The captured stream for `repo`, if anything was written.
    pub fn output(&self, repo: &str) -> Option<&[u8]> {
        self.outputs.get(repo).map(Vec::as_slice)
    }

    /// Repositories that received at least one write.
    pub fn repos(&self) -> Vec<&str> {
        let mut repos: Vec<&str> = self.outputs.keys().map(String::as_str).collect();
        repos.sort_unstable();
        repos
    }
}
