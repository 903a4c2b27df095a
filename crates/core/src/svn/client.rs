//! On-disk SVN repository access via the `svnlook` CLI.
//!
//! Everything is synchronous: the conversion pipeline is strictly sequential
//! and each `svnlook` call is a short-lived child process, so there is
//! nothing to overlap. File content is fetched lazily through
//! [`ContentSource`] so a revision's metadata can be mapped and grouped
//! without holding every payload in memory.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};

use super::parser::{
    mime_is_binary, parse_changed, parse_proplist, parse_tree_files, Change, CopyFrom,
};
use crate::errors::SvnError;

/// Revision date used when `svn:date` is missing.
const EPOCH_DATE: &str = "1970-01-01T00:00:00.000000Z";

/// One file (or directory) touched by a revision.
#[derive(Debug, Clone)]
pub struct ChangedFile {
    pub path: String,
    pub is_directory: bool,
    pub change: Change,
    pub is_executable: bool,
    pub is_symlink: bool,
    pub is_binary: bool,
    pub size: u64,
    pub copied_from: Option<CopyFrom>,
}

/// A fully described SVN revision, ready for commit emission.
#[derive(Debug, Clone)]
pub struct Revision {
    pub number: i64,
    pub author: String,
    pub log: String,
    /// ISO-8601 UTC date (`svn:date`), epoch when unset.
    pub date: String,
    pub files: Vec<ChangedFile>,
}

/// Lazy access to file content at a given revision.
///
/// The emitter pulls payloads through this seam, which keeps it testable
/// without a repository on disk.
pub trait ContentSource {
    fn contents(&self, rev: i64, path: &str) -> Result<Vec<u8>, SvnError>;
}

/// An on-disk SVN repository (the thing `svnadmin create` makes).
pub struct Repository {
    path: PathBuf,
}

impl Repository {
    /// Open the repository at `path`.
    ///
    /// Only checks the on-disk shape (`format` file and `db/` directory);
    /// a corrupt repository still fails on the first `svnlook` call.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self, SvnError> {
        let path = path.into();
        if !path.join("format").is_file() || !path.join("db").is_dir() {
            return Err(SvnError::NotARepository(path.display().to_string()));
        }
        debug!(path = %path.display(), "opened svn repository");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The newest revision number in the repository.
    pub fn youngest(&self) -> Result<i64, SvnError> {
        let out = self.svnlook_str("youngest", &[], &[])?;
        out.trim()
            .parse()
            .map_err(|_| SvnError::ParseError(format!("bad youngest revision {:?}", out.trim())))
    }

    /// Read revision `rev`: revision properties plus its changed paths with
    /// per-file metadata. Content stays behind [`ContentSource`].
    pub fn revision(&self, rev: i64) -> Result<Revision, SvnError> {
        let rev_str = rev.to_string();

        let changed = self.svnlook_str("changed", &["--copy-info", "-r", &rev_str], &[])?;
        let changed_paths = parse_changed(&changed)?;

        // Usernames cannot contain whitespace; the log passes through
        // verbatim.
        let author = self
            .revprop(rev, "svn:author")?
            .map(|value| value.trim().to_string())
            .unwrap_or_default();
        let log = self.revprop(rev, "svn:log")?.unwrap_or_default();
        let date = self
            .revprop(rev, "svn:date")?
            .unwrap_or_else(|| EPOCH_DATE.to_string());

        let mut files = Vec::with_capacity(changed_paths.len());
        for entry in changed_paths {
            let expand_copy =
                entry.is_directory && entry.change == Change::Add && entry.copied_from.is_some();

            let file = self.describe(
                rev,
                entry.path,
                entry.is_directory,
                entry.change,
                entry.copied_from,
            )?;
            files.push(file);

            // A copied directory brings its whole subtree along without the
            // children showing up in `svnlook changed`; walk them in.
            if expand_copy {
                let dir_path = files[files.len() - 1].path.clone();
                let tree =
                    self.svnlook_str("tree", &["--full-paths", "-r", &rev_str], &[&dir_path])?;
                for child in parse_tree_files(&tree) {
                    if files.iter().any(|f| f.path == child) {
                        continue;
                    }
                    let child_file = self.describe(rev, child, false, Change::Add, None)?;
                    files.push(child_file);
                }
            }
        }

        Ok(Revision {
            number: rev,
            author,
            log,
            date,
            files,
        })
    }

    /// Fill in the per-node metadata for one changed path.
    fn describe(
        &self,
        rev: i64,
        path: String,
        is_directory: bool,
        change: Change,
        copied_from: Option<CopyFrom>,
    ) -> Result<ChangedFile, SvnError> {
        let mut file = ChangedFile {
            path,
            is_directory,
            change,
            is_executable: false,
            is_symlink: false,
            is_binary: false,
            size: 0,
            copied_from,
        };

        // A deleted path no longer exists in this revision's tree, so there
        // are no properties or size to read.
        if change == Change::Delete {
            return Ok(file);
        }

        let rev_str = rev.to_string();
        let proplist = self.svnlook_str("proplist", &["-r", &rev_str], &[&file.path])?;
        for prop in parse_proplist(&proplist) {
            match prop.as_str() {
                "svn:executable" => file.is_executable = true,
                "svn:special" => file.is_symlink = true,
                "svn:mime-type" => {
                    let mime = self.svnlook_str(
                        "propget",
                        &["-r", &rev_str],
                        &["svn:mime-type", &file.path],
                    )?;
                    file.is_binary = mime_is_binary(&mime);
                }
                "svn:externals" => {
                    warn!(path = %file.path, "svn external is not supported in git, ignoring");
                }
                _ => {}
            }
        }

        if !is_directory {
            let size = self.svnlook_str("filesize", &["-r", &rev_str], &[&file.path])?;
            file.size = size.trim().parse().map_err(|_| {
                SvnError::ParseError(format!("bad filesize {:?} for {}", size.trim(), file.path))
            })?;
        }

        Ok(file)
    }

    /// Read one revision property, `None` when unset.
    fn revprop(&self, rev: i64, name: &str) -> Result<Option<String>, SvnError> {
        let rev_str = rev.to_string();
        // svnlook propget exits non-zero for unset properties; treat any
        // failure as absent (a genuinely bad revision already failed at
        // `changed`).
        match self.svnlook_bytes("propget", &["--revprop", "-r", &rev_str], &[name]) {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(SvnError::LookFailed { .. }) => {
                debug!(rev, name, "revision property unset");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn svnlook_str(
        &self,
        subcommand: &str,
        options: &[&str],
        trailing: &[&str],
    ) -> Result<String, SvnError> {
        let bytes = self.svnlook_bytes(subcommand, options, trailing)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn svnlook_bytes(
        &self,
        subcommand: &str,
        options: &[&str],
        trailing: &[&str],
    ) -> Result<Vec<u8>, SvnError> {
        let output = Command::new("svnlook")
            .arg(subcommand)
            .args(options)
            .arg(&self.path)
            .args(trailing)
            .output()?;

        if !output.status.success() {
            return Err(SvnError::LookFailed {
                subcommand: subcommand.to_string(),
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

impl ContentSource for Repository {
    fn contents(&self, rev: i64, path: &str) -> Result<Vec<u8>, SvnError> {
        let rev_str = rev.to_string();
        self.svnlook_bytes("cat", &["-r", &rev_str], &[path])
    }
}
