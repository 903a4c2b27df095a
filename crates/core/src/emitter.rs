//! The revision-to-commit translator.
//!
//! One SVN revision becomes zero or more fast-import commit blocks: its
//! changed files are mapped through the rule list, grouped by destination
//! `(repository, branch)`, and each group is emitted as one commit routed
//! through the [`Writer`]. LFS-eligible payloads are written to the blob
//! store first and replaced by pointer text on the wire.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::config::Config;
use crate::errors::ConvertError;
use crate::lfs;
use crate::mapper::{map_path, Mapping, PathMatch};
use crate::metadata;
use crate::svn::{Change, ChangedFile, ContentSource, Revision};
use crate::writer::Writer;

/// Git file modes as they appear on the fast-import wire.
const MODE_NORMAL: &str = "100644";
const MODE_EXECUTABLE: &str = "100755";
const MODE_SYMLINK: &str = "120000";

/// Translates revisions into fast-import commit blocks.
///
/// Holds the per-run memory of which `(repository, branch)` pairs have
/// already received a commit, which drives base-commit selection for
/// branches that appear later in the history.
pub struct CommitEmitter<'a> {
    config: &'a Config,
    seen_branches: HashMap<String, HashSet<String>>,
}

impl<'a> CommitEmitter<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            seen_branches: HashMap::new(),
        }
    }

    /// Emit one revision. Returns the number of commit blocks written.
    pub fn emit(
        &mut self,
        revision: &Revision,
        source: &dyn ContentSource,
        writer: &mut Writer,
    ) -> Result<usize, ConvertError> {
        let committer = metadata::author(self.config, &revision.author);
        let message = metadata::commit_message(
            self.config,
            &revision.log,
            &revision.author,
            revision.number,
        )?;
        let time = metadata::commit_time(self.config, &revision.date)?;

        // 1. Map every changed path; collect the survivors.
        let mut mapped: Vec<(&ChangedFile, Mapping)> = Vec::new();
        for file in &revision.files {
            match map_path(self.config, revision.number, &file.path) {
                PathMatch::Mapped(mapping) => mapped.push((file, mapping)),
                PathMatch::Skip => {}
                PathMatch::NoMatch => {
                    if self.config.strict_mode && !file.is_directory {
                        return Err(ConvertError::UnmappedPath {
                            path: file.path.clone(),
                            rev: revision.number,
                        });
                    }
                    if file.is_directory {
                        warn!(
                            path = %file.path,
                            rev = revision.number,
                            "directory maps to no git location, dropping"
                        );
                    } else {
                        debug!(
                            path = %file.path,
                            rev = revision.number,
                            "path maps to no git location, dropping"
                        );
                    }
                }
            }
        }
        if mapped.is_empty() {
            return Ok(0);
        }

        // 2. Group by destination. Ties must be adjacent; a revision that
        //    lands in more than one destination gets no mark because the
        //    revision number would be ambiguous between its commits.
        mapped.sort_by(|a, b| {
            (a.1.repo.as_str(), a.1.branch.as_str()).cmp(&(b.1.repo.as_str(), b.1.branch.as_str()))
        });
        let is_multi_commit = mapped
            .windows(2)
            .any(|pair| pair[0].1.repo != pair[1].1.repo || pair[0].1.branch != pair[1].1.branch);

        // 3. Emit one commit block per group.
        let mut commits = 0;
        let mut start = 0;
        while start < mapped.len() {
            let repo = mapped[start].1.repo.clone();
            let branch = mapped[start].1.branch.clone();
            let end = start
                + mapped[start..]
                    .iter()
                    .take_while(|(_, m)| m.repo == repo && m.branch == branch)
                    .count();

            self.emit_commit(
                revision,
                source,
                writer,
                &repo,
                &branch,
                &mapped[start..end],
                &committer,
                &message,
                &time,
                is_multi_commit,
            )?;

            self.seen_branches
                .entry(repo)
                .or_default()
                .insert(branch);
            commits += 1;
            start = end;
        }

        Ok(commits)
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_commit(
        &mut self,
        revision: &Revision,
        source: &dyn ContentSource,
        writer: &mut Writer,
        repo: &str,
        branch: &str,
        group: &[(&ChangedFile, Mapping)],
        committer: &str,
        message: &str,
        time: &str,
        is_multi_commit: bool,
    ) -> Result<(), ConvertError> {
        let seed = self.branch_origin(repo, branch, writer)?;
        let lfs_root = writer.lfs_root(repo)?;

        let mut buf: Vec<u8> = Vec::new();
        buf.extend_from_slice(format!("commit refs/heads/{branch}\n").as_bytes());
        if !is_multi_commit {
            buf.extend_from_slice(format!("mark :{}\n", revision.number).as_bytes());
        }
        buf.extend_from_slice(format!("original-oid r{}\n", revision.number).as_bytes());
        buf.extend_from_slice(format!("committer {committer} {time}\n").as_bytes());
        buf.extend_from_slice(format!("data {}\n", message.len()).as_bytes());
        buf.extend_from_slice(message.as_bytes());
        buf.push(b'\n');
        buf.extend_from_slice(seed.as_bytes());

        let attributes = lfs::gitattributes_body(&self.config.lfs_patterns);
        if !attributes.is_empty() {
            buf.extend_from_slice(b"M 100644 inline .gitattributes\n");
            buf.extend_from_slice(format!("data {}\n", attributes.len()).as_bytes());
            buf.extend_from_slice(attributes.as_bytes());
            buf.push(b'\n');
        }

        for (file, mapping) in group {
            if file.change == Change::Delete {
                buf.extend_from_slice(format!("D {}\n", mapping.path).as_bytes());
                continue;
            }
            if file.is_directory {
                // Git tracks directories only through their contents.
                continue;
            }

            let content = source.contents(revision.number, &file.path)?;
            let (mode, payload) = if file.is_symlink {
                (MODE_SYMLINK, symlink_target(&content, &file.path))
            } else if mapping.lfs {
                let pointer = lfs::store_blob(&content, &lfs_root)?;
                (file_mode(file), pointer.into_bytes())
            } else {
                (file_mode(file), content)
            };

            buf.extend_from_slice(format!("M {mode} inline {}\n", mapping.path).as_bytes());
            buf.extend_from_slice(format!("data {}\n", payload.len()).as_bytes());
            buf.extend_from_slice(&payload);
            buf.push(b'\n');
        }

        writer.write(repo, &buf)?;
        debug!(
            repo,
            branch,
            rev = revision.number,
            files = group.len(),
            "emitted commit"
        );
        Ok(())
    }

    /// Decide what the first commit to `(repo, branch)` this run grows from.
    ///
    /// In order: a branch already committed to this run continues as-is; a
    /// repository that did not exist before the run starts unborn branches;
    /// a branch present on disk is continued from its current tip; a
    /// configured origin seeds the branch (and clears the inherited tree);
    /// otherwise the history has a branch we cannot place.
    fn branch_origin(
        &self,
        repo: &str,
        branch: &str,
        writer: &mut Writer,
    ) -> Result<String, ConvertError> {
        if self
            .seen_branches
            .get(repo)
            .is_some_and(|branches| branches.contains(branch))
        {
            return Ok(String::new());
        }
        if !writer.repo_existed(repo)? {
            return Ok(String::new());
        }
        if writer.branch_exists_on_disk(repo, branch)? {
            return Ok(format!("from refs/heads/{branch}^0\n"));
        }
        if let Some(origin) = self.config.branch_origin.get(branch) {
            return Ok(format!("from {origin}\ndeleteall\n"));
        }
        Err(ConvertError::UnknownBranchOrigin {
            repo: repo.to_string(),
            branch: branch.to_string(),
        })
    }
}

fn file_mode(file: &ChangedFile) -> &'static str {
    if file.is_executable {
        MODE_EXECUTABLE
    } else {
        MODE_NORMAL
    }
}

/// Extract the target from an `svn:special` symlink representation
/// (`link <target>`), dropping the trailing newline some exports carry.
fn symlink_target(content: &[u8], path: &str) -> Vec<u8> {
    match content.strip_prefix(b"link ") {
        Some(target) => target.strip_suffix(b"\n").unwrap_or(target).to_vec(),
        None => {
            warn!(path, "svn:special node is not a symlink representation, keeping raw content");
            content.to_vec()
        }
    }
}
