//! The path-mapping engine.
//!
//! Given a revision number and an SVN path, the ordered rule list decides the
//! destination repository, branch, in-repository path, and LFS eligibility.
//! A rule's regex consumes a prefix of the SVN path; the remainder is
//! appended verbatim after template rewriting. `\0` in a template stands for
//! the whole matched prefix, `\1`..`\9` for the capture groups.

use tracing::trace;

use crate::config::{Config, RuleAction};

/// Where one SVN path lands in git.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub repo: String,
    pub branch: String,
    pub path: String,
    pub lfs: bool,
}

/// The outcome of running a path through the rule list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathMatch {
    /// No rule matched.
    NoMatch,
    /// A skip rule matched; drop the path and consider no further rules.
    Skip,
    /// A mapping rule matched.
    Mapped(Mapping),
}

/// Map an SVN path for revision `rev` through the configured rules.
///
/// The first matching rule wins. Revision bounds are checked before the
/// regex; both bounds are inclusive.
pub fn map_path(config: &Config, rev: i64, svn_path: &str) -> PathMatch {
    for rule in &config.rules {
        if rule.min_revision.is_some_and(|min| rev < min) {
            continue;
        }
        if rule.max_revision.is_some_and(|max| rev > max) {
            continue;
        }

        // Patterns are compiled with a \A anchor, so a match always starts
        // at byte 0 and the tail past the match is the preserved suffix.
        let Some(caps) = rule.svn_path.captures(svn_path) else {
            continue;
        };
        let consumed = caps.get(0).map_or(0, |m| m.end());
        let suffix = &svn_path[consumed..];

        let (repo_tpl, branch_tpl, path_tpl) = match &rule.action {
            RuleAction::Skip => {
                trace!(path = svn_path, pattern = %rule.pattern, "skip rule matched");
                return PathMatch::Skip;
            }
            RuleAction::Map { repo, branch, path } => (repo, branch, path),
        };

        let groups: Vec<&str> = (0..caps.len())
            .map(|i| caps.get(i).map_or("", |m| m.as_str()))
            .collect();

        let repo = rewrite(repo_tpl, &groups);
        let branch = rewrite(branch_tpl, &groups);
        let mut path = rewrite(path_tpl, &groups);
        path.push_str(suffix);
        if path.starts_with('/') {
            path.remove(0);
        }

        let lfs = config.lfs_matches(&path);
        return PathMatch::Mapped(Mapping {
            repo,
            branch,
            path,
            lfs,
        });
    }
    PathMatch::NoMatch
}

// ---------------------------------------------------------------------------
// Rewrite templates
// ---------------------------------------------------------------------------

/// Substitute `\0`..`\9` back-references into `template`.
///
/// `groups[0]` must be the whole matched prefix. Assumes the template passed
/// [`check_rewrite_template`]; an out-of-range reference expands to nothing.
fn rewrite(template: &str, groups: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(d @ '0'..='9') => {
                let idx = d as usize - '0' as usize;
                if let Some(group) = groups.get(idx) {
                    out.push_str(group);
                }
            }
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => {}
        }
    }
    out
}

/// Validate a rewrite template against the number of capture groups in the
/// rule's pattern. Mirrors the checks RE2 performs on rewrite strings.
pub(crate) fn check_rewrite_template(template: &str, group_count: usize) -> Result<(), String> {
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            continue;
        }
        match chars.next() {
            Some(d @ '0'..='9') => {
                let idx = d as usize - '0' as usize;
                if idx > group_count {
                    return Err(format!(
                        "rewrite references group {idx} but the pattern only has \
                         {group_count} capturing group(s)"
                    ));
                }
            }
            Some('\\') => {}
            Some(other) => {
                return Err(format!("invalid rewrite escape '\\{other}'"));
            }
            None => {
                return Err("rewrite ends with a bare backslash".into());
            }
        }
    }
    Ok(())
}
