//! Parsers for `svnlook` output.

use crate::errors::SvnError;

/// How a path changed in a revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Add,
    Modify,
    Delete,
}

/// Copy source recorded by `svnlook changed --copy-info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyFrom {
    pub path: String,
    pub rev: i64,
}

/// One line of `svnlook changed` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedPath {
    pub path: String,
    pub is_directory: bool,
    pub change: Change,
    pub copied_from: Option<CopyFrom>,
}

/// Parse `svnlook changed --copy-info` output.
///
/// Lines look like `U   trunk/a.c`, `_U  trunk/props-only`, `A + trunk/copy`
/// followed by an indented `(from trunk/orig:r3)` line, with directories
/// carrying a trailing `/`. The path always starts at column 4.
pub fn parse_changed(output: &str) -> Result<Vec<ChangedPath>, SvnError> {
    let mut entries: Vec<ChangedPath> = Vec::new();

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let trimmed = line.trim_start();
        if trimmed.starts_with("(from ") {
            let copied_from = parse_copy_info(trimmed)?;
            match entries.last_mut() {
                Some(entry) => entry.copied_from = Some(copied_from),
                None => {
                    return Err(SvnError::ParseError(format!(
                        "copy info with no preceding change: {line:?}"
                    )));
                }
            }
            continue;
        }

        if line.len() < 5 || !line.is_char_boundary(4) {
            return Err(SvnError::ParseError(format!("short change line: {line:?}")));
        }
        let (status, raw_path) = line.split_at(4);

        let change = match status.chars().next() {
            Some('A') => Change::Add,
            Some('D') => Change::Delete,
            // 'U' is a content change, '_' a property-only change.
            Some('U') | Some('_') => Change::Modify,
            other => {
                return Err(SvnError::ParseError(format!(
                    "unknown change flag {other:?} in line {line:?}"
                )));
            }
        };

        let is_directory = raw_path.ends_with('/');
        entries.push(ChangedPath {
            path: raw_path.trim_end_matches('/').to_string(),
            is_directory,
            change,
            copied_from: None,
        });
    }

    Ok(entries)
}

fn parse_copy_info(trimmed: &str) -> Result<CopyFrom, SvnError> {
    let inner = trimmed
        .strip_prefix("(from ")
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| SvnError::ParseError(format!("malformed copy info: {trimmed:?}")))?;
    let (path, rev) = inner
        .rsplit_once(":r")
        .ok_or_else(|| SvnError::ParseError(format!("malformed copy info: {trimmed:?}")))?;
    let rev: i64 = rev
        .parse()
        .map_err(|_| SvnError::ParseError(format!("bad copy revision in {trimmed:?}")))?;
    Ok(CopyFrom {
        path: path.trim_end_matches('/').to_string(),
        rev,
    })
}

/// Parse `svnlook tree --full-paths` output into the file paths below the
/// queried directory. Directory entries (trailing `/`) are dropped.
pub fn parse_tree_files(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.ends_with('/'))
        .map(str::to_string)
        .collect()
}

/// Parse `svnlook proplist` output into property names.
pub fn parse_proplist(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether an `svn:mime-type` value marks the file as binary.
pub fn mime_is_binary(mime: &str) -> bool {
    !mime.trim().starts_with("text/")
}
