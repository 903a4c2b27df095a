//! Error types for the svn-lfs-export core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Svn(#[from] SvnError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Convert(#[from] ConvertError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// A rule's `svn_path` regular expression does not compile.
    #[error("svn_path regex \"{pattern}\" is not valid: {detail}")]
    BadRegex {
        pattern: String,
        detail: String,
    },

    /// A rewrite template references groups the regex does not capture.
    #[error("cannot rewrite \"{template}\" with the regex \"{pattern}\": {detail}")]
    BadRewrite {
        template: String,
        pattern: String,
        detail: String,
    },

    /// An identity map value does not look like `Name <email>`.
    #[error(
        "git identity for svn user '{user}' should be in the format \
         \"Firstname Lastname <email@domain.com>\""
    )]
    BadIdentity {
        user: String,
    },

    /// The commit message template is malformed or uses an unknown key.
    #[error("invalid commit_message template: {detail}")]
    BadTemplate {
        detail: String,
    },

    /// The configured time zone is not a known IANA zone name.
    #[error("time zone '{0}' is not valid")]
    BadTimezone(String),

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// SVN errors
// ---------------------------------------------------------------------------

/// Errors from reading an on-disk SVN repository via `svnlook`.
#[derive(Debug, Error)]
pub enum SvnError {
    /// The given path is not an on-disk SVN repository.
    #[error("'{0}' is not an on-disk svn repository")]
    NotARepository(String),

    /// An `svnlook` invocation exited with a non-zero status.
    #[error("svnlook {subcommand} failed (exit {exit_code}): {stderr}")]
    LookFailed {
        subcommand: String,
        exit_code: i32,
        stderr: String,
    },

    /// Could not parse `svnlook` output.
    #[error("failed to parse svnlook output: {0}")]
    ParseError(String),

    /// Generic I/O wrapper (including a missing `svnlook` binary).
    #[error("svn I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Writer errors
// ---------------------------------------------------------------------------

/// Errors from the fast-import writers.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Could not spawn `git fast-import` for a target repository.
    #[error("could not spawn git fast-import for repository '{repo}': {source}")]
    SpawnFailed {
        repo: String,
        source: std::io::Error,
    },

    /// A `git2` library error while probing or creating a repository.
    #[error("git error: {0}")]
    Git2Error(#[from] git2::Error),

    /// The stdout writer only serves a single repository per run.
    #[error(
        "cannot write to repository '{requested}' on stdout while already \
         writing '{active}'"
    )]
    RepoMismatch {
        active: String,
        requested: String,
    },

    /// Generic I/O wrapper (pipe writes, LFS blob writes).
    #[error("write I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Conversion errors
// ---------------------------------------------------------------------------

/// Errors from translating revisions into fast-import commits.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Strict mode: a file path matched no mapping rule.
    #[error(
        "the path \"{path}\" for r{rev} does not map to a git location; \
         stopping because strict_mode is enabled"
    )]
    UnmappedPath {
        path: String,
        rev: i64,
    },

    /// A new branch on an existing repository has no known ancestor.
    #[error(
        "branch '{branch}' is new to existing repository '{repo}' and has no \
         origin; add a [branch_origin] entry for it"
    )]
    UnknownBranchOrigin {
        repo: String,
        branch: String,
    },

    /// An SVN revision date could not be parsed.
    #[error("cannot parse svn date \"{value}\": {detail}")]
    BadDate {
        value: String,
        detail: String,
    },

    /// Template rendering failure (unreachable after config validation).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Underlying SVN error while reading file content.
    #[error(transparent)]
    Svn(#[from] SvnError),

    /// Underlying writer error.
    #[error(transparent)]
    Write(#[from] WriteError),

    /// Generic I/O wrapper (LFS blob store).
    #[error("conversion I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
