//! TOML-based configuration for svn-lfs-export.
//!
//! Loading happens in two stages: the raw file is deserialized with `serde`
//! into [`ConfigFile`], then compiled into the validated [`Config`] that the
//! rest of the core consumes. Compilation owns everything expensive or
//! fallible: rule regexes, rewrite-template checks, the LFS pathspec, the
//! identity format check, the commit-message template check, and the time
//! zone lookup. After [`Config::load`] succeeds nothing downstream needs to
//! re-validate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::errors::ConfigError;
use crate::mapper::check_rewrite_template;
use crate::metadata::render_template;

/// Default commit message appended below each converted SVN log.
pub const DEFAULT_COMMIT_MESSAGE: &str =
    "{log}\n\nThis commit was converted from revision r{rev} by svn-lfs-export.";

const DEFAULT_TIME_ZONE: &str = "Etc/UTC";

/// Accepted shape of an identity map value: optional name words followed by
/// exactly one `<email>` part, no angle brackets or newlines elsewhere.
static IDENTITY_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^\n<>]+ )*<[^<>\n]+>$").expect("identity format regex is valid")
});

// ---------------------------------------------------------------------------
// Raw file representation
// ---------------------------------------------------------------------------

/// The configuration file exactly as written, before compilation.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    svn_repository: String,

    domain: Option<String>,

    #[serde(default = "default_time_zone")]
    time_zone: String,

    #[serde(default = "default_commit_message")]
    commit_message: String,

    #[serde(default)]
    strict_mode: bool,

    #[serde(default)]
    identity_map: HashMap<String, String>,

    #[serde(default)]
    branch_origin: HashMap<String, String>,

    /// Git pathspec patterns selecting LFS-routed destination paths.
    #[serde(default, rename = "LFS")]
    lfs: Vec<String>,

    #[serde(default, rename = "rule")]
    rules: Vec<RuleFile>,
}

fn default_time_zone() -> String {
    DEFAULT_TIME_ZONE.into()
}
fn default_commit_message() -> String {
    DEFAULT_COMMIT_MESSAGE.into()
}

/// One `[[rule]]` table as written.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleFile {
    svn_path: String,
    repository: Option<String>,
    branch: Option<String>,
    #[serde(default)]
    git_path: String,
    min_revision: Option<i64>,
    max_revision: Option<i64>,
}

// ---------------------------------------------------------------------------
// Compiled configuration
// ---------------------------------------------------------------------------

/// What a matched rule does with the path.
#[derive(Debug)]
pub enum RuleAction {
    /// Drop the path and consider no further rules.
    Skip,
    /// Rewrite into a destination repository, branch, and path.
    Map {
        repo: String,
        branch: String,
        path: String,
    },
}

/// A compiled mapping rule.
///
/// `svn_path` is compiled anchored at the start of the input (`\A(?:...)`),
/// so a match always consumes a prefix and leaves a literal suffix.
#[derive(Debug)]
pub struct Rule {
    pub svn_path: Regex,
    /// The pattern as written, kept for diagnostics.
    pub pattern: String,
    pub action: RuleAction,
    pub min_revision: Option<i64>,
    pub max_revision: Option<i64>,
}

impl Rule {
    /// Number of capturing groups in the pattern (excluding group 0).
    pub fn group_count(&self) -> usize {
        self.svn_path.captures_len() - 1
    }
}

/// Validated, immutable configuration for one conversion run.
pub struct Config {
    pub svn_repository: PathBuf,
    pub domain: Option<String>,
    pub time_zone: chrono_tz::Tz,
    pub commit_message: String,
    pub strict_mode: bool,
    pub identity_map: HashMap<String, String>,
    pub branch_origin: HashMap<String, String>,
    /// The LFS pathspec patterns as written, for `.gitattributes` seeding.
    pub lfs_patterns: Vec<String>,
    pub rules: Vec<Rule>,
    /// Compiled pathspec over `lfs_patterns`; `None` when no patterns.
    pub(crate) lfs_pathspec: Option<git2::Pathspec>,
}

impl Config {
    /// Load and validate a configuration from a TOML file at `path`.
    ///
    /// Also checks that `svn_repository` points at an existing directory;
    /// [`Config::parse`] skips that check so tests can build configs
    /// without a repository on disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config = Self::parse(&contents)?;

        if !config.svn_repository.is_dir() {
            return Err(ConfigError::InvalidValue {
                field: "svn_repository".into(),
                detail: format!(
                    "\"{}\" is not a directory that can be found",
                    config.svn_repository.display()
                ),
            });
        }

        debug!("configuration loaded and validated");
        Ok(config)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let raw: ConfigFile =
            toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        Self::compile(raw)
    }

    fn compile(raw: ConfigFile) -> Result<Self, ConfigError> {
        if raw.svn_repository.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "svn_repository".into(),
                detail: "provide a path to an on-disk svn repository".into(),
            });
        }

        // The template must interpolate cleanly; render once with sample
        // arguments so bad placeholders fail here instead of mid-run.
        render_template(&raw.commit_message, "log msg", "user", 1)?;

        let time_zone: chrono_tz::Tz = raw
            .time_zone
            .parse()
            .map_err(|_| ConfigError::BadTimezone(raw.time_zone.clone()))?;

        for (user, identity) in &raw.identity_map {
            if !IDENTITY_FORMAT.is_match(identity) {
                return Err(ConfigError::BadIdentity { user: user.clone() });
            }
        }
        if raw.identity_map.is_empty() {
            warn!("no identity_map configured; git authors will be derived from svn usernames");
        }
        if raw.domain.is_none() {
            warn!("no domain configured; unmapped svn users will fall back to @localhost");
        }

        let lfs_pathspec = if raw.lfs.is_empty() {
            None
        } else {
            Some(
                git2::Pathspec::new(raw.lfs.iter().map(String::as_str)).map_err(|e| {
                    ConfigError::InvalidValue {
                        field: "LFS".into(),
                        detail: e.to_string(),
                    }
                })?,
            )
        };

        if raw.rules.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "rule".into(),
                detail: "provide one or more [[rule]] tables".into(),
            });
        }

        let mut rules = Vec::with_capacity(raw.rules.len());
        for rule in raw.rules {
            rules.push(compile_rule(rule)?);
        }

        Ok(Self {
            svn_repository: PathBuf::from(raw.svn_repository),
            domain: raw.domain,
            time_zone,
            commit_message: raw.commit_message,
            strict_mode: raw.strict_mode,
            identity_map: raw.identity_map,
            branch_origin: raw.branch_origin,
            lfs_patterns: raw.lfs,
            rules,
            lfs_pathspec,
        })
    }

    /// Whether a destination path is routed through LFS.
    ///
    /// An empty pathspec matches nothing (libgit2 would match everything).
    pub fn lfs_matches(&self, dest_path: &str) -> bool {
        match &self.lfs_pathspec {
            Some(pathspec) => {
                pathspec.matches_path(Path::new(dest_path), git2::PathspecFlags::DEFAULT)
            }
            None => false,
        }
    }
}

fn compile_rule(rule: RuleFile) -> Result<Rule, ConfigError> {
    let svn_path = Regex::new(&format!(r"\A(?:{})", rule.svn_path)).map_err(|e| {
        ConfigError::BadRegex {
            pattern: rule.svn_path.clone(),
            detail: e.to_string(),
        }
    })?;
    let group_count = svn_path.captures_len() - 1;

    let action = match (rule.repository, rule.branch) {
        (Some(repo), Some(branch)) => {
            for template in [&repo, &branch, &rule.git_path] {
                check_rewrite_template(template, group_count).map_err(|detail| {
                    ConfigError::BadRewrite {
                        template: template.clone(),
                        pattern: rule.svn_path.clone(),
                        detail,
                    }
                })?;
            }
            RuleAction::Map {
                repo,
                branch,
                path: rule.git_path,
            }
        }
        (None, None) => {
            if !rule.git_path.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "rule.git_path".into(),
                    detail: format!(
                        "rule \"{}\" skips its matches and must not set git_path",
                        rule.svn_path
                    ),
                });
            }
            RuleAction::Skip
        }
        _ => {
            return Err(ConfigError::InvalidValue {
                field: "rule".into(),
                detail: format!(
                    "for \"{}\" both a repository and a branch must be provided, \
                     or neither",
                    rule.svn_path
                ),
            });
        }
    };

    Ok(Rule {
        svn_path,
        pattern: rule.svn_path,
        action,
        min_revision: rule.min_revision,
        max_revision: rule.max_revision,
    })
}

// ---------------------------------------------------------------------------
// Example configuration
// ---------------------------------------------------------------------------

/// Sample configuration printed by `svn-lfs-export --example-config`.
pub const EXAMPLE_CONFIG: &str = r#"# svn-lfs-export configuration

# Path to the on-disk SVN repository to convert (as created by
# `svnadmin create`, not a working copy or URL).
svn_repository = "/srv/svn/myproject"

# Fallback email domain for svn users missing from identity_map.
domain = "example.com"

# IANA time zone used to render commit UTC offsets.
time_zone = "Etc/UTC"

# Commit message template. Recognised keys: {log}, {usr}, {rev}.
commit_message = "{log}\n\nThis commit was converted from revision r{rev} by svn-lfs-export."

# Fail the run when a file path matches no rule (directories are exempt).
strict_mode = false

# Git pathspec patterns whose destination paths are stored in LFS.
LFS = ["*.bin", "*.png", "assets/**"]

[identity_map]
jsmith = "John Smith <jsmith@example.com>"
adoe = "Alice Doe <alice.doe@example.com>"

# Seed commit for branches that first appear on an already-existing
# repository. Values are fast-import references.
[branch_origin]
feature-x = "refs/heads/master"

# Ordered mapping rules; the first match wins. svn_path is a regex matched
# against the start of the SVN path. Captured groups may be used in
# repository, branch, and git_path via \1..\9 (\0 is the whole match).
[[rule]]
svn_path = "trunk/"
repository = "myproject"
branch = "master"
git_path = ""

[[rule]]
svn_path = 'branches/([^/]+)/'
repository = "myproject"
branch = '\1'
git_path = ""

# A rule without repository and branch drops everything it matches.
[[rule]]
svn_path = "tags/"
"#;
