//! Commit metadata helpers: author identity, message template, and time.

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::errors::{ConfigError, ConvertError};

/// Derive the git author/committer line for an SVN username.
///
/// An identity map entry wins verbatim; an empty username becomes
/// `Unknown User`; anything else is derived from the username and the
/// configured domain (falling back to `localhost`).
pub fn author(config: &Config, username: &str) -> String {
    if let Some(mapped) = config.identity_map.get(username) {
        return mapped.clone();
    }

    let domain = config.domain.as_deref().unwrap_or("localhost");
    if username.is_empty() {
        return format!("Unknown User <unknown@{domain}>");
    }
    format!("{username} <{username}@{domain}>")
}

/// Render the configured commit message for one revision.
pub fn commit_message(
    config: &Config,
    log: &str,
    username: &str,
    rev: i64,
) -> Result<String, ConfigError> {
    render_template(&config.commit_message, log, username, rev)
}

/// Interpolate a commit-message template.
///
/// Recognised keys are exactly `{log}`, `{usr}`, and `{rev}`; `{{` escapes a
/// literal brace. A single pass over the template means substituted values
/// are never re-scanned for placeholders.
pub(crate) fn render_template(
    template: &str,
    log: &str,
    username: &str,
    rev: i64,
) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(template.len() + log.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        if let Some(stripped) = after.strip_prefix('{') {
            out.push('{');
            rest = stripped;
            continue;
        }

        let Some(close) = after.find('}') else {
            return Err(ConfigError::BadTemplate {
                detail: format!("unterminated placeholder at \"{{{after}\""),
            });
        };
        match &after[..close] {
            "log" => out.push_str(log),
            "usr" => out.push_str(username),
            "rev" => out.push_str(&rev.to_string()),
            other => {
                return Err(ConfigError::BadTemplate {
                    detail: format!(
                        "unknown key {{{other}}}; recognised keys are {{log}}, {{usr}}, {{rev}}"
                    ),
                });
            }
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Convert an SVN revision date into git's `"<epoch> <±HHMM>"` form.
///
/// SVN stores revision dates in UTC (`YYYY-MM-DDThh:mm:ss.ffffffZ`); the
/// fractional seconds are discarded. The offset renders that UTC instant in
/// the configured time zone. A missing date means the Unix epoch.
pub fn commit_time(config: &Config, svn_date: &str) -> Result<String, ConvertError> {
    let svn_date = svn_date.trim();
    let utc: DateTime<Utc> = if svn_date.is_empty() {
        DateTime::<Utc>::UNIX_EPOCH
    } else {
        DateTime::parse_from_rfc3339(svn_date)
            .map_err(|e| ConvertError::BadDate {
                value: svn_date.to_string(),
                detail: e.to_string(),
            })?
            .with_timezone(&Utc)
    };

    let zoned = utc.with_timezone(&config.time_zone);
    Ok(format!("{} {}", utc.timestamp(), zoned.format("%z")))
}
