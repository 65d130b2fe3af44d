use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

use crate::utils::duration::parse_duration_to_secs;
use crate::utils::error::{EngineError, EngineResult};

/// Command-line surface (§6c): a single `check` verb plus global config
/// override, mirroring the shape of the engine config it sits in front of.
#[derive(Debug, Parser)]
#[command(name = "dbhc", version, about = "Database health check engine")]
pub struct Cli {
    /// Overrides config-file discovery (`Config::load`'s candidate list).
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Runs one health check pass and writes the report document.
    Check(CheckArgs),
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// `YASDB_HOME` equivalent; falls back to the environment variable.
    #[arg(long)]
    pub home: Option<String>,
    /// `YASDB_DATA` equivalent; falls back to the environment variable.
    #[arg(long)]
    pub data: Option<String>,
    #[arg(long)]
    pub user: Option<String>,
    #[arg(long)]
    pub password: Option<String>,
    /// Connect via OS group membership instead of user/password.
    #[arg(long)]
    pub system_auth: bool,
    #[arg(long, default_value = "127.0.0.1:1688")]
    pub listen_addr: String,
    /// Ordered multi-node topology file; single-node run if omitted.
    #[arg(long)]
    pub nodes: Option<String>,

    /// RFC 3339 window start; combined with `--range` if `--end` is absent.
    #[arg(long)]
    pub start: Option<String>,
    /// RFC 3339 window end; defaults to now.
    #[arg(long)]
    pub end: Option<String>,
    /// Duration string (`"24h"`, `"7d"`, ...) measured back from `--end`.
    #[arg(long)]
    pub range: Option<String>,

    #[arg(long)]
    pub output: Option<String>,
    /// Restrict the run to these top-level modules (repeatable).
    #[arg(long = "module")]
    pub modules: Vec<String>,
    /// Restrict the run to these metrics by name (repeatable).
    #[arg(long = "metric")]
    pub metrics: Vec<String>,
    #[arg(long)]
    pub language: Option<String>,
}

/// Resolves `[start, end]` from the CLI flags and the config's defaults:
/// `--end` defaults to now, `--start` defaults to `--end - range`, and
/// `range` defaults to the config's `range`, clamped into `[min_duration,
/// max_duration]`.
pub fn resolve_window(args: &CheckArgs, config: &crate::config::Config) -> EngineResult<(DateTime<Utc>, DateTime<Utc>)> {
    let end = match &args.end {
        Some(s) => parse_rfc3339(s)?,
        None => Utc::now(),
    };

    let start = match &args.start {
        Some(s) => parse_rfc3339(s)?,
        None => {
            let range_secs = match &args.range {
                Some(s) => parse_duration_to_secs(s).map_err(EngineError::config_invalid)?,
                None => config.range,
            };
            let clamped = range_secs.clamp(config.min_duration, config.max_duration);
            end - chrono::Duration::seconds(clamped as i64)
        }
    };

    if start > end {
        return Err(EngineError::config_invalid("--start must not be after --end"));
    }
    Ok((start, end))
}

fn parse_rfc3339(s: &str) -> EngineResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| EngineError::config_invalid(format!("invalid timestamp {s:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> CheckArgs {
        CheckArgs {
            home: None,
            data: None,
            user: None,
            password: None,
            system_auth: false,
            listen_addr: "127.0.0.1:1688".into(),
            nodes: None,
            start: None,
            end: None,
            range: None,
            output: None,
            modules: vec![],
            metrics: vec![],
            language: None,
        }
    }

    #[test]
    fn default_window_spans_configured_range_ending_now() {
        let config = crate::config::Config::default();
        let (start, end) = resolve_window(&args(), &config).unwrap();
        let spanned = (end - start).num_seconds() as u64;
        assert_eq!(spanned, config.range.clamp(config.min_duration, config.max_duration));
    }

    #[test]
    fn explicit_range_overrides_config_default() {
        let config = crate::config::Config::default();
        let mut a = args();
        a.range = Some("1h".into());
        let (start, end) = resolve_window(&a, &config).unwrap();
        assert_eq!((end - start).num_seconds(), 3600);
    }

    #[test]
    fn start_after_end_is_rejected() {
        let config = crate::config::Config::default();
        let mut a = args();
        a.start = Some("2026-01-02T00:00:00Z".into());
        a.end = Some("2026-01-01T00:00:00Z".into());
        assert!(resolve_window(&a, &config).is_err());
    }
}
