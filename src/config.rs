// src/config.rs
//! Runtime configuration from the environment (`.env` is loaded by the binaries).

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::prefs::DEFAULT_PREFS_PATH;
use crate::store::DEFAULT_DIGEST_STORE_PATH;

pub const ENV_PREFS_PATH: &str = "PREFS_PATH";
pub const ENV_DIGEST_STORE_PATH: &str = "DIGEST_STORE_PATH";
pub const ENV_TOPICS_PATH: &str = "DIGEST_TOPICS_PATH";
pub const ENV_INTERVAL_SECS: &str = "DIGEST_INTERVAL_SECS";
pub const ENV_SCHEDULER: &str = "DIGEST_SCHEDULER";
pub const ENV_FETCH_TIMEOUT_SECS: &str = "FETCH_TIMEOUT_SECS";

const DEFAULT_INTERVAL_SECS: u64 = 3600;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 15;
const DEFAULT_SMTP_PORT: u16 = 587;

/// Outgoing mail server. Only present when `SMTP_HOST` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub prefs_path: PathBuf,
    pub digest_store_path: PathBuf,
    /// Custom topic table (TOML or JSON); built-in table when unset.
    pub topics_path: Option<PathBuf>,
    pub interval: Duration,
    pub scheduler_enabled: bool,
    pub fetch_timeout: Duration,
    pub smtp: Option<SmtpConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            prefs_path: PathBuf::from(DEFAULT_PREFS_PATH),
            digest_store_path: PathBuf::from(DEFAULT_DIGEST_STORE_PATH),
            topics_path: None,
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            scheduler_enabled: false,
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            smtp: None,
        }
    }
}

impl AppConfig {
    /// Read every setting from the process environment; unset values keep
    /// their defaults, malformed numbers are an error.
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            prefs_path: var(ENV_PREFS_PATH).map(PathBuf::from).unwrap_or(d.prefs_path),
            digest_store_path: var(ENV_DIGEST_STORE_PATH)
                .map(PathBuf::from)
                .unwrap_or(d.digest_store_path),
            topics_path: var(ENV_TOPICS_PATH).map(PathBuf::from),
            interval: secs(ENV_INTERVAL_SECS)?.unwrap_or(d.interval),
            scheduler_enabled: var(ENV_SCHEDULER).is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true")),
            fetch_timeout: secs(ENV_FETCH_TIMEOUT_SECS)?.unwrap_or(d.fetch_timeout),
            smtp: SmtpConfig::from_env()?,
        })
    }
}

impl SmtpConfig {
    fn from_env() -> Result<Option<Self>> {
        let Some(host) = var("SMTP_HOST") else {
            return Ok(None);
        };
        let port = match var("SMTP_PORT") {
            Some(p) => p
                .parse()
                .with_context(|| format!("SMTP_PORT is not a port number: {p}"))?,
            None => DEFAULT_SMTP_PORT,
        };
        let user = var("SMTP_USER");
        // the SMTP user doubles as sender when no explicit one is given
        let from = var("DIGEST_EMAIL_FROM")
            .or_else(|| user.clone())
            .context("DIGEST_EMAIL_FROM (or SMTP_USER) is required when SMTP_HOST is set")?;
        Ok(Some(Self {
            host,
            port,
            user,
            pass: var("SMTP_PASS"),
            from,
        }))
    }
}

/// Non-empty, trimmed env var.
fn var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn secs(key: &str) -> Result<Option<Duration>> {
    var(key)
        .map(|v| {
            v.parse::<u64>()
                .map(Duration::from_secs)
                .with_context(|| format!("{key} must be a whole number of seconds, got {v}"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: &[&str] = &[
        ENV_PREFS_PATH,
        ENV_DIGEST_STORE_PATH,
        ENV_TOPICS_PATH,
        ENV_INTERVAL_SECS,
        ENV_SCHEDULER,
        ENV_FETCH_TIMEOUT_SECS,
        "SMTP_HOST",
        "SMTP_PORT",
        "SMTP_USER",
        "SMTP_PASS",
        "DIGEST_EMAIL_FROM",
    ];

    fn clear() {
        for k in ALL {
            env::remove_var(k);
        }
    }

    #[serial_test::serial]
    #[test]
    fn defaults_when_unset() {
        clear();
        assert_eq!(AppConfig::from_env().unwrap(), AppConfig::default());
    }

    #[serial_test::serial]
    #[test]
    fn reads_overrides() {
        clear();
        env::set_var(ENV_PREFS_PATH, "/tmp/p.json");
        env::set_var(ENV_INTERVAL_SECS, "60");
        env::set_var(ENV_SCHEDULER, "1");
        env::set_var("SMTP_HOST", "smtp.example.com");
        env::set_var("SMTP_USER", "bot@example.com");

        let cfg = AppConfig::from_env().unwrap();
        assert_eq!(cfg.prefs_path, PathBuf::from("/tmp/p.json"));
        assert_eq!(cfg.interval, Duration::from_secs(60));
        assert!(cfg.scheduler_enabled);
        let smtp = cfg.smtp.unwrap();
        assert_eq!(smtp.port, DEFAULT_SMTP_PORT);
        assert_eq!(smtp.from, "bot@example.com");
        clear();
    }

    #[serial_test::serial]
    #[test]
    fn bad_number_is_an_error() {
        clear();
        env::set_var(ENV_FETCH_TIMEOUT_SECS, "soon");
        assert!(AppConfig::from_env().is_err());
        clear();
    }
}
