// src/prefs.rs
//! User preferences: which feeds to read and where to deliver the digest.
//!
//! Stored as one camelCase JSON document. Writes go through a temp file and
//! a rename so a crash never leaves a half-written file behind.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::ingest::DEFAULT_SOURCES;

pub const DEFAULT_PREFS_PATH: &str = "data/prefs.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prefs {
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram_bot_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram_chat_id: Option<String>,
    /// 5- or 6-field cron expression for the background digest run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
}

impl Prefs {
    /// Build prefs from an untrusted JSON body. `None` when the body is not
    /// an object. Anything malformed inside degrades to "not set".
    pub fn from_loose_json(v: &Value) -> Option<Self> {
        let obj = v.as_object()?;

        let sources = match obj.get("sources") {
            Some(Value::Array(arr)) => clean_sources(arr.iter().filter_map(Value::as_str)),
            _ => Vec::new(),
        };

        Some(Self {
            sources,
            email: loose_string(obj.get("email")),
            telegram_bot_token: loose_string(obj.get("telegramBotToken")),
            telegram_chat_id: loose_string(obj.get("telegramChatId")),
            schedule: loose_string(obj.get("schedule")),
        })
    }

    /// Configured sources, or the built-in feed list when none are set.
    pub fn effective_sources(&self) -> Vec<String> {
        if self.sources.is_empty() {
            DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect()
        } else {
            self.sources.clone()
        }
    }

    /// Bot token and chat id, only when both are present.
    pub fn telegram(&self) -> Option<(&str, &str)> {
        match (&self.telegram_bot_token, &self.telegram_chat_id) {
            (Some(t), Some(c)) => Some((t.as_str(), c.as_str())),
            _ => None,
        }
    }
}

fn clean_sources<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_string()))
        .map(str::to_string)
        .collect()
}

// Chat ids are often sent as numbers; accept those too.
fn loose_string(v: Option<&Value>) -> Option<String> {
    let s = match v? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

/// File-backed preference store with an in-memory copy of the last
/// read or written value.
#[derive(Debug)]
pub struct PrefsStore {
    path: PathBuf,
    cache: RwLock<Option<Prefs>>,
}

impl PrefsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn set_cached(&self, prefs: &Prefs) -> Result<()> {
        *self
            .cache
            .write()
            .map_err(|_| anyhow!("prefs cache lock poisoned"))? = Some(prefs.clone());
        Ok(())
    }

    /// Current prefs. A missing file means defaults; an unreadable document
    /// is logged and also treated as defaults so the service keeps running.
    pub fn read(&self) -> Result<Prefs> {
        if let Some(p) = self
            .cache
            .read()
            .map_err(|_| anyhow!("prefs cache lock poisoned"))?
            .as_ref()
        {
            return Ok(p.clone());
        }

        let prefs = match fs::read_to_string(&self.path) {
            Ok(s) => match serde_json::from_str::<Value>(&s) {
                Ok(v) => Prefs::from_loose_json(&v).unwrap_or_default(),
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "prefs file is not valid JSON, using defaults");
                    Prefs::default()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Prefs::default(),
            Err(e) => {
                return Err(e).with_context(|| format!("reading prefs from {}", self.path.display()))
            }
        };

        self.set_cached(&prefs)?;
        Ok(prefs)
    }

    /// Persist `prefs` atomically and return what was stored.
    pub fn write(&self, prefs: Prefs) -> Result<Prefs> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating prefs dir {}", dir.display()))?;
        }

        let json = serde_json::to_string_pretty(&prefs).context("serializing prefs")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;

        self.set_cached(&prefs)?;
        tracing::info!(
            path = %self.path.display(),
            sources = prefs.sources.len(),
            email = prefs.email.is_some(),
            telegram = prefs.telegram().is_some(),
            "prefs saved"
        );
        Ok(prefs)
    }
}
