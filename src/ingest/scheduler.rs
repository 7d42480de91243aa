// src/ingest/scheduler.rs
use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::pipeline::{run_digest, AppState};

const WEEKDAYS: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// Days named by one numeric day-of-week list element (`0`-`7`, Sunday is
/// both 0 and 7). `None` for anything else, e.g. names.
fn weekday_part(part: &str) -> Option<Vec<usize>> {
    let (range, step) = match part.split_once('/') {
        Some((r, s)) => (r, s.parse::<usize>().ok().filter(|s| *s > 0)?),
        None => (part, 1),
    };
    let (lo, hi) = if range == "*" {
        (0, 6)
    } else if let Some((a, b)) = range.split_once('-') {
        (a.parse().ok()?, b.parse().ok()?)
    } else {
        let n: usize = range.parse().ok()?;
        (n, if part.contains('/') { 6 } else { n })
    };
    if hi > 7 || lo > hi {
        return None;
    }
    Some((lo..=hi).step_by(step).map(|d| d % 7).collect())
}

/// Rewrite a standard (Sunday = 0) day-of-week field to day names, which the
/// `cron` crate reads unambiguously. Non-numeric elements pass through.
fn translate_weekdays(field: &str) -> String {
    if field == "*" || field == "?" {
        return field.to_string();
    }
    let mut out: Vec<String> = Vec::new();
    for part in field.split(',') {
        let names = match weekday_part(part) {
            Some(days) => days.into_iter().map(|d| WEEKDAYS[d].to_string()).collect(),
            None => vec![part.to_string()],
        };
        for n in names {
            if !out.contains(&n) {
                out.push(n);
            }
        }
    }
    out.join(",")
}

/// Parse a 5-field (minute precision) or 6/7-field (with seconds) cron
/// expression. Five fields are standard crontab: they get a leading `0`
/// seconds column and their numeric weekdays are converted to names.
pub fn parse_schedule(expr: &str) -> Result<Schedule, cron::error::Error> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if let [min, hour, dom, month, dow] = fields.as_slice() {
        let dow = translate_weekdays(dow);
        Schedule::from_str(&format!("0 {min} {hour} {dom} {month} {dow}"))
    } else {
        Schedule::from_str(expr.trim())
    }
}

/// Time until the next run: the cron schedule if it parses and has a future
/// tick, else the fixed interval.
pub fn next_delay(schedule: Option<&str>, fallback: Duration, now: DateTime<Utc>) -> Duration {
    let Some(expr) = schedule else {
        return fallback;
    };
    match parse_schedule(expr) {
        Ok(s) => s
            .after(&now)
            .next()
            .and_then(|at| (at - now).to_std().ok())
            .unwrap_or(fallback),
        Err(e) => {
            tracing::warn!(target: "scheduler", schedule = expr, error = %e, "invalid cron schedule, using interval");
            fallback
        }
    }
}

/// Background digest runs. The schedule is re-read from prefs before every
/// sleep, so edits through the API apply from the next tick on.
pub fn spawn_digest_scheduler(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let schedule = match state.prefs.read() {
                Ok(p) => p.schedule,
                Err(e) => {
                    tracing::warn!(target: "scheduler", error = ?e, "reading prefs failed");
                    None
                }
            };
            let delay = next_delay(schedule.as_deref(), state.config.interval, Utc::now());
            tracing::info!(target: "scheduler", secs = delay.as_secs(), "next digest run scheduled");
            tokio::time::sleep(delay).await;

            match run_digest(&state).await {
                Ok(r) => tracing::info!(
                    target: "scheduler",
                    items = r.items,
                    groups = r.groups,
                    "scheduled digest run done"
                ),
                Err(e) => tracing::warn!(target: "scheduler", error = ?e, "scheduled digest run failed"),
            }
        }
    })
}
