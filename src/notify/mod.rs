// src/notify/mod.rs
//! Digest delivery. Each configured channel is a [`Notifier`]; the
//! [`Dispatcher`] fans a digest out to all of them at once and reports one
//! [`DeliveryOutcome`] per channel.

pub mod email;
pub mod render;
pub mod telegram;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::future::join_all;
use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::digest::SummaryGroup;
use crate::prefs::Prefs;

use self::email::EmailSender;
use self::telegram::TelegramSender;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short channel name used in outcomes and logs ("email", "telegram").
    fn channel(&self) -> &str;
    async fn send(&self, groups: &[SummaryGroup]) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub channel: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryOutcome {
    fn from_result(channel: &str, res: Result<()>) -> Self {
        match res {
            Ok(()) => Self {
                channel: channel.to_string(),
                ok: true,
                error: None,
            },
            Err(e) => Self {
                channel: channel.to_string(),
                ok: false,
                error: Some(format!("{e:#}")),
            },
        }
    }
}

enum Slot {
    Ready(Box<dyn Notifier>),
    // requested in prefs but could not be set up
    Broken { channel: String, error: String },
}

#[derive(Default)]
pub struct Dispatcher {
    slots: Vec<Slot>,
}

impl Dispatcher {
    pub fn new(notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self {
            slots: notifiers.into_iter().map(Slot::Ready).collect(),
        }
    }

    /// Channels requested by `prefs`, in order email then Telegram.
    /// Email needs SMTP settings in `config`; without them the channel is
    /// kept as a failed slot so the caller still sees why nothing was sent.
    pub fn from_prefs(prefs: &Prefs, config: &AppConfig) -> Self {
        let mut slots = Vec::new();

        if let Some(to) = prefs.email.as_deref() {
            let sender = config
                .smtp
                .as_ref()
                .ok_or_else(|| anyhow!("SMTP is not configured (set SMTP_HOST)"))
                .and_then(|smtp| EmailSender::new(smtp, to));
            slots.push(match sender {
                Ok(s) => Slot::Ready(Box::new(s)),
                Err(e) => Slot::Broken {
                    channel: "email".into(),
                    error: format!("{e:#}"),
                },
            });
        }

        if let Some((token, chat_id)) = prefs.telegram() {
            slots.push(Slot::Ready(Box::new(TelegramSender::new(token, chat_id))));
        }

        Self { slots }
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Send to every channel concurrently. One outcome per channel, in
    /// channel order; a failure never stops the others.
    pub async fn dispatch(&self, groups: &[SummaryGroup]) -> Vec<DeliveryOutcome> {
        let outcomes = join_all(self.slots.iter().map(|slot| async move {
            match slot {
                Slot::Ready(n) => DeliveryOutcome::from_result(n.channel(), n.send(groups).await),
                Slot::Broken { channel, error } => DeliveryOutcome {
                    channel: channel.clone(),
                    ok: false,
                    error: Some(error.clone()),
                },
            }
        }))
        .await;

        for o in &outcomes {
            if o.ok {
                counter!("deliveries_total", "channel" => o.channel.clone()).increment(1);
                tracing::info!(target: "notify", channel = %o.channel, groups = groups.len(), "digest delivered");
            } else {
                counter!("delivery_failures_total", "channel" => o.channel.clone()).increment(1);
                tracing::warn!(
                    target: "notify",
                    channel = %o.channel,
                    error = o.error.as_deref().unwrap_or_default(),
                    "digest delivery failed"
                );
            }
        }
        outcomes
    }
}
