use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::{Mailbox, Message, MultiPart};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::render::{render_html, render_text, subject};
use super::Notifier;
use crate::config::SmtpConfig;
use crate::digest::SummaryGroup;

const IMPLICIT_TLS_PORT: u16 = 465;

pub struct EmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailSender {
    /// Port 465 uses implicit TLS, anything else STARTTLS.
    pub fn new(smtp: &SmtpConfig, to: &str) -> Result<Self> {
        let builder = if smtp.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
        }
        .with_context(|| format!("invalid SMTP_HOST {}", smtp.host))?
        .port(smtp.port);

        let builder = match (&smtp.user, &smtp.pass) {
            (Some(u), Some(p)) => builder.credentials(Credentials::new(u.clone(), p.clone())),
            _ => builder,
        };

        let from = smtp
            .from
            .parse()
            .with_context(|| format!("invalid sender address {}", smtp.from))?;
        let to = to
            .parse()
            .with_context(|| format!("invalid recipient address {to}"))?;

        Ok(Self {
            mailer: builder.build(),
            from,
            to,
        })
    }

    pub fn build_message(&self, groups: &[SummaryGroup]) -> Result<Message> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject(groups))
            .multipart(MultiPart::alternative_plain_html(
                render_text(groups),
                render_html(groups),
            ))
            .context("build email")
    }
}

#[async_trait]
impl Notifier for EmailSender {
    fn channel(&self) -> &str {
        "email"
    }

    async fn send(&self, groups: &[SummaryGroup]) -> Result<()> {
        let msg = self.build_message(groups)?;
        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }
}
