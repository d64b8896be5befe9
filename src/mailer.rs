use askama::Template;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Serialize;
use std::time::Duration;

use crate::config::MailConfig;
use crate::models::Record;
use crate::store::MailerKeys;
use crate::utils::error::{AppError, Result};

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// What was delivered, and to whom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub recipient: String,
    pub record_count: usize,
    pub sent_at: DateTime<Local>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Mail `records` as one report. An empty list still produces a report.
    async fn send(&self, records: &[Record], keys: &MailerKeys) -> Result<DeliveryReport>;
}

#[derive(Template)]
#[template(path = "report.html")]
struct ReportTemplate<'a> {
    subject: &'a str,
    records: &'a [Record],
}

/// Sends reports over SMTP with implicit TLS.
pub struct SmtpMailer {
    subject: String,
    from_name: String,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Self {
        Self {
            subject: config.subject.clone(),
            from_name: config.from_name.clone(),
        }
    }

    pub fn subject_at(&self, at: DateTime<Local>) -> String {
        format!("{} {}", self.subject, at.format("%Y-%m-%d %H:%M"))
    }

    pub fn build_message(&self, records: &[Record], keys: &MailerKeys, at: DateTime<Local>) -> Result<Message> {
        let subject = self.subject_at(at);
        let from = Mailbox::new(Some(self.from_name.clone()), keys.login.parse()?);
        let to: Mailbox = keys.recipient.parse()?;

        let html = render_html(&subject, records)?;
        let plain = render_plain(records);

        Ok(Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(plain, html))?)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, records: &[Record], keys: &MailerKeys) -> Result<DeliveryReport> {
        let sent_at = Local::now();
        let message = self.build_message(records, keys, sent_at)?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&keys.server)?
            .port(keys.port)
            .credentials(Credentials::new(keys.login.clone(), keys.password.clone()))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        transport.send(message).await.map_err(|e| {
            AppError::Mail(format!("delivery via {}:{} failed: {}", keys.server, keys.port, e))
        })?;

        tracing::info!("Mailed {} records to {}", records.len(), keys.recipient);
        metrics::counter!("aw_records_mailed_total").increment(records.len() as u64);

        Ok(DeliveryReport {
            recipient: keys.recipient.clone(),
            record_count: records.len(),
            sent_at,
        })
    }
}

pub fn render_html(subject: &str, records: &[Record]) -> Result<String> {
    ReportTemplate { subject, records }
        .render()
        .map_err(|e| AppError::Mail(format!("cannot render report: {}", e)))
}

pub fn render_plain(records: &[Record]) -> String {
    if records.is_empty() {
        return "No listings matched your queries.\n".to_string();
    }

    let mut text = String::new();
    for record in records {
        text.push_str(&format!("{}\n", record));
        text.push_str(&format!(
            "  {} | {} | {}\n",
            record.issue_year, record.publisher, record.language
        ));
        text.push_str(&format!("  {}\n\n", record.link));
    }
    text
}
