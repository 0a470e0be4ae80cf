use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::Tls;
use lettre::{Message, SmtpTransport, Transport};
use serde_json::json;
use tracing::{error, info};

use crate::html::markdown_to_html;

const SENDGRID_API_BASE: &str = "https://api.sendgrid.com";

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailResult {
    pub success: bool,
    pub status_code: Option<u16>,
    pub message: String,
}

impl EmailResult {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            status_code: None,
            message: message.into(),
        }
    }
}

/// A message ready for any transport: markdown body plus its HTML rendering.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl OutgoingEmail {
    pub fn from_markdown(from: impl Into<String>, to: Vec<String>, subject: impl Into<String>, markdown: impl Into<String>) -> Self {
        let text = markdown.into();
        let html = markdown_to_html(&text);
        Self {
            from: from.into(),
            to,
            subject: subject.into(),
            text,
            html,
        }
    }
}

/// Transport seam for digest delivery.
#[async_trait]
pub trait DigestSender: Send + Sync {
    fn provider(&self) -> &'static str;

    /// Deliver one message. `Err` means the message never left; a rejected
    /// message comes back as an unsuccessful [`EmailResult`].
    async fn send(&self, email: &OutgoingEmail) -> Result<EmailResult>;
}

/// SendGrid v3 mail API.
pub struct SendGridSender {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl SendGridSender {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: SENDGRID_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl DigestSender for SendGridSender {
    fn provider(&self) -> &'static str {
        "sendgrid"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<EmailResult> {
        if email.to.is_empty() {
            return Ok(EmailResult::failed("No email recipients configured"));
        }

        let to: Vec<_> = email.to.iter().map(|address| json!({ "email": address })).collect();
        let body = json!({
            "personalizations": [{ "to": to }],
            "from": { "email": email.from },
            "subject": email.subject,
            "content": [
                { "type": "text/plain", "value": email.text },
                { "type": "text/html", "value": email.html },
            ],
        });

        let response = self
            .client
            .post(format!("{}/v3/mail/send", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("SendGrid request failed")?;

        let status = response.status();
        if status.is_success() {
            info!("Email sent successfully to {} recipients", email.to.len());
            Ok(EmailResult {
                success: true,
                status_code: Some(status.as_u16()),
                message: format!("Email sent to {} recipients", email.to.len()),
            })
        } else {
            let detail = response.text().await.unwrap_or_default();
            error!("SendGrid returned status {}: {}", status, detail);
            Ok(EmailResult {
                success: false,
                status_code: Some(status.as_u16()),
                message: format!("SendGrid returned status {}", status.as_u16()),
            })
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Plain SMTP through lettre. Port 465 uses implicit TLS, 587 STARTTLS and
/// anything else an unencrypted connection (local relays, test servers).
pub struct SmtpSender {
    settings: SmtpSettings,
}

impl SmtpSender {
    pub fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }

    fn transport(&self) -> Result<SmtpTransport> {
        let SmtpSettings {
            host,
            port,
            username,
            password,
        } = &self.settings;

        let builder = match port {
            465 => SmtpTransport::relay(host)?,
            587 => SmtpTransport::starttls_relay(host)?,
            _ => SmtpTransport::builder_dangerous(host).tls(Tls::None),
        }
        .port(*port);

        let builder = match (username, password) {
            (Some(user), Some(pass)) => builder.credentials(Credentials::new(user.clone(), pass.clone())),
            _ => builder,
        };
        Ok(builder.build())
    }

    fn build_message(email: &OutgoingEmail) -> Result<Message> {
        let mut builder = Message::builder()
            .from(email.from.parse::<Mailbox>().with_context(|| format!("invalid sender {}", email.from))?)
            .subject(&email.subject);
        for address in &email.to {
            builder = builder.to(address.parse::<Mailbox>().with_context(|| format!("invalid recipient {}", address))?);
        }
        builder
            .multipart(MultiPart::alternative_plain_html(email.text.clone(), email.html.clone()))
            .map_err(|e| anyhow!("Failed to build message: {}", e))
    }
}

#[async_trait]
impl DigestSender for SmtpSender {
    fn provider(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<EmailResult> {
        if email.to.is_empty() {
            return Ok(EmailResult::failed("No email recipients configured"));
        }

        let message = Self::build_message(email)?;
        let mailer = self.transport()?;
        let recipients = email.to.len();

        // lettre's SmtpTransport is blocking
        let outcome = tokio::task::spawn_blocking(move || mailer.send(&message)).await?;

        match outcome {
            Ok(response) => {
                info!("Email sent successfully to {} recipients via SMTP", recipients);
                Ok(EmailResult {
                    success: true,
                    status_code: response.code().to_string().parse().ok(),
                    message: format!("Email sent to {} recipients", recipients),
                })
            }
            Err(e) => {
                error!("Failed to send email via SMTP: {}", e);
                Ok(EmailResult::failed(format!("Failed to send email via SMTP: {}", e)))
            }
        }
    }
}
