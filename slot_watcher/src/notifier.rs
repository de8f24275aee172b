use crate::error::NotifyError;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use shared::SmtpConfig;
use shared::locations::LocationTarget;
use shared::ttp::slots::Slot;
use tracing::{debug, error, info};

/// Delivers one notification. Returns whether it was sent; failures are logged, not raised.
pub trait Notify {
    async fn send(&self, subject: &str, body: &str) -> bool;
}

pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl EmailNotifier {
    /// Fails if the relay host or credentials are missing, since nothing can be delivered
    /// without them.
    pub fn from_config(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let host = required(config.host.as_deref(), "host")?;
        let username = required(config.username.as_deref(), "username")?;
        let password = required(config.password.as_deref(), "password")?;

        let from = parse_mailbox(config.from.as_deref().unwrap_or(username))?;
        let to = config
            .recipient_list()
            .iter()
            .map(|r| parse_mailbox(r))
            .collect::<Result<Vec<_>, _>>()?;
        if to.is_empty() {
            return Err(NotifyError::NoRecipients);
        }

        let builder = if config.use_implicit_tls() {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        }?;
        let transport = builder
            .credentials(Credentials::new(username.to_owned(), password.to_owned()))
            .port(config.port)
            .build();

        debug!(host, port = config.port, recipients = to.len(), "configured SMTP relay");
        Ok(Self {
            transport,
            from,
            to,
        })
    }

    pub fn build_message(&self, subject: &str, body: &str) -> Result<Message, NotifyError> {
        let mut builder = Message::builder().from(self.from.clone()).subject(subject);
        for to in &self.to {
            builder = builder.to(to.clone());
        }

        Ok(builder.multipart(MultiPart::alternative_plain_html(
            body.to_owned(),
            to_html(body),
        ))?)
    }
}

impl Notify for EmailNotifier {
    async fn send(&self, subject: &str, body: &str) -> bool {
        let message = match self.build_message(subject, body) {
            Ok(m) => m,
            Err(e) => {
                error!(error = ?e, subject, "failed to build notification email");
                return false;
            }
        };

        match self.transport.send(message).await {
            Ok(response) => {
                info!(code = %response.code(), subject, "sent notification email");
                true
            }
            Err(e) => {
                error!(error = ?e, subject, "failed to send notification email");
                false
            }
        }
    }
}

fn required<'a>(value: Option<&'a str>, name: &'static str) -> Result<&'a str, NotifyError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(NotifyError::MissingSetting(name))
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address.parse().map_err(|source| NotifyError::Address {
        address: address.to_owned(),
        source,
    })
}

/// HTML alternative of a plain-text body: escaped, with newlines as line breaks.
pub fn to_html(body: &str) -> String {
    body.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\n', "<br>")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotEmail {
    pub subject: String,
    pub body: String,
}

impl SlotEmail {
    pub fn new(location: &LocationTarget, slot: &Slot, booking_url: &str) -> Self {
        let date = slot.appointment_date();
        let when = slot.starts_at().map_or_else(
            || slot.start_timestamp.clone(),
            |t| t.format("%A, %B %-d, %Y at %-I:%M %p").to_string(),
        );

        let subject = format!("Earlier appointment available: {} on {date}", location.name);
        let body = format!(
            "An earlier appointment is available at {} (location {}).\n\
             \n\
             Date: {date}\n\
             When: {when}\n\
             Your target date: {}\n\
             \n\
             Book it at {booking_url}",
            location.name, location.id, location.target_date,
        );

        Self { subject, body }
    }
}
