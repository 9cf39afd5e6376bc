use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::error;

use super::Alerter;
use crate::error::Error;
use crate::event::Event;

/// Emails outage and recovery notices over SMTP.
#[derive(Debug)]
pub struct SmtpAlerter {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    recipients: Vec<Mailbox>,
}

impl SmtpAlerter {
    /// `recipients` is a `;`-separated address list. Credentials are
    /// optional; without them the connection stays unauthenticated.
    pub fn new(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        from: &str,
        recipients: &str,
    ) -> Result<Self, Error> {
        if host.is_empty() {
            return Err(Error::Sink("smtp host cannot be empty".to_string()));
        }

        let from = parse_mailbox(from)?;
        let recipients = recipients
            .split(';')
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .map(parse_mailbox)
            .collect::<Result<Vec<_>, _>>()?;
        if recipients.is_empty() {
            return Err(Error::Sink("smtp recipient list is empty".to_string()));
        }

        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host).port(port);
        if let (Some(username), Some(password)) = (username, password) {
            builder = builder.credentials(Credentials::new(
                username.to_string(),
                password.to_string(),
            ));
        }

        Ok(SmtpAlerter {
            transport: builder.build(),
            from,
            recipients,
        })
    }

    fn render(event: &Event) -> (String, String) {
        let check = &event.check;
        if event.notify_fix {
            (
                format!("[RESOLVED] {} is back up", check.key),
                format!(
                    "{} is back up after {} of downtime.",
                    check.describe(),
                    humantime::format_duration(check.was_down_for()),
                ),
            )
        } else {
            let since = check
                .down_since()
                .map(|t| t.to_rfc2822())
                .unwrap_or_else(|| "just now".to_string());
            (
                format!("[ALERT] {} is down", check.key),
                format!("{} is down since {}.", check.describe(), since),
            )
        }
    }
}

fn parse_mailbox(addr: &str) -> Result<Mailbox, Error> {
    addr.parse()
        .map_err(|err| Error::Sink(format!("smtp address {addr:?}: {err}")))
}

#[async_trait]
impl Alerter for SmtpAlerter {
    async fn alert(&self, event: &Event) {
        let (subject, body) = Self::render(event);

        let mut builder = Message::builder().from(self.from.clone()).subject(subject);
        for recipient in &self.recipients {
            builder = builder.to(recipient.clone());
        }

        let message = match builder.body(body) {
            Ok(message) => message,
            Err(err) => {
                error!(check = %event.check.key, error = %err, "smtp message build failed");
                return;
            }
        };

        if let Err(err) = self.transport.send(message).await {
            error!(check = %event.check.key, error = %err, "smtp delivery failed");
        }
    }
}
