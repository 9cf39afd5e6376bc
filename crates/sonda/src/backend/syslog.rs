use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::warn;

use super::Backend;
use crate::error::Error;
use crate::event::Event;

// RFC 3164 user-level facility.
const FACILITY: u8 = 1;
const SEVERITY_INFO: u8 = 6;
const SEVERITY_ERR: u8 = 3;

/// Sends probe results as RFC 3164 datagrams to a syslog collector; up
/// results at informational severity, down results at error severity.
pub struct SyslogBackend {
    socket: UdpSocket,
    tag: String,
}

impl SyslogBackend {
    pub async fn new(address: &str, tag: &str) -> Result<Self, Error> {
        if address.is_empty() {
            return Err(Error::Sink("syslog address cannot be empty".to_string()));
        }

        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(address).await?;

        Ok(SyslogBackend {
            socket,
            tag: tag.to_string(),
        })
    }

    fn render(&self, event: &Event) -> String {
        let severity = if event.up { SEVERITY_INFO } else { SEVERITY_ERR };
        let priority = FACILITY * 8 + severity;
        format!(
            "<{priority}>{tag}: {key} {verdict} {status} {duration}",
            tag = self.tag,
            key = event.check.key,
            verdict = if event.up { "UP" } else { "DOWN" },
            status = event.status_code,
            duration = humantime::format_duration(event.duration),
        )
    }
}

#[async_trait]
impl Backend for SyslogBackend {
    async fn log(&self, event: &Event) {
        let message = self.render(event);
        if let Err(err) = self.socket.send(message.as_bytes()).await {
            warn!(check = %event.check.key, error = %err, "syslog delivery failed");
        }
    }
}
