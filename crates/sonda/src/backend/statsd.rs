use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::warn;

use super::Backend;
use crate::error::Error;
use crate::event::Event;

/// Emits per-check timing and availability metrics as statsd datagrams:
/// `<prefix><key>.duration` as a timer and `<prefix><key>.up` as a 0/1
/// gauge.
#[derive(Debug)]
pub struct StatsdBackend {
    socket: UdpSocket,
    prefix: String,
}

impl StatsdBackend {
    pub async fn new(host: &str, port: u16, prefix: &str) -> Result<Self, Error> {
        if host.is_empty() {
            return Err(Error::Sink("statsd host cannot be empty".to_string()));
        }

        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect((host, port)).await?;

        Ok(StatsdBackend {
            socket,
            prefix: prefix.to_string(),
        })
    }
}

#[async_trait]
impl Backend for StatsdBackend {
    async fn log(&self, event: &Event) {
        let key = &event.check.key;
        let datagram = format!(
            "{prefix}{key}.duration:{}|ms\n{prefix}{key}.up:{}|g",
            event.duration.as_millis(),
            event.up as u8,
            prefix = self.prefix,
        );

        if let Err(err) = self.socket.send(datagram.as_bytes()).await {
            warn!(check = %key, error = %err, "statsd delivery failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::check::{Check, ProbeConfig};

    fn up_event(key: &str, duration: Duration) -> Event {
        let probe = ProbeConfig::http("http://example.com/", BTreeMap::new()).unwrap();
        let check = Arc::new(Check::new(
            key,
            Duration::from_secs(10),
            false,
            Duration::ZERO,
            false,
            probe,
        ));
        let mut event = Event::new(check.clone());
        event.duration = duration;
        check.record_up(&mut event);
        event
    }

    #[tokio::test]
    async fn emits_timer_and_gauge_lines() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();

        let backend = StatsdBackend::new("127.0.0.1", port, "checks.").await.unwrap();
        backend.log(&up_event("web", Duration::from_millis(42))).await;

        let mut buf = [0u8; 256];
        let (n, _) = tokio::time::timeout(Duration::from_secs(1), receiver.recv_from(&mut buf))
            .await
            .expect("datagram expected")
            .unwrap();
        let datagram = std::str::from_utf8(&buf[..n]).unwrap();

        assert_eq!(datagram, "checks.web.duration:42|ms\nchecks.web.up:1|g");
    }

    #[tokio::test]
    async fn empty_host_is_rejected() {
        let err = StatsdBackend::new("", 8125, "checks.").await.unwrap_err();
        assert!(matches!(err, Error::Sink(_)));
    }
}
