use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::net::{lookup_host, UdpSocket};
use tracing::debug;

use super::Prober;
use crate::check::{Check, ProbeConfig};
use crate::event::Event;

/// Probes a check by sending a configured payload and expecting one
/// datagram back whose bytes equal the configured reply exactly. The
/// status code stays 0 for UDP.
pub struct UdpProber {
    timeout: Duration,
}

impl UdpProber {
    pub fn new(timeout: Duration) -> Self {
        UdpProber { timeout }
    }

    /// Resolve, send, and wait for a single reply. Returns whether the
    /// reply matched the expected bytes.
    async fn exchange(&self, check: &Check) -> Result<bool> {
        let ProbeConfig::Udp {
            host,
            port,
            send,
            receive,
        } = &check.probe
        else {
            bail!("not a udp check");
        };

        let addr = lookup_host((host.as_str(), *port))
            .await?
            .next()
            .context("hostname resolved to no addresses")?;

        let bind_addr = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(addr).await?;
        socket.send(send.as_bytes()).await?;

        // One byte of headroom so an over-long reply fails the comparison
        // instead of being silently truncated to a match.
        let mut buf = vec![0u8; receive.len() + 1];
        let n = socket.recv(&mut buf).await?;

        Ok(&buf[..n] == receive.as_bytes())
    }
}

#[async_trait]
impl Prober for UdpProber {
    async fn probe(&self, check: &Arc<Check>) -> Event {
        let mut event = Event::new(check.clone());
        let started = Instant::now();

        match tokio::time::timeout(self.timeout, self.exchange(check)).await {
            Ok(Ok(matched)) => {
                event.duration = started.elapsed();
                if matched {
                    check.record_up(&mut event);
                } else {
                    check.record_down(&mut event);
                }
            }
            Ok(Err(err)) => {
                event.duration = started.elapsed();
                debug!(check = %check.key, error = %err, "udp probe failed");
                check.record_down(&mut event);
            }
            Err(_) => {
                event.duration = self.timeout;
                debug!(check = %check.key, "udp probe timed out");
                check.record_down(&mut event);
            }
        }

        event
    }
}
