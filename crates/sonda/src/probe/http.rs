use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::debug;

use super::Prober;
use crate::check::{Check, ProbeConfig};
use crate::error::Error;
use crate::event::Event;

/// Probes a check by issuing a GET and comparing the status code against
/// 200. Anything else, including redirect loops, transport errors and the
/// deadline firing first, is a down result.
pub struct HttpProber {
    client: reqwest::Client,
    user_agent: String,
    timeout: Duration,
}

impl HttpProber {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| Error::Sink(format!("http client: {err}")))?;

        Ok(HttpProber {
            client,
            user_agent: user_agent.to_string(),
            timeout,
        })
    }

    async fn fetch(&self, check: &Check) -> Result<u16> {
        let ProbeConfig::Http { url, headers } = &check.probe else {
            bail!("not an http check");
        };

        let mut request = self.client.get(url.clone());
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        // Injected last so it wins over a configured User-Agent header.
        request = request.header(reqwest::header::USER_AGENT, &self.user_agent);

        let response = request.send().await?;
        Ok(response.status().as_u16())
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, check: &Arc<Check>) -> Event {
        let mut event = Event::new(check.clone());
        let started = Instant::now();

        match tokio::time::timeout(self.timeout, self.fetch(check)).await {
            Ok(Ok(status)) => {
                event.duration = started.elapsed();
                event.status_code = status;
                if status == 200 {
                    check.record_up(&mut event);
                } else {
                    check.record_down(&mut event);
                }
            }
            Ok(Err(err)) => {
                event.duration = started.elapsed();
                debug!(check = %check.key, error = %err, "http probe failed");
                check.record_down(&mut event);
            }
            Err(_) => {
                event.duration = self.timeout;
                debug!(check = %check.key, "http probe timed out");
                check.record_down(&mut event);
            }
        }

        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::net::SocketAddr;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Minimal HTTP server answering every connection with a canned
    /// response after an optional delay.
    async fn serve(response: &'static str, delay: Duration) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = stream.read(&mut buf).await;
                    tokio::time::sleep(delay).await;
                    let _ = stream.write_all(response.as_bytes()).await;
                });
            }
        });

        addr
    }

    fn check_for(addr: SocketAddr) -> Arc<Check> {
        let url = format!("http://{addr}/");
        Arc::new(Check::new(
            "web",
            Duration::from_secs(10),
            false,
            Duration::ZERO,
            false,
            ProbeConfig::http(&url, BTreeMap::new()).unwrap(),
        ))
    }

    const OK: &str = "HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n";
    const ERROR: &str =
        "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n";

    #[tokio::test]
    async fn responsive_endpoint_is_up() {
        let addr = serve(OK, Duration::ZERO).await;
        let prober = HttpProber::new("sonda-test", Duration::from_secs(10)).unwrap();

        let event = prober.probe(&check_for(addr)).await;
        assert!(event.up);
        assert_eq!(event.status_code, 200);
        assert!(event.duration > Duration::ZERO);
    }

    #[tokio::test]
    async fn server_error_is_down() {
        let addr = serve(ERROR, Duration::ZERO).await;
        let prober = HttpProber::new("sonda-test", Duration::from_secs(10)).unwrap();

        let event = prober.probe(&check_for(addr)).await;
        assert!(!event.up);
        assert_eq!(event.status_code, 500);
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() {
        let addr = serve(OK, Duration::from_millis(200)).await;
        let prober = HttpProber::new("sonda-test", Duration::from_millis(100)).unwrap();

        let event = prober.probe(&check_for(addr)).await;
        assert!(!event.up);
        assert_eq!(event.status_code, 0);
        assert_eq!(event.duration, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn refused_connection_is_down() {
        // Bind then drop to get an address nothing listens on.
        let addr = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();
        let prober = HttpProber::new("sonda-test", Duration::from_secs(10)).unwrap();

        let event = prober.probe(&check_for(addr)).await;
        assert!(!event.up);
        assert_eq!(event.status_code, 0);
    }
}
