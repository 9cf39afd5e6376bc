use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{error, warn};

use super::Alerter;
use crate::error::Error;
use crate::event::Event;

const EVENTS_URL: &str = "https://events.pagerduty.com/generic/2010-04-15/create_event.json";
const RETRY_DELAY: Duration = Duration::from_secs(3);

/// Pages through the PagerDuty events API. Outages trigger an incident
/// keyed by the check key (so repeated triggers de-duplicate server-side)
/// and recoveries resolve it. Delivery retries forever on 5xx responses
/// with a fixed backoff and gives up immediately on success or 4xx.
pub struct PagerDutyAlerter {
    client: reqwest::Client,
    service_key: String,
    endpoint: String,
    retry_delay: Duration,
}

impl PagerDutyAlerter {
    pub fn new(service_key: &str) -> Result<Self, Error> {
        if service_key.is_empty() {
            return Err(Error::Sink("pagerduty service key must be set".to_string()));
        }

        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| Error::Sink(format!("pagerduty client: {err}")))?;

        Ok(PagerDutyAlerter {
            client,
            service_key: service_key.to_string(),
            endpoint: EVENTS_URL.to_string(),
            retry_delay: RETRY_DELAY,
        })
    }

    #[cfg(test)]
    fn with_target(mut self, endpoint: &str, retry_delay: Duration) -> Self {
        self.endpoint = endpoint.to_string();
        self.retry_delay = retry_delay;
        self
    }

    fn payload(&self, event: &Event) -> Value {
        let check = &event.check;
        if event.notify_fix {
            json!({
                "service_key": self.service_key,
                "event_type": "resolve",
                "incident_key": check.key,
                "description": format!("{} is back UP.", check.describe()),
                "details": {
                    "checked_at": event.time.to_rfc3339(),
                    "duration": humantime::format_duration(event.duration).to_string(),
                    "was_down_for": humantime::format_duration(check.was_down_for()).to_string(),
                },
            })
        } else {
            let since = check
                .down_since()
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| event.time.to_rfc3339());
            json!({
                "service_key": self.service_key,
                "event_type": "trigger",
                "incident_key": check.key,
                "description": format!("{} is DOWN since {}.", check.describe(), since),
                "details": {
                    "checked_at": event.time.to_rfc3339(),
                    "duration": humantime::format_duration(event.duration).to_string(),
                    "status_code": event.status_code,
                    "was_up_for": humantime::format_duration(check.was_up_for()).to_string(),
                },
            })
        }
    }
}

#[async_trait]
impl Alerter for PagerDutyAlerter {
    async fn alert(&self, event: &Event) {
        let payload = self.payload(event);

        loop {
            match self
                .client
                .post(&self.endpoint)
                .json(&payload)
                .send()
                .await
            {
                Ok(response) if response.status().is_server_error() => {
                    warn!(
                        check = %event.check.key,
                        status = response.status().as_u16(),
                        "pagerduty unavailable, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Ok(response) => {
                    if !response.status().is_success() {
                        error!(
                            check = %event.check.key,
                            status = response.status().as_u16(),
                            "pagerduty rejected the event"
                        );
                    }
                    break;
                }
                Err(err) => {
                    error!(check = %event.check.key, error = %err, "pagerduty delivery failed");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use chrono::Utc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use crate::check::{Check, ProbeConfig};

    fn down_check() -> Arc<Check> {
        let probe = ProbeConfig::http("https://example.com/", BTreeMap::new()).unwrap();
        Arc::new(Check::new(
            "web",
            Duration::from_secs(10),
            true,
            Duration::ZERO,
            true,
            probe,
        ))
    }

    fn outage_event() -> Event {
        let check = down_check();
        let mut event = Event::new(check.clone());
        check.record_down(&mut event);
        event.alert_now = true;
        event
    }

    /// Read one HTTP request, headers plus content-length body.
    async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);

            let text = String::from_utf8_lossy(&data).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let body_len = text[..end]
                    .lines()
                    .find_map(|line| {
                        line.to_lowercase()
                            .strip_prefix("content-length:")
                            .map(str::to_string)
                    })
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if data.len() >= end + 4 + body_len {
                    return text;
                }
            }
        }
        String::from_utf8_lossy(&data).to_string()
    }

    #[test]
    fn outages_trigger_an_incident_keyed_by_check() {
        let alerter = PagerDutyAlerter::new("key123").unwrap();
        let payload = alerter.payload(&outage_event());

        assert_eq!(payload["event_type"], "trigger");
        assert_eq!(payload["incident_key"], "web");
        assert_eq!(payload["service_key"], "key123");
        assert!(payload["description"]
            .as_str()
            .unwrap()
            .contains("is DOWN since"));
    }

    #[test]
    fn recoveries_resolve_the_incident() {
        let check = down_check();
        let t0 = Utc::now();
        let mut down = Event::at(check.clone(), t0);
        check.record_down(&mut down);
        assert!(check.claim_alert(t0));
        let mut up = Event::at(check.clone(), t0 + chrono::Duration::seconds(10));
        check.record_up(&mut up);

        let alerter = PagerDutyAlerter::new("key123").unwrap();
        let payload = alerter.payload(&up);

        assert_eq!(payload["event_type"], "resolve");
        assert_eq!(payload["incident_key"], "web");
    }

    #[test]
    fn empty_service_key_is_rejected() {
        assert!(matches!(
            PagerDutyAlerter::new(""),
            Err(Error::Sink(_))
        ));
    }

    #[tokio::test]
    async fn retries_on_server_errors_until_accepted() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let mut requests = 0;
            for status in [
                "HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                "HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
            ] {
                let (mut stream, _) = listener.accept().await.unwrap();
                let _ = read_request(&mut stream).await;
                stream.write_all(status.as_bytes()).await.unwrap();
                requests += 1;
            }
            requests
        });

        let alerter = PagerDutyAlerter::new("key123")
            .unwrap()
            .with_target(&format!("http://{addr}/"), Duration::from_millis(10));
        alerter.alert(&outage_event()).await;

        assert_eq!(server.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _ = read_request(&mut stream).await;
            stream
                .write_all(
                    b"HTTP/1.1 400 Bad Request\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                )
                .await
                .unwrap();
        });

        let alerter = PagerDutyAlerter::new("key123")
            .unwrap()
            .with_target(&format!("http://{addr}/"), Duration::from_millis(10));
        // Completes without retrying; the single accepted connection is it.
        alerter.alert(&outage_event()).await;
        server.await.unwrap();
    }
}
