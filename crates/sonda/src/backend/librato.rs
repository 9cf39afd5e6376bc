use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use super::Backend;
use crate::error::Error;
use crate::event::Event;

const METRICS_URL: &str = "https://metrics-api.librato.com/v1/metrics";

/// Posts per-check gauges (`.duration` in milliseconds, `.up` as 0/1) to
/// the Librato metrics API. Each event is submitted on its own, so there
/// is nothing buffered to flush at close time.
pub struct LibratoBackend {
    client: reqwest::Client,
    user: String,
    token: String,
    source: String,
    prefix: String,
    endpoint: String,
}

impl LibratoBackend {
    pub fn new(user: &str, token: &str, source: &str, prefix: &str) -> Result<Self, Error> {
        if user.is_empty() || token.is_empty() {
            return Err(Error::Sink(
                "librato user and token must both be set".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| Error::Sink(format!("librato client: {err}")))?;

        Ok(LibratoBackend {
            client,
            user: user.to_string(),
            token: token.to_string(),
            source: source.to_string(),
            prefix: prefix.to_string(),
            endpoint: METRICS_URL.to_string(),
        })
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    fn body(&self, event: &Event) -> serde_json::Value {
        let key = &event.check.key;
        json!({
            "source": self.source,
            "gauges": [
                {
                    "name": format!("{}{}.duration", self.prefix, key),
                    "value": event.duration.as_millis() as u64,
                },
                {
                    "name": format!("{}{}.up", self.prefix, key),
                    "value": event.up as u8,
                },
            ],
        })
    }
}

#[async_trait]
impl Backend for LibratoBackend {
    async fn log(&self, event: &Event) {
        let result = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.user, Some(&self.token))
            .json(&self.body(event))
            .send()
            .await;

        match result {
            Ok(response) if !response.status().is_success() => {
                warn!(
                    check = %event.check.key,
                    status = response.status().as_u16(),
                    "librato rejected metrics"
                );
            }
            Ok(_) => {}
            Err(err) => {
                warn!(check = %event.check.key, error = %err, "librato delivery failed");
            }
        }
    }
}
