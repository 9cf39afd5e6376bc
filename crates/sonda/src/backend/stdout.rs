use async_trait::async_trait;

use super::Backend;
use crate::event::Event;

/// Writes one plain line per probe result to standard output.
pub struct StdoutBackend;

impl StdoutBackend {
    pub fn new() -> Self {
        StdoutBackend
    }
}

impl Default for StdoutBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for StdoutBackend {
    async fn log(&self, event: &Event) {
        println!(
            "{} {} {} {} {}",
            event.time.to_rfc3339(),
            event.check.key,
            if event.up { "UP" } else { "DOWN" },
            event.status_code,
            humantime::format_duration(event.duration),
        );
    }
}
