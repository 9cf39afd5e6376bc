//! Metric sinks. Every completed probe produces an event that is
//! broadcast to all configured backends; a sink that fails to deliver
//! logs the failure and moves on, it never disturbs monitoring.

mod librato;
mod statsd;
mod stdout;
mod syslog;

pub use librato::LibratoBackend;
pub use statsd::StatsdBackend;
pub use stdout::StdoutBackend;
pub use syslog::SyslogBackend;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;

use crate::event::Event;

/// A metrics sink. Implementations must tolerate being called from any
/// number of probe tasks at once.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Record one probe result.
    async fn log(&self, event: &Event);

    /// Flush and release resources. Called once at shutdown.
    async fn close(&self) {}
}

/// Broadcasts every event to all member sinks concurrently, so one slow
/// sink never serializes the others.
#[derive(Default)]
pub struct BackendPool {
    backends: Vec<Arc<dyn Backend>>,
}

impl BackendPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, backend: Arc<dyn Backend>) {
        self.backends.push(backend);
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub async fn log(&self, event: &Event) {
        join_all(self.backends.iter().map(|b| b.log(event))).await;
    }

    pub async fn close(&self) {
        join_all(self.backends.iter().map(|b| b.close())).await;
    }
}
