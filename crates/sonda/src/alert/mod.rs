//! Notification sinks. The orchestrator forwards an event here exactly
//! once per outage when its grace period elapses, and once more on
//! recovery when the check asks for fix notifications (`notify_fix` set
//! on the event distinguishes the two).

mod pagerduty;
mod smtp;

pub use pagerduty::PagerDutyAlerter;
pub use smtp::SmtpAlerter;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;

use crate::event::Event;

/// A notification sink. Implementations own their delivery policy,
/// including retries, and must be callable from many probe tasks at once.
#[async_trait]
pub trait Alerter: Send + Sync {
    async fn alert(&self, event: &Event);
}

/// Broadcasts an alertable event to all member sinks concurrently.
#[derive(Default)]
pub struct AlerterPool {
    alerters: Vec<Arc<dyn Alerter>>,
}

impl AlerterPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, alerter: Arc<dyn Alerter>) {
        self.alerters.push(alerter);
    }

    pub fn len(&self) -> usize {
        self.alerters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerters.is_empty()
    }

    pub async fn alert(&self, event: &Event) {
        join_all(self.alerters.iter().map(|a| a.alert(event))).await;
    }
}
