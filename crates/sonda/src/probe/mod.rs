//! Probe layer: one bounded network test per invocation.
//!
//! A probe never fails and never outlives its deadline. Whatever happens
//! on the wire (refused connection, bad response, timeout) is folded into
//! an [`Event`] with `up = false`; the only observable difference is the
//! status code and duration. Every invocation also applies the resulting
//! transition to the check's state.

mod http;
mod udp;

pub use http::HttpProber;
pub use udp::UdpProber;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::check::{Check, ProbeConfig};
use crate::error::Error;
use crate::event::Event;

/// A protocol-specific probe routine.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Run one test for `check`, bounded by the prober's timeout.
    async fn probe(&self, check: &Arc<Check>) -> Event;
}

/// Dispatches each check to the prober matching its probe configuration.
pub struct Probes {
    http: HttpProber,
    udp: UdpProber,
}

impl Probes {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, Error> {
        Ok(Probes {
            http: HttpProber::new(user_agent, timeout)?,
            udp: UdpProber::new(timeout),
        })
    }
}

#[async_trait]
impl Prober for Probes {
    async fn probe(&self, check: &Arc<Check>) -> Event {
        match check.probe {
            ProbeConfig::Http { .. } => self.http.probe(check).await,
            ProbeConfig::Udp { .. } => self.udp.probe(check).await,
        }
    }
}
