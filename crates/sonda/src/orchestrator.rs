//! Ties the pieces together: consumes due checks from the scheduler,
//! probes each one in its own task, and fans the resulting event out to
//! the sink pools.
//!
//! The loop itself only ever waits for the next due check; a hung probe
//! occupies its own task and cannot stall the stream. There is no cap on
//! in-flight probes.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::info;

use crate::alert::AlerterPool;
use crate::backend::BackendPool;
use crate::check::Check;
use crate::probe::Prober;

pub struct Orchestrator {
    probes: Arc<dyn Prober>,
    backends: Arc<BackendPool>,
    alerters: Arc<AlerterPool>,
}

impl Orchestrator {
    pub fn new(
        probes: Arc<dyn Prober>,
        backends: Arc<BackendPool>,
        alerters: Arc<AlerterPool>,
    ) -> Self {
        Orchestrator {
            probes,
            backends,
            alerters,
        }
    }

    /// Drive the monitoring loop until the due stream ends (i.e. the
    /// scheduler and all of its timers are gone).
    pub async fn run(self, mut due: mpsc::Receiver<Arc<Check>>) {
        info!("monitoring loop started");
        while let Some(check) = due.recv().await {
            let probes = self.probes.clone();
            let backends = self.backends.clone();
            let alerters = self.alerters.clone();
            tokio::spawn(async move {
                handle(&*probes, &backends, &alerters, check).await;
            });
        }
        info!("monitoring loop ended");
    }
}

/// Probe one due check and route the event: metrics always, notification
/// only on the alert edge (claimed atomically, once per outage) or the
/// recovery edge.
async fn handle(
    probes: &dyn Prober,
    backends: &BackendPool,
    alerters: &AlerterPool,
    check: Arc<Check>,
) {
    let mut event = probes.probe(&check).await;

    if check.claim_alert(Utc::now()) {
        event.alert_now = true;
    }

    backends.log(&event).await;
    if event.alert_now || event.notify_fix {
        alerters.alert(&event).await;
    }
}
