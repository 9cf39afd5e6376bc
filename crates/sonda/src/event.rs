use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::check::Check;

/// Outcome of a single probe attempt against a [`Check`].
///
/// Events are built by the probe layer, consumed synchronously by the sink
/// pools and then dropped; they are never persisted. `alert_now` and
/// `notify_fix` are edge flags: they are only ever true on the one event
/// marking a state transition, not on every event in the same state.
#[derive(Debug, Clone)]
pub struct Event {
    /// The check this attempt was made for.
    pub check: Arc<Check>,
    /// When the probe started.
    pub time: DateTime<Utc>,
    /// Wall-clock time the attempt took, including any timeout wait.
    pub duration: Duration,
    /// Protocol status code. HTTP status for HTTP probes; 0 for UDP probes
    /// and for any transport failure or timeout.
    pub status_code: u16,
    /// Verdict of this attempt.
    pub up: bool,
    /// The orchestrator decided an alert must be dispatched for this event.
    pub alert_now: bool,
    /// This event marks recovery of an outage that had been alerted.
    pub notify_fix: bool,
}

impl Event {
    /// New event stamped with the current time.
    pub fn new(check: Arc<Check>) -> Self {
        Self::at(check, Utc::now())
    }

    /// New event with an explicit start time.
    pub fn at(check: Arc<Check>, time: DateTime<Utc>) -> Self {
        Event {
            check,
            time,
            duration: Duration::ZERO,
            status_code: 0,
            up: false,
            alert_now: false,
            notify_fix: false,
        }
    }
}
