//! The check model: what to probe, how often, and the up/down state machine
//! driving alert and recovery decisions.

mod json;

pub use json::{parse_check, parse_checks, render_checks};

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use url::Url;

use crate::error::Error;
use crate::event::Event;

/// Probe-specific parameters, resolved and validated at construction time.
#[derive(Debug, Clone)]
pub enum ProbeConfig {
    Http {
        url: Url,
        /// Extra request headers, sent verbatim on every probe.
        headers: BTreeMap<String, String>,
    },
    Udp {
        host: String,
        port: u16,
        /// Payload sent to the endpoint.
        send: String,
        /// Exact datagram expected back.
        receive: String,
    },
}

impl ProbeConfig {
    /// HTTP probe configuration. Fails on an unparsable URL.
    pub fn http(url: &str, headers: BTreeMap<String, String>) -> Result<Self, Error> {
        let url = Url::parse(url).map_err(|source| Error::BadUrl {
            value: url.to_string(),
            source,
        })?;
        Ok(ProbeConfig::Http { url, headers })
    }

    /// UDP echo-style probe configuration.
    pub fn udp(host: &str, port: u16, send: &str, receive: &str) -> Self {
        ProbeConfig::Udp {
            host: host.to_string(),
            port,
            send: send.to_string(),
            receive: receive.to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ProbeConfig::Http { .. } => "http",
            ProbeConfig::Udp { .. } => "udp",
        }
    }
}

/// Mutable availability state of a check. Both timestamps being `None`
/// means the check was never probed and counts as up for transition
/// purposes, so the first down result always records a transition.
#[derive(Debug, Default, Clone)]
struct State {
    up_since: Option<DateTime<Utc>>,
    down_since: Option<DateTime<Utc>>,
    was_up_for: Duration,
    was_down_for: Duration,
    alerted: bool,
    /// Latched on a down→up transition of an alerted outage; cleared by
    /// the next transition call in either direction.
    recovered: bool,
}

/// One monitored target: schedule, alert policy, probe parameters and the
/// runtime up/down state mutated by completed probes.
///
/// Checks are shared as `Arc<Check>` between the scheduler, the store and
/// any number of in-flight probes; the state sits behind its own mutex so
/// overlapping probes of the same key apply their transitions atomically,
/// in completion order.
#[derive(Debug)]
pub struct Check {
    pub key: String,
    pub interval: Duration,
    pub alert: bool,
    pub alert_delay: Duration,
    pub notify_fix: bool,
    pub probe: ProbeConfig,
    state: Mutex<State>,
}

impl Check {
    pub fn new(
        key: &str,
        interval: Duration,
        alert: bool,
        alert_delay: Duration,
        notify_fix: bool,
        probe: ProbeConfig,
    ) -> Self {
        Check {
            key: key.to_string(),
            interval,
            alert,
            alert_delay,
            notify_fix,
            probe,
            state: Mutex::new(State::default()),
        }
    }

    /// Record an up result. Sets `up_since` on the first up observation;
    /// on a down→up transition captures `was_down_for`, clears the outage
    /// and flags recovery on the event if the outage had been alerted and
    /// the check asks for fix notifications.
    pub fn record_up(&self, event: &mut Event) {
        event.up = true;

        let mut state = self.state.lock().unwrap();
        if state.up_since.is_none() {
            state.up_since = Some(event.time);
        }

        if let Some(down_since) = state.down_since.take() {
            state.up_since = Some(event.time);
            state.was_down_for = (event.time - down_since).to_std().unwrap_or_default();
            state.recovered = state.alerted;
            if self.notify_fix && state.alerted {
                event.notify_fix = true;
            }
            state.alerted = false;
        } else {
            state.recovered = false;
        }
    }

    /// Record a down result. Sets `down_since` on the first down
    /// observation; on an up→down transition captures `was_up_for`.
    /// Alert arming is left to the orchestrator, which re-evaluates the
    /// delay gate on every subsequent result.
    pub fn record_down(&self, event: &mut Event) {
        event.up = false;

        let mut state = self.state.lock().unwrap();
        if state.down_since.is_none() {
            state.down_since = Some(event.time);
        }

        if let Some(up_since) = state.up_since.take() {
            state.down_since = Some(event.time);
            state.was_up_for = (event.time - up_since).to_std().unwrap_or_default();
        }
        state.recovered = false;
    }

    /// True once the check is down, alerting is enabled, no alert has been
    /// dispatched for this outage yet and the grace period has elapsed.
    pub fn should_alert(&self, now: DateTime<Utc>) -> bool {
        let state = self.state.lock().unwrap();
        self.eligible(&state, now)
    }

    /// Test-and-set form of [`should_alert`](Check::should_alert): when the
    /// predicate holds, marks the outage alerted and returns true for
    /// exactly one caller. This is what makes "one alert per outage" hold
    /// when probes of the same check overlap.
    pub fn claim_alert(&self, now: DateTime<Utc>) -> bool {
        let mut state = self.state.lock().unwrap();
        if self.eligible(&state, now) {
            state.alerted = true;
            true
        } else {
            false
        }
    }

    fn eligible(&self, state: &State, now: DateTime<Utc>) -> bool {
        if !self.alert || state.alerted {
            return false;
        }
        let Some(down_since) = state.down_since else {
            return false;
        };
        // An alert delay beyond chrono's range can never elapse.
        let Ok(delay) = chrono::Duration::from_std(self.alert_delay) else {
            return false;
        };
        match down_since.checked_add_signed(delay) {
            Some(due) => now >= due,
            None => false,
        }
    }

    /// Recovery signal derived from persistent state instead of the
    /// transient event flag: true only immediately after a down→up
    /// transition of an outage that had been alerted.
    pub fn should_notify_fix(&self) -> bool {
        let state = self.state.lock().unwrap();
        self.notify_fix && state.recovered && !state.was_down_for.is_zero()
    }

    pub fn up_since(&self) -> Option<DateTime<Utc>> {
        self.state.lock().unwrap().up_since
    }

    pub fn down_since(&self) -> Option<DateTime<Utc>> {
        self.state.lock().unwrap().down_since
    }

    pub fn was_up_for(&self) -> Duration {
        self.state.lock().unwrap().was_up_for
    }

    pub fn was_down_for(&self) -> Duration {
        self.state.lock().unwrap().was_down_for
    }

    pub fn alerted(&self) -> bool {
        self.state.lock().unwrap().alerted
    }

    /// Human-readable target description used in alert messages.
    pub fn describe(&self) -> String {
        match &self.probe {
            ProbeConfig::Http { url, .. } => format!("{} ({})", self.key, url),
            ProbeConfig::Udp { host, port, .. } => {
                format!("{} (udp {}:{})", self.key, host, port)
            }
        }
    }
}
