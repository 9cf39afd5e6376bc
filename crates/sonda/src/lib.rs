//! sonda - concurrent endpoint probing, metrics and alerting engine
//!
//! This library periodically probes configured HTTP and UDP endpoints on
//! independent per-check timers, streams availability metrics to
//! pluggable backends, and raises notifications once a check has been
//! down past its grace period (plus a recovery notice when it returns).

pub mod alert;
pub mod backend;
pub mod check;
pub mod error;
pub mod event;
pub mod orchestrator;
pub mod probe;
pub mod scheduler;
pub mod store;

// Re-export main types
pub use alert::{Alerter, AlerterPool, PagerDutyAlerter, SmtpAlerter};
pub use backend::{Backend, BackendPool, LibratoBackend, StatsdBackend, StdoutBackend, SyslogBackend};
pub use check::{parse_check, parse_checks, render_checks, Check, ProbeConfig};
pub use error::Error;
pub use event::Event;
pub use orchestrator::Orchestrator;
pub use probe::{HttpProber, Probes, Prober, UdpProber};
pub use scheduler::Scheduler;
pub use store::{FileStore, MemoryStore, Store};
