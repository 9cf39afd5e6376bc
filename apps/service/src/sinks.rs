//! Builds the backend and alerter pools from the comma-separated sink
//! lists given on the command line; each sink reads its own settings and
//! credentials from the environment.

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use sonda::{
    AlerterPool, BackendPool, LibratoBackend, PagerDutyAlerter, SmtpAlerter, StatsdBackend,
    StdoutBackend, SyslogBackend,
};

fn required(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("{name} environment variable must be set"))
}

fn or_default(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

pub async fn backend_pool(names: &str) -> Result<BackendPool> {
    let mut pool = BackendPool::new();

    for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        match name {
            "stdout" => pool.add(Arc::new(StdoutBackend::new())),

            "statsd" => {
                let host = required("STATSD_HOST")?;
                let port = or_default("STATSD_PORT", "8125")
                    .parse()
                    .context("STATSD_PORT must be a port number")?;
                let prefix = or_default("STATSD_PREFIX", "checks.");
                pool.add(Arc::new(StatsdBackend::new(&host, port, &prefix).await?));
            }

            "librato" => {
                let user = required("LIBRATO_USER")?;
                let token = required("LIBRATO_TOKEN")?;
                let source = or_default("LIBRATO_SOURCE", "sonda");
                let prefix = or_default("LIBRATO_PREFIX", "checks.");
                pool.add(Arc::new(LibratoBackend::new(&user, &token, &source, &prefix)?));
            }

            "syslog" => {
                let address = required("SYSLOG_ADDRESS")?;
                let tag = or_default("SYSLOG_PREFIX", "sonda");
                pool.add(Arc::new(SyslogBackend::new(&address, &tag).await?));
            }

            other => bail!("unknown backend {other:?}"),
        }
    }

    Ok(pool)
}

pub fn alerter_pool(names: &str) -> Result<AlerterPool> {
    let mut pool = AlerterPool::new();

    for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        match name {
            "smtp" => {
                let host = required("SMTP_HOST")?;
                let port = or_default("SMTP_PORT", "25")
                    .parse()
                    .context("SMTP_PORT must be a port number")?;
                let username = env::var("SMTP_USERNAME").ok();
                let password = env::var("SMTP_PASSWORD").ok();
                let from = required("SMTP_FROM")?;
                let recipients = required("SMTP_RECIPIENT")?;
                pool.add(Arc::new(SmtpAlerter::new(
                    &host,
                    port,
                    username.as_deref(),
                    password.as_deref(),
                    &from,
                    &recipients,
                )?));
            }

            "pagerduty" => {
                let service_key = required("PAGERDUTY_SERVICE_KEY")?;
                pool.add(Arc::new(PagerDutyAlerter::new(&service_key)?));
            }

            other => bail!("unknown alerter {other:?}"),
        }
    }

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_lists_build_empty_pools() {
        assert!(backend_pool("").await.unwrap().is_empty());
        assert!(alerter_pool("").unwrap().is_empty());
    }

    #[tokio::test]
    async fn stdout_needs_no_configuration() {
        let pool = backend_pool("stdout").await.unwrap();
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test]
    async fn unknown_names_are_rejected() {
        assert!(backend_pool("carrier-pigeon").await.is_err());
        assert!(alerter_pool("carrier-pigeon").is_err());
    }
}
