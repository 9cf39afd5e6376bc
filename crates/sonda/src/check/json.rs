//! Wire representation of checks: `{key, type, interval, alert,
//! alertDelay, notifyFix, config}` with humantime duration strings.
//! Decoding validates everything up front so no partially-built check
//! ever reaches the scheduler.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Check, ProbeConfig};
use crate::error::Error;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckRepr {
    key: String,
    #[serde(rename = "type")]
    kind: String,
    interval: String,
    #[serde(default)]
    alert: bool,
    #[serde(default = "zero_delay")]
    alert_delay: String,
    #[serde(default)]
    notify_fix: bool,
    #[serde(default)]
    config: Map<String, Value>,
}

fn zero_delay() -> String {
    "0s".to_string()
}

fn parse_duration(value: &str) -> Result<Duration, Error> {
    humantime::parse_duration(value).map_err(|source| Error::BadDuration {
        value: value.to_string(),
        source,
    })
}

fn require_str<'a>(config: &'a Map<String, Value>, key: &'static str) -> Result<&'a str, Error> {
    match config.get(key) {
        None => Err(Error::MissingConfig(key)),
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(Error::BadConfig {
            key,
            reason: format!("expected a string, got {other}"),
        }),
    }
}

fn http_config(config: &Map<String, Value>) -> Result<ProbeConfig, Error> {
    let url = require_str(config, "url")?;

    let mut headers = BTreeMap::new();
    match config.get("headers") {
        None => {}
        Some(Value::Object(map)) => {
            for (name, value) in map {
                let Value::String(value) = value else {
                    return Err(Error::BadConfig {
                        key: "headers",
                        reason: format!("header {name:?} must be a string"),
                    });
                };
                headers.insert(name.clone(), value.clone());
            }
        }
        Some(other) => {
            return Err(Error::BadConfig {
                key: "headers",
                reason: format!("expected an object, got {other}"),
            })
        }
    }

    ProbeConfig::http(url, headers)
}

fn udp_config(config: &Map<String, Value>) -> Result<ProbeConfig, Error> {
    let host = require_str(config, "host")?;
    let port = match config.get("port") {
        None => return Err(Error::MissingConfig("port")),
        Some(Value::Number(n)) => {
            n.as_u64()
                .and_then(|n| u16::try_from(n).ok())
                .ok_or_else(|| Error::BadConfig {
                    key: "port",
                    reason: format!("{n} is not a valid port number"),
                })?
        }
        Some(other) => {
            return Err(Error::BadConfig {
                key: "port",
                reason: format!("expected a number, got {other}"),
            })
        }
    };
    let send = require_str(config, "send")?;
    let receive = require_str(config, "receive")?;

    Ok(ProbeConfig::udp(host, port, send, receive))
}

impl TryFrom<CheckRepr> for Check {
    type Error = Error;

    fn try_from(repr: CheckRepr) -> Result<Self, Error> {
        let interval = parse_duration(&repr.interval)?;
        let alert_delay = parse_duration(&repr.alert_delay)?;

        let probe = match repr.kind.as_str() {
            "http" => http_config(&repr.config)?,
            "udp" => udp_config(&repr.config)?,
            other => return Err(Error::UnknownCheckType(other.to_string())),
        };

        Ok(Check::new(
            &repr.key,
            interval,
            repr.alert,
            alert_delay,
            repr.notify_fix,
            probe,
        ))
    }
}

impl From<&Check> for CheckRepr {
    fn from(check: &Check) -> Self {
        let mut config = Map::new();
        match &check.probe {
            ProbeConfig::Http { url, headers } => {
                config.insert("url".into(), Value::String(url.to_string()));
                if !headers.is_empty() {
                    let map = headers
                        .iter()
                        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                        .collect();
                    config.insert("headers".into(), Value::Object(map));
                }
            }
            ProbeConfig::Udp {
                host,
                port,
                send,
                receive,
            } => {
                config.insert("host".into(), Value::String(host.clone()));
                config.insert("port".into(), Value::from(*port));
                config.insert("send".into(), Value::String(send.clone()));
                config.insert("receive".into(), Value::String(receive.clone()));
            }
        }

        CheckRepr {
            key: check.key.clone(),
            kind: check.probe.kind().to_string(),
            interval: humantime::format_duration(check.interval).to_string(),
            alert: check.alert,
            alert_delay: humantime::format_duration(check.alert_delay).to_string(),
            notify_fix: check.notify_fix,
            config,
        }
    }
}

impl Serialize for Check {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        CheckRepr::from(self).serialize(serializer)
    }
}

/// Decode a single check document.
pub fn parse_check(data: &[u8]) -> Result<Check, Error> {
    let repr: CheckRepr = serde_json::from_slice(data)?;
    repr.try_into()
}

/// Decode an array of check documents. Fails as a whole on the first bad
/// entry; nothing is returned partially.
pub fn parse_checks(data: &[u8]) -> Result<Vec<Check>, Error> {
    let reprs: Vec<CheckRepr> = serde_json::from_slice(data)?;
    reprs.into_iter().map(Check::try_from).collect()
}

/// Encode checks back into the same document format accepted by
/// [`parse_checks`].
pub fn render_checks(checks: &[Arc<Check>]) -> Result<String, Error> {
    let reprs: Vec<CheckRepr> = checks.iter().map(|c| CheckRepr::from(c.as_ref())).collect();
    Ok(serde_json::to_string_pretty(&reprs)?)
}
