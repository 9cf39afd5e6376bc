use thiserror::Error;

/// Errors surfaced while building checks or sinks from configuration.
///
/// Probe failures are never represented here: an unreachable endpoint is a
/// normal monitoring outcome and folds into a down [`Event`](crate::Event).
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid duration {value:?}: {source}")]
    BadDuration {
        value: String,
        #[source]
        source: humantime::DurationError,
    },

    #[error("invalid url {value:?}: {source}")]
    BadUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unknown check type {0:?}")]
    UnknownCheckType(String),

    #[error("missing config key {0:?}")]
    MissingConfig(&'static str),

    #[error("config key {key:?}: {reason}")]
    BadConfig { key: &'static str, reason: String },

    #[error("malformed check document: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("sink setup failed: {0}")]
    Sink(String),
}
