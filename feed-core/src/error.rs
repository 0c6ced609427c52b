//! Error types for the acquisition layer

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::capability::Capability;

/// Failure of a single source for a single fetch
///
/// These never cross the aggregator boundary on their own; the aggregator
/// records them and moves on to the next source.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Connect failure, request timeout or non-success HTTP status
    #[error("network failure: {0}")]
    Network(String),

    /// Response shape changed or could not be decoded
    #[error("parse failure: {0}")]
    Parse(String),

    /// Local limiter refused before the deadline, or upstream answered 429
    #[error("rate limit exceeded for {source_name}")]
    RateLimited {
        source_name: String,
        retry_after: Option<Duration>,
    },

    /// The adapter does not implement this capability
    #[error("capability {0} not supported")]
    Unsupported(Capability),

    /// Request could not be built from the given parameters
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
}

impl FetchError {
    pub fn network(msg: impl Into<String>) -> Self {
        FetchError::Network(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        FetchError::Parse(msg.into())
    }

    pub fn rate_limited(source_name: impl Into<String>, retry_after: Option<Duration>) -> Self {
        FetchError::RateLimited {
            source_name: source_name.into(),
            retry_after,
        }
    }

    pub fn invalid_params(msg: impl Into<String>) -> Self {
        FetchError::InvalidParams(msg.into())
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Network(_) => FailureKind::NetworkFailure,
            FetchError::Parse(_) => FailureKind::ParseFailure,
            FetchError::RateLimited { .. } => FailureKind::RateLimitExceeded,
            FetchError::Unsupported(_) | FetchError::InvalidParams(_) => FailureKind::Unsupported,
        }
    }
}

/// Classification of a per-source failure, as reported to operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NetworkFailure,
    ParseFailure,
    RateLimitExceeded,
    Unsupported,
    /// Source answered with zero records and the empty-result policy skipped it
    EmptyResult,
    /// Source was still in flight when the caller's deadline passed
    Timeout,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::NetworkFailure => "network failure",
            FailureKind::ParseFailure => "parse failure",
            FailureKind::RateLimitExceeded => "rate limit exceeded",
            FailureKind::Unsupported => "unsupported",
            FailureKind::EmptyResult => "empty result",
            FailureKind::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// One entry of the per-source diagnostics carried by [`AcquisitionError`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub source: String,
    pub kind: FailureKind,
    pub message: String,
}

impl SourceFailure {
    pub fn from_error(source: impl Into<String>, error: &FetchError) -> Self {
        Self {
            source: source.into(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    pub fn empty(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            kind: FailureKind::EmptyResult,
            message: "returned zero records".to_string(),
        }
    }

    pub fn timed_out(source: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            source: source.into(),
            kind: FailureKind::Timeout,
            message: format!("timeout: no answer before the deadline ({:?})", elapsed),
        }
    }
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.message)
    }
}

fn describe(failures: &[SourceFailure], when_empty: &str) -> String {
    if failures.is_empty() {
        return when_empty.to_string();
    }
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that surface to callers of the acquisition layer
#[derive(Error, Debug, Clone)]
pub enum AcquisitionError {
    /// Every source for the capability failed
    #[error("all sources exhausted for {capability} [{}]", describe(.failures, "no source configured"))]
    SourceExhausted {
        capability: Capability,
        failures: Vec<SourceFailure>,
    },

    /// The caller's deadline passed before any source succeeded
    #[error("deadline exceeded for {capability} after {elapsed:?} [{}]", describe(.failures, "no source attempted"))]
    Timeout {
        capability: Capability,
        elapsed: Duration,
        failures: Vec<SourceFailure>,
    },
}

impl AcquisitionError {
    pub fn capability(&self) -> Capability {
        match self {
            AcquisitionError::SourceExhausted { capability, .. }
            | AcquisitionError::Timeout { capability, .. } => *capability,
        }
    }

    /// Per-source reasons collected before the error was raised
    pub fn failures(&self) -> &[SourceFailure] {
        match self {
            AcquisitionError::SourceExhausted { failures, .. }
            | AcquisitionError::Timeout { failures, .. } => failures,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, AcquisitionError::Timeout { .. })
    }
}

/// Result type alias for acquisition operations
pub type AcquisitionResult<T> = Result<T, AcquisitionError>;

/// Cache misuse
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache key must not be empty")]
    EmptyKey,

    #[error("ttl must be greater than zero")]
    ZeroTtl,

    #[error("max_size must be greater than zero")]
    ZeroCapacity,
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid JSON in {field}: {error}")]
    InvalidJson { field: String, error: String },

    #[error("Unknown source kind '{kind}' for source {source_name}")]
    UnknownKind { source_name: String, kind: String },

    #[error("Invalid endpoint for {source_name}/{capability}: {message}")]
    InvalidEndpoint {
        source_name: String,
        capability: Capability,
        message: String,
    },

    #[error("Invalid base URL for {source_name}: {message}")]
    InvalidBaseUrl { source_name: String, message: String },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("IO error reading {path}: {error}")]
    Io { path: String, error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_message_lists_every_source() {
        let err = AcquisitionError::SourceExhausted {
            capability: Capability::FetchUpcoming,
            failures: vec![
                SourceFailure::from_error("vlr-api", &FetchError::network("connection refused")),
                SourceFailure::from_error("vlr-scrape", &FetchError::parse("no matches element")),
            ],
        };

        let msg = err.to_string();
        assert!(msg.contains("upcoming"), "{}", msg);
        assert!(msg.contains("vlr-api: network failure: connection refused"), "{}", msg);
        assert!(msg.contains("vlr-scrape: parse failure: no matches element"), "{}", msg);
        assert_eq!(err.failures().len(), 2);
    }

    #[test]
    fn test_exhausted_without_sources() {
        let err = AcquisitionError::SourceExhausted {
            capability: Capability::FetchEvents,
            failures: Vec::new(),
        };
        assert!(err.to_string().contains("no source configured"));
    }

    #[test]
    fn test_timeout_names_the_source_in_flight() {
        let err = AcquisitionError::Timeout {
            capability: Capability::FetchResults,
            elapsed: Duration::from_secs(2),
            failures: vec![
                SourceFailure::from_error("vlr-api", &FetchError::network("connection reset")),
                SourceFailure::timed_out("vlr-scrape", Duration::from_secs(2)),
            ],
        };

        let msg = err.to_string();
        assert!(msg.contains("vlr-scrape: timeout"), "{}", msg);
        assert!(!msg.contains("no source configured"), "{}", msg);
        assert_eq!(err.failures()[1].kind, FailureKind::Timeout);
        assert_eq!(FailureKind::Timeout.to_string(), "timeout");
    }

    #[test]
    fn test_timeout_before_any_attempt() {
        let err = AcquisitionError::Timeout {
            capability: Capability::FetchResults,
            elapsed: Duration::ZERO,
            failures: Vec::new(),
        };
        let msg = err.to_string();
        assert!(msg.contains("no source attempted"), "{}", msg);
        assert!(!msg.contains("no source configured"), "{}", msg);
    }

    #[test]
    fn test_failure_kind_classification() {
        assert_eq!(FetchError::network("x").kind(), FailureKind::NetworkFailure);
        assert_eq!(FetchError::parse("x").kind(), FailureKind::ParseFailure);
        assert_eq!(
            FetchError::rate_limited("a", None).kind(),
            FailureKind::RateLimitExceeded
        );
        assert_eq!(
            FetchError::Unsupported(Capability::FetchRankings).kind(),
            FailureKind::Unsupported
        );
        assert_eq!(SourceFailure::empty("a").kind, FailureKind::EmptyResult);
    }
}
