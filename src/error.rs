use std::fmt::{self, Display};
use std::time::Duration;

use thiserror::Error;

use crate::http::request::StatusSet;

/// Transport-level failure category, derived from the underlying client error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Dns,
    Connect,
    Tls,
    Read,
}

impl Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportKind::Dns => "DNS_ERROR",
            TransportKind::Connect => "CONNECT_ERROR",
            TransportKind::Tls => "TLS_ERROR",
            TransportKind::Read => "READ_ERROR",
        };
        write!(f, "{label}")
    }
}

/// Failures of the harness itself, as opposed to contract violations.
#[derive(Debug, Clone, Error)]
pub enum HarnessError {
    #[error("authentication rejected with status {status}: {reason}")]
    AuthFailure { status: u16, reason: String },

    #[error("{request} requires a credential but the session has none")]
    NotAuthenticated { request: String },

    #[error("{request} failed after {attempts} attempt(s) [{kind}]: {message}")]
    NetworkFailure {
        request: String,
        kind: TransportKind,
        attempts: u32,
        message: String,
    },

    #[error("{request} did not complete within {}ms; remote outcome unknown", .limit.as_millis())]
    TimeoutFailure { request: String, limit: Duration },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{request} returned a body that could not be decoded: {message}")]
    Decode { request: String, message: String },
}

impl HarnessError {
    pub fn is_network_failure(&self) -> bool {
        matches!(self, HarnessError::NetworkFailure { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, HarnessError::TimeoutFailure { .. })
    }
}

/// A response that was observed but does not satisfy the contract.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssertionFailure {
    #[error("{request} returned {status}, expected one of {allowed}; body: {body}")]
    UnexpectedStatus {
        request: String,
        status: u16,
        allowed: StatusSet,
        body: String,
    },

    #[error("{request} body mismatch at `{path}`: expected {expected}, got {actual}")]
    BodyMismatch {
        request: String,
        path: String,
        expected: String,
        actual: String,
    },

    #[error("{request} took {}ms, bound is {}ms", .elapsed.as_millis(), .bound.as_millis())]
    LatencyExceeded {
        request: String,
        elapsed: Duration,
        bound: Duration,
    },

    #[error("{request}: percentile {percentile} is outside 0..=100")]
    UnknownPercentile { request: String, percentile: u8 },
}

/// One entry in a [`FailureReport`], keyed by the position of the response in its batch.
#[derive(Debug, Clone)]
pub struct IndexedFailure<E> {
    pub index: usize,
    pub failure: E,
}

/// Every failure of a batch, in input order. Batches never short-circuit.
#[derive(Debug, Clone)]
pub struct FailureReport<E> {
    pub total: usize,
    pub failures: Vec<IndexedFailure<E>>,
}

impl<E> FailureReport<E> {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            failures: Vec::new(),
        }
    }

    pub fn push(&mut self, index: usize, failure: E) {
        self.failures.push(IndexedFailure { index, failure });
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn indices(&self) -> Vec<usize> {
        self.failures.iter().map(|entry| entry.index).collect()
    }

    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl<E: Display> Display for FailureReport<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {} responses failed", self.failures.len(), self.total)?;
        for entry in &self.failures {
            write!(f, "\n  [{}] {}", entry.index, entry.failure)?;
        }
        Ok(())
    }
}

impl<E: fmt::Debug + Display> std::error::Error for FailureReport<E> {}
