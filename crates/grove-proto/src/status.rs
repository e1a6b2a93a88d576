// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Structured service failures.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Status category of a failed service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCategory {
    /// Request rate too large; retry later.
    Throttled,
    /// The service or the client gave up waiting.
    Timeout,
    /// The connection failed before an answer arrived.
    Transport,
    /// The addressed resource does not exist.
    NotFound,
    /// Malformed or unsupported query.
    BadRequest,
    /// Authentication or authorization failure.
    Unauthorized,
    /// The resource already exists or was changed concurrently.
    Conflict,
    /// Unclassified server-side failure.
    Internal,
}

impl StatusCategory {
    /// Whether a request failing with this category may be retried.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Throttled | Self::Timeout | Self::Transport)
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Throttled => "throttled",
            Self::Timeout => "timeout",
            Self::Transport => "transport",
            Self::NotFound => "not-found",
            Self::BadRequest => "bad-request",
            Self::Unauthorized => "unauthorized",
            Self::Conflict => "conflict",
            Self::Internal => "internal",
        })
    }
}

/// A failed call to the backing service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{category}: {message}")]
pub struct ServiceError {
    /// Category deciding retry eligibility.
    pub category: StatusCategory,
    /// Message reported by the service (or the transport).
    pub message: String,
    /// Minimum wait the service asked for before retrying.
    pub retry_after: Option<Duration>,
}

impl ServiceError {
    /// Build an error without a retry hint.
    pub fn new(category: StatusCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Attach a retry hint.
    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }

    /// Shorthand for a throttled error.
    pub fn throttled(message: impl Into<String>) -> Self {
        Self::new(StatusCategory::Throttled, message)
    }

    /// Shorthand for a timeout.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(StatusCategory::Timeout, message)
    }

    /// Shorthand for a transport failure.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(StatusCategory::Transport, message)
    }

    /// Whether the failed request may be retried.
    pub fn is_transient(&self) -> bool {
        self.category.is_transient()
    }

    /// Whether the connection that produced this error must be discarded.
    pub fn poisons_connection(&self) -> bool {
        matches!(self.category, StatusCategory::Transport | StatusCategory::Timeout)
    }
}
