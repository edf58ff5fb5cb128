//! Failure classification.
//!
//! A closed taxonomy over [`Error`] variants, decided at the boundary so the
//! retry core never inspects concrete error sources. Used by both
//! [`super::retry::RetryPolicy`] and callers deciding fail-fast behavior.

use crate::Error;

/// Retry-relevant failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Transient condition; retrying may succeed.
    Transient,
    /// Retrying cannot change the outcome; fail fast.
    Permanent,
    /// Unclassified; treated as non-retryable to avoid retry storms.
    Unknown,
}

/// Map an error to its failure class.
pub fn classify(error: &Error) -> FailureClass {
    match error {
        // Transient remote conditions - a later attempt may succeed.
        Error::Timeout { .. }
        | Error::Network { .. }
        | Error::RateLimited { .. }
        | Error::Unavailable { .. } => FailureClass::Transient,

        // Caller or credential mistakes - retrying changes nothing.
        Error::Validation { .. }
        | Error::Configuration { .. }
        | Error::Authentication { .. }
        | Error::Serialization(_) => FailureClass::Permanent,

        // The breaker's recovery timeout, not a retry loop, governs when the
        // dependency is probed again.
        Error::CircuitOpen { .. } => FailureClass::Permanent,

        // Unknown/other - conservative: don't retry.
        Error::Infrastructure { .. } | Error::Io(_) | Error::Unknown { .. } => {
            FailureClass::Unknown
        }
    }
}

/// True when a retry is worth attempting for this error.
pub fn is_retryable(error: &Error) -> bool {
    classify(error) == FailureClass::Transient
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_retryable() {
        for err in [
            Error::timeout("t"),
            Error::network("connection refused"),
            Error::rate_limited("429"),
            Error::unavailable("503"),
        ] {
            assert_eq!(classify(&err), FailureClass::Transient, "{err}");
            assert!(is_retryable(&err));
        }
    }

    #[test]
    fn test_permanent_errors_fail_fast() {
        for err in [
            Error::validation("empty text"),
            Error::configuration("bad ttl"),
            Error::authentication("bad token"),
        ] {
            assert_eq!(classify(&err), FailureClass::Permanent, "{err}");
            assert!(!is_retryable(&err));
        }
    }

    #[test]
    fn test_circuit_open_not_retried() {
        let err = Error::CircuitOpen {
            breaker: "redis".into(),
            retry_after_ms: None,
        };
        assert_eq!(classify(&err), FailureClass::Permanent);
        assert!(!is_retryable(&err));
    }

    #[test]
    fn test_unknown_defaults_to_non_retryable() {
        for err in [
            Error::infrastructure("unexpected"),
            Error::Io(std::io::Error::other("disk")),
            Error::unknown_with_context("?", crate::ErrorContext::new()),
        ] {
            assert_eq!(classify(&err), FailureClass::Unknown, "{err}");
            assert!(!is_retryable(&err));
        }
    }
}
