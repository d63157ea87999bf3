// src/error.rs
//! Error types for the pool's public API.

use std::fmt;

/// Errors the pool core can surface.
///
/// `HandlerFailure` carries whatever error escaped [`crate::ResourceHandler::create`]
/// unchanged; the pool has already reverted its own accounting by the time this
/// variant is constructed (see [`crate::Pool::acquire`]).
#[derive(Debug)]
pub enum PoolError {
    /// Negative/invalid sizes or indexes, a requested size above `total_capacity`,
    /// an `adjust_allocation_size` hook returning less than its input, or a
    /// resource whose capacity exceeds its routed bucket.
    InvalidArgument(String),
    /// Acquire on a closed pool, or acquire interrupted by a concurrent close.
    IllegalState(String),
    /// A bounded wait elapsed before enough capacity was reserved.
    Timeout,
    /// The calling thread's blocked acquire was cancelled via a [`crate::CancelToken`].
    Interrupted,
    /// `ResourceHandler::create` failed; the pool's accounting has already been
    /// reverted by the caller.
    HandlerFailure(Box<dyn std::error::Error + Send + Sync>),
}

impl PoolError {
    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub(crate) fn illegal_state(msg: impl Into<String>) -> Self {
        Self::IllegalState(msg.into())
    }

    pub(crate) fn handler_failure(
        err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::HandlerFailure(err.into())
    }
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::IllegalState(msg) => write!(f, "illegal state: {msg}"),
            Self::Timeout => write!(f, "timed out waiting for capacity"),
            Self::Interrupted => write!(f, "acquire was cancelled"),
            Self::HandlerFailure(err) => write!(f, "resource handler failed: {err}"),
        }
    }
}

impl std::error::Error for PoolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::HandlerFailure(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// Convert a [`PoolError`] into `std::io::Error`, mirroring how client code
/// commonly bridges library errors into I/O-flavored call sites.
impl From<PoolError> for std::io::Error {
    fn from(err: PoolError) -> Self {
        use std::io::ErrorKind;
        match err {
            PoolError::Timeout => std::io::Error::new(ErrorKind::TimedOut, err.to_string()),
            PoolError::Interrupted => {
                std::io::Error::new(ErrorKind::Interrupted, err.to_string())
            }
            PoolError::InvalidArgument(_) => {
                std::io::Error::new(ErrorKind::InvalidInput, err.to_string())
            }
            other => std::io::Error::other(other.to_string()),
        }
    }
}

/// Result type alias for pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_distinct() {
        let errs = vec![
            PoolError::invalid_argument("bad size"),
            PoolError::illegal_state("closed"),
            PoolError::Timeout,
            PoolError::Interrupted,
            PoolError::handler_failure(std::io::Error::other("disk full")),
        ];
        let rendered: Vec<String> = errs.iter().map(|e| e.to_string()).collect();
        assert!(rendered[0].contains("bad size"));
        assert!(rendered[1].contains("closed"));
        assert_eq!(rendered[2], "timed out waiting for capacity");
        assert_eq!(rendered[3], "acquire was cancelled");
        assert!(rendered[4].contains("disk full"));
    }

    #[test]
    fn timeout_converts_to_io_error_kind() {
        let io_err: std::io::Error = PoolError::Timeout.into();
        assert_eq!(io_err.kind(), std::io::ErrorKind::TimedOut);
    }

    #[test]
    fn handler_failure_exposes_source() {
        use std::error::Error;
        let err = PoolError::handler_failure(std::io::Error::other("boom"));
        assert!(err.source().is_some());
    }
}
