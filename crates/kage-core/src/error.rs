//! Error types for control plane operations.
//!
//! This module provides [`Error`], the closed error taxonomy every
//! component reports through, and conversions to [`tonic::Status`] for
//! gRPC responses and to HTTP status codes for the admin surface.

use std::fmt;

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// The closed set of error kinds.
///
/// Every [`Error`] maps to exactly one kind; callers that need to branch
/// on failure mode match on [`Error::kind`] instead of the display text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The addressed object does not exist.
    NotFound,
    /// A concurrent writer changed the object underneath us.
    Conflict,
    /// The object being created is already present.
    AlreadyExists,
    /// The input failed validation or could not be parsed.
    Invalid,
    /// The requested kind or operation is outside the supported set.
    Unsupported,
    /// An operation exceeded its deadline.
    Timeout,
    /// Multiple failures from a fan-out operation.
    Batch,
    /// Everything else.
    Internal,
}

/// Error type covering all failure modes in the control plane.
///
/// # Example
///
/// ```rust
/// use kage_core::{Error, ErrorKind};
///
/// fn validate_percentage(pct: u32) -> Result<(), Error> {
///     if pct > 100 {
///         return Err(Error::invalid(format!(
///             "routing percentage {pct} exceeds 100"
///         )));
///     }
///     Ok(())
/// }
///
/// assert_eq!(validate_percentage(130).unwrap_err().kind(), ErrorKind::Invalid);
/// ```
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The addressed object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A concurrent writer changed the object underneath us.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The object being created is already present.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The input failed validation or could not be parsed.
    #[error("invalid: {0}")]
    Invalid(String),

    /// The requested kind or operation is outside the supported set.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// An operation exceeded its deadline.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Multiple failures gathered from a fan-out operation.
    #[error("{0}")]
    Batch(BatchError),

    /// Unexpected internal error.
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
        /// Optional underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// The kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::Invalid(_) => ErrorKind::Invalid,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Batch(_) => ErrorKind::Batch,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Create an invalid-input error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    /// Create an internal error without an underlying source.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Create an internal error wrapping an underlying error.
    pub fn internal_from<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// HTTP status code for the admin surface.
    ///
    /// `NotFound` maps to 404, validation-shaped kinds to 400, `Timeout`
    /// to 408 and everything else to 500.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self.kind() {
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict
            | ErrorKind::AlreadyExists
            | ErrorKind::Invalid
            | ErrorKind::Unsupported => 400,
            ErrorKind::Timeout => 408,
            ErrorKind::Batch | ErrorKind::Internal => 500,
        }
    }
}

/// A collection of errors produced by a fan-out operation.
///
/// Consumers inspect [`BatchError::len`] to decide whether the operation
/// partially succeeded.
#[derive(Debug, Default)]
pub struct BatchError {
    errors: Vec<Error>,
}

impl BatchError {
    /// Create an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one failure.
    pub fn push(&mut self, err: Error) {
        self.errors.push(err);
    }

    /// Number of recorded failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// True when nothing failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// The recorded failures.
    #[must_use]
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// `Ok(())` when empty, otherwise the batch wrapped in [`Error::Batch`].
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Batch(self))
        }
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} errors: [", self.errors.len())?;
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{err}")?;
        }
        write!(f, "]")
    }
}

/// Map Kubernetes API errors onto the closed taxonomy.
impl From<kube::Error> for Error {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ref ae) => match ae.code {
                404 => Self::NotFound(ae.message.clone()),
                408 => Self::Timeout(ae.message.clone()),
                409 if ae.reason == "AlreadyExists" => Self::AlreadyExists(ae.message.clone()),
                409 => Self::Conflict(ae.message.clone()),
                400 | 422 => Self::Invalid(ae.message.clone()),
                _ => Self::internal_from("kubernetes api error", err),
            },
            _ => Self::internal_from("kubernetes client error", err),
        }
    }
}

/// Convert to tonic::Status for gRPC responses.
impl From<Error> for tonic::Status {
    fn from(err: Error) -> Self {
        match err.kind() {
            ErrorKind::NotFound => tonic::Status::not_found(err.to_string()),
            ErrorKind::Conflict => tonic::Status::aborted(err.to_string()),
            ErrorKind::AlreadyExists => tonic::Status::already_exists(err.to_string()),
            ErrorKind::Invalid | ErrorKind::Unsupported => {
                tonic::Status::invalid_argument(err.to_string())
            }
            ErrorKind::Timeout => tonic::Status::deadline_exceeded(err.to_string()),
            ErrorKind::Batch | ErrorKind::Internal => tonic::Status::internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotFound("envoy state n1".to_string());
        assert_eq!(err.to_string(), "not found: envoy state n1");

        let err = Error::invalid("expected bool but got \"1\"");
        assert_eq!(err.to_string(), "invalid: expected bool but got \"1\"");
    }

    #[test]
    fn test_kind_accessor() {
        assert_eq!(
            Error::AlreadyExists("c".into()).kind(),
            ErrorKind::AlreadyExists
        );
        assert_eq!(Error::internal("boom").kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(Error::NotFound("x".into()).http_status(), 404);
        assert_eq!(Error::AlreadyExists("x".into()).http_status(), 400);
        assert_eq!(Error::invalid("x").http_status(), 400);
        assert_eq!(Error::Unsupported("x".into()).http_status(), 400);
        assert_eq!(Error::Conflict("x".into()).http_status(), 400);
        assert_eq!(Error::Timeout("x".into()).http_status(), 408);
        assert_eq!(Error::internal("x").http_status(), 500);
    }

    #[test]
    fn test_batch_error() {
        let mut batch = BatchError::new();
        assert!(batch.into_result().is_ok());

        let mut batch = BatchError::new();
        batch.push(Error::NotFound("a".into()));
        batch.push(Error::Timeout("b".into()));
        assert_eq!(batch.len(), 2);

        let err = batch.into_result().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Batch);
        let msg = err.to_string();
        assert!(msg.contains("2 errors"));
        assert!(msg.contains("not found: a"));
        assert!(msg.contains("timed out: b"));
    }

    #[test]
    fn test_tonic_status_conversion() {
        let status: tonic::Status = Error::NotFound("n1".into()).into();
        assert_eq!(status.code(), tonic::Code::NotFound);

        let status: tonic::Status = Error::Timeout("slow".into()).into();
        assert_eq!(status.code(), tonic::Code::DeadlineExceeded);

        let status: tonic::Status = Error::invalid("bad").into();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }
}
