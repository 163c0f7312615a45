//! Crate-wide error type

use crate::syntax::{Diagnostics, Range};
use crate::value::ConversionError;
use crate::wire::Status;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The evaluated value is not known until apply time
    #[error("unknown value found")]
    UnknownValue,
    #[error("null value found")]
    NullValue,
    #[error("sensitive value found")]
    SensitiveValue,
    #[error("ephemeral value found")]
    EphemeralValue,

    /// Returned from a fix closure to emit the issue without a fix
    #[error("fix not supported")]
    FixNotSupported,

    #[error("{0}")]
    Diagnostics(#[from] Diagnostics),

    #[error("range overlaps with a previous rewrite range: {0}")]
    RangeOverlap(Range),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("invalid range: {0}")]
    InvalidRange(Range),

    #[error("{0}")]
    Unsupported(String),

    #[error("scan error: {0}")]
    Scan(String),

    #[error("invalid version: {0}")]
    Version(String),

    #[error("failed to check \"{rule}\" rule: {source}")]
    RuleCheck { rule: String, source: Box<Error> },

    #[error("failed to apply fixes by \"{rule}\" rule: {source}")]
    ApplyFixes { rule: String, source: Box<Error> },

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Status(#[from] Status),

    #[error("failed to encode message: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("failed to decode message: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Whether this is one of the "skip quietly" evaluation outcomes
    pub fn is_sentinel(&self) -> bool {
        matches!(
            self,
            Error::UnknownValue | Error::NullValue | Error::SensitiveValue | Error::EphemeralValue
        )
    }
}

/// Run `k` with the successful value; sentinel errors are swallowed
/// without running it, other errors are returned as they are.
///
/// ```
/// use ruleplug::{ensure_no_error, Error};
///
/// let mut seen = None;
/// ensure_no_error(Err::<String, _>(Error::UnknownValue), |v| {
///     seen = Some(v);
///     Ok(())
/// })
/// .unwrap();
/// assert!(seen.is_none());
/// ```
pub fn ensure_no_error<T>(result: Result<T>, k: impl FnOnce(T) -> Result<()>) -> Result<()> {
    match result {
        Ok(value) => k(value),
        Err(e) if e.is_sentinel() => {
            log::debug!("skipping: {}", e);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels() {
        assert!(Error::UnknownValue.is_sentinel());
        assert!(Error::NullValue.is_sentinel());
        assert!(Error::SensitiveValue.is_sentinel());
        assert!(Error::EphemeralValue.is_sentinel());
        assert!(!Error::FixNotSupported.is_sentinel());
    }

    #[test]
    fn test_ensure_no_error_runs_continuation() {
        let mut got = 0;
        ensure_no_error(Ok(3), |v| {
            got = v;
            Ok(())
        })
        .unwrap();
        assert_eq!(got, 3);
    }

    #[test]
    fn test_ensure_no_error_propagates_other_errors() {
        let err = ensure_no_error(Err::<(), _>(Error::Unsupported("boom".into())), |_| Ok(()))
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_overlap_message() {
        let err = Error::RangeOverlap(Range::default());
        assert!(err
            .to_string()
            .starts_with("range overlaps with a previous rewrite range: "));
    }
}
