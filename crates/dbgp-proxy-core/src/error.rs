//! Request errors.

use thiserror::Error;

use crate::{EngineError, MalformedReference, object_id::Generation};

/// Error failing a single cache request.
///
/// None of these poison the session; the next request is served normally.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Engine is not paused")]
    NotPaused,
    #[error("Stale reference: minted under generation {found}, current generation is {current}")]
    StaleReference {
        found: Generation,
        current: Generation,
    },
    #[error(transparent)]
    MalformedReference(#[from] MalformedReference),
    #[error(transparent)]
    Remote(#[from] EngineError),
}

impl CacheError {
    /// Errors expected when a request outlives a pause. Front-ends should
    /// drop the result silently.
    #[must_use]
    pub const fn is_benign(&self) -> bool {
        matches!(self, Self::NotPaused | Self::StaleReference { .. })
    }

    /// Errors that indicate the caller built or corrupted a reference.
    #[must_use]
    pub const fn is_caller_bug(&self) -> bool {
        matches!(self, Self::MalformedReference(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(CacheError::NotPaused.is_benign());
        assert!(
            CacheError::StaleReference {
                found: 1,
                current: 3
            }
            .is_benign()
        );

        let malformed = CacheError::from(MalformedReference {
            reference: "{".to_string(),
            reason: "EOF".to_string(),
        });
        assert!(malformed.is_caller_bug());
        assert!(!malformed.is_benign());

        let remote = CacheError::from(EngineError::Transport("closed".to_string()));
        assert!(!remote.is_benign() && !remote.is_caller_bug());
    }

    #[test]
    fn test_remote_error_is_transparent() {
        let inner = EngineError::Response {
            code: 300,
            message: "can not get property".to_string(),
        };
        let expected = inner.to_string();
        assert_eq!(CacheError::Remote(inner).to_string(), expected);
    }
}
