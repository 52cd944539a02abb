//! Error types for the pipeline engine
//!
//! Every step-level error aborts the rest of the chain and reaches the
//! caller unchanged. Nothing in the engine retries.

use fetchpipe_artifact::PathError;
use std::path::PathBuf;

/// Errors while pulling a resource from its origin
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Origin answered with something other than success
    #[error("fetching {url} returned status {status}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Connection, TLS or read failure
    #[error("transport error fetching {url}: {message}")]
    Transport {
        /// Requested URL
        url: String,
        /// Underlying error message
        message: String,
    },

    /// Origin answered with success but sent no bytes
    #[error("empty body fetching {0}")]
    EmptyBody(String),

    /// HTTP client could not be built
    #[error("http client error: {0}")]
    Client(String),
}

impl FetchError {
    /// Create transport error for URL
    pub fn transport(url: impl Into<String>, message: impl ToString) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.to_string(),
        }
    }
}

/// Main pipeline error type
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Download or sniff failed
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Mimetype outside a step's accepted set, or a target extension that
    /// does not fit the produced mimetype
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// What was acceptable
        expected: String,
        /// What was found
        actual: String,
    },

    /// Step token with a missing or malformed argument
    #[error("invalid argument for step '{step}': {reason}")]
    InvalidArgument {
        /// The offending token
        step: String,
        /// Why it was rejected
        reason: String,
    },

    /// Step name with no registered transformation
    #[error("unknown step: '{0}'")]
    UnknownStep(String),

    /// Artifact path could not be derived or prepared
    #[error("path error: {0}")]
    Path(PathError),

    /// Filesystem failure on an artifact
    #[error("io error on {path}: {source}")]
    Io {
        /// Artifact path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Image decoding, processing or encoding failed
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// A worker task died
    #[error("worker task failed: {0}")]
    Task(String),
}

impl PipelineError {
    /// Create type mismatch error
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create invalid argument error
    pub fn invalid_argument(step: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            step: step.into(),
            reason: reason.into(),
        }
    }

    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the caller's request is at fault (bad-request class)
    #[inline]
    #[must_use]
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            Self::TypeMismatch { .. }
                | Self::InvalidArgument { .. }
                | Self::UnknownStep(_)
                | Self::Path(PathError::Escape(_))
        )
    }
}

impl From<PathError> for PipelineError {
    fn from(err: PathError) -> Self {
        match err {
            PathError::ExtensionMismatch {
                mime_type,
                extension,
            } => Self::type_mismatch(format!("an extension of {mime_type}"), extension),
            PathError::UnknownMimeType(mime_type) => {
                Self::type_mismatch("a mimetype with a known extension", mime_type)
            }
            other => Self::Path(other),
        }
    }
}

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_mismatch_becomes_type_mismatch() {
        let err: PipelineError = PathError::extension_mismatch("image/jpeg", ".png").into();
        assert!(matches!(err, PipelineError::TypeMismatch { .. }));
        assert!(err.is_bad_request());
        assert_eq!(
            err.to_string(),
            "type mismatch: expected an extension of image/jpeg, got .png"
        );
    }

    #[test]
    fn escape_stays_a_path_error() {
        let err: PipelineError = PathError::Escape("http://e.com/../x".into()).into();
        assert!(matches!(err, PipelineError::Path(_)));
        assert!(err.is_bad_request());
    }

    #[test]
    fn fetch_failures_are_not_bad_requests() {
        let err: PipelineError = FetchError::Status {
            url: "http://e.com/a.jpg".into(),
            status: 404,
        }
        .into();
        assert!(!err.is_bad_request());
        assert_eq!(
            err.to_string(),
            "fetch failed: fetching http://e.com/a.jpg returned status 404"
        );
    }

    #[test]
    fn unknown_step_display() {
        let err = PipelineError::UnknownStep("sepia".into());
        assert_eq!(err.to_string(), "unknown step: 'sepia'");
        assert!(err.is_bad_request());
    }
}
