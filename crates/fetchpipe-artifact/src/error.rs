//! Error types for path derivation

use std::path::PathBuf;

/// Errors while deriving or preparing an artifact path
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// Requested final extension does not fit the produced mimetype
    #[error("extension '{extension}' does not match mimetype {mime_type}")]
    ExtensionMismatch {
        /// Mimetype of the produced artifact
        mime_type: String,
        /// Extension the caller asked for
        extension: String,
    },

    /// An intermediate artifact has a mimetype with no known extension
    #[error("no extension known for mimetype {0}")]
    UnknownMimeType(String),

    /// The derived path would leave the cache root
    #[error("path escapes the cache root: {0}")]
    Escape(String),

    /// Containing directory could not be created
    #[error("io error preparing {path}: {source}")]
    Io {
        /// Directory being created
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl PathError {
    /// Create an extension mismatch error
    pub fn extension_mismatch(mime_type: impl Into<String>, extension: impl Into<String>) -> Self {
        Self::ExtensionMismatch {
            mime_type: mime_type.into(),
            extension: extension.into(),
        }
    }

    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_display() {
        let err = PathError::extension_mismatch("image/jpeg", ".png");
        assert_eq!(
            err.to_string(),
            "extension '.png' does not match mimetype image/jpeg"
        );
    }

    #[test]
    fn io_error_names_the_path() {
        let err = PathError::io_error("/tmp/x", std::io::Error::other("boom"));
        assert!(err.to_string().contains("/tmp/x"));
    }
}
