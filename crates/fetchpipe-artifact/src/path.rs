//! Deterministic artifact paths
//!
//! A path is the source URL, then each applied step token behind a `..`
//! separator, then an extension chosen from the bundle's progress:
//!
//! | pending | applied | extension |
//! |---------|---------|-----------|
//! | none | none | none (raw fetch of an empty chain) |
//! | none | some | caller's target, validated against the mimetype; none if absent |
//! | some | any | primary extension of the current mimetype |
//!
//! Identical URL and applied tokens always produce identical paths. The
//! cache has no index besides this formula, so changing it turns every
//! existing artifact into a miss.

use crate::bundle::Bundle;
use crate::error::PathError;
use crate::mime;
use std::path::{Path, PathBuf};

/// Separator placed before each applied step token
pub const STEP_SEPARATOR: &str = "..";

/// Maps bundles to artifact paths under a cache root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathNamer {
    cache_root: PathBuf,
}

impl PathNamer {
    /// Create a namer rooted at `cache_root`.
    ///
    /// Relative roots are anchored at the current directory so every
    /// derived path is absolute.
    #[must_use]
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        let cache_root = cache_root.into();
        let cache_root = if cache_root.is_absolute() {
            cache_root
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&cache_root))
                .unwrap_or(cache_root)
        };
        Self { cache_root }
    }

    /// Root of the artifact tree
    #[inline]
    #[must_use]
    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Cache-root-relative name of the artifact for the bundle's current
    /// progress.
    ///
    /// # Errors
    /// - [`PathError::ExtensionMismatch`] when the chain is done and the
    ///   target extension does not fit the mimetype
    /// - [`PathError::UnknownMimeType`] when steps are pending and the
    ///   mimetype has no known extension
    /// - [`PathError::Escape`] when the name contains a `..` segment
    pub fn relative(&self, bundle: &Bundle) -> Result<String, PathError> {
        let mut local = bundle.source_url().to_owned();
        for token in bundle.applied() {
            local.push_str(STEP_SEPARATOR);
            local.push_str(token);
        }

        if bundle.pending().is_empty() {
            // A raw fetch keeps its implicit name.
            let target = bundle
                .target_extension()
                .filter(|_| !bundle.applied().is_empty());
            if let Some(ext) = target {
                if !mime::accepts_extension(bundle.mime_type(), ext) {
                    return Err(PathError::extension_mismatch(bundle.mime_type(), ext));
                }
                local.push_str(ext);
            }
        } else {
            let ext = mime::primary_extension(bundle.mime_type())
                .ok_or_else(|| PathError::UnknownMimeType(bundle.mime_type().to_owned()))?;
            local.push('.');
            local.push_str(ext);
        }

        if local.split('/').any(|segment| segment == "..") {
            return Err(PathError::Escape(local));
        }
        Ok(local)
    }

    /// Absolute artifact path for the bundle's current progress, without
    /// touching the filesystem.
    ///
    /// # Errors
    /// See [`PathNamer::relative`].
    pub fn derive(&self, bundle: &Bundle) -> Result<PathBuf, PathError> {
        let local = self.relative(bundle)?;
        let mut path = self.cache_root.clone().into_os_string();
        path.push("/");
        path.push(local);
        Ok(PathBuf::from(path))
    }

    /// Derive the artifact path and make sure its directory exists.
    ///
    /// # Errors
    /// See [`PathNamer::relative`]; also [`PathError::Io`] when the
    /// directory cannot be created.
    pub async fn resolve(&self, bundle: &Bundle) -> Result<PathBuf, PathError> {
        let path = self.derive(bundle)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PathError::io_error(parent, e))?;
        }
        Ok(path)
    }
}
