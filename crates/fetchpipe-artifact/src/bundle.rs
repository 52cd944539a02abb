//! The unit of work carried through a pipeline
//!
//! A [`Bundle`] tracks where a request stands in its chain: which step
//! tokens are already applied and which are still pending. The two always
//! partition the requested chain, in execution order.
//!
//! Consumption goes through [`Bundle::peek_next`] and [`Bundle::advance`].
//! A step reads its input path before advancing and its output path after,
//! so the input reflects the chain without the step and the output the
//! chain with it.

use crate::url::normalize_url;

/// Mimetype assumed until sniffing says otherwise
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Mutable carrier threaded through one pipeline execution
///
/// Owned by exactly one execution; never shared between concurrent runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    source_url: String,
    chain: Vec<String>,
    cursor: usize,
    mime_type: String,
    target_extension: Option<String>,
}

impl Bundle {
    /// Create a bundle for `url` with the caller's ordered chain.
    ///
    /// The URL is normalized here, once. An empty target extension is
    /// treated as absent; a missing leading dot is added.
    #[must_use]
    pub fn new(url: &str, chain: Vec<String>, target_extension: Option<String>) -> Self {
        let target_extension = target_extension
            .filter(|ext| !ext.is_empty() && ext != ".")
            .map(|ext| {
                if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{ext}")
                }
            });
        Self {
            source_url: normalize_url(url),
            chain,
            cursor: 0,
            mime_type: DEFAULT_MIME_TYPE.to_owned(),
            target_extension,
        }
    }

    /// Normalized source URL
    #[inline]
    #[must_use]
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// The full chain as requested, in execution order
    #[inline]
    #[must_use]
    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    /// Tokens already applied, oldest first
    #[inline]
    #[must_use]
    pub fn applied(&self) -> &[String] {
        &self.chain[..self.cursor]
    }

    /// Tokens still to apply, next first
    #[inline]
    #[must_use]
    pub fn pending(&self) -> &[String] {
        &self.chain[self.cursor..]
    }

    /// Token of the step that will be consumed next
    #[inline]
    #[must_use]
    pub fn peek_next(&self) -> Option<&str> {
        self.chain.get(self.cursor).map(String::as_str)
    }

    /// Move the next pending token to the applied side and return it.
    ///
    /// Returns `None` once the chain is exhausted.
    pub fn advance(&mut self) -> Option<&str> {
        let token = self.chain.get(self.cursor)?;
        self.cursor += 1;
        Some(token.as_str())
    }

    /// Whether every step has been applied
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.cursor == self.chain.len()
    }

    /// Current mimetype
    #[inline]
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Replace the current mimetype
    pub fn set_mime_type(&mut self, mime_type: impl Into<String>) {
        self.mime_type = mime_type.into();
    }

    /// Extension requested for the final artifact, with leading dot
    #[inline]
    #[must_use]
    pub fn target_extension(&self) -> Option<&str> {
        self.target_extension.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn chain(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| (*t).to_owned()).collect()
    }

    #[test]
    fn new_bundle_has_everything_pending() {
        let bundle = Bundle::new("http://example.com/a.jpg", chain(&["bw", "thumb"]), None);
        assert_eq!(bundle.pending(), &["bw", "thumb"]);
        assert!(bundle.applied().is_empty());
        assert_eq!(bundle.mime_type(), DEFAULT_MIME_TYPE);
        assert!(!bundle.is_complete());
    }

    #[test]
    fn advance_consumes_in_caller_order() {
        let mut bundle = Bundle::new("http://e.com/a.jpg", chain(&["bw", "resize:640"]), None);

        assert_eq!(bundle.peek_next(), Some("bw"));
        assert_eq!(bundle.advance(), Some("bw"));
        assert_eq!(bundle.applied(), &["bw"]);
        assert_eq!(bundle.pending(), &["resize:640"]);

        assert_eq!(bundle.advance(), Some("resize:640"));
        assert!(bundle.is_complete());
        assert_eq!(bundle.advance(), None);
        assert_eq!(bundle.applied(), &["bw", "resize:640"]);
    }

    #[test]
    fn url_is_normalized_at_construction() {
        let bundle = Bundle::new("http:/example.com/a.jpg", Vec::new(), None);
        assert_eq!(bundle.source_url(), "http://example.com/a.jpg");
    }

    #[test]
    fn target_extension_gets_a_dot() {
        let bundle = Bundle::new("http://e.com/a", Vec::new(), Some("png".into()));
        assert_eq!(bundle.target_extension(), Some(".png"));

        let bundle = Bundle::new("http://e.com/a", Vec::new(), Some(".JPG".into()));
        assert_eq!(bundle.target_extension(), Some(".JPG"));
    }

    #[test]
    fn empty_target_extension_is_absent() {
        let bundle = Bundle::new("http://e.com/a", Vec::new(), Some(String::new()));
        assert_eq!(bundle.target_extension(), None);
    }

    proptest! {
        #[test]
        fn applied_and_pending_partition_the_chain(
            tokens in proptest::collection::vec("[a-z]{1,6}(:[0-9]{1,4})?", 0..8),
            steps in 0usize..10,
        ) {
            let mut bundle = Bundle::new("http://e.com/x.png", tokens.clone(), None);
            for _ in 0..steps {
                bundle.advance();
            }
            let mut joined = bundle.applied().to_vec();
            joined.extend_from_slice(bundle.pending());
            prop_assert_eq!(joined, tokens);
        }
    }
}
