//! Request signatures
//!
//! A [`Signature`] identifies a (URL, full chain) request. It keys claims,
//! never paths: artifact paths come from the path namer alone.

use fetchpipe_artifact::ContentHash;
use std::fmt::{self, Display, Formatter};

/// Separator between chain tokens when hashing a chain
const CHAIN_SEPARATOR: &str = "|";

/// Hash-derived key of a (URL, chain) combination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature {
    url: ContentHash,
    chain: ContentHash,
}

impl Signature {
    /// Signature of `url` with the full ordered `chain`
    #[must_use]
    pub fn new<S: AsRef<str>>(url: &str, chain: &[S]) -> Self {
        Self {
            url: ContentHash::compute(url.as_bytes()),
            chain: ContentHash::compute_joined(chain, CHAIN_SEPARATOR),
        }
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "lock--{}--{}", self.url, self.chain)
    }
}

impl serde::Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_request_same_signature() {
        let a = Signature::new("http://e.com/a.jpg", &["bw", "thumb"]);
        let b = Signature::new("http://e.com/a.jpg", &["bw".to_owned(), "thumb".to_owned()]);
        assert_eq!(a, b);
    }

    #[test]
    fn order_matters() {
        let a = Signature::new("http://e.com/a.jpg", &["bw", "thumb"]);
        let b = Signature::new("http://e.com/a.jpg", &["thumb", "bw"]);
        assert_ne!(a, b);
    }

    #[test]
    fn url_matters() {
        let a = Signature::new("http://e.com/a.jpg", &["bw"]);
        let b = Signature::new("http://e.com/b.jpg", &["bw"]);
        assert_ne!(a, b);
        assert_eq!(a.chain, b.chain);
    }

    #[test]
    fn display_format() {
        let sig = Signature::new("http://e.com/a.jpg", &["bw"]);
        let text = sig.to_string();
        assert!(text.starts_with("lock--"));
        assert_eq!(text.split("--").count(), 3);
        assert_eq!(text.len(), "lock--".len() + 64 + 2 + 64);
    }
}
