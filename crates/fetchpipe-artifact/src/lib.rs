//! fetchpipe artifact addressing
//!
//! Everything needed to name a cached artifact without consulting any
//! index: the [`Bundle`] that tracks a request's progress through its
//! chain, mimetype sniffing, and the [`PathNamer`] that turns both into a
//! path under the cache root.
//!
//! # Example
//!
//! ```rust,ignore
//! use fetchpipe_artifact::{Bundle, PathNamer};
//!
//! let namer = PathNamer::new("/srv/cache");
//! let mut bundle = Bundle::new("http://example.com/a.jpg", vec!["bw".into()], Some(".jpg".into()));
//! bundle.set_mime_type("image/jpeg");
//! bundle.advance();
//! assert!(namer.derive(&bundle)?.ends_with("a.jpg..bw.jpg"));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod bundle;
pub mod error;
pub mod hash;
pub mod mime;
pub mod path;
pub mod url;

pub use bundle::{Bundle, DEFAULT_MIME_TYPE};
pub use error::PathError;
pub use hash::ContentHash;
pub use path::{PathNamer, STEP_SEPARATOR};
pub use url::normalize_url;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
