//! fetchpipe request claims
//!
//! Keeps identical (URL, chain) requests from running side by side. The
//! first request for a [`Signature`] claims it; later ones see the holder's
//! token until the claim is released or expires.
//!
//! This is a liveness optimization that saves redundant fetch and
//! transform work. Artifacts stay correct without it since every run for a
//! signature writes the same paths.
//!
//! # Example
//!
//! ```rust,ignore
//! use fetchpipe_lock::{Acquisition, LockCoordinator, Signature};
//!
//! let locks = LockCoordinator::default();
//! let signature = Signature::new("http://example.com/a.jpg", &["bw"]);
//! match locks.acquire(signature) {
//!     Acquisition::Claimed(_guard) => { /* run the pipeline */ }
//!     Acquisition::Held { holder } => println!("already running as {holder}"),
//! }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod coordinator;
pub mod signature;

pub use coordinator::{Acquisition, ClaimGuard, ClaimToken, LockCoordinator, DEFAULT_CLAIM_TTL};
pub use signature::Signature;
