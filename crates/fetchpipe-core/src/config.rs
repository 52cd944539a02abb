//! Engine configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// What a request does when an identical one is already in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentionPolicy {
    /// Run the pipeline anyway; duplicate writes land on the same paths
    #[default]
    Duplicate,
    /// Wait for the holder to finish, then run over its cached artifacts
    Wait,
}

/// Pipeline engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root of the artifact tree
    pub cache_root: PathBuf,
    /// Claim lifetime in seconds
    pub lock_ttl_secs: u64,
    /// Leading bytes read when sniffing a mimetype
    pub sniff_bytes: usize,
    /// Skip TLS certificate verification on fetches
    pub accept_invalid_certs: bool,
    /// User agent sent to origins
    pub user_agent: String,
    /// Transport timeout for one fetch, in seconds
    pub request_timeout_secs: u64,
    /// Behavior when the request's signature is already claimed
    pub contention: ContentionPolicy,
    /// Poll interval in milliseconds under [`ContentionPolicy::Wait`]
    pub wait_poll_ms: u64,
}

impl PipelineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With cache root
    #[inline]
    #[must_use]
    pub fn with_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = root.into();
        self
    }

    /// With claim lifetime
    #[inline]
    #[must_use]
    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl_secs = ttl.as_secs();
        self
    }

    /// With contention policy
    #[inline]
    #[must_use]
    pub fn with_contention(mut self, policy: ContentionPolicy) -> Self {
        self.contention = policy;
        self
    }

    /// With wait poll interval
    #[inline]
    #[must_use]
    pub fn with_wait_poll(mut self, poll: Duration) -> Self {
        self.wait_poll_ms = u64::try_from(poll.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Claim lifetime
    #[inline]
    #[must_use]
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    /// Transport timeout
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Wait poll interval (at least one millisecond)
    #[inline]
    #[must_use]
    pub fn wait_poll(&self) -> Duration {
        Duration::from_millis(self.wait_poll_ms.max(1))
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache_root: PathBuf::from("media/cache"),
            lock_ttl_secs: 60 * 5,
            sniff_bytes: 1024,
            accept_invalid_certs: false,
            user_agent: format!("fetchpipe/{}", env!("CARGO_PKG_VERSION")),
            request_timeout_secs: 60,
            contention: ContentionPolicy::Duplicate,
            wait_poll_ms: 100,
        }
    }
}
