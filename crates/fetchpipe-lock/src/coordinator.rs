//! Claim table for in-flight requests
//!
//! Per signature: `FREE -> CLAIMED -> FREE`. A claim lives until its holder
//! releases it or its time-to-live runs out, whichever comes first. Expiry
//! only recovers from holders that vanished without releasing; artifact
//! correctness never depends on the claim, because duplicate work writes
//! the same deterministic paths.

use crate::signature::Signature;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Default claim lifetime (5 minutes)
pub const DEFAULT_CLAIM_TTL: Duration = Duration::from_secs(60 * 5);

/// Opaque identifier of one claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClaimToken(Uuid);

impl ClaimToken {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for ClaimToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct Claim {
    token: ClaimToken,
    expires_at: Instant,
}

impl Claim {
    #[inline]
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Outcome of [`LockCoordinator::acquire`]
#[derive(Debug)]
pub enum Acquisition {
    /// This caller owns execution; dropping the guard releases the claim
    Claimed(ClaimGuard),
    /// Someone else holds a live claim
    Held {
        /// The holder's token
        holder: ClaimToken,
    },
}

impl Acquisition {
    /// Whether this caller now owns execution
    #[inline]
    #[must_use]
    pub fn is_claimed(&self) -> bool {
        matches!(self, Self::Claimed(_))
    }

    /// Token of whoever owns execution: this caller's or the holder's
    #[inline]
    #[must_use]
    pub fn token(&self) -> ClaimToken {
        match self {
            Self::Claimed(guard) => guard.token(),
            Self::Held { holder } => *holder,
        }
    }
}

/// Shared table of live claims
///
/// Cheap to clone; clones share the same table.
#[derive(Debug, Clone)]
pub struct LockCoordinator {
    claims: Arc<DashMap<Signature, Claim>>,
    ttl: Duration,
}

impl LockCoordinator {
    /// Create a coordinator whose claims expire after `ttl`
    #[inline]
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            claims: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Claim lifetime
    #[inline]
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Create the claim for `signature` unless a live one exists.
    ///
    /// Create-if-absent is atomic: of two concurrent first requests exactly
    /// one gets [`Acquisition::Claimed`]. An expired claim is taken over.
    #[must_use = "dropping a claimed acquisition releases it immediately"]
    pub fn acquire(&self, signature: Signature) -> Acquisition {
        let now = Instant::now();
        let fresh = Claim {
            token: ClaimToken::generate(),
            expires_at: now + self.ttl,
        };

        match self.claims.entry(signature) {
            Entry::Vacant(slot) => {
                slot.insert(fresh);
            }
            Entry::Occupied(mut slot) => {
                let existing = *slot.get();
                if existing.is_live(now) {
                    return Acquisition::Held {
                        holder: existing.token,
                    };
                }
                tracing::warn!(
                    %signature,
                    stale = %existing.token,
                    "taking over expired claim"
                );
                slot.insert(fresh);
            }
        }

        tracing::trace!(%signature, token = %fresh.token, "claim acquired");
        Acquisition::Claimed(ClaimGuard {
            coordinator: self.clone(),
            signature,
            token: fresh.token,
        })
    }

    /// Remove the claim for `signature` if `token` still owns it.
    ///
    /// Returns whether a claim was removed. A holder whose claim expired
    /// and was taken over cannot release its successor's claim.
    pub fn release(&self, signature: &Signature, token: ClaimToken) -> bool {
        let removed = self
            .claims
            .remove_if(signature, |_, claim| claim.token == token)
            .is_some();
        if removed {
            tracing::trace!(%signature, %token, "claim released");
        }
        removed
    }

    /// Token of the live claim on `signature`, if any
    #[must_use]
    pub fn holder(&self, signature: &Signature) -> Option<ClaimToken> {
        let now = Instant::now();
        self.claims
            .get(signature)
            .filter(|claim| claim.is_live(now))
            .map(|claim| claim.token)
    }

    /// Whether a live claim exists for `signature`
    #[inline]
    #[must_use]
    pub fn is_held(&self, signature: &Signature) -> bool {
        self.holder(signature).is_some()
    }

    /// Wait until `signature` has no live claim, checking every `poll`.
    ///
    /// Returns immediately when the signature is free. Always terminates:
    /// at worst the claim expires.
    pub async fn wait_until_free(&self, signature: &Signature, poll: Duration) {
        while self.is_held(signature) {
            tokio::time::sleep(poll).await;
        }
    }

    /// Drop every expired claim and return how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.claims.len();
        self.claims.retain(|_, claim| claim.is_live(now));
        before.saturating_sub(self.claims.len())
    }

    /// Number of claims in the table, live or expired
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// Whether the table is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

impl Default for LockCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_CLAIM_TTL)
    }
}

/// Ownership of a claim; releases it when dropped
///
/// Dropping covers success, failure and panics alike, so an aborted chain
/// never blocks its signature until expiry.
#[derive(Debug)]
pub struct ClaimGuard {
    coordinator: LockCoordinator,
    signature: Signature,
    token: ClaimToken,
}

impl ClaimGuard {
    /// Token of the owned claim
    #[inline]
    #[must_use]
    pub fn token(&self) -> ClaimToken {
        self.token
    }

    /// Signature the claim is held on
    #[inline]
    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        self.coordinator.release(&self.signature, self.token);
    }
}
