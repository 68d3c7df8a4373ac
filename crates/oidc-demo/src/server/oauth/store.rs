//! In-memory store of pending logins, keyed by CSRF state.
//!
//! Each login issues a fresh state that can be redeemed by exactly one
//! callback before its time-to-live runs out.

use std::time::{Duration, Instant};

use moka::future::Cache;
use moka::policy::EvictionPolicy;
use oauth2::{PkceCodeChallenge, PkceCodeVerifier};

/// What the callback needs to finish a login.
#[derive(Clone)]
pub struct PendingLogin {
    code_verifier: String,
    issued_at: Instant,
}

impl PendingLogin {
    /// PKCE verifier matching the challenge sent to the provider.
    #[must_use]
    pub fn pkce_verifier(&self) -> PkceCodeVerifier {
        PkceCodeVerifier::new(self.code_verifier.clone())
    }
}

/// A freshly issued login state.
pub struct IssuedState {
    /// Opaque CSRF state round-tripped through the provider.
    pub state: String,
    /// PKCE S256 challenge for the authorization request.
    pub pkce_challenge: PkceCodeChallenge,
}

/// Pending-login store with expiry.
#[derive(Clone)]
pub struct StateStore {
    pending: Cache<String, PendingLogin>,
    ttl: Duration,
}

impl StateStore {
    /// Create a store whose entries expire after `ttl`.
    ///
    /// When full, the oldest pending login is evicted; a new login is never
    /// refused admission.
    #[must_use]
    pub fn new(ttl: Duration, max_entries: u64) -> Self {
        let pending = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .eviction_policy(EvictionPolicy::lru())
            .build();
        Self { pending, ttl }
    }

    /// Generate a random token using two UUIDs (256 bits).
    fn generate_token() -> String {
        format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
    }

    /// Issue a new state and PKCE pair for one login attempt.
    pub async fn issue(&self) -> IssuedState {
        let state = Self::generate_token();
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let login = PendingLogin {
            code_verifier: pkce_verifier.secret().clone(),
            issued_at: Instant::now(),
        };
        self.pending.insert(state.clone(), login).await;

        IssuedState { state, pkce_challenge }
    }

    /// Redeem a state (one-time use).
    ///
    /// Returns `None` if the state was never issued, has expired, or was already redeemed.
    pub async fn consume(&self, state: &str) -> Option<PendingLogin> {
        self.pending.remove(state).await.filter(|login| login.issued_at.elapsed() <= self.ttl)
    }

    /// Approximate number of outstanding states.
    pub async fn pending_count(&self) -> u64 {
        self.pending.run_pending_tasks().await;
        self.pending.entry_count()
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore").field("pending", &self.pending.entry_count()).finish()
    }
}
