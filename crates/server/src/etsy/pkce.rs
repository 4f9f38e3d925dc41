//! PKCE (RFC 7636) challenge generation and pending authorization state.
//!
//! Each authorization attempt gets its own verifier. The verifier is kept
//! server-side, keyed by the OAuth `state` parameter, until Etsy redirects
//! back with the authorization code.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use moka::future::Cache;
use rand::distr::Alphanumeric;
use rand::{Rng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

/// How long a started authorization stays valid.
pub const PENDING_TTL: Duration = Duration::from_secs(10 * 60);

const STATE_LENGTH: usize = 32;
const MAX_PENDING: u64 = 1_000;

/// A freshly generated PKCE verifier/challenge pair plus OAuth state.
pub struct PkceChallenge {
    /// High-entropy secret sent only during code exchange.
    pub verifier: SecretString,
    /// `base64url(sha256(verifier))`, sent on the consent URL.
    pub challenge: String,
    /// Opaque value Etsy echoes back on redirect.
    pub state: String,
}

impl PkceChallenge {
    /// Generate a new challenge from 32 random bytes.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        let verifier = URL_SAFE_NO_PAD.encode(bytes);
        let challenge = challenge_for(&verifier);

        let state = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(STATE_LENGTH)
            .map(char::from)
            .collect();

        Self {
            verifier: SecretString::from(verifier),
            challenge,
            state,
        }
    }
}

/// Compute the S256 code challenge for a verifier.
#[must_use]
pub fn challenge_for(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Authorizations started but not yet completed, keyed by state.
#[derive(Clone)]
pub struct PendingAuthorizations {
    cache: Cache<String, SecretString>,
}

impl PendingAuthorizations {
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(PENDING_TTL)
    }

    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(MAX_PENDING)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Generate a challenge and remember its verifier.
    pub async fn begin(&self) -> PkceChallenge {
        let pkce = PkceChallenge::generate();
        self.cache
            .insert(
                pkce.state.clone(),
                SecretString::from(pkce.verifier.expose_secret().to_owned()),
            )
            .await;
        pkce
    }

    /// Take the verifier for a state. Each state can be consumed once.
    pub async fn take(&self, state: &str) -> Option<SecretString> {
        self.cache.remove(state).await
    }
}

impl Default for PendingAuthorizations {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_matches_rfc7636_vector() {
        // Appendix B of RFC 7636
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            challenge_for(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_generated_pair_is_consistent() {
        let pkce = PkceChallenge::generate();
        let verifier = pkce.verifier.expose_secret();
        assert_eq!(verifier.len(), 43);
        assert!(!verifier.contains('='));
        assert_eq!(challenge_for(verifier), pkce.challenge);
        assert_eq!(pkce.state.len(), STATE_LENGTH);
        assert!(pkce.state.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_generated_pairs_differ() {
        let a = PkceChallenge::generate();
        let b = PkceChallenge::generate();
        assert_ne!(a.state, b.state);
        assert_ne!(a.challenge, b.challenge);
    }

    #[tokio::test]
    async fn test_state_is_single_use() {
        let pending = PendingAuthorizations::new();
        let pkce = pending.begin().await;

        let verifier = pending.take(&pkce.state).await.unwrap();
        assert_eq!(verifier.expose_secret(), pkce.verifier.expose_secret());
        assert!(pending.take(&pkce.state).await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_state_rejected() {
        let pending = PendingAuthorizations::new();
        assert!(pending.take("never-issued").await.is_none());
    }
}
