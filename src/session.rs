use std::sync::OnceLock;

use parking_lot::RwLock;

use crate::crypto::KeyPair;
use crate::tls::TrustAnchors;
use crate::{Error, Result};

/// The single mutable context of an ACME session.
///
/// Holds the last anti-replay token handed out by the server, the account
/// key id once known, the trust anchors and the account signing key. The
/// token is never empty: construction and [`set_token`] both refuse an empty
/// value.
///
/// Exactly one exchange is in flight at a time, so there is one writer (the
/// completion of an exchange). The lock only guarantees that readers never
/// see a torn value.
///
/// [`set_token`]: struct.SessionState.html#method.set_token
#[derive(Debug)]
pub struct SessionState {
    token: RwLock<String>,
    key_id: OnceLock<String>,
    trust_anchors: TrustAnchors,
    key: KeyPair,
}

impl SessionState {
    pub fn new(initial_token: &str, key: KeyPair, trust_anchors: TrustAnchors) -> Result<Self> {
        if initial_token.is_empty() {
            return Err(Error::EmptyToken);
        }
        Ok(SessionState {
            token: RwLock::new(initial_token.to_string()),
            key_id: OnceLock::new(),
            trust_anchors,
            key,
        })
    }

    /// Replace the anti-replay token. An empty value is rejected and the
    /// stored token is left untouched.
    pub fn set_token(&self, token: &str) -> Result<()> {
        if token.is_empty() {
            return Err(Error::EmptyToken);
        }
        trace!("Rotate nonce");
        *self.token.write() = token.to_string();
        Ok(())
    }

    pub fn current_token(&self) -> String {
        self.token.read().clone()
    }

    /// Record the account key id (the account URL). Only once per session.
    pub fn set_key_id(&self, kid: &str) -> Result<()> {
        self.key_id
            .set(kid.to_string())
            .map_err(|_| Error::Other("Account key id is already set".into()))
    }

    pub fn key_id(&self) -> Result<&str> {
        self.key_id
            .get()
            .map(|s| s.as_str())
            .ok_or_else(|| Error::Other("No account key id yet".into()))
    }

    pub fn key(&self) -> &KeyPair {
        &self.key
    }

    pub fn trust_anchors(&self) -> &TrustAnchors {
        &self.trust_anchors
    }
}
