//! Token signing
//!
//! A token's claims are assembled in three layers:
//!
//! 1. Defaults: `iss` (application id), `iat` (now), `exp` (now + lifetime),
//!    `sub` (subject).
//! 2. The caller's payload, which replaces a default when it uses the same
//!    claim name. Register requests rely on this to set `iat`/`exp`.
//! 3. `nonce`, when one is supplied.
//!
//! The signing key is drawn at random from the [`KeyStore`] on every call, and
//! its id and algorithm go into the token header.

use crate::claims::{ClaimPayload, Claims, STANDARD_CLAIMS};
use crate::error::SignError;
use crate::keys::KeyStore;
use chrono::Utc;
use jsonwebtoken::{Header, encode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default token lifetime: 6 hours
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(6 * 60 * 60);

/// Signs claim payloads with a randomly selected signing key
///
/// # Example
///
/// ```rust,no_run
/// # use jwt_service_auth::{KeyStore, Signer};
/// # use std::sync::Arc;
/// # fn example(pem: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
/// let mut keys = KeyStore::new();
/// keys.add_signing_key("es256_0", "ES256", pem)?;
///
/// let signer = Signer::new(Arc::new(keys), "my-app");
/// let jwt = signer.sign("register", serde_json::Map::new(), None)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Signer {
    keys: Arc<KeyStore>,
    issuer: String,
    lifetime: Duration,
}

impl Signer {
    /// Create a signer issuing tokens as `issuer` with the default lifetime
    pub fn new(keys: Arc<KeyStore>, issuer: impl Into<String>) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            lifetime: DEFAULT_TOKEN_LIFETIME,
        }
    }

    /// Set the lifetime used for the default `exp` claim
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Issuer (`iss`) placed in every token
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Lifetime used for the default `exp` claim
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Sign `payload` under `subject`
    ///
    /// Payload claims named `iss`, `iat`, `exp` or `sub` replace the
    /// defaults. An empty `nonce` is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::NoSigningKeys`] if the key store is empty, or
    /// [`SignError::Encoding`] if the token cannot be encoded.
    pub fn sign(
        &self,
        subject: &str,
        payload: Claims,
        nonce: Option<&str>,
    ) -> Result<String, SignError> {
        let now = Utc::now().timestamp();

        let mut claims = Claims::new();
        claims.insert("iss".into(), Value::from(self.issuer.as_str()));
        claims.insert("iat".into(), Value::from(now));
        claims.insert(
            "exp".into(),
            Value::from(now + self.lifetime.as_secs() as i64),
        );
        claims.insert("sub".into(), Value::from(subject));

        for (name, value) in payload {
            if STANDARD_CLAIMS.contains(&name.as_str()) {
                debug!(claim = %name, subject, "Payload overrides default claim");
            }
            claims.insert(name, value);
        }

        if let Some(nonce) = nonce.filter(|nonce| !nonce.is_empty()) {
            claims.insert("nonce".into(), Value::from(nonce));
        }

        let key = self.keys.random_signing_key()?;

        let mut header = Header::new(key.algorithm());
        header.typ = Some("JWT".to_string());
        header.kid = Some(key.id().to_string());

        let token = encode(&header, &claims, key.encoding_key())?;

        debug!(kid = %key.id(), algorithm = ?key.algorithm(), subject, "Signed token");
        Ok(token)
    }

    /// Sign one of the typed claim payloads
    ///
    /// # Errors
    ///
    /// Same as [`Signer::sign`].
    pub fn sign_payload(
        &self,
        payload: &ClaimPayload,
        nonce: Option<&str>,
    ) -> Result<String, SignError> {
        self.sign(payload.subject(), payload.to_claims(), nonce)
    }
}
