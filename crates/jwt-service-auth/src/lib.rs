//! # JWT Service Auth - Rotating-key token signing and verification
//!
//! Issues and verifies the signed tokens that authorize operations in the
//! points/offer economy: account registration, earning, spending,
//! peer-to-peer transfers and arbitrary signed payloads.
//!
//! ## Architecture
//!
//! ```text
//!   ClaimPayload ──► Signer ──► token string
//!                      │
//!                      ▼
//!                  KeyStore  (signing keys, verification-key cache)
//!                      ▲
//!                      │
//!   token string ──► Verifier ──► KeyResolver ──► remote key service
//!                      │                          (GET <base>/v1/config)
//!                      ▼
//!              ValidationResult
//! ```
//!
//! - [`keys`] - [`KeyStore`] with random signing-key selection
//! - [`claims`] - typed claim payloads per token subject
//! - [`signer`] - default claims, payload overlay, signing
//! - [`resolver`] - cache-first key lookup with a coalesced remote fallback
//! - [`verifier`] - structural decode, signature and expiry checks
//! - [`offers`] - read-only offer catalog
//! - [`config`] - loading keys from PEM files at startup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jwt_service_auth::{KeyResolver, KeyStore, Signer, Verifier, VerificationKey};
//! use std::sync::Arc;
//!
//! # async fn example(private_pem: &[u8], public_pem: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! let mut keys = KeyStore::new();
//! keys.add_signing_key("es256_0", "ES256", private_pem)?;
//! keys.add_verification_key(VerificationKey::new("es256_0", public_pem));
//! let keys = Arc::new(keys);
//!
//! let signer = Signer::new(Arc::clone(&keys), "my-app");
//! let verifier = Verifier::new(KeyResolver::new(keys));
//!
//! let jwt = signer.sign("register", serde_json::Map::new(), None)?;
//! assert!(verifier.validate(&jwt).await.is_valid);
//! # Ok(())
//! # }
//! ```

pub mod claims;
pub mod config;
pub mod error;
pub mod keys;
pub mod offers;
pub mod resolver;
pub mod signer;
pub mod verifier;

#[doc(inline)]
pub use claims::{
    ClaimPayload, Claims, EarnClaims, OfferClaim, Party, PayToUserClaims, RegisterClaims,
    SpendClaims,
};
#[doc(inline)]
pub use config::{KeyConfig, PrivateKeyConfig};
#[doc(inline)]
pub use error::{FetchError, KeyError, SignError, VerifyError};
#[doc(inline)]
pub use keys::{KeyStore, SigningKey, VerificationKey};
#[doc(inline)]
pub use offers::{OfferCatalog, OfferKind, OfferRecord, StaticOfferCatalog};
#[doc(inline)]
pub use resolver::{KeyResolver, RemoteKeySource};
#[doc(inline)]
pub use signer::{DEFAULT_TOKEN_LIFETIME, Signer};
#[doc(inline)]
pub use verifier::{ValidationResult, VerifiedToken, Verifier};

// Re-exported so callers can name algorithms without a direct dependency
pub use jsonwebtoken::Algorithm;
