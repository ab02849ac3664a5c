//! Signing and verification key storage
//!
//! The [`KeyStore`] holds two sets of keys:
//!
//! - **Signing keys** (private halves) are loaded once during startup and are
//!   immutable afterwards. Every token is signed with one of them, chosen
//!   uniformly at random, so issued tokens spread evenly across the trusted
//!   key set.
//! - **Verification keys** (public halves) live in a cache that can grow at
//!   runtime when the [`KeyResolver`](crate::KeyResolver) pulls a key set
//!   from the remote key service. Entries are overwritten, never removed.

use crate::error::{KeyError, SignError};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use parking_lot::RwLock;
use rand::seq::IndexedRandom;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Algorithms accepted for signing and verification
///
/// Only asymmetric algorithms: a verification key is public material and must
/// never double as an HMAC secret.
pub const SUPPORTED_ALGORITHMS: &[Algorithm] = &[
    Algorithm::ES256,
    Algorithm::ES384,
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
    Algorithm::EdDSA,
];

/// Parse an algorithm identifier (`"ES256"`, `"RS256"`, ...) into a supported [`Algorithm`]
pub fn parse_algorithm(name: &str) -> Option<Algorithm> {
    Algorithm::from_str(name)
        .ok()
        .filter(|alg| SUPPORTED_ALGORITHMS.contains(alg))
}

/// PEM decoding family of an algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyFamily {
    Rsa,
    Ec,
    Ed,
}

impl KeyFamily {
    fn of(algorithm: Algorithm) -> Option<Self> {
        match algorithm {
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => Some(Self::Rsa),
            Algorithm::ES256 | Algorithm::ES384 => Some(Self::Ec),
            Algorithm::EdDSA => Some(Self::Ed),
            _ => None,
        }
    }

    fn encoding_key(self, pem: &[u8]) -> jsonwebtoken::errors::Result<EncodingKey> {
        match self {
            Self::Rsa => EncodingKey::from_rsa_pem(pem),
            Self::Ec => EncodingKey::from_ec_pem(pem),
            Self::Ed => EncodingKey::from_ed_pem(pem),
        }
    }

    fn decoding_key(self, pem: &[u8]) -> jsonwebtoken::errors::Result<DecodingKey> {
        match self {
            Self::Rsa => DecodingKey::from_rsa_pem(pem),
            Self::Ec => DecodingKey::from_ec_pem(pem),
            Self::Ed => DecodingKey::from_ed_pem(pem),
        }
    }
}

/// Private key used to sign tokens
pub struct SigningKey {
    id: String,
    algorithm: Algorithm,
    key: EncodingKey,
}

// Manual Debug impl so private key material never reaches logs
impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("id", &self.id)
            .field("algorithm", &self.algorithm)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl SigningKey {
    /// Key id, placed in the `kid` header of every token this key signs
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Signature algorithm
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.key
    }
}

/// Public key used to verify tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationKey {
    id: String,
    material: Vec<u8>,
    algorithm: Option<Algorithm>,
}

impl VerificationKey {
    /// Create a verification key from PEM encoded public key material
    pub fn new(id: impl Into<String>, material: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            material: material.into(),
            algorithm: None,
        }
    }

    /// Pin the key to one algorithm; tokens declaring another one are rejected
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    /// Key id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// PEM encoded public key
    pub fn material(&self) -> &[u8] {
        &self.material
    }

    /// Algorithm the key is pinned to, if any
    pub fn algorithm(&self) -> Option<Algorithm> {
        self.algorithm
    }

    /// Build a decoding key for `algorithm` from the stored material
    ///
    /// # Errors
    ///
    /// Fails if `algorithm` is not asymmetric or the material is not a public
    /// key of the matching family.
    pub fn decoding_key(&self, algorithm: Algorithm) -> jsonwebtoken::errors::Result<DecodingKey> {
        let family =
            KeyFamily::of(algorithm).ok_or(jsonwebtoken::errors::ErrorKind::InvalidAlgorithm)?;
        family.decoding_key(&self.material)
    }

    /// Whether the material parses as a public key of any supported family
    pub fn is_parseable(&self) -> bool {
        match self.algorithm.and_then(KeyFamily::of) {
            Some(family) => family.decoding_key(&self.material).is_ok(),
            None => [KeyFamily::Rsa, KeyFamily::Ec, KeyFamily::Ed]
                .into_iter()
                .any(|family| family.decoding_key(&self.material).is_ok()),
        }
    }
}

/// Process-wide key storage, shared by the signer and the key resolver
///
/// Signing keys are added through `&mut self` during initialization; the
/// verification-key cache is behind a reader/writer lock so lookups can run
/// concurrently with a cache fill. A batch fill takes the write lock once, so
/// readers observe either the whole batch or none of it.
#[derive(Debug, Default)]
pub struct KeyStore {
    signing: Vec<SigningKey>,
    verification: RwLock<HashMap<String, Arc<VerificationKey>>>,
}

impl KeyStore {
    /// Create an empty key store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a signing key from PEM encoded private key material
    ///
    /// # Errors
    ///
    /// Returns an error if `algorithm` is not a supported asymmetric
    /// algorithm, if `material` is not a private key for it, or if `id` is
    /// already taken.
    pub fn add_signing_key(
        &mut self,
        id: impl Into<String>,
        algorithm: &str,
        material: &[u8],
    ) -> Result<(), KeyError> {
        let id = id.into();

        if self.signing.iter().any(|key| key.id == id) {
            return Err(KeyError::DuplicateId(id));
        }

        let (algorithm, family) = parse_algorithm(algorithm)
            .and_then(|alg| KeyFamily::of(alg).map(|family| (alg, family)))
            .ok_or_else(|| KeyError::UnsupportedAlgorithm {
                id: id.clone(),
                algorithm: algorithm.to_string(),
            })?;

        let key = family
            .encoding_key(material)
            .map_err(|source| KeyError::InvalidMaterial {
                id: id.clone(),
                source,
            })?;

        info!(kid = %id, algorithm = ?algorithm, "Loaded signing key");
        self.signing.push(SigningKey { id, algorithm, key });
        Ok(())
    }

    /// Insert or overwrite a verification key
    pub fn add_verification_key(&self, key: VerificationKey) {
        debug!(kid = %key.id, "Caching verification key");
        self.verification
            .write()
            .insert(key.id.clone(), Arc::new(key));
    }

    /// Insert or overwrite several verification keys under one write lock
    pub fn add_verification_keys(&self, keys: impl IntoIterator<Item = VerificationKey>) -> usize {
        let mut cache = self.verification.write();
        let mut added = 0;
        for key in keys {
            debug!(kid = %key.id, "Caching verification key");
            cache.insert(key.id.clone(), Arc::new(key));
            added += 1;
        }
        added
    }

    /// Pick a signing key uniformly at random
    ///
    /// # Errors
    ///
    /// Returns [`SignError::NoSigningKeys`] if no signing key was loaded.
    pub fn random_signing_key(&self) -> Result<&SigningKey, SignError> {
        self.signing
            .choose(&mut rand::rng())
            .ok_or(SignError::NoSigningKeys)
    }

    /// Look up a cached verification key
    pub fn get_verification_key(&self, id: &str) -> Option<Arc<VerificationKey>> {
        self.verification.read().get(id).cloned()
    }

    /// Ids of all signing keys, in load order
    pub fn signing_key_ids(&self) -> impl Iterator<Item = &str> {
        self.signing.iter().map(SigningKey::id)
    }

    /// Number of loaded signing keys
    pub fn signing_key_count(&self) -> usize {
        self.signing.len()
    }

    /// Number of cached verification keys
    pub fn verification_key_count(&self) -> usize {
        self.verification.read().len()
    }
}
