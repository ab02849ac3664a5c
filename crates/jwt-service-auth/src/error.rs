//! Error types for key loading, signing, remote key fetches and verification
//!
//! Startup problems ([`KeyError`]) are fatal: the service must not become
//! ready with a key set it could not load. Signing problems ([`SignError`])
//! fail the request that triggered them. Verification problems
//! ([`VerifyError`]) are expected outcomes and are turned into a
//! [`ValidationResult`](crate::ValidationResult) instead of being propagated.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while populating the [`KeyStore`](crate::KeyStore)
#[derive(Debug, Error)]
pub enum KeyError {
    /// The algorithm identifier is unknown or not an asymmetric signature algorithm
    #[error("unsupported algorithm '{algorithm}' for key '{id}'")]
    UnsupportedAlgorithm {
        /// Key id from configuration
        id: String,
        /// Algorithm identifier as configured
        algorithm: String,
    },

    /// The key material could not be parsed for the declared algorithm
    #[error("invalid key material for key '{id}': {source}")]
    InvalidMaterial {
        /// Key id from configuration
        id: String,
        /// Underlying parse error
        #[source]
        source: jsonwebtoken::errors::Error,
    },

    /// The public key material is not a PEM public key of any supported family
    #[error("invalid public key material for key '{0}'")]
    InvalidPublicKey(String),

    /// Two signing keys share one id
    #[error("duplicate signing key id '{0}'")]
    DuplicateId(String),

    /// A key file could not be read
    #[error("failed to read key '{id}' from {}: {source}", path.display())]
    Io {
        /// Key id from configuration
        id: String,
        /// Resolved file path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The configuration contains no signing keys
    #[error("no signing keys configured")]
    NoSigningKeys,
}

/// Errors raised while producing a token
#[derive(Debug, Error)]
pub enum SignError {
    /// The key store holds no signing key to sign with
    #[error("no signing keys available")]
    NoSigningKeys,

    /// The JWT library refused to encode the token
    #[error("failed to encode token: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
}

/// Errors raised by a remote key-service fetch
///
/// Cloneable so every caller waiting on one in-flight fetch sees the same outcome.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The HTTP client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    /// Connection, timeout or other transport failure
    #[error("key service request failed: {0}")]
    Transport(String),

    /// The key service answered with a non-success status
    #[error("key service returned status {0}")]
    Status(u16),

    /// The response body was not a valid key set document
    #[error("invalid key service response: {0}")]
    Body(String),

    /// The task running the fetch panicked or was cancelled
    #[error("key fetch task failed: {0}")]
    Task(String),

    /// Another fetch completed too recently to start a new one
    #[error("key service fetch rate limited")]
    RateLimited,
}

/// Reasons a token failed verification
///
/// The `Display` text of each variant is the `error` string reported in a
/// [`ValidationResult`](crate::ValidationResult).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// Wrong segment count, bad base64url or bad JSON
    #[error("malformed token")]
    Malformed,

    /// The header carries no `kid`
    #[error("missing kid")]
    MissingKeyId,

    /// The header declares an algorithm that is not accepted
    #[error("unsupported algorithm {0}")]
    UnsupportedAlgorithm(String),

    /// No verification key is known for the header `kid`
    #[error("no key for kid {0}")]
    KeyNotFound(String),

    /// The stored key declares a different algorithm than the token header
    #[error("algorithm mismatch for kid {0}")]
    AlgorithmMismatch(String),

    /// The stored key material cannot be used for the header algorithm
    #[error("invalid key for kid {0}")]
    InvalidKey(String),

    /// The signature does not match header and payload
    #[error("invalid signature")]
    SignatureInvalid,

    /// `exp` is at or before the current time
    #[error("token expired")]
    Expired,

    /// A registered claim is missing or has the wrong type
    #[error("invalid claims: {0}")]
    InvalidClaims(String),
}
