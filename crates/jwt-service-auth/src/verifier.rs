//! Token verification
//!
//! Verification runs in a fixed order and stops at the first failure:
//!
//! 1. Structural decode without trusting the signature: three segments,
//!    base64url header and payload, JSON objects.
//! 2. Algorithm allowlist (asymmetric algorithms only) and `kid` presence.
//! 3. Key resolution through the [`KeyResolver`], which may hit the remote
//!    key service.
//! 4. Signature check with the resolved key and the header algorithm.
//! 5. Expiry: `exp` must be an integer strictly in the future. No leeway.
//!
//! [`Verifier::validate`] folds every failure into a [`ValidationResult`], so
//! no input string can make it error out or panic.

use crate::claims::Claims;
use crate::error::VerifyError;
use crate::keys::SUPPORTED_ALGORITHMS;
use crate::resolver::KeyResolver;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Header, TokenData, Validation, decode, decode_header};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Outcome of validating a token, as reported to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the token is valid
    pub is_valid: bool,
    /// Why the token is invalid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationResult {
    /// A valid result
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            error: None,
        }
    }

    /// An invalid result carrying the error's message
    pub fn invalid(error: &VerifyError) -> Self {
        Self {
            is_valid: false,
            error: Some(error.to_string()),
        }
    }
}

impl<T> From<Result<T, VerifyError>> for ValidationResult {
    fn from(result: Result<T, VerifyError>) -> Self {
        match result {
            Ok(_) => Self::valid(),
            Err(e) => Self::invalid(&e),
        }
    }
}

/// A token whose signature and expiry have been checked
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedToken {
    /// Key id from the header
    pub key_id: String,
    /// Signature algorithm from the header
    pub algorithm: Algorithm,
    /// Verified claims
    pub claims: Claims,
}

impl VerifiedToken {
    /// Subject claim, if present and a string
    pub fn subject(&self) -> Option<&str> {
        self.claims.get("sub").and_then(Value::as_str)
    }
}

/// Header and payload of a token, decoded without checking the signature
#[derive(Debug, Clone)]
pub struct UnverifiedToken {
    /// Decoded header
    pub header: Header,
    /// Decoded payload
    pub claims: Claims,
}

/// Decode header and payload without checking the signature
///
/// # Errors
///
/// Returns [`VerifyError::Malformed`] unless the token has exactly three
/// segments and the first two are base64url encoded JSON objects.
pub fn decode_unverified(token: &str) -> Result<UnverifiedToken, VerifyError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(VerifyError::Malformed);
    }

    let header = decode_header(token).map_err(|e| {
        debug!(error = %e, "Failed to decode token header");
        VerifyError::Malformed
    })?;

    let payload = URL_SAFE_NO_PAD.decode(segments[1]).map_err(|e| {
        debug!(error = %e, "Invalid token payload encoding");
        VerifyError::Malformed
    })?;

    let claims: Claims = serde_json::from_slice(&payload).map_err(|e| {
        debug!(error = %e, "Invalid token payload");
        VerifyError::Malformed
    })?;

    Ok(UnverifiedToken { header, claims })
}

/// Verifies tokens against keys found by a [`KeyResolver`]
///
/// # Example
///
/// ```rust,no_run
/// # use jwt_service_auth::{KeyResolver, KeyStore, Verifier};
/// # use std::sync::Arc;
/// # async fn example() {
/// let verifier = Verifier::new(KeyResolver::new(Arc::new(KeyStore::new())));
///
/// let result = verifier.validate("eyJ0eXAi...").await;
/// assert!(!result.is_valid);
/// # }
/// ```
#[derive(Debug)]
pub struct Verifier {
    resolver: KeyResolver,
}

impl Verifier {
    /// Create a verifier resolving keys through `resolver`
    pub fn new(resolver: KeyResolver) -> Self {
        Self { resolver }
    }

    /// The key resolver in use
    pub fn resolver(&self) -> &KeyResolver {
        &self.resolver
    }

    /// Validate a token, reporting the outcome as a [`ValidationResult`]
    pub async fn validate(&self, token: &str) -> ValidationResult {
        self.verify(token).await.into()
    }

    /// Verify a token and return its claims
    ///
    /// # Errors
    ///
    /// Returns the first [`VerifyError`] encountered; see the module docs for
    /// the order of checks.
    pub async fn verify(&self, token: &str) -> Result<VerifiedToken, VerifyError> {
        let UnverifiedToken { header, .. } = decode_unverified(token)?;

        if !SUPPORTED_ALGORITHMS.contains(&header.alg) {
            warn!(algorithm = ?header.alg, "Token algorithm not allowed");
            return Err(VerifyError::UnsupportedAlgorithm(format!("{:?}", header.alg)));
        }

        let key_id = header
            .kid
            .filter(|kid| !kid.is_empty())
            .ok_or(VerifyError::MissingKeyId)?;

        let key = self.resolver.resolve_public_key(&key_id).await?;

        if let Some(pinned) = key.algorithm()
            && pinned != header.alg
        {
            warn!(
                kid = %key_id,
                pinned = ?pinned,
                algorithm = ?header.alg,
                "Token algorithm does not match key"
            );
            return Err(VerifyError::AlgorithmMismatch(key_id));
        }

        let decoding_key = key.decoding_key(header.alg).map_err(|e| {
            warn!(kid = %key_id, error = %e, "Verification key unusable for algorithm");
            VerifyError::InvalidKey(key_id.clone())
        })?;

        let mut validation = Validation::new(header.alg);
        validation.leeway = 0;
        validation.validate_aud = false;

        let TokenData { claims, .. } = decode::<Claims>(token, &decoding_key, &validation)
            .map_err(|e| {
                warn!(kid = %key_id, error = %e, "Token verification failed");
                classify(&e)
            })?;

        let exp = claims
            .get("exp")
            .and_then(Value::as_i64)
            .ok_or_else(|| VerifyError::InvalidClaims("exp must be an integer".to_string()))?;

        if exp <= Utc::now().timestamp() {
            debug!(kid = %key_id, exp, "Token expired");
            return Err(VerifyError::Expired);
        }

        debug!(kid = %key_id, algorithm = ?header.alg, "Token verified");

        Ok(VerifiedToken {
            key_id,
            algorithm: header.alg,
            claims,
        })
    }
}

fn classify(error: &jsonwebtoken::errors::Error) -> VerifyError {
    match error.kind() {
        ErrorKind::ExpiredSignature => VerifyError::Expired,
        // Absent and unparseable `exp` both surface as a missing claim
        ErrorKind::MissingRequiredClaim(claim) if claim.as_str() == "exp" => {
            VerifyError::InvalidClaims("exp must be an integer".to_string())
        }
        ErrorKind::MissingRequiredClaim(claim) => {
            VerifyError::InvalidClaims(format!("missing {claim}"))
        }
        ErrorKind::Json(_) | ErrorKind::Utf8(_) => VerifyError::Malformed,
        _ => VerifyError::SignatureInvalid,
    }
}
