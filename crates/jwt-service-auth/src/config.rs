//! Key material configuration
//!
//! Keys are configured by id and point at PEM files:
//!
//! ```toml
//! [private_keys.es256_0]
//! algorithm = "ES256"
//! file = "keys/es256_0-priv.pem"
//!
//! [public_keys]
//! es256_0 = "keys/es256_0.pem"
//! ```
//!
//! Relative paths are resolved against a base directory, normally the
//! directory of the configuration file. Every failure is fatal: a service that
//! cannot load its keys must not start.

use crate::error::KeyError;
use crate::keys::{KeyStore, VerificationKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// One signing key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateKeyConfig {
    /// Algorithm identifier, e.g. `ES256`
    pub algorithm: String,
    /// Path of the PEM encoded private key
    pub file: PathBuf,
}

/// Signing and verification keys to load at startup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyConfig {
    /// Signing keys by id
    #[serde(default)]
    pub private_keys: BTreeMap<String, PrivateKeyConfig>,
    /// Verification key PEM paths by id
    #[serde(default)]
    pub public_keys: BTreeMap<String, PathBuf>,
}

impl KeyStore {
    /// Load every configured key
    ///
    /// # Errors
    ///
    /// Returns the first [`KeyError`] hit: an unreadable file, an unsupported
    /// algorithm, unparseable key material, or an empty signing key set.
    pub fn from_config(config: &KeyConfig, base_dir: &Path) -> Result<Self, KeyError> {
        if config.private_keys.is_empty() {
            return Err(KeyError::NoSigningKeys);
        }

        let mut store = Self::new();

        for (id, key) in &config.private_keys {
            let material = read_key_file(id, &resolve(base_dir, &key.file))?;
            store.add_signing_key(id.clone(), &key.algorithm, &material)?;
        }

        for (id, file) in &config.public_keys {
            let key = VerificationKey::new(id.clone(), read_key_file(id, &resolve(base_dir, file))?);
            if !key.is_parseable() {
                return Err(KeyError::InvalidPublicKey(id.clone()));
            }
            store.add_verification_key(key);
        }

        info!(
            signing_keys = store.signing_key_count(),
            verification_keys = store.verification_key_count(),
            "Key store loaded"
        );

        Ok(store)
    }
}

fn resolve(base_dir: &Path, file: &Path) -> PathBuf {
    if file.is_absolute() {
        file.to_path_buf()
    } else {
        base_dir.join(file)
    }
}

fn read_key_file(id: &str, path: &Path) -> Result<Vec<u8>, KeyError> {
    std::fs::read(path).map_err(|source| KeyError::Io {
        id: id.to_string(),
        path: path.to_path_buf(),
        source,
    })
}
