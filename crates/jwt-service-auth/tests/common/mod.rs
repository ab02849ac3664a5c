//! Common test utilities for integration tests
//!
//! Key fixtures, key store builders, a mock key service and a helper for
//! hand-crafting tokens outside the signer.

#![allow(dead_code)]

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use jwt_service_auth::{KeyResolver, KeyStore, RemoteKeySource, Signer, VerificationKey, Verifier};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing_subscriber::fmt::MakeWriter;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

pub const ES256_1_PRIVATE: &str = include_str!("../fixtures/es256-1.pem");
pub const ES256_1_PUBLIC: &str = include_str!("../fixtures/es256-1.pub.pem");
pub const ES256_2_PRIVATE: &str = include_str!("../fixtures/es256-2.pem");
pub const ES256_2_PUBLIC: &str = include_str!("../fixtures/es256-2.pub.pem");
pub const RS256_1_PRIVATE: &str = include_str!("../fixtures/rs256-1.pem");
pub const RS256_1_PUBLIC: &str = include_str!("../fixtures/rs256-1.pub.pem");

pub const APP_ID: &str = "test-app";

/// Current time as Unix timestamp
pub fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

/// Key store holding the given signing keys (id, algorithm, private PEM)
pub fn signing_store(keys: &[(&str, &str, &str)]) -> KeyStore {
    let mut store = KeyStore::new();
    for (id, algorithm, pem) in keys {
        store
            .add_signing_key(*id, algorithm, pem.as_bytes())
            .expect("fixture signing key");
    }
    store
}

/// Signer over both ES256 fixture keys (`es256_1`, `es256_2`)
pub fn two_key_signer() -> Signer {
    let store = signing_store(&[
        ("es256_1", "ES256", ES256_1_PRIVATE),
        ("es256_2", "ES256", ES256_2_PRIVATE),
    ]);
    Signer::new(Arc::new(store), APP_ID)
}

/// Verifier whose cache holds the public halves of both ES256 fixture keys
pub fn local_verifier() -> Verifier {
    let store = KeyStore::new();
    store.add_verification_key(VerificationKey::new("es256_1", ES256_1_PUBLIC));
    store.add_verification_key(VerificationKey::new("es256_2", ES256_2_PUBLIC));
    Verifier::new(KeyResolver::new(Arc::new(store)))
}

/// Verifier with an empty cache backed by the key service at `base_url`
pub fn remote_verifier(base_url: &str, timeout: Duration, refresh_interval: Duration) -> Verifier {
    let remote = RemoteKeySource::new(base_url, timeout)
        .expect("http client")
        .with_refresh_interval(refresh_interval);
    Verifier::new(KeyResolver::new(Arc::new(KeyStore::new())).with_remote(remote))
}

/// Sign arbitrary claims with an explicit header, bypassing the signer
pub fn forge_token(kid: &str, algorithm: Algorithm, private_pem: &str, claims: Value) -> String {
    let key = match algorithm {
        Algorithm::RS256 => EncodingKey::from_rsa_pem(private_pem.as_bytes()),
        Algorithm::ES256 => EncodingKey::from_ec_pem(private_pem.as_bytes()),
        _ => panic!("Unsupported algorithm for forged token"),
    }
    .expect("fixture key");

    let mut header = Header::new(algorithm);
    header.typ = Some("JWT".to_string());
    header.kid = Some(kid.to_string());

    encode(&header, &claims, &key).expect("Failed to encode forged token")
}

/// Mock of the marketplace key service
pub struct MockKeyService {
    pub server: MockServer,
    pub base_url: String,
}

impl MockKeyService {
    /// Start a key service with no mounted routes
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let base_url = server.uri();
        Self { server, base_url }
    }

    /// Serve `keys` as (kid, algorithm, public PEM) from `/v1/config`
    pub async fn mock_keys(&self, keys: &[(&str, &str, &str)], delay: Duration) {
        Mock::given(method("GET"))
            .and(path("/v1/config"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(config_document(keys))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Serve a fixed response from `/v1/config`
    pub async fn mock_response(&self, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/v1/config"))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Number of requests the key service received
    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or_default()
    }
}

/// Key service configuration document
pub fn config_document(keys: &[(&str, &str, &str)]) -> Value {
    let mut jwt_keys = serde_json::Map::new();
    for (kid, algorithm, pem) in keys {
        jwt_keys.insert(
            kid.to_string(),
            json!({ "key": pem, "algorithm": algorithm }),
        );
    }
    json!({
        "jwt_keys": jwt_keys,
        "blockchain": { "horizon_url": "https://horizon.example.com" }
    })
}

/// Log lines written while a capture is installed on the current thread
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Route this thread's events at DEBUG and above into the capture
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(self.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Captured lines containing `message`
    pub fn lines_with(&self, message: &str) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .filter(|line| line.contains(message))
            .map(str::to_string)
            .collect()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
