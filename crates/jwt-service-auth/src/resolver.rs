//! Verification key resolution with remote fallback
//!
//! Lookups go to the [`KeyStore`] cache first. On a miss, and only when a
//! remote key service is configured, the resolver downloads the service's
//! whole key set from `<base>/v1/config`, caches every entry it returns and
//! looks again.
//!
//! # Fetch coalescing
//!
//! There is at most one fetch in flight at a time. A miss that happens while a
//! fetch is running joins it instead of starting another one, whichever `kid`
//! it is looking for, and every waiter sees the same outcome. The fetch runs
//! on its own task: a waiter that is cancelled or times out does not stall it,
//! and the keys it downloads are cached even if nobody is left waiting. After a fetch
//! completes, no new fetch starts until the refresh interval has passed; a
//! miss inside that window is answered as "not found" without touching the
//! network.
//!
//! # Failure handling
//!
//! Transport errors, timeouts, non-2xx statuses and malformed bodies are
//! logged and reported as a missing key. They never panic and never block a
//! caller for longer than the HTTP client timeout.

use crate::error::{FetchError, VerifyError};
use crate::keys::{KeyStore, VerificationKey, parse_algorithm};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Default bound on one remote fetch, connection to last body byte
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default minimum spacing between two remote fetches
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Key service configuration document (only the part we read)
#[derive(Debug, Deserialize)]
struct RemoteConfig {
    jwt_keys: HashMap<String, RemoteKey>,
}

#[derive(Debug, Deserialize)]
struct RemoteKey {
    key: String,
    #[serde(default)]
    algorithm: Option<String>,
}

type SharedFetch = Shared<BoxFuture<'static, Result<usize, FetchError>>>;

/// Remote key service client
///
/// # Example
///
/// ```rust,no_run
/// # use jwt_service_auth::{KeyResolver, KeyStore, RemoteKeySource};
/// # use std::sync::Arc;
/// # use std::time::Duration;
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let remote = RemoteKeySource::new("https://marketplace.example.com", Duration::from_secs(5))?;
/// let resolver = KeyResolver::new(Arc::new(KeyStore::new())).with_remote(remote);
/// # Ok(())
/// # }
/// ```
pub struct RemoteKeySource {
    /// `<base>/v1/config`
    config_url: String,
    /// HTTP client with the fetch timeout applied
    http_client: reqwest::Client,
    /// Minimum spacing between completed fetches
    min_refresh_interval: Duration,
    /// Fetch currently running, if any
    in_flight: Arc<Mutex<Option<SharedFetch>>>,
    /// When the last fetch completed
    last_fetch: Arc<Mutex<Option<Instant>>>,
}

// Manual Debug impl: the in-flight future has no useful representation
impl std::fmt::Debug for RemoteKeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteKeySource")
            .field("config_url", &self.config_url)
            .field("min_refresh_interval", &self.min_refresh_interval)
            .field(
                "in_flight",
                &self.in_flight.lock().as_ref().map(|_| "<fetching>"),
            )
            .finish()
    }
}

impl RemoteKeySource {
    /// Create a client for the key service at `base_url`
    ///
    /// `timeout` bounds each fetch as a whole.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            config_url: format!("{}/v1/config", base_url.trim_end_matches('/')),
            http_client,
            min_refresh_interval: DEFAULT_REFRESH_INTERVAL,
            in_flight: Arc::new(Mutex::new(None)),
            last_fetch: Arc::new(Mutex::new(None)),
        })
    }

    /// Set the minimum spacing between two fetches
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// URL of the key service configuration resource
    pub fn config_url(&self) -> &str {
        &self.config_url
    }

    /// Fill `keys` from the key service, joining a fetch already in flight
    ///
    /// The fetch runs as its own task, so it settles and frees the slot even
    /// when every caller waiting on it has gone away.
    ///
    /// Returns the number of keys cached by the fetch that was awaited.
    async fn fill(&self, keys: &Arc<KeyStore>, kid: &str) -> Result<usize, FetchError> {
        let fetch = {
            let mut slot = self.in_flight.lock();
            match slot.as_ref() {
                Some(fetch) => {
                    debug!(kid, url = %self.config_url, "Joining in-flight key fetch");
                    fetch.clone()
                }
                None => {
                    // A fill may have completed between the caller's miss and now
                    if keys.get_verification_key(kid).is_some() {
                        return Ok(0);
                    }

                    if let Some(last) = *self.last_fetch.lock()
                        && last.elapsed() < self.min_refresh_interval
                    {
                        warn!(
                            kid,
                            url = %self.config_url,
                            since_last_ms = last.elapsed().as_millis(),
                            "Key service fetch rate limited"
                        );
                        return Err(FetchError::RateLimited);
                    }

                    let task = tokio::spawn(fetch_and_cache(
                        self.http_client.clone(),
                        self.config_url.clone(),
                        Arc::clone(keys),
                        Arc::clone(&self.last_fetch),
                        Arc::clone(&self.in_flight),
                    ));
                    let fetch = task
                        .map(|joined| {
                            joined.unwrap_or_else(|e| Err(FetchError::Task(e.to_string())))
                        })
                        .boxed()
                        .shared();
                    *slot = Some(fetch.clone());
                    fetch
                }
            }
        };

        fetch.await
    }
}

/// Download the key set, cache it, record completion time and free the slot
///
/// The slot is only ever filled while empty, so at this point it holds the
/// fetch this task is running.
async fn fetch_and_cache(
    http_client: reqwest::Client,
    config_url: String,
    keys: Arc<KeyStore>,
    last_fetch: Arc<Mutex<Option<Instant>>>,
    in_flight: Arc<Mutex<Option<SharedFetch>>>,
) -> Result<usize, FetchError> {
    info!(url = %config_url, "Fetching keys from key service");

    let result = fetch_keys(&http_client, &config_url).await;
    *last_fetch.lock() = Some(Instant::now());

    let result = result.map(|fetched| {
        let added = keys.add_verification_keys(fetched);
        info!(url = %config_url, key_count = added, "Cached keys from key service");
        added
    });

    *in_flight.lock() = None;
    result
}

async fn fetch_keys(
    http_client: &reqwest::Client,
    config_url: &str,
) -> Result<Vec<VerificationKey>, FetchError> {
    let response = http_client.get(config_url).send().await.map_err(|e| {
        error!(url = %config_url, error = %e, "Failed to reach key service");
        FetchError::Transport(e.to_string())
    })?;

    if !response.status().is_success() {
        error!(
            url = %config_url,
            status = %response.status(),
            "Key service returned error status"
        );
        return Err(FetchError::Status(response.status().as_u16()));
    }

    let config: RemoteConfig = response.json().await.map_err(|e| {
        error!(url = %config_url, error = %e, "Failed to parse key service response");
        FetchError::Body(e.to_string())
    })?;

    let mut keys = Vec::with_capacity(config.jwt_keys.len());
    for (kid, entry) in config.jwt_keys {
        let mut key = VerificationKey::new(kid, entry.key.into_bytes());
        if let Some(name) = entry.algorithm.as_deref() {
            let Some(algorithm) = parse_algorithm(name) else {
                warn!(kid = %key.id(), algorithm = name, "Skipping key with unsupported algorithm");
                continue;
            };
            key = key.with_algorithm(algorithm);
        }
        keys.push(key);
    }

    Ok(keys)
}

/// Resolves the verification key named by a token's `kid`
#[derive(Debug)]
pub struct KeyResolver {
    keys: Arc<KeyStore>,
    remote: Option<RemoteKeySource>,
}

impl KeyResolver {
    /// Resolve from the local cache only
    pub fn new(keys: Arc<KeyStore>) -> Self {
        Self { keys, remote: None }
    }

    /// Fall back to `remote` on cache misses
    pub fn with_remote(mut self, remote: RemoteKeySource) -> Self {
        self.remote = Some(remote);
        self
    }

    /// The key store this resolver reads and fills
    pub fn key_store(&self) -> &Arc<KeyStore> {
        &self.keys
    }

    /// The configured key service, if any
    pub fn remote(&self) -> Option<&RemoteKeySource> {
        self.remote.as_ref()
    }

    /// Find the verification key for `kid`
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::KeyNotFound`] if the key is neither cached nor
    /// served by the key service, including when the fetch fails.
    pub async fn resolve_public_key(&self, kid: &str) -> Result<Arc<VerificationKey>, VerifyError> {
        if let Some(key) = self.keys.get_verification_key(kid) {
            debug!(kid, "Found public key locally");
            return Ok(key);
        }

        if let Some(remote) = &self.remote {
            match remote.fill(&self.keys, kid).await {
                Ok(key_count) => debug!(kid, key_count, "Key service fill completed"),
                Err(e) => warn!(kid, error = %e, "Key service fill failed"),
            }

            if let Some(key) = self.keys.get_verification_key(kid) {
                info!(kid, "Found public key from remote");
                return Ok(key);
            }
        }

        warn!(kid, "Did not find public key");
        Err(VerifyError::KeyNotFound(kid.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ES256_PUBLIC: &[u8] = include_bytes!("../tests/fixtures/es256-1.pub.pem");

    #[test]
    fn test_config_url() {
        let remote = RemoteKeySource::new("http://localhost:3000/", DEFAULT_FETCH_TIMEOUT).unwrap();
        assert_eq!(remote.config_url(), "http://localhost:3000/v1/config");

        let remote = RemoteKeySource::new("http://localhost:3000", DEFAULT_FETCH_TIMEOUT).unwrap();
        assert_eq!(remote.config_url(), "http://localhost:3000/v1/config");
        assert_eq!(remote.min_refresh_interval, DEFAULT_REFRESH_INTERVAL);
    }

    #[test]
    fn test_custom_refresh_interval() {
        let remote = RemoteKeySource::new("http://localhost:3000", DEFAULT_FETCH_TIMEOUT)
            .unwrap()
            .with_refresh_interval(Duration::ZERO);
        assert_eq!(remote.min_refresh_interval, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_local_hit() {
        let keys = Arc::new(KeyStore::new());
        keys.add_verification_key(VerificationKey::new("k1", ES256_PUBLIC));

        let resolver = KeyResolver::new(keys);
        let key = resolver.resolve_public_key("k1").await.unwrap();
        assert_eq!(key.id(), "k1");
    }

    #[tokio::test]
    async fn test_miss_without_remote() {
        let resolver = KeyResolver::new(Arc::new(KeyStore::new()));
        assert_eq!(
            resolver.resolve_public_key("unknown").await.unwrap_err(),
            VerifyError::KeyNotFound("unknown".into())
        );
    }

    #[tokio::test]
    async fn test_unreachable_remote_degrades_to_not_found() {
        // Port 9 (discard) on localhost is not served in test environments
        let remote = RemoteKeySource::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let resolver = KeyResolver::new(Arc::new(KeyStore::new())).with_remote(remote);

        let err = resolver.resolve_public_key("k1").await.unwrap_err();
        assert_eq!(err, VerifyError::KeyNotFound("k1".into()));
    }

    #[test]
    fn test_remote_document_parsing() {
        let doc: RemoteConfig = serde_json::from_str(
            r#"{"jwt_keys": {"k1": {"key": "pem", "algorithm": "ES256"}, "k2": {"key": "pem"}}, "other": 1}"#,
        )
        .unwrap();
        assert_eq!(doc.jwt_keys.len(), 2);
        assert_eq!(doc.jwt_keys["k1"].algorithm.as_deref(), Some("ES256"));
        assert!(doc.jwt_keys["k2"].algorithm.is_none());
    }
}
