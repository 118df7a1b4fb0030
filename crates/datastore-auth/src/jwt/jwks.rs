//! Signing-key resolution from a JWKS endpoint
//!
//! The resolver reads the `kid` header of an unverified token and returns the
//! matching public key, fetching the key set from the identity provider on a
//! cache miss:
//!
//! - **Per-kid TTL cache**: every key of a fetched set is cached with the fetch
//!   time and expires after the configured lifespan (default 3000 seconds)
//! - **Single-flight refresh**: concurrent misses wait on one fetch and re-check
//!   the cache before going to the network
//! - **Refresh floor**: neither an unknown `kid` nor a failing endpoint can
//!   cause more than one fetch per minimum refresh interval; expired keys keep
//!   serving until the next fetch is allowed
//!
//! Resolution failures are operational ([`AuthError::KeyResolution`]), never
//! token-validity failures. A token whose header cannot be read at all is
//! [`AuthError::InvalidToken`].

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{DecodingKey, decode_header};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::error::{AuthError, AuthResult};

/// Default lifespan of a cached key
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3000);

/// Default timeout for the key-set request
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default minimum time between two key-set fetches
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Public key used to verify token signatures
#[derive(Clone)]
pub struct SigningKey {
    key_id: String,
    decoding_key: DecodingKey,
}

impl SigningKey {
    /// Wrap a decoding key under its key id
    pub fn new(key_id: impl Into<String>, decoding_key: DecodingKey) -> Self {
        Self {
            key_id: key_id.into(),
            decoding_key,
        }
    }

    /// Key id (`kid`) this key was published under
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

// Key material stays out of logs
impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
struct CachedKey {
    key: Arc<SigningKey>,
    fetched_at: Instant,
}

impl CachedKey {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() >= ttl
    }
}

/// Resolves token signing keys from a JWKS endpoint
///
/// Shared across concurrent requests; the cache is the only state that
/// outlives a request.
///
/// # Example
///
/// ```rust,no_run
/// # use datastore_auth::jwt::SigningKeyResolver;
/// # async fn run(token: &str) -> datastore_auth::AuthResult<()> {
/// let resolver = SigningKeyResolver::new("https://idp.example.com/jwks")?;
/// let key = resolver.resolve(token).await?;
/// println!("verified with {}", key.key_id());
/// # Ok(())
/// # }
/// ```
pub struct SigningKeyResolver {
    jwks_uri: String,
    http_client: reqwest::Client,
    cache: RwLock<HashMap<String, CachedKey>>,
    /// Held while fetching; records when the last fetch happened
    last_fetch: Mutex<Option<Instant>>,
    cache_ttl: Duration,
    min_refresh_interval: Duration,
}

impl std::fmt::Debug for SigningKeyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeyResolver")
            .field("jwks_uri", &self.jwks_uri)
            .field("cache_ttl", &self.cache_ttl)
            .field("min_refresh_interval", &self.min_refresh_interval)
            .field("cache", &"<cached keys>")
            .finish()
    }
}

impl SigningKeyResolver {
    /// Create a resolver with the default lifespan and timeout
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the HTTP client cannot be built.
    pub fn new(jwks_uri: impl Into<String>) -> AuthResult<Self> {
        Self::with_settings(jwks_uri, DEFAULT_CACHE_TTL, DEFAULT_FETCH_TIMEOUT)
    }

    /// Create a resolver with a custom cache lifespan and fetch timeout
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the HTTP client cannot be built.
    pub fn with_settings(
        jwks_uri: impl Into<String>,
        cache_ttl: Duration,
        fetch_timeout: Duration,
    ) -> AuthResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .map_err(|e| AuthError::Configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            jwks_uri: jwks_uri.into(),
            http_client,
            cache: RwLock::new(HashMap::new()),
            last_fetch: Mutex::new(None),
            cache_ttl,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
        })
    }

    /// Set the minimum time between two fetches
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Resolve the signing key for an unverified token
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidToken`] if the header is unreadable or has no `kid`
    /// - [`AuthError::KeyResolution`] if the endpoint is unreachable, returns
    ///   malformed data, or does not publish the `kid`
    pub async fn resolve(&self, token: &str) -> AuthResult<Arc<SigningKey>> {
        let header = decode_header(token).map_err(|e| {
            debug!(error = %e, "Failed to decode token header");
            AuthError::InvalidToken
        })?;

        let key_id = header.kid.ok_or_else(|| {
            debug!("Token header has no kid");
            AuthError::InvalidToken
        })?;

        self.key_for(&key_id).await
    }

    /// Look up a key by id, fetching the key set on a miss
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyResolution`] if the key cannot be obtained.
    pub async fn key_for(&self, key_id: &str) -> AuthResult<Arc<SigningKey>> {
        if let Some(key) = self.cached(key_id).await {
            debug!(kid = %key_id, "Signing key cache hit");
            return Ok(key);
        }

        let mut last_fetch = self.last_fetch.lock().await;

        // Another request may have refreshed while we waited
        if let Some(key) = self.cached(key_id).await {
            debug!(kid = %key_id, "Signing key cached by concurrent refresh");
            return Ok(key);
        }

        if let Some(last) = *last_fetch
            && last.elapsed() < self.min_refresh_interval
        {
            // Expired keys keep serving until the next refresh is allowed
            if let Some(key) = self.stale(key_id).await {
                debug!(
                    kid = %key_id,
                    "Serving expired signing key while refresh is rate limited"
                );
                return Ok(key);
            }
            warn!(
                kid = %key_id,
                jwks_uri = %self.jwks_uri,
                since_last_ms = last.elapsed().as_millis(),
                "Key id unknown and JWKS refresh rate limited"
            );
            return Err(AuthError::KeyResolution(format!(
                "Key ID '{key_id}' not found in JWKS"
            )));
        }

        // Failed fetches count against the refresh floor too
        *last_fetch = Some(Instant::now());
        let keys = self.fetch().await?;
        let fetched_at = Instant::now();

        let mut cache = self.cache.write().await;
        *cache = keys
            .into_iter()
            .map(|key| {
                let entry = CachedKey {
                    key: Arc::new(key),
                    fetched_at,
                };
                (entry.key.key_id().to_string(), entry)
            })
            .collect();

        cache
            .get(key_id)
            .map(|entry| Arc::clone(&entry.key))
            .ok_or_else(|| {
                error!(kid = %key_id, jwks_uri = %self.jwks_uri, "Key ID not found in JWKS");
                AuthError::KeyResolution(format!("Key ID '{key_id}' not found in JWKS"))
            })
    }

    async fn cached(&self, key_id: &str) -> Option<Arc<SigningKey>> {
        let cache = self.cache.read().await;
        cache
            .get(key_id)
            .filter(|entry| !entry.is_expired(self.cache_ttl))
            .map(|entry| Arc::clone(&entry.key))
    }

    async fn stale(&self, key_id: &str) -> Option<Arc<SigningKey>> {
        let cache = self.cache.read().await;
        cache.get(key_id).map(|entry| Arc::clone(&entry.key))
    }

    async fn fetch(&self) -> AuthResult<Vec<SigningKey>> {
        info!(jwks_uri = %self.jwks_uri, "Fetching JWKS from endpoint");

        let response = self
            .http_client
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|e| {
                error!(jwks_uri = %self.jwks_uri, error = %e, "Failed to fetch JWKS");
                AuthError::KeyResolution(format!("JWKS fetch failed: {e}"))
            })?;

        if !response.status().is_success() {
            error!(
                jwks_uri = %self.jwks_uri,
                status = %response.status(),
                "JWKS endpoint returned error status"
            );
            return Err(AuthError::KeyResolution(format!(
                "JWKS endpoint returned status {}",
                response.status()
            )));
        }

        let jwks: JwkSet = response.json().await.map_err(|e| {
            error!(jwks_uri = %self.jwks_uri, error = %e, "Failed to parse JWKS JSON");
            AuthError::KeyResolution(format!("Invalid JWKS format: {e}"))
        })?;

        let mut keys = Vec::with_capacity(jwks.keys.len());
        for jwk in &jwks.keys {
            let Some(key_id) = jwk.common.key_id.clone() else {
                warn!(jwks_uri = %self.jwks_uri, "Skipping JWK without kid");
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(decoding_key) => keys.push(SigningKey::new(key_id, decoding_key)),
                Err(e) => warn!(kid = %key_id, error = %e, "Skipping unusable JWK"),
            }
        }

        if keys.is_empty() {
            error!(jwks_uri = %self.jwks_uri, "JWKS contained no usable keys");
            return Err(AuthError::KeyResolution(
                "No valid keys found in JWKS".to_string(),
            ));
        }

        info!(jwks_uri = %self.jwks_uri, key_count = keys.len(), "Successfully fetched JWKS");
        Ok(keys)
    }

    /// JWKS endpoint URI
    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }

    /// Cache lifespan
    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// Drop all cached keys
    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
        *self.last_fetch.lock().await = None;
        debug!(jwks_uri = %self.jwks_uri, "Signing key cache cleared");
    }
}
