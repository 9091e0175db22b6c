// # Tiltify API Donation Source
//
// This crate provides the Tiltify v3 REST implementation of `DonationSource`.
//
// ## Implementation Status
//
// - ✅ One HTTP request per trait call
// - ✅ Full error propagation to the engine (the engine retries next tick)
// - ✅ HTTP timeout configured (30 seconds, the engine adds its own bound)
// - ✅ Specific error handling for HTTP status codes (401, 403, 404, 429, 5xx)
// - ✅ Bearer authentication
// - ❌ NO retry logic (intentionally omitted - owned by PollEngine)
// - ❌ NO caching (intentionally omitted - state owned by StateStore)
// - ❌ NO background tasks (intentionally omitted - violates shutdown determinism)
//
// ## Trust Level: Untrusted (Donation Source)
//
// **Allowed Capabilities**:
// - ✅ Perform HTTP/HTTPS API calls to the Tiltify endpoints only
// - ✅ Parse Tiltify-specific responses
//
// **Forbidden Capabilities**:
// - ❌ Spawn tasks or threads
// - ❌ Implement retry logic
// - ❌ Access the state store
// - ❌ Deduplicate or reorder donations
//
// ## Security Requirements
//
// - Access token NEVER appears in logs
// - Client MUST fail fast if the token is empty
//
// ## API Reference
//
// Every response is wrapped in `{ "data": ... }`.
//
// - `GET campaigns/{id}`
// - `GET causes/{id}`
// - `GET campaigns/{id}/donations[?after={lastId}]`
// - `GET campaigns/{id}/rewards`, `/polls`, `/challenges`
// - `GET user`, then `GET users/{id}/campaigns`

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tiltify_core::config::ConnectionConfig;
use tiltify_core::model::{
    Campaign, CampaignSummary, Cause, Challenge, Donation, DonationId, Poll, Reward, User,
};
use tiltify_core::registry::ComponentRegistry;
use tiltify_core::traits::{DonationSource, DonationSourceFactory};
use tiltify_core::{Error, Result};

/// Name under which the source is registered
pub const SOURCE_NAME: &str = "tiltify";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Response envelope used by every Tiltify v3 endpoint
#[derive(serde::Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Tiltify v3 REST client
///
/// # Trust Level: Untrusted
///
/// This client is isolated, stateless, and single-shot. All coordination
/// (retries, scheduling, deduplication) is owned by `PollEngine`.
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the access token.
pub struct TiltifyClient {
    /// Tiltify access token
    /// ⚠️ NEVER log this value
    access_token: String,

    /// API base URL, without a trailing slash
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the access token
impl std::fmt::Debug for TiltifyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiltifyClient")
            .field("access_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl TiltifyClient {
    /// Create a new Tiltify client
    ///
    /// # Parameters
    ///
    /// - `access_token`: Tiltify access token
    /// - `base_url`: API base URL, e.g. `https://tiltify.com/api/v3/`
    /// - `timeout`: Per-request HTTP timeout
    ///
    /// # Returns
    ///
    /// - `Err(Error::Config)`: Empty token or URL, or the HTTP client could
    ///   not be built
    pub fn new(
        access_token: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let access_token = access_token.into();
        if access_token.trim().is_empty() {
            return Err(Error::config("Tiltify access token cannot be empty"));
        }

        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::config("Tiltify API base URL cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            access_token,
            base_url,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// GET `path` and unwrap the `data` envelope
    ///
    /// # Errors
    ///
    /// - 401/403: `Error::Authentication`
    /// - 404: `Error::NotFound`
    /// - 429: `Error::RateLimited`
    /// - Other non-success, transport failure or undecodable body: `Error::Upstream`
    /// - Client timeout: `Error::Timeout`
    async fn get_data<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        tracing::debug!(path, "Tiltify GET");

        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::timeout(format!("GET {} timed out", path))
                } else {
                    Error::upstream(format!("GET {} failed: {}", path, e.without_url()))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = body.chars().take(200).collect::<String>();

            return Err(match status.as_u16() {
                401 | 403 => Error::auth(format!(
                    "Tiltify rejected the access token for {}. Status: {}",
                    path, status
                )),
                404 => Error::not_found(format!("Tiltify resource not found: {}", path)),
                429 => Error::rate_limited(format!(
                    "Tiltify rate limit exceeded for {}. Status: {}",
                    path, status
                )),
                _ => Error::upstream(format!("GET {} failed: {} - {}", path, status, body)),
            });
        }

        let envelope: Envelope<T> = response.json().await.map_err(|e| {
            Error::upstream(format!("Failed to parse response of {}: {}", path, e))
        })?;

        Ok(envelope.data)
    }
}

#[async_trait]
impl DonationSource for TiltifyClient {
    async fn fetch_campaign(&self, campaign_id: &str) -> Result<Campaign> {
        self.get_data(&format!("campaigns/{}", campaign_id), &[]).await
    }

    async fn fetch_cause(&self, cause_id: i64) -> Result<Cause> {
        self.get_data(&format!("causes/{}", cause_id), &[]).await
    }

    async fn fetch_donations(
        &self,
        campaign_id: &str,
        after: Option<DonationId>,
    ) -> Result<Vec<Donation>> {
        let path = format!("campaigns/{}/donations", campaign_id);
        match after {
            Some(id) => self.get_data(&path, &[("after", id.to_string())]).await,
            None => self.get_data(&path, &[]).await,
        }
    }

    async fn fetch_rewards(&self, campaign_id: &str) -> Result<Vec<Reward>> {
        self.get_data(&format!("campaigns/{}/rewards", campaign_id), &[])
            .await
    }

    async fn fetch_polls(&self, campaign_id: &str) -> Result<Vec<Poll>> {
        self.get_data(&format!("campaigns/{}/polls", campaign_id), &[])
            .await
    }

    async fn fetch_challenges(&self, campaign_id: &str) -> Result<Vec<Challenge>> {
        self.get_data(&format!("campaigns/{}/challenges", campaign_id), &[])
            .await
    }

    async fn fetch_current_user(&self) -> Result<User> {
        self.get_data("user", &[]).await
    }

    async fn fetch_user_campaigns(&self, user_id: i64) -> Result<Vec<CampaignSummary>> {
        self.get_data(&format!("users/{}/campaigns", user_id), &[])
            .await
    }

    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }
}

/// Factory for creating Tiltify clients
pub struct TiltifyClientFactory {
    timeout: Duration,
}

impl TiltifyClientFactory {
    /// Create a factory whose clients use `timeout` per request
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TiltifyClientFactory {
    fn default() -> Self {
        Self::new(DEFAULT_HTTP_TIMEOUT)
    }
}

impl DonationSourceFactory for TiltifyClientFactory {
    fn create(&self, config: &ConnectionConfig) -> Result<Arc<dyn DonationSource>> {
        let client = TiltifyClient::new(
            config.credential.clone(),
            config.api_base_url.clone(),
            self.timeout,
        )?;
        Ok(Arc::new(client))
    }
}

/// Register the Tiltify source with a registry
///
/// This function should be called during initialization to make the
/// Tiltify source available.
///
/// # Example
///
/// ```rust,no_run
/// use tiltify_core::ComponentRegistry;
/// use tiltify_api::register;
///
/// let registry = ComponentRegistry::new();
/// register(&registry);
/// ```
pub fn register(registry: &ComponentRegistry) {
    registry.register_donation_source(SOURCE_NAME, Arc::new(TiltifyClientFactory::default()));
}
