// # Donation Source Trait
//
// Defines the interface for reading campaign, cause and donation data from
// the donation platform.
//
// ## Implementations
//
// - Tiltify v3 REST API: `tiltify-api` crate
// - Test doubles: `tests/common/mod.rs`
//
// ## Usage
//
// ```rust,ignore
// use tiltify_core::DonationSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* DonationSource implementation */;
//
//     // Everything after donation 41
//     let donations = source.fetch_donations("12345", Some(41)).await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::ConnectionConfig;
use crate::model::{
    Campaign, CampaignSummary, Cause, Challenge, Donation, DonationId, Poll, Reward, User,
};

/// Trait for donation source implementations
///
/// One instance is bound to one credential. Implementations must be
/// thread-safe and usable across async tasks.
///
/// # Trust Level: Untrusted
///
/// Donation sources are **untrusted** components with strict limitations:
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
/// - ✅ Parse provider-specific responses
/// - ✅ Return success or failure (engine retries on the next tick)
///
/// ## Forbidden Capabilities
/// - ❌ Spawn tasks or threads (violates shutdown determinism)
/// - ❌ Implement retry logic or backoff (owned by `PollEngine`)
/// - ❌ Access the state store (owned by `PollEngine`)
/// - ❌ Deduplicate or reorder donations (owned by `PollEngine`)
///
/// Every method is a single-shot read. A non-success status or a payload that
/// does not decode must be reported as an upstream error
/// ([`Error::is_upstream`](crate::Error::is_upstream)).
#[async_trait]
pub trait DonationSource: Send + Sync {
    /// Fetch a campaign
    ///
    /// # Parameters
    ///
    /// - `campaign_id`: The campaign identifier as configured
    async fn fetch_campaign(&self, campaign_id: &str) -> Result<Campaign, crate::Error>;

    /// Fetch a cause
    ///
    /// # Parameters
    ///
    /// - `cause_id`: Taken from [`Campaign::cause_id`]
    async fn fetch_cause(&self, cause_id: i64) -> Result<Cause, crate::Error>;

    /// Fetch donations for a campaign
    ///
    /// # Parameters
    ///
    /// - `campaign_id`: The campaign identifier
    /// - `after`: `None` for the full list, `Some(id)` for donations with an
    ///   identifier strictly after `id` (server-side filter)
    ///
    /// # Returns
    ///
    /// Donations in whatever order the server returns them. The engine sorts.
    async fn fetch_donations(
        &self,
        campaign_id: &str,
        after: Option<DonationId>,
    ) -> Result<Vec<Donation>, crate::Error>;

    /// Fetch the rewards of a campaign
    async fn fetch_rewards(&self, campaign_id: &str) -> Result<Vec<Reward>, crate::Error>;

    /// Fetch the polls of a campaign, each with its options
    async fn fetch_polls(&self, campaign_id: &str) -> Result<Vec<Poll>, crate::Error>;

    /// Fetch the challenges of a campaign
    async fn fetch_challenges(&self, campaign_id: &str) -> Result<Vec<Challenge>, crate::Error>;

    /// Fetch the user owning the credential
    async fn fetch_current_user(&self) -> Result<User, crate::Error>;

    /// Fetch the campaigns of a user
    async fn fetch_user_campaigns(
        &self,
        user_id: i64,
    ) -> Result<Vec<CampaignSummary>, crate::Error>;

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}

/// Helper trait for constructing donation sources from configuration
///
/// The connection controller calls this on every `connect()`, so a
/// reconfigured credential always gets a fresh source.
pub trait DonationSourceFactory: Send + Sync {
    /// Create a DonationSource bound to the credential in `config`
    ///
    /// # Returns
    ///
    /// A shared DonationSource trait object
    fn create(&self, config: &ConnectionConfig)
    -> Result<Arc<dyn DonationSource>, crate::Error>;
}
