//! Lookup helpers
//!
//! Preset values for the event filters and the list of campaigns reachable
//! with a credential. Upstream failures are logged and yield an empty list,
//! so a settings screen never breaks because Tiltify is briefly unavailable.

use std::sync::Arc;
use std::time::Duration;

use crate::config::ConnectionConfig;
use crate::context::with_timeout;
use crate::error::{Error, Result};
use crate::filters::PresetValue;
use crate::model::CampaignSummary;
use crate::traits::{DonationSource, DonationSourceFactory};

/// Lookup client for one credential and, optionally, one campaign
pub struct Lookups {
    source: Arc<dyn DonationSource>,
    campaign_id: Option<String>,
    timeout: Duration,
}

impl Lookups {
    /// Build lookups from a connection config
    ///
    /// Only the credential is required here. The campaign id may be empty,
    /// in which case only [`Lookups::campaigns`] is usable.
    ///
    /// # Returns
    ///
    /// - `Err(Error::Config)`: No credential configured
    pub fn from_config(
        factory: &dyn DonationSourceFactory,
        config: &ConnectionConfig,
        timeout: Duration,
    ) -> Result<Self> {
        if config.credential.trim().is_empty() {
            return Err(Error::config("Tiltify is not configured: missing access token"));
        }

        let campaign_id = Some(config.campaign_id.trim().to_string()).filter(|id| !id.is_empty());

        Ok(Self {
            source: factory.create(config)?,
            campaign_id,
            timeout,
        })
    }

    /// Build lookups around an existing source
    pub fn new(
        source: Arc<dyn DonationSource>,
        campaign_id: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            source,
            campaign_id: campaign_id.filter(|id| !id.trim().is_empty()),
            timeout,
        }
    }

    fn campaign_id(&self) -> Result<&str> {
        self.campaign_id
            .as_deref()
            .ok_or_else(|| Error::config("Tiltify is not configured: missing campaign ID"))
    }

    /// Rewards of the configured campaign
    pub async fn rewards(&self) -> Result<Vec<PresetValue>> {
        let campaign_id = self.campaign_id()?;
        let rewards = with_timeout(
            self.timeout,
            "rewards fetch",
            self.source.fetch_rewards(campaign_id),
        )
        .await;

        Ok(or_empty("rewards", rewards)
            .into_iter()
            .map(|r| PresetValue {
                value: r.id,
                display: r.name,
            })
            .collect())
    }

    /// Options of every poll of the configured campaign, flattened
    pub async fn poll_options(&self) -> Result<Vec<PresetValue>> {
        let campaign_id = self.campaign_id()?;
        let polls = with_timeout(
            self.timeout,
            "polls fetch",
            self.source.fetch_polls(campaign_id),
        )
        .await;

        Ok(or_empty("polls", polls)
            .into_iter()
            .flat_map(|poll| poll.options)
            .map(|o| PresetValue {
                value: o.id,
                display: o.name,
            })
            .collect())
    }

    /// Challenges of the configured campaign
    pub async fn challenges(&self) -> Result<Vec<PresetValue>> {
        let campaign_id = self.campaign_id()?;
        let challenges = with_timeout(
            self.timeout,
            "challenges fetch",
            self.source.fetch_challenges(campaign_id),
        )
        .await;

        Ok(or_empty("challenges", challenges)
            .into_iter()
            .map(|c| PresetValue {
                value: c.id,
                display: c.name,
            })
            .collect())
    }

    /// Campaigns of the user owning the credential
    pub async fn campaigns(&self) -> Result<Vec<CampaignSummary>> {
        let campaigns = async {
            let user =
                with_timeout(self.timeout, "user fetch", self.source.fetch_current_user()).await?;
            with_timeout(
                self.timeout,
                "campaigns fetch",
                self.source.fetch_user_campaigns(user.id),
            )
            .await
        }
        .await;

        Ok(or_empty("campaigns", campaigns))
    }
}

fn or_empty<T>(what: &str, result: Result<Vec<T>>) -> Vec<T> {
    result.unwrap_or_else(|e| {
        tracing::warn!("Failed to fetch {}: {}", what, e);
        Vec::new()
    })
}
