//! Campaign context cache
//!
//! The campaign and cause metadata every event is enriched with. Loaded once
//! per connection, before the first poll tick runs.

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::model::CampaignContext;
use crate::traits::DonationSource;

/// Bound an upstream call by `timeout`
///
/// An elapsed timeout becomes [`Error::Timeout`], which counts as an upstream
/// failure.
pub async fn with_timeout<T, F>(timeout: Duration, what: &str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(format!(
            "{} did not complete within {:?}",
            what, timeout
        ))),
    }
}

/// Load the context of `campaign_id`
///
/// Two sequential reads: the campaign, then the cause it references. Each is
/// bounded by `timeout`.
///
/// # Returns
///
/// - `Ok(CampaignContext)`: Both reads succeeded
/// - `Err(Error)`: Either read failed; an upstream error
pub async fn load_campaign_context(
    source: &dyn DonationSource,
    campaign_id: &str,
    timeout: Duration,
) -> Result<CampaignContext> {
    let campaign =
        with_timeout(timeout, "campaign fetch", source.fetch_campaign(campaign_id)).await?;
    let cause = with_timeout(timeout, "cause fetch", source.fetch_cause(campaign.cause_id)).await?;

    let context = CampaignContext::from_parts(&campaign, &cause);
    tracing::info!(
        campaign_id,
        campaign = %context.campaign_name,
        cause = %context.cause_name,
        "Campaign context loaded"
    );
    Ok(context)
}
