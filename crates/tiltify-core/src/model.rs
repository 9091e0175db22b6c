//! Tiltify data model
//!
//! Wire types returned by a [`DonationSource`](crate::traits::DonationSource)
//! and the per-connection [`CampaignContext`] built from them.
//!
//! Field names follow the Tiltify v3 JSON (camelCase).

use serde::{Deserialize, Serialize};

/// Identifier of a donation; the ordering key of the "after" cursor
pub type DonationId = i64;

/// Campaign returned by `GET /campaigns/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: i64,
    pub name: String,
    pub cause_id: i64,
    #[serde(default)]
    pub fundraiser_goal_amount: f64,
    #[serde(default)]
    pub original_fundraiser_goal: f64,
    #[serde(default)]
    pub amount_raised: f64,
    #[serde(default)]
    pub supporting_amount_raised: f64,
    #[serde(default)]
    pub total_amount_raised: f64,
}

/// Cause returned by `GET /causes/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cause {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub legal_name: String,
}

/// A single donation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    pub id: DonationId,
    pub amount: f64,
    /// Payer display name
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub comment: Option<String>,
    /// Completion time, milliseconds since the Unix epoch
    pub completed_at: i64,
    #[serde(default)]
    pub reward_id: Option<i64>,
    #[serde(default)]
    pub poll_option_id: Option<i64>,
    #[serde(default)]
    pub challenge_id: Option<i64>,
}

impl Donation {
    /// Completion time as a UTC timestamp, if it is in range
    pub fn completed_at_utc(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp_millis(self.completed_at)
    }
}

/// A campaign reward (donation incentive)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reward {
    pub id: i64,
    pub name: String,
}

/// A campaign poll with its options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poll {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub options: Vec<PollOption>,
}

/// One option of a [`Poll`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollOption {
    pub id: i64,
    pub name: String,
}

/// A campaign challenge (donation goal with a promised action)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: i64,
    pub name: String,
}

/// The user owning the credential, from `GET /user`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: String,
}

/// Entry of `GET /users/{id}/campaigns`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
}

/// Campaign and cause metadata used to enrich every emitted event
///
/// Built once per connection from two sequential reads (campaign, then the
/// cause it references) and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignContext {
    pub campaign_id: i64,
    pub campaign_name: String,
    pub fundraising_goal: f64,
    pub original_goal: f64,
    pub supporting_raised: f64,
    pub amount_raised: f64,
    pub total_raised: f64,
    pub cause_name: String,
    pub cause_legal_name: String,
}

impl CampaignContext {
    /// Combine a campaign and its cause
    pub fn from_parts(campaign: &Campaign, cause: &Cause) -> Self {
        Self {
            campaign_id: campaign.id,
            campaign_name: campaign.name.clone(),
            fundraising_goal: campaign.fundraiser_goal_amount,
            original_goal: campaign.original_fundraiser_goal,
            supporting_raised: campaign.supporting_amount_raised,
            amount_raised: campaign.amount_raised,
            total_raised: campaign.total_amount_raised,
            cause_name: cause.name.clone(),
            cause_legal_name: cause.legal_name.clone(),
        }
    }
}
